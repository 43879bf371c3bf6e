use std::path::PathBuf;
use std::time::Duration;

/// ブラウザセッション設定
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub headless: bool,
    /// 未指定時は CHROME_PATH / CHROMIUM_PATH 環境変数 → "chromium"
    pub chrome_path: Option<PathBuf>,
    /// 一覧ページのナビゲーションタイムアウト
    pub listing_timeout: Duration,
    /// 詳細ページのナビゲーションタイムアウト
    pub detail_timeout: Duration,
    /// セレクタ出現待機のタイムアウト
    pub selector_timeout: Duration,
    /// 次ページへ進む前の待機
    pub page_delay: Duration,
    /// メディア・広告リクエストをブロックする
    pub block_resources: bool,
    /// デバッグモード（失敗時スクリーンショットをログ出力）
    pub debug: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            listing_timeout: Duration::from_secs(100),
            detail_timeout: Duration::from_secs(60),
            selector_timeout: Duration::from_secs(60),
            page_delay: Duration::from_secs(3),
            block_resources: true,
            debug: false,
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn with_listing_timeout(mut self, timeout: Duration) -> Self {
        self.listing_timeout = timeout;
        self
    }

    pub fn with_detail_timeout(mut self, timeout: Duration) -> Self {
        self.detail_timeout = timeout;
        self
    }

    pub fn with_selector_timeout(mut self, timeout: Duration) -> Self {
        self.selector_timeout = timeout;
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn with_block_resources(mut self, block: bool) -> Self {
        self.block_resources = block;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// 使用する Chrome 実行ファイル
    pub fn resolve_chrome_path(&self) -> PathBuf {
        self.chrome_path.clone().unwrap_or_else(|| {
            std::env::var("CHROME_PATH")
                .or_else(|_| std::env::var("CHROMIUM_PATH"))
                .unwrap_or_else(|_| "chromium".to_string())
                .into()
        })
    }
}
