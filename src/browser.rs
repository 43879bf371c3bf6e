//! chromiumoxide による `PageFetcher` 実装
//!
//! 1回の実行につきブラウザ1つ・ページ1つを排他的に所有し、順次ナビゲーションする。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::{PageFetcher, SessionFactory};

/// セレクタ出現判定のインターバル（ミリ秒）
const SELECTOR_POLL_INTERVAL_MS: u64 = 250;

/// ブロック対象（動画・音声・広告/解析ドメイン）
const BLOCKED_URL_PATTERNS: &[&str] = &[
    "*.mp4",
    "*.m3u8",
    "*.webm",
    "*.mov",
    "*.avi",
    "*.flv",
    "*.mp3",
    "*doubleclick.net*",
    "*google-analytics.com*",
    "*googletagmanager.com*",
    "*adsystem.com*",
    "*amazon-adsystem.com*",
    "*facebook.net*",
];

/// ブラウザセッション
pub struct BrowserSession {
    config: ScraperConfig,
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
}

impl BrowserSession {
    /// ブラウザを起動して空ページを1つ開く
    pub async fn launch(config: ScraperConfig) -> Result<Self, ScraperError> {
        info!("Initializing browser session...");

        // ユニークなユーザーデータディレクトリを生成
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("marketplace-scraper-{}", unique_id));

        let mut builder = BrowserConfig::builder()
            .chrome_executable(config.resolve_chrome_path())
            .user_data_dir(&user_data_dir)
            .window_size(1280, 800);

        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(config.listing_timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        if config.block_resources {
            block_requests(&page).await;
        }

        info!("Browser session ready");
        Ok(Self {
            config,
            browser: Some(browser),
            page: Some(page),
            handler_task: Some(handler_task),
        })
    }

    fn get_page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("ブラウザが初期化されていません".into()))
    }

    /// デバッグ用スクリーンショットをログ出力
    async fn log_screenshot(&self, context: &str) {
        if !self.config.debug {
            return;
        }
        let Ok(page) = self.get_page() else {
            return;
        };
        if let Ok(screenshot) = page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
            debug!("{} screenshot: data:image/png;base64,{}", context, encoded);
        }
    }
}

/// 不要なサブリソースをブロック（失敗しても続行）
async fn block_requests(page: &Page) {
    if let Err(e) = page.execute(EnableParams::default()).await {
        warn!("Failed to enable network domain: {}", e);
        return;
    }
    let patterns: Vec<String> = BLOCKED_URL_PATTERNS.iter().map(|p| p.to_string()).collect();
    match page.execute(SetBlockedUrLsParams::new(patterns)).await {
        Ok(_) => debug!("Blocking {} URL patterns", BLOCKED_URL_PATTERNS.len()),
        Err(e) => warn!("Failed to set blocked URLs: {}", e),
    }
}

#[async_trait]
impl PageFetcher for BrowserSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError> {
        let page = self.get_page()?;
        debug!("Navigating to {}", url);

        let result = match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScraperError::Navigation(format!("{}: {}", url, e))),
            Err(_) => Err(ScraperError::Timeout(format!(
                "{} ({}秒)",
                url,
                timeout.as_secs()
            ))),
        };

        if result.is_err() {
            self.log_screenshot("Navigation failure").await;
        }
        result
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        let page = self.get_page()?;
        let start = Instant::now();

        // 要素の出現をポーリング
        loop {
            if page.find_element(selector).await.is_ok() {
                debug!("Selector {} ready after {:?}", selector, start.elapsed());
                return Ok(());
            }

            if start.elapsed() > timeout {
                self.log_screenshot("Selector timeout").await;
                return Err(ScraperError::Timeout(format!(
                    "セレクタ {} が{}秒以内に出現しませんでした",
                    selector,
                    timeout.as_secs()
                )));
            }

            sleep(Duration::from_millis(SELECTOR_POLL_INTERVAL_MS)).await;
        }
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        self.get_page()?
            .content()
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("Closing browser session...");

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Failed to close page: {}", e);
            }
        }

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Failed to wait for browser exit: {}", e);
            }
        }

        if let Some(task) = self.handler_task.take() {
            task.abort();
        }

        info!("Browser session closed");
        Ok(())
    }
}

/// 段階ごとにブラウザを起動する
#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    config: ScraperConfig,
}

impl BrowserLauncher {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for BrowserLauncher {
    type Session = BrowserSession;

    async fn open(&self) -> Result<BrowserSession, ScraperError> {
        info!("Launching browser (headless: {})", self.config.headless);
        BrowserSession::launch(self.config.clone()).await
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // close() を経由しなかった経路（パニック等）でもハンドラを止める。
        // Browser 自体は drop 時に子プロセスを終了する。
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}
