use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScraperError;

/// ページ取得の抽象（ナビゲーション → 待機 → レンダリング済みHTML）
///
/// リトライは呼び出し側（一覧ウォーカー・詳細エンリッチャー）が行う。
/// 実装自身はリトライしない。
#[async_trait]
pub trait PageFetcher: Send {
    /// URLへ遷移し、DOMContentLoaded まで待つ
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError>;

    /// セレクタが出現するまで待つ
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ScraperError>;

    /// 現在のページのHTML
    async fn content(&mut self) -> Result<String, ScraperError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), ScraperError>;

    /// 一括実行（navigate → 各セレクタ待機 → content）
    async fn load(
        &mut self,
        url: &str,
        timeout: Duration,
        ready_selectors: &[&str],
        selector_timeout: Duration,
    ) -> Result<String, ScraperError> {
        self.navigate(url, timeout).await?;
        for selector in ready_selectors {
            self.wait_for_selector(selector, selector_timeout).await?;
        }
        self.content().await
    }
}

/// 段階ごとにページ取得セッションを開く
///
/// 開いたセッションは呼び出し側が成功・失敗にかかわらず `close` する。
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: PageFetcher;

    async fn open(&self) -> Result<Self::Session, ScraperError>;
}
