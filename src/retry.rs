//! 有界リトライポリシー
//!
//! 一覧ウォーカーと詳細エンリッチャーで共通に使う。
//!
//! ```rust,ignore
//! let mut attempts = policy.attempts();
//! while let Some(attempt) = attempts.next_attempt() {
//!     match fetch(url).await {
//!         Ok(value) => return RetryOutcome::Success { value, attempts: attempt },
//!         Err(e) => attempts.fail(e, url).await,
//!     }
//! }
//! attempts.exhausted()
//! ```

use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::error::ScraperError;

/// リトライ設定
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// タイムアウト後の待機
    pub timeout_backoff: Duration,
    /// その他のエラー後の待機
    pub error_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            timeout_backoff: Duration::ZERO,
            error_backoff: Duration::ZERO,
        }
    }

    /// 一覧ページ用: 5回 / 3秒固定
    pub fn listing_page() -> Self {
        Self::new(5).with_backoff(Duration::from_secs(3), Duration::from_secs(3))
    }

    /// 詳細ページ用: 5回 / タイムアウト3秒・その他5秒
    pub fn detail_page() -> Self {
        Self::new(5).with_backoff(Duration::from_secs(3), Duration::from_secs(5))
    }

    pub fn with_backoff(mut self, timeout_backoff: Duration, error_backoff: Duration) -> Self {
        self.timeout_backoff = timeout_backoff;
        self.error_backoff = error_backoff;
        self
    }

    /// エラー種別ごとの待機時間
    pub fn backoff_for(&self, error: &ScraperError) -> Duration {
        if error.is_timeout() {
            self.timeout_backoff
        } else {
            self.error_backoff
        }
    }

    pub fn attempts(&self) -> Attempts<'_> {
        Attempts {
            policy: self,
            attempt: 0,
            last_error: None,
            stopped: false,
        }
    }
}

/// 1つの対象（ページ・レコード）に対する試行カウンタ
#[derive(Debug)]
pub struct Attempts<'a> {
    policy: &'a RetryPolicy,
    attempt: u32,
    last_error: Option<ScraperError>,
    /// リトライ対象外のエラーで打ち切った
    stopped: bool,
}

impl Attempts<'_> {
    /// 次の試行番号（1始まり）。上限に達したか打ち切り済みなら None
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.stopped || self.attempt >= self.policy.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some(self.attempt)
    }

    /// 失敗を記録し、残り試行があれば待機する
    ///
    /// リトライ対象外のエラーは待機せずに打ち切る。
    pub async fn fail(&mut self, error: ScraperError, context: &str) {
        if !error.is_retryable() {
            warn!(
                "Attempt {}/{} failed for {} with a non-retryable error, giving up: {}",
                self.attempt, self.policy.max_attempts, context, error
            );
            self.last_error = Some(error);
            self.stopped = true;
            return;
        }

        let backoff = self.policy.backoff_for(&error);
        warn!(
            "Attempt {}/{} failed for {}: {}",
            self.attempt, self.policy.max_attempts, context, error
        );
        self.last_error = Some(error);

        if self.attempt < self.policy.max_attempts && !backoff.is_zero() {
            sleep(backoff).await;
        }
    }

    pub fn exhausted<T>(self) -> RetryOutcome<T> {
        RetryOutcome::Exhausted {
            attempts: self.attempt,
            last_error: self.last_error,
        }
    }
}

/// リトライ結果
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    Exhausted {
        attempts: u32,
        /// max_attempts が 0 の場合は None
        last_error: Option<ScraperError>,
    },
}
