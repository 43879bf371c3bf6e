//! 詳細エンリッチャー
//!
//! 一覧レコードごとに詳細ページを取得し、付加情報をマージする。
//! 1つのセッションを全レコードで共有し、レコード単位で失敗を隔離する。

use std::time::Duration;

use tracing::{info, warn};

use crate::config::ScraperConfig;
use crate::extract::extract_detail;
use crate::extract::selectors::detail::READY;
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::traits::PageFetcher;
use crate::types::{DetailFields, EnrichedRecord, Extracted, ListingRecord, ALL_ATTEMPTS_FAILED};

#[derive(Debug, Clone)]
pub struct DetailEnricher {
    retry: RetryPolicy,
    navigation_timeout: Duration,
    selector_timeout: Duration,
}

impl DetailEnricher {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            retry: RetryPolicy::detail_page(),
            navigation_timeout: config.detail_timeout,
            selector_timeout: config.selector_timeout,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// records[..limit] を順にエンリッチする
    ///
    /// 1件の失敗（全試行失敗を含む）は後続レコードの処理を止めない。
    pub async fn enrich<F>(
        &self,
        fetcher: &mut F,
        records: Vec<ListingRecord>,
        limit: Option<usize>,
    ) -> Vec<EnrichedRecord>
    where
        F: PageFetcher + ?Sized,
    {
        let total = limit.map_or(records.len(), |l| l.min(records.len()));
        info!("Enriching {} of {} products", total, records.len());

        let mut enriched = Vec::with_capacity(total);
        let mut exhausted = 0;

        for (idx, record) in records.into_iter().take(total).enumerate() {
            let index = idx + 1;
            info!(
                "Index [{}] - product name: {} ...",
                index,
                record.name.chars().take(50).collect::<String>()
            );

            let result = match self.fetch_detail(fetcher, &record.product_detail_url).await {
                RetryOutcome::Success { value, attempts } => {
                    if attempts > 1 {
                        info!("[{}] Succeeded on attempt {}", index, attempts);
                    }
                    EnrichedRecord::merge(record, value.value, value.errors)
                }
                RetryOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    exhausted += 1;
                    warn!(
                        "[{}] All {} attempts failed for {}: {}",
                        index,
                        attempts,
                        record.product_detail_url,
                        last_error.map(|e| e.to_string()).unwrap_or_default()
                    );
                    EnrichedRecord::merge(
                        record,
                        DetailFields::default(),
                        vec![ALL_ATTEMPTS_FAILED.to_string()],
                    )
                }
            };

            info!(
                "[{}] Collected: {}...",
                index,
                result.listing.name.chars().take(60).collect::<String>()
            );
            enriched.push(result);
        }

        info!(
            "Enriched {} products ({} exhausted all attempts)",
            enriched.len(),
            exhausted
        );
        enriched
    }

    /// 1レコード分の取得・抽出（試行ごとに結果を作り直す）
    async fn fetch_detail<F>(&self, fetcher: &mut F, url: &str) -> RetryOutcome<Extracted<DetailFields>>
    where
        F: PageFetcher + ?Sized,
    {
        let mut attempts = self.retry.attempts();
        while let Some(attempt) = attempts.next_attempt() {
            info!("Attempt Number - [{}]", attempt);
            match fetcher
                .load(url, self.navigation_timeout, &READY, self.selector_timeout)
                .await
            {
                Ok(html) => {
                    return RetryOutcome::Success {
                        value: extract_detail(&html),
                        attempts: attempt,
                    };
                }
                Err(e) => attempts.fail(e, url).await,
            }
        }
        attempts.exhausted()
    }
}
