//! 一覧ページウォーカー
//!
//! ページ数を決めて（URLテンプレート）または「次へ」リンクを辿って一覧ページを巡回し、
//! アイテム単位でエラーを隔離しながら一覧レコードを集める。

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::extract::{parse_listing_page, ListingContext, ListingPage};
use crate::extract::selectors::listing::RESULTS_SLOT;
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::traits::PageFetcher;
use crate::types::ListingRecord;

/// URLテンプレート中のページ番号プレースホルダ
pub const PAGE_INDEX_PLACEHOLDER: &str = "{page_index}";

/// ページ巡回の開始点
#[derive(Debug, Clone, PartialEq)]
pub enum PageSource {
    /// `{page_index}` を含むテンプレートから各ページURLを合成
    Template { url_template: String, min_page: u32 },
    /// 開始URLから「次へ」リンクを辿る
    NextControl { start_url: String },
}

impl PageSource {
    pub fn page_url(url_template: &str, page_index: u32) -> String {
        url_template.replace(PAGE_INDEX_PLACEHOLDER, &page_index.to_string())
    }
}

/// 一覧ページウォーカー
#[derive(Debug, Clone)]
pub struct PaginationWalker {
    context: ListingContext,
    retry: RetryPolicy,
    navigation_timeout: Duration,
    selector_timeout: Duration,
    page_delay: Duration,
}

impl PaginationWalker {
    pub fn new(context: ListingContext, config: &ScraperConfig) -> Self {
        Self {
            context,
            retry: RetryPolicy::listing_page(),
            navigation_timeout: config.listing_timeout,
            selector_timeout: config.selector_timeout,
            page_delay: config.page_delay,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 全ページを巡回して一覧レコードを返す（ページ順 → アイテム順）
    pub async fn walk<F>(
        &self,
        fetcher: &mut F,
        source: &PageSource,
        max_pages: Option<u32>,
    ) -> Vec<ListingRecord>
    where
        F: PageFetcher + ?Sized,
    {
        let mut records = Vec::new();
        let pages_visited = match source {
            PageSource::Template {
                url_template,
                min_page,
            } => {
                self.walk_template(fetcher, url_template, *min_page, max_pages, &mut records)
                    .await
            }
            PageSource::NextControl { start_url } => {
                self.walk_next(fetcher, start_url, max_pages, &mut records)
                    .await
            }
        };

        info!("Total pages visited: {}", pages_visited);
        info!("Total products collected: {}", records.len());
        records
    }

    async fn walk_template<F>(
        &self,
        fetcher: &mut F,
        url_template: &str,
        min_page: u32,
        max_pages: Option<u32>,
        records: &mut Vec<ListingRecord>,
    ) -> u32
    where
        F: PageFetcher + ?Sized,
    {
        // ページ数を決めるために1ページ目を取得（min_page が 1 なら結果をそのまま使う）
        let first_url = PageSource::page_url(url_template, 1);
        let first = self.load_page(fetcher, &first_url).await;

        let actual_max = match &first {
            RetryOutcome::Success { value, .. } => value.max_page_label.unwrap_or(1),
            RetryOutcome::Exhausted { .. } => 1,
        };
        let last_page = max_pages.map_or(actual_max, |cap| cap.min(actual_max));
        info!("Max paginated number found: {}", actual_max);
        info!("Selected paginated number: {}", last_page);

        let mut cached_first = (min_page == 1).then_some(first);
        let mut visited = 0;

        for page_index in min_page..=last_page {
            let url = PageSource::page_url(url_template, page_index);

            let outcome = match cached_first.take() {
                Some(outcome) => outcome,
                None => {
                    if visited > 0 {
                        self.pause().await;
                    }
                    self.load_page(fetcher, &url).await
                }
            };
            let page = match outcome {
                RetryOutcome::Success { value, .. } => value,
                RetryOutcome::Exhausted { attempts, .. } => {
                    warn!(
                        "Abandoning page {} after {} attempts: {}",
                        page_index, attempts, url
                    );
                    continue;
                }
            };
            visited += 1;

            if self.collect(page_index, &url, page, records) == 0 {
                info!("No items on page {}, stopping", page_index);
                break;
            }
        }

        visited
    }

    async fn walk_next<F>(
        &self,
        fetcher: &mut F,
        start_url: &str,
        max_pages: Option<u32>,
        records: &mut Vec<ListingRecord>,
    ) -> u32
    where
        F: PageFetcher + ?Sized,
    {
        let mut url = start_url.to_string();
        let mut page_num = 0;

        loop {
            let page = match self.load_page(fetcher, &url).await {
                RetryOutcome::Success { value, .. } => value,
                RetryOutcome::Exhausted { attempts, .. } => {
                    warn!(
                        "Abandoning page {} after {} attempts, ending pagination: {}",
                        page_num + 1,
                        attempts,
                        url
                    );
                    break;
                }
            };
            page_num += 1;

            let next_url = page.next_url.clone();
            if self.collect(page_num, &url, page, records) == 0 {
                info!("No items on page {}, stopping", page_num);
                break;
            }
            if max_pages.is_some_and(|cap| page_num >= cap) {
                info!("Reached page limit {}", page_num);
                break;
            }
            match next_url {
                Some(next) => url = next,
                None => {
                    info!("Next control absent or disabled on page {}", page_num);
                    break;
                }
            }

            self.pause().await;
        }

        page_num
    }

    /// ナビゲーション + 結果スロット待機 + 解析（リトライ付き）
    async fn load_page<F>(&self, fetcher: &mut F, url: &str) -> RetryOutcome<ListingPage>
    where
        F: PageFetcher + ?Sized,
    {
        let mut attempts = self.retry.attempts();
        while let Some(attempt) = attempts.next_attempt() {
            info!("Scraping page {} (attempt {})", url, attempt);
            match fetcher
                .load(url, self.navigation_timeout, &[RESULTS_SLOT], self.selector_timeout)
                .await
            {
                Ok(html) => {
                    let page = parse_listing_page(&html, url, &self.context);
                    return RetryOutcome::Success {
                        value: page,
                        attempts: attempt,
                    };
                }
                Err(e) => attempts.fail(e, url).await,
            }
        }
        attempts.exhausted()
    }

    /// アイテムを取り込み、アイテム数（スキップ分を含む）を返す
    fn collect(
        &self,
        page_index: u32,
        url: &str,
        page: ListingPage,
        records: &mut Vec<ListingRecord>,
    ) -> usize {
        let item_count = page.item_count();
        let before = records.len();

        for (idx, item) in page.items.into_iter().enumerate() {
            match item {
                Ok(Some(extracted)) => {
                    if !extracted.errors.is_empty() {
                        debug!(
                            "Product #{} on page {} missing fields: {:?}",
                            idx + 1,
                            page_index,
                            extracted.errors
                        );
                    }
                    records.push(extracted.value);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "Skipping product #{} on page {} ({}) due to error: {}",
                        idx + 1,
                        page_index,
                        url,
                        e
                    );
                }
            }
        }

        info!(
            "Total extracted products: [{}] -- page: [{}]",
            records.len() - before,
            page_index
        );
        item_count
    }

    async fn pause(&self) {
        if !self.page_delay.is_zero() {
            sleep(self.page_delay).await;
        }
    }
}
