//! 統合テスト用のスクリプト化フェッチャーとHTMLフィクスチャ

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marketplace_scraper::{PageFetcher, ScraperError, SessionFactory};
use scraper::{Html, Selector};

pub const BASE_URL: &str = "https://www.amazon.ae";

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Timeout,
    Navigation,
    /// リトライ対象外
    Config,
}

/// URL → HTML を返すフェッチャー（URLごとに失敗を仕込める）
///
/// クローン同士で close 回数を共有する。
#[derive(Debug, Default, Clone)]
pub struct ScriptedFetcher {
    pages: HashMap<String, String>,
    failures: HashMap<String, VecDeque<Failure>>,
    visits: Vec<String>,
    current: Option<String>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// 次の `times` 回のナビゲーションを失敗させる
    pub fn fail(mut self, url: impl Into<String>, failure: Failure, times: usize) -> Self {
        self.failures
            .entry(url.into())
            .or_default()
            .extend(std::iter::repeat(failure).take(times));
        self
    }

    pub fn visits(&self, url: &str) -> usize {
        self.visits.iter().filter(|v| v.as_str() == url).count()
    }

    pub fn total_visits(&self) -> usize {
        self.visits.len()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), ScraperError> {
        self.visits.push(url.to_string());
        self.current = None;

        if let Some(failure) = self.failures.get_mut(url).and_then(VecDeque::pop_front) {
            return Err(match failure {
                Failure::Timeout => ScraperError::Timeout(format!("navigate {}", url)),
                Failure::Navigation => ScraperError::Navigation(format!("net::ERR_FAILED {}", url)),
                Failure::Config => ScraperError::Config(format!("bad request {}", url)),
            });
        }
        if !self.pages.contains_key(url) {
            return Err(ScraperError::Navigation(format!("404 {}", url)));
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    /// 読み込んだHTMLにセレクタが現れなければタイムアウト扱い
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<(), ScraperError> {
        let html = self
            .current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .ok_or_else(|| ScraperError::ElementNotFound(selector.to_string()))?;
        if contains_selector(html, selector)? {
            Ok(())
        } else {
            Err(ScraperError::Timeout(format!("selector {}", selector)))
        }
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .cloned()
            .ok_or_else(|| ScraperError::Navigation("no page loaded".into()))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn contains_selector(html: &str, selector: &str) -> Result<bool, ScraperError> {
    let parsed = Selector::parse(selector)
        .map_err(|e| ScraperError::Extraction(format!("{}: {}", selector, e)))?;
    Ok(Html::parse_document(html).select(&parsed).next().is_some())
}

/// 開くたびに同じ台本のフェッチャーを返す
#[derive(Debug, Clone)]
pub struct ScriptedLauncher {
    fetcher: ScriptedFetcher,
    opened: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    pub fn new(fetcher: ScriptedFetcher) -> Self {
        Self {
            fetcher,
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.fetcher.close_count()
    }
}

#[async_trait]
impl SessionFactory for ScriptedLauncher {
    type Session = ScriptedFetcher;

    async fn open(&self) -> Result<ScriptedFetcher, ScraperError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.fetcher.clone())
    }
}

/// 商品コンテナのないブロックページ
pub fn blocked_page() -> String {
    "<html><body><p>robot check</p></body></html>".to_string()
}

pub fn detail_url(asin: &str) -> String {
    format!("{}/dp/{}", BASE_URL, asin)
}

/// 一覧アイテム（name が None なら商品名なし）
pub fn listing_item(asin: &str, name: Option<&str>, price: &str) -> String {
    let name = name
        .map(|n| format!("<h2><span>{}</span></h2>", n))
        .unwrap_or_default();
    format!(
        r#"<div class="a-section a-spacing-base">
             <span data-component-type="s-product-image">
               <a class="a-link-normal" href="/dp/{asin}"><img class="s-image" src="https://m.media-amazon.com/{asin}.jpg"></a>
             </span>
             {name}
             <span class="a-price"><span class="a-offscreen">{price}</span></span>
           </div>"#
    )
}

/// `count` 件のアイテムを持つ一覧ページ（ASIN は prefix + 連番）
pub fn items(prefix: &str, count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| {
            listing_item(
                &format!("{}{:03}", prefix, i),
                Some(&format!("Product {} {}", prefix, i)),
                "AED 10.50",
            )
        })
        .collect()
}

/// 一覧ページ（pagination ラベルは 1..=max_page、next は有効なリンクか無効化された表示）
pub fn listing_page(items: &[String], max_page: u32, next_href: Option<&str>) -> String {
    let labels: String = (1..=max_page)
        .map(|p| format!(r#"<span class="s-pagination-item">{}</span>"#, p))
        .collect();
    let next = match next_href {
        Some(href) => format!(r#"<a class="s-pagination-next" href="{}">Next</a>"#, href),
        None => r#"<span class="s-pagination-item s-pagination-next s-pagination-disabled">Next</span>"#
            .to_string(),
    };
    format!(
        r#"<html><body><div class="s-main-slot">{}</div><div class="s-pagination-strip">{}{}</div></body></html>"#,
        items.join("\n"),
        labels,
        next
    )
}

/// 全フィールドがそろった詳細ページ
pub fn detail_page(title: &str, brand: Option<&str>) -> String {
    let brand = brand
        .map(|b| {
            format!(
                r#"<table><tr class="po-brand"><td class="a-span3">Brand</td><td class="a-span9">{}</td></tr></table>"#,
                b
            )
        })
        .unwrap_or_default();
    format!(
        r#"<html><body>
      <div id="desktop-breadcrumbs_feature_div">
        <ul class="a-unordered-list a-horizontal a-size-small">
          <li><span class="a-list-item"><a>Pet Supplies</a></span></li>
          <li><span class="a-list-item"><a>Cats</a></span></li>
        </ul>
      </div>
      <div id="ppd"><div id="centerCol">
        <span id="productTitle">{title}</span>
        <div id="averageCustomerReviews">
          <span class="a-icon-alt">4.4 out of 5 stars</span>
          <span id="acrCustomerReviewText">2,048 ratings</span>
        </div>
        {brand}
        <div id="feature-bullets"><ul class="a-unordered-list a-vertical"><li>Grain free</li></ul></div>
      </div></div>
      <div id="productDescription_feature_div"><div id="productDescription"><p>Description of {title}</p></div></div>
    </body></html>"#
    )
}
