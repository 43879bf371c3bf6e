//! 一覧（検索結果）ページの抽出

use chrono::NaiveDate;
use scraper::{ElementRef, Html};
use url::Url;

use super::parse::{element_text, parse_price};
use super::selectors::listing as sel;
use crate::error::ScraperError;
use crate::schema;
use crate::types::{Extracted, ListingRecord};

/// 一覧レコードに付与する実行コンテキスト
#[derive(Debug, Clone)]
pub struct ListingContext {
    pub marketplace: String,
    /// 相対リンクの解決に使うベースURL
    pub base_url: Url,
    pub category: String,
    pub subcategory: String,
    pub date_collected: NaiveDate,
}

/// アイテム単位の抽出結果。Ok(None) は商品リンクを持たないブロック
pub type ItemResult = Result<Option<Extracted<ListingRecord>>, ScraperError>;

/// 1ページ分の解析結果
#[derive(Debug)]
pub struct ListingPage {
    pub items: Vec<ItemResult>,
    /// ページネーションの最大ページ番号
    pub max_page_label: Option<u32>,
    /// 有効な「次へ」リンクの絶対URL
    pub next_url: Option<String>,
}

impl ListingPage {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

pub fn parse_listing_page(html: &str, page_url: &str, ctx: &ListingContext) -> ListingPage {
    let document = Html::parse_document(html);

    let items = document
        .select(&sel::ITEM_SEL)
        .map(|item| extract_listing(item, page_url, ctx))
        .collect();

    ListingPage {
        items,
        max_page_label: max_page_label(&document),
        next_url: next_url(&document, &ctx.base_url),
    }
}

/// 一覧アイテム1件を抽出
///
/// 任意フィールドの失敗は既定値 + errors に記録し、
/// 商品名が無いアイテムだけをエラーとして返す。
pub fn extract_listing(item: ElementRef<'_>, page_url: &str, ctx: &ListingContext) -> ItemResult {
    let Some(href) = item
        .select(&sel::LINK_SEL)
        .find_map(|link| link.value().attr("href"))
    else {
        return Ok(None);
    };
    let product_detail_url = ctx.base_url.join(href)?.to_string();

    let name = item
        .select(&sel::NAME_SEL)
        .next()
        .map(element_text)
        .filter(|name| !name.is_empty())
        .ok_or(ScraperError::MissingField {
            field: schema::NAME.name,
        })?;

    let mut errors = Vec::new();

    let image_url = item
        .select(&sel::IMAGE_SEL)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);
    if image_url.is_none() {
        errors.push(format!("{}: {}", schema::IMAGE_URL.name, sel::IMAGE));
    }

    let (currency, price) = match item.select(&sel::PRICE_SEL).next().map(element_text) {
        Some(text) => match parse_price(&text) {
            Ok((currency, price)) => (Some(currency), Some(price)),
            Err(_) => {
                errors.push(format!("{}: {} ({:?})", schema::PRICE.name, sel::PRICE, text));
                (None, None)
            }
        },
        None => {
            errors.push(format!("{}: {}", schema::PRICE.name, sel::PRICE));
            (None, None)
        }
    };

    Ok(Some(Extracted {
        value: ListingRecord {
            name,
            price,
            currency,
            image_url,
            product_detail_url,
            page_url: page_url.to_string(),
            url: ctx.base_url.as_str().trim_end_matches('/').to_string(),
            marketplace: ctx.marketplace.clone(),
            category: ctx.category.clone(),
            subcategory: ctx.subcategory.clone(),
            date_collected: ctx.date_collected,
        },
        errors,
    }))
}

fn max_page_label(document: &Html) -> Option<u32> {
    document
        .select(&sel::PAGINATION_ITEM_SEL)
        .filter_map(|el| element_text(el).parse::<u32>().ok())
        .max()
}

fn next_url(document: &Html, base_url: &Url) -> Option<String> {
    let next = document.select(&sel::NEXT_SEL).next()?;
    let disabled = next.value().classes().any(|c| c == "s-pagination-disabled")
        || next.value().attr("aria-disabled") == Some("true");
    if disabled {
        return None;
    }
    let href = next.value().attr("href")?;
    base_url.join(href).ok().map(|u| u.to_string())
}
