//! レコード型

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schema;

/// 全試行失敗時に付与するエラータグ
pub const ALL_ATTEMPTS_FAILED: &str = "All attempts failed";

/// 一覧ページから抽出した商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub name: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub image_url: Option<String>,
    /// 自然キー
    pub product_detail_url: String,
    pub page_url: String,
    /// マーケットプレイスのベースURL
    pub url: String,
    pub marketplace: String,
    pub category: String,
    pub subcategory: String,
    pub date_collected: NaiveDate,
}

/// 詳細ページから抽出したフィールド
#[derive(Debug, Clone, PartialEq)]
pub struct DetailFields {
    pub title: Option<String>,
    /// パンくず（タブ区切り）
    pub amazon_category: Option<String>,
    pub brand: Option<String>,
    pub about: String,
    pub description: String,
    pub review_score: f64,
    pub total_reviews: String,
}

/// フィールド記述子の既定値（抽出失敗・全試行失敗時）
impl Default for DetailFields {
    fn default() -> Self {
        Self {
            title: None,
            amazon_category: schema::AMAZON_CATEGORY.default_text(),
            brand: schema::BRAND.default_text(),
            about: schema::ABOUT.default_text().unwrap_or_default(),
            description: schema::DESCRIPTION.default_text().unwrap_or_default(),
            review_score: schema::REVIEW_SCORE.default_number().unwrap_or_default(),
            total_reviews: schema::TOTAL_REVIEWS.default_text().unwrap_or_default(),
        }
    }
}

/// 詳細情報を付与した商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub listing: ListingRecord,
    pub amazon_category: Option<String>,
    pub brand: Option<String>,
    pub about: String,
    pub description: String,
    pub review_score: f64,
    pub total_reviews: String,
    /// 抽出に失敗した任意セレクタ
    #[serde(default)]
    pub errors: Vec<String>,
}

impl EnrichedRecord {
    /// 一覧レコードに詳細フィールドをマージ
    ///
    /// 詳細ページのタイトルが取れた場合のみ name を置き換える。
    pub fn merge(listing: ListingRecord, detail: DetailFields, errors: Vec<String>) -> Self {
        let mut listing = listing;
        if let Some(title) = detail.title {
            listing.name = title;
        }
        Self {
            listing,
            amazon_category: detail.amazon_category,
            brand: detail.brand,
            about: detail.about,
            description: detail.description,
            review_score: detail.review_score,
            total_reviews: detail.total_reviews,
            errors,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.errors.iter().any(|e| e == ALL_ATTEMPTS_FAILED)
    }
}

/// ベストエフォート抽出の結果
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<T> {
    pub value: T,
    /// 失敗したサブフィールド（"field: selector" 形式）
    pub errors: Vec<String>,
}

impl<T> Extracted<T> {
    pub fn has_error_for(&self, field: &str) -> bool {
        self.errors
            .iter()
            .any(|e| e.split(':').next() == Some(field))
    }
}
