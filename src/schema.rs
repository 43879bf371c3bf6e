//! 商品フィールド定義
//!
//! 抽出・検証・保存の各段階はここで宣言したフィールド記述子を参照する。

use std::fmt;

/// 保存時の型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Numeric,
    Integer,
    Timestamp,
}

impl FieldType {
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Numeric => "NUMERIC(10, 2)",
            FieldType::Integer => "INTEGER",
            FieldType::Timestamp => "TIMESTAMP",
        }
    }
}

/// 抽出失敗時の既定値
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    Null,
    Empty,
    Zero,
    ZeroText,
}

/// フィールド記述子
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ty: FieldType,
    pub default: FieldDefault,
    /// 必須列の並び順（None なら任意列）。検証済み行で null を許さない（review_score を除く）
    pub priority: Option<usize>,
    /// リレーショナルテーブルに保存する列
    pub persisted: bool,
}

impl FieldDescriptor {
    const fn new(name: &'static str, ty: FieldType, default: FieldDefault) -> Self {
        Self {
            name,
            ty,
            default,
            priority: None,
            persisted: true,
        }
    }

    const fn required(mut self, rank: usize) -> Self {
        self.priority = Some(rank);
        self
    }

    pub const fn is_required(&self) -> bool {
        self.priority.is_some()
    }

    const fn transient(mut self) -> Self {
        self.persisted = false;
        self
    }

    pub fn default_value(&self) -> serde_json::Value {
        match self.default {
            FieldDefault::Null => serde_json::Value::Null,
            FieldDefault::Empty => serde_json::Value::String(String::new()),
            FieldDefault::Zero => serde_json::json!(0.0),
            FieldDefault::ZeroText => serde_json::Value::String("0".into()),
        }
    }

    /// 文字列フィールドの既定値（Null は None）
    pub fn default_text(&self) -> Option<String> {
        match self.default {
            FieldDefault::Null => None,
            FieldDefault::Empty => Some(String::new()),
            FieldDefault::Zero | FieldDefault::ZeroText => Some("0".to_string()),
        }
    }

    /// 数値フィールドの既定値
    pub fn default_number(&self) -> Option<f64> {
        match self.default {
            FieldDefault::Zero | FieldDefault::ZeroText => Some(0.0),
            FieldDefault::Null | FieldDefault::Empty => None,
        }
    }
}

pub const NAME: FieldDescriptor = FieldDescriptor::new("name", FieldType::Text, FieldDefault::Null).required(4);
pub const PRICE: FieldDescriptor = FieldDescriptor::new("price", FieldType::Numeric, FieldDefault::Null).required(5);
pub const CURRENCY: FieldDescriptor = FieldDescriptor::new("currency", FieldType::Text, FieldDefault::Null).required(6);
pub const IMAGE_URL: FieldDescriptor = FieldDescriptor::new("image_url", FieldType::Text, FieldDefault::Null).required(9);
pub const PRODUCT_DETAIL_URL: FieldDescriptor = FieldDescriptor::new("product_detail_url", FieldType::Text, FieldDefault::Null);
pub const PAGE_URL: FieldDescriptor = FieldDescriptor::new("page_url", FieldType::Text, FieldDefault::Null);
pub const URL: FieldDescriptor = FieldDescriptor::new("url", FieldType::Text, FieldDefault::Null).required(8).transient();
pub const MARKETPLACE: FieldDescriptor = FieldDescriptor::new("marketplace", FieldType::Text, FieldDefault::Null).required(2);
pub const DATE_COLLECTED: FieldDescriptor = FieldDescriptor::new("date_collected", FieldType::Timestamp, FieldDefault::Null).required(11);
pub const CATEGORY: FieldDescriptor = FieldDescriptor::new("category", FieldType::Text, FieldDefault::Null).required(0);
pub const SUBCATEGORY: FieldDescriptor = FieldDescriptor::new("subcategory", FieldType::Text, FieldDefault::Null).required(1);
pub const AMAZON_CATEGORY: FieldDescriptor = FieldDescriptor::new("amazon_category", FieldType::Text, FieldDefault::Null);
pub const REVIEW_SCORE: FieldDescriptor = FieldDescriptor::new("review_score", FieldType::Numeric, FieldDefault::Zero).required(10);
pub const TOTAL_REVIEWS: FieldDescriptor = FieldDescriptor::new("total_reviews", FieldType::Integer, FieldDefault::ZeroText);
pub const BRAND: FieldDescriptor = FieldDescriptor::new("brand", FieldType::Text, FieldDefault::Null).required(3);
pub const ABOUT: FieldDescriptor = FieldDescriptor::new("about", FieldType::Text, FieldDefault::Empty);
pub const DESCRIPTION: FieldDescriptor = FieldDescriptor::new("description", FieldType::Text, FieldDefault::Empty).required(7);
pub const ERRORS: FieldDescriptor = FieldDescriptor::new("errors", FieldType::Text, FieldDefault::Null).transient();

/// 宣言順（保存テーブルの列順）
pub const PRODUCT_FIELDS: &[FieldDescriptor] = &[
    NAME,
    PRICE,
    CURRENCY,
    IMAGE_URL,
    PRODUCT_DETAIL_URL,
    PAGE_URL,
    URL,
    MARKETPLACE,
    DATE_COLLECTED,
    CATEGORY,
    SUBCATEGORY,
    AMAZON_CATEGORY,
    REVIEW_SCORE,
    TOTAL_REVIEWS,
    BRAND,
    ABOUT,
    DESCRIPTION,
    ERRORS,
];

const fn count_required(fields: &[FieldDescriptor]) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i < fields.len() {
        if fields[i].is_required() {
            count += 1;
        }
        i += 1;
    }
    count
}

const fn priority_order<const N: usize>(fields: &[FieldDescriptor]) -> [&'static str; N] {
    let mut out = [""; N];
    let mut i = 0;
    while i < fields.len() {
        if let Some(rank) = fields[i].priority {
            out[rank] = fields[i].name;
        }
        i += 1;
    }
    out
}

/// 検証済みデータの先頭に並べる必須列（優先順）
pub const PRIORITY_COLUMNS: [&str; count_required(PRODUCT_FIELDS)] =
    priority_order(PRODUCT_FIELDS);

/// null を許容する必須列
pub const NULLABLE_REQUIRED: &str = "review_score";

pub fn field(name: &str) -> Option<&'static FieldDescriptor> {
    PRODUCT_FIELDS.iter().find(|f| f.name == name)
}

/// 数値へ強制変換する列
pub fn numeric_columns() -> impl Iterator<Item = &'static str> {
    PRODUCT_FIELDS
        .iter()
        .filter(|f| f.ty == FieldType::Numeric)
        .map(|f| f.name)
}

/// 保存列の型と制約
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub not_null: bool,
    pub unique: bool,
}

/// フィールド宣言から導出したテーブルスキーマ（永続化しない）
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSchema {
    pub columns: Vec<ColumnSpec>,
}

/// NOT NULL 制約を持つ列
const NOT_NULL_COLUMNS: [&str; 2] = ["name", "price"];
/// 自然キー
pub const NATURAL_KEY: &str = "product_detail_url";

impl StorageSchema {
    pub fn derive() -> Self {
        let columns = PRODUCT_FIELDS
            .iter()
            .filter(|f| f.persisted)
            .map(|f| ColumnSpec {
                name: f.name,
                ty: f.ty,
                not_null: NOT_NULL_COLUMNS.contains(&f.name),
                unique: f.name == NATURAL_KEY,
            })
            .collect();
        Self { columns }
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// CREATE TABLE の列定義部分
    pub fn column_definitions(&self) -> String {
        let mut lines = vec!["id SERIAL PRIMARY KEY".to_string()];
        lines.extend(self.columns.iter().map(ColumnSpec::to_string));
        lines.join(",\n    ")
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.ty.sql_type())?;
        if self.not_null {
            write!(f, " NOT NULL")?;
        }
        if self.unique {
            write!(f, " UNIQUE")?;
        }
        Ok(())
    }
}
