//! PostgreSQL への upsert
//!
//! テーブルはフィールド宣言から導出したスキーマで作成し、
//! `product_detail_url` が既存の行は挿入しない。

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres};
use tracing::{debug, info};

use crate::dataset::{cell_to_string, Dataset};
use crate::error::ScraperError;
use crate::schema::{self, FieldType, StorageSchema, NATURAL_KEY};

const DEFAULT_PORT: u16 = 5432;
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// 接続設定（環境変数 DB_HOST / DB_PORT / DB_NAME / DB_USER / DB_PASSWORD）
#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl DbConfig {
    pub fn from_env() -> Result<Self, ScraperError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー参照関数から構築
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScraperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ScraperError::Config(format!("環境変数 {} が未設定です", key)))
        };

        let port = match lookup("DB_PORT").filter(|v| !v.is_empty()) {
            Some(p) => p
                .parse()
                .map_err(|_| ScraperError::Config(format!("DB_PORT が不正です: {}", p)))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: required("DB_HOST")?,
            port,
            database: required("DB_NAME")?,
            user: required("DB_USER")?,
            password: required("DB_PASSWORD")?,
        })
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

/// 保存用に型変換したセル
#[derive(Debug, Clone, PartialEq)]
pub enum StorageValue {
    Text(Option<String>),
    Numeric(Option<f64>),
    Integer(Option<i32>),
    Timestamp(Option<NaiveDateTime>),
}

/// テーブル名を検証（英小文字・数字・アンダースコアのみ）
pub fn validate_table_name(table: &str) -> Result<&str, ScraperError> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(table)
    } else {
        Err(ScraperError::InvalidTableName(table.to_string()))
    }
}

pub fn create_table_sql(table: &str, schema: &StorageSchema) -> Result<String, ScraperError> {
    let table = validate_table_name(table)?;
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        table,
        schema.column_definitions()
    ))
}

pub fn insert_sql(table: &str, schema: &StorageSchema) -> Result<String, ScraperError> {
    let table = validate_table_name(table)?;
    let names = schema.column_names();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("${}", i)).collect();
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
        table,
        names.join(", "),
        placeholders.join(", "),
        NATURAL_KEY
    ))
}

/// 1行をスキーマの列順に変換（列が無い・null の場合は宣言の既定値）
pub fn row_values(dataset: &Dataset, row: usize, schema: &StorageSchema) -> Vec<StorageValue> {
    schema
        .columns
        .iter()
        .map(|column| {
            let cell = dataset
                .get(row, column.name)
                .filter(|v| !v.is_null())
                .cloned()
                .or_else(|| {
                    schema::field(column.name)
                        .map(|f| f.default_value())
                        .filter(|v| !v.is_null())
                })
                .unwrap_or(Value::Null);
            convert(column.ty, &cell)
        })
        .collect()
}

fn convert(ty: FieldType, cell: &Value) -> StorageValue {
    if cell.is_null() {
        return match ty {
            FieldType::Text => StorageValue::Text(None),
            FieldType::Numeric => StorageValue::Numeric(None),
            FieldType::Integer => StorageValue::Integer(None),
            FieldType::Timestamp => StorageValue::Timestamp(None),
        };
    }

    match ty {
        FieldType::Text => StorageValue::Text(Some(cell_to_string(cell))),
        FieldType::Numeric => StorageValue::Numeric(match cell {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }),
        FieldType::Integer => StorageValue::Integer(match cell {
            Value::Number(n) => n.as_f64().map(|f| f as i32),
            Value::String(s) => parse_count(s),
            _ => None,
        }),
        FieldType::Timestamp => StorageValue::Timestamp(match cell {
            Value::String(s) => parse_date(s),
            _ => None,
        }),
    }
}

/// "1,234" → 1234（数字以外を除去）
fn parse_count(text: &str) -> Option<i32> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// PostgreSQL シンク
pub struct PostgresSink {
    pool: PgPool,
    table: String,
    schema: StorageSchema,
}

impl PostgresSink {
    pub async fn connect(config: &DbConfig, table: &str) -> Result<Self, ScraperError> {
        validate_table_name(table)?;
        info!(
            "Connecting to PostgreSQL at {}:{}/{}",
            config.host, config.port, config.database
        );
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(config.connect_options())
            .await?;

        Ok(Self {
            pool,
            table: table.to_string(),
            schema: StorageSchema::derive(),
        })
    }

    /// テーブルを作成し全行を1トランザクションで挿入。挿入件数を返す
    pub async fn upsert(&self, dataset: &Dataset) -> Result<u64, ScraperError> {
        let ddl = create_table_sql(&self.table, &self.schema)?;
        let sql = insert_sql(&self.table, &self.schema)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(&ddl).execute(&mut *tx).await?;

        let mut inserted = 0;
        for row in 0..dataset.len() {
            let mut query = sqlx::query::<Postgres>(&sql);
            for value in row_values(dataset, row, &self.schema) {
                query = match value {
                    StorageValue::Text(v) => query.bind(v),
                    StorageValue::Numeric(v) => query.bind(v),
                    StorageValue::Integer(v) => query.bind(v),
                    StorageValue::Timestamp(v) => query.bind(v),
                };
            }
            let result = query.execute(&mut *tx).await?;
            if result.rows_affected() == 0 {
                debug!("Row {} already stored, skipped", row);
            }
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        info!(
            "Inserted {} of {} rows into {} ({} already present)",
            inserted,
            dataset.len(),
            self.table,
            dataset.len() as u64 - inserted
        );
        Ok(inserted)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("pet_food_wet_food").is_ok());
        assert!(validate_table_name("cats2").is_ok());
        for bad in ["", "Pets", "pet-food", "1st", "pets; DROP TABLE x"] {
            let err = validate_table_name(bad).unwrap_err();
            assert!(err.is_fatal(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_sql_statements() {
        let schema = StorageSchema::derive();
        let ddl = create_table_sql("pets_wet", &schema).unwrap();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS pets_wet (\n    id SERIAL PRIMARY KEY"));

        let insert = insert_sql("pets_wet", &schema).unwrap();
        let count = schema.columns.len();
        assert!(insert.starts_with("INSERT INTO pets_wet (name, price, currency"));
        assert!(insert.contains(&format!("${})", count)));
        assert!(insert.ends_with("ON CONFLICT (product_detail_url) DO NOTHING"));
        assert!(insert_sql("bad-name", &schema).is_err());
    }

    #[test]
    fn test_row_conversion() {
        let schema = StorageSchema::derive();
        let mut ds = Dataset::new(vec![
            "name".into(),
            "price".into(),
            "date_collected".into(),
            "total_reviews".into(),
            "review_score".into(),
            "brand".into(),
        ]);
        ds.push_row(vec![
            json!("Cat Food"),
            json!(12.5),
            json!("16/10/2026"),
            json!("1,234"),
            Value::Null,
            Value::Null,
        ]);

        let values = row_values(&ds, 0, &schema);
        let by_name: HashMap<_, _> = schema.column_names().into_iter().zip(values).collect();

        assert_eq!(by_name["name"], StorageValue::Text(Some("Cat Food".into())));
        assert_eq!(by_name["price"], StorageValue::Numeric(Some(12.5)));
        assert_eq!(by_name["total_reviews"], StorageValue::Integer(Some(1234)));
        assert_eq!(by_name["review_score"], StorageValue::Numeric(Some(0.0)));
        assert_eq!(by_name["brand"], StorageValue::Text(None));
        assert_eq!(by_name["about"], StorageValue::Text(Some(String::new())));
        let midnight = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(by_name["date_collected"], StorageValue::Timestamp(Some(midnight)));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap().and_hms_opt(0, 0, 0);
        assert_eq!(parse_date("2026-01-05"), expected);
        assert_eq!(parse_date("05/01/2026"), expected);
        assert_eq!(parse_date("2026/01/05"), expected);
        assert_eq!(parse_date("Jan 5"), None);
    }

    #[test]
    fn test_db_config_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("DB_HOST", "localhost"),
            ("DB_NAME", "products"),
            ("DB_USER", "scraper"),
            ("DB_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();
        let config = DbConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.port, 5432);
        assert!(!format!("{:?}", config).contains("secret"));

        let err = DbConfig::from_lookup(|k| {
            (k != "DB_USER").then(|| env.get(k).map(|v| v.to_string())).flatten()
        })
        .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("DB_USER"));
    }
}
