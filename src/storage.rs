//! 段階間のJSONファイル

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::ScraperError;
use crate::types::{EnrichedRecord, ListingRecord};

/// JSON（整形・UTF-8）で書き出す
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ScraperError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    info!("Saved {}", path.display());
    Ok(())
}

fn read_array(path: &Path) -> Result<Vec<Value>, ScraperError> {
    if !path.exists() {
        return Err(ScraperError::InputNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    match serde_json::from_str(&text)? {
        Value::Array(items) => Ok(items),
        _ => Err(ScraperError::Extraction(format!(
            "JSON配列ではありません: {}",
            path.display()
        ))),
    }
}

fn has_name(entry: &Value) -> bool {
    entry
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|n| !n.trim().is_empty())
}

/// 名前のあるエントリだけを型付きで読み込む（不正なエントリは警告してスキップ）
fn read_named<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ScraperError> {
    let entries = read_array(path)?;
    let total = entries.len();
    let mut records = Vec::with_capacity(total);

    for (idx, entry) in entries.into_iter().enumerate() {
        if !has_name(&entry) {
            info!("Skipping entry #{} without a name", idx + 1);
            continue;
        }
        match serde_json::from_value(entry) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping malformed entry #{}: {}", idx + 1, e),
        }
    }

    info!(
        "Loaded {} of {} entries from {}",
        records.len(),
        total,
        path.display()
    );
    Ok(records)
}

pub fn read_listings(path: &Path) -> Result<Vec<ListingRecord>, ScraperError> {
    read_named(path)
}

pub fn read_enriched(path: &Path) -> Result<Vec<EnrichedRecord>, ScraperError> {
    read_named(path)
}

/// 型を問わずフラットなオブジェクトとして読み込む
pub fn read_objects(path: &Path) -> Result<Vec<Map<String, Value>>, ScraperError> {
    Ok(read_array(path)?
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_listings_skips_bad_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listing.json");
        let good = json!({
            "name": "Cat Food",
            "price": 12.5,
            "currency": "AED",
            "image_url": null,
            "product_detail_url": "https://www.amazon.ae/dp/B001",
            "page_url": "https://www.amazon.ae/s?page=1",
            "url": "https://www.amazon.ae",
            "marketplace": "amazon",
            "category": "pet",
            "subcategory": "wet food",
            "date_collected": "2026-10-16"
        });
        let mut nameless = good.clone();
        nameless["name"] = json!("  ");
        let malformed = json!({"name": "Broken", "price": "cheap"});

        write_json(&path, &json!([good, nameless, malformed])).unwrap();
        let listings = read_listings(&path).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].name, "Cat Food");
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_listings(&dir.path().join("none.json")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_write_json_is_utf8_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("out.json");
        write_json(&path, &json!([{"name": "キャットフード"}])).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("キャットフード"));
        assert!(text.contains('\n'));
        assert_eq!(read_objects(&path).unwrap().len(), 1);
    }
}
