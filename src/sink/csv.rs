//! CSV 入出力

use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::dataset::{cell_to_string, Dataset};
use crate::error::ScraperError;

/// データセットを列順どおりにCSVへ書き出す（null は空セル）
pub fn write_csv(dataset: &Dataset, path: &Path) -> Result<(), ScraperError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = ::csv::Writer::from_path(path)?;
    writer.write_record(dataset.columns())?;
    for row in dataset.rows() {
        writer.write_record(row.iter().map(cell_to_string))?;
    }
    writer.flush()?;

    info!("Wrote {} rows to {}", dataset.len(), path.display());
    Ok(())
}

/// CSVを読み込む（空セルは null、それ以外は文字列）
pub fn read_csv(path: &Path) -> Result<Dataset, ScraperError> {
    if !path.exists() {
        return Err(ScraperError::InputNotFound(path.to_path_buf()));
    }

    let mut reader = ::csv::Reader::from_path(path)?;
    let columns = reader.headers()?.iter().map(str::to_string).collect();
    let mut dataset = Dataset::new(columns);

    for record in reader.records() {
        let record = record?;
        dataset.push_row(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Value::Null
                    } else {
                        Value::String(cell.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_then_read_keeps_order_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");

        let mut ds = Dataset::new(vec!["name".into(), "price".into(), "brand".into()]);
        ds.push_row(vec![json!("Cat, Food \"Deluxe\""), json!(12.5), Value::Null]);
        ds.push_row(vec![json!("Bowl"), json!(3.0), json!("Generic")]);
        write_csv(&ds, &path).unwrap();

        let back = read_csv(&path).unwrap();
        assert_eq!(back.columns(), ds.columns());
        assert_eq!(back.len(), 2);
        assert_eq!(back.get(0, "name"), Some(&json!("Cat, Food \"Deluxe\"")));
        assert_eq!(back.get(0, "price"), Some(&json!("12.5")));
        assert_eq!(back.get(0, "brand"), Some(&Value::Null));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_csv(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, ScraperError::InputNotFound(_)));
    }
}
