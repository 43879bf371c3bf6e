//! 正規化・検証パイプライン
//!
//! 数値列の強制変換 → 必須列の null 行除去 → 必須列での重複除去 → 列の並べ替え。
//! 出力を再度通しても変化しない。

use std::collections::HashSet;

use serde_json::Value;
use tracing::{info, warn};

use crate::dataset::Dataset;
use crate::error::ScraperError;
use crate::schema::{numeric_columns, NULLABLE_REQUIRED, PRIORITY_COLUMNS};
use crate::types::EnrichedRecord;

/// データセットを検証する
///
/// `required` のうちデータに存在しない列は警告のみで、null 除去・重複判定から外す。
pub fn validate(mut dataset: Dataset, required: &[&str]) -> Dataset {
    log_missing_values(&dataset);
    let before = dataset.len();

    let present: Vec<&str> = required
        .iter()
        .copied()
        .filter(|c| {
            let found = dataset.has_column(c);
            if !found {
                warn!("Required column '{}' is missing from the dataset", c);
            }
            found
        })
        .collect();

    for column in numeric_columns() {
        dataset.coerce_numeric(column);
    }

    let null_checked: Vec<usize> = present
        .iter()
        .filter(|c| **c != NULLABLE_REQUIRED)
        .filter_map(|c| dataset.column_index(c))
        .collect();
    dataset.retain_rows(|row| null_checked.iter().all(|&i| !row[i].is_null()));
    let after_nulls = dataset.len();

    let key_columns: Vec<usize> = present
        .iter()
        .filter_map(|c| dataset.column_index(c))
        .collect();
    let mut seen = HashSet::new();
    dataset.retain_rows(|row| {
        let key: Vec<&Value> = key_columns.iter().map(|&i| &row[i]).collect();
        seen.insert(serde_json::to_string(&key).unwrap_or_default())
    });

    info!(
        "Validation: {} rows in, {} dropped for nulls, {} duplicates removed, {} rows out",
        before,
        before - after_nulls,
        after_nulls - dataset.len(),
        dataset.len()
    );

    let mut order: Vec<String> = present.iter().map(|c| c.to_string()).collect();
    order.extend(
        dataset
            .columns()
            .iter()
            .filter(|c| !present.contains(&c.as_str()))
            .cloned(),
    );
    dataset.select_columns(&order)
}

/// エンリッチ済みレコードを既定の必須列で検証
pub fn validate_records(records: &[EnrichedRecord]) -> Result<Dataset, ScraperError> {
    let dataset = Dataset::from_records(records)?;
    Ok(validate(dataset, &PRIORITY_COLUMNS))
}

fn log_missing_values(dataset: &Dataset) {
    let missing: Vec<String> = dataset
        .null_counts()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(column, count)| format!("{}={}", column, count))
        .collect();

    if missing.is_empty() {
        info!("Missing values: none ({} rows)", dataset.len());
    } else {
        info!(
            "Missing values ({} rows): {}",
            dataset.len(),
            missing.join(", ")
        );
    }
}
