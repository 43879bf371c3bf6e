//! 欠損フィールドの再取得
//!
//! エンリッチ済みレコードのうち指定フィールドが空のものだけを再エンリッチし、
//! `product_detail_url` で元のレコードに書き戻す。

use std::collections::HashMap;

use serde_json::Value;
use tracing::info;

use crate::enricher::DetailEnricher;
use crate::error::ScraperError;
use crate::schema;
use crate::traits::PageFetcher;
use crate::types::EnrichedRecord;

pub const DEFAULT_FIELD: &str = "brand";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackfillReport {
    /// 欠損していたレコード数
    pub candidates: usize,
    /// 置き換えたレコード数
    pub filled: usize,
}

fn check_field(field: &str) -> Result<(), ScraperError> {
    match schema::field(field) {
        Some(_) => Ok(()),
        None => Err(ScraperError::Config(format!("不明なフィールドです: {}", field))),
    }
}

/// フィールドが null または空文字か
pub fn is_missing(record: &EnrichedRecord, field: &str) -> Result<bool, ScraperError> {
    let value = serde_json::to_value(record)?;
    Ok(match value.get(field) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    })
}

/// 再取得結果を書き戻す
///
/// 全試行失敗でなく、かつフィールドが埋まった場合のみ置き換える。
pub fn merge_refreshed(
    records: &mut [EnrichedRecord],
    refreshed: Vec<EnrichedRecord>,
    field: &str,
) -> Result<usize, ScraperError> {
    let mut by_url: HashMap<String, EnrichedRecord> = HashMap::new();
    for record in refreshed {
        if record.is_exhausted() || is_missing(&record, field)? {
            continue;
        }
        by_url
            .entry(record.listing.product_detail_url.clone())
            .or_insert(record);
    }

    let mut filled = 0;
    for record in records.iter_mut() {
        if let Some(fresh) = by_url.remove(&record.listing.product_detail_url) {
            *record = fresh;
            filled += 1;
        }
    }
    Ok(filled)
}

/// 欠損レコードを再エンリッチしてマージした結果を返す
pub async fn backfill<F>(
    enricher: &DetailEnricher,
    fetcher: &mut F,
    mut records: Vec<EnrichedRecord>,
    field: &str,
) -> Result<(Vec<EnrichedRecord>, BackfillReport), ScraperError>
where
    F: PageFetcher + ?Sized,
{
    check_field(field)?;

    let mut candidates = Vec::new();
    for record in &records {
        if is_missing(record, field)? {
            candidates.push(record.listing.clone());
        }
    }
    info!(
        "{} of {} records are missing '{}'",
        candidates.len(),
        records.len(),
        field
    );

    let mut report = BackfillReport {
        candidates: candidates.len(),
        filled: 0,
    };
    if candidates.is_empty() {
        return Ok((records, report));
    }

    let refreshed = enricher.enrich(fetcher, candidates, None).await;
    report.filled = merge_refreshed(&mut records, refreshed, field)?;
    info!(
        "Backfilled '{}' for {} of {} records",
        field, report.filled, report.candidates
    );

    Ok((records, report))
}
