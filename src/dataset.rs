//! 列順を保持する表形式データ（セルは JSON 値）

use serde_json::{Map, Value};

use crate::error::ScraperError;
use crate::types::EnrichedRecord;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// フラットなJSONオブジェクト列から構築（列は出現順、欠けたセルは null）
    pub fn from_objects(objects: Vec<Map<String, Value>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for obj in &objects {
            for key in obj.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = objects
            .into_iter()
            .map(|mut obj| {
                columns
                    .iter()
                    .map(|c| obj.remove(c).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn from_records(records: &[EnrichedRecord]) -> Result<Self, ScraperError> {
        let objects = records
            .iter()
            .map(|record| match serde_json::to_value(record)? {
                Value::Object(map) => Ok(map),
                other => Err(ScraperError::Extraction(format!(
                    "レコードがオブジェクトではありません: {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>, ScraperError>>()?;
        Ok(Self::from_objects(objects))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// 行を追加（列数に合わせて null で埋める・切り詰める）
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn column_values<'a>(&'a self, column: &str) -> impl Iterator<Item = &'a Value> + 'a {
        let idx = self.column_index(column);
        self.rows
            .iter()
            .filter_map(move |row| idx.and_then(|i| row.get(i)))
    }

    /// 列ごとの null 件数
    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), self.rows.iter().filter(|r| r[i].is_null()).count()))
            .collect()
    }

    /// 列を数値に変換（変換できない値は null）
    pub fn coerce_numeric(&mut self, column: &str) {
        let Some(idx) = self.column_index(column) else {
            return;
        };
        for row in &mut self.rows {
            let cell = std::mem::take(&mut row[idx]);
            row[idx] = to_number(cell);
        }
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Value]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// 指定順に列を並べ替える（order に無い列は落とす）
    pub fn select_columns(&self, order: &[String]) -> Self {
        let indices: Vec<Option<usize>> = order.iter().map(|c| self.column_index(c)).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|idx| idx.map(|i| row[i].clone()).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self {
            columns: order.to_vec(),
            rows,
        }
    }
}

fn to_number(cell: Value) -> Value {
    let parsed = match &cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// セルを表出力用の文字列にする
pub fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(cell_to_string)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(_) => cell.to_string(),
    }
}
