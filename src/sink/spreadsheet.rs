//! xlsx 出力

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};
use serde_json::Value;
use tracing::info;

use crate::dataset::{cell_to_string, Dataset};
use crate::error::ScraperError;

pub const SHEET_NAME: &str = "Products";

/// データセットを単一シートのxlsxに書き出す（数値は数値セル）
pub fn write_xlsx(dataset: &Dataset, path: &Path) -> Result<(), ScraperError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in dataset.columns().iter().enumerate() {
        worksheet.write_string_with_format(0, column_index(col)?, name, &header)?;
    }

    for (r, row) in dataset.rows().iter().enumerate() {
        let xlsx_row = u32::try_from(r + 1)
            .map_err(|_| ScraperError::Extraction(format!("行数が多すぎます: {}", r + 1)))?;
        for (col, cell) in row.iter().enumerate() {
            let col = column_index(col)?;
            match cell {
                Value::Null => {}
                Value::Number(n) => match n.as_f64() {
                    Some(f) => {
                        worksheet.write_number(xlsx_row, col, f)?;
                    }
                    None => {
                        worksheet.write_string(xlsx_row, col, n.to_string())?;
                    }
                },
                other => {
                    worksheet.write_string(xlsx_row, col, cell_to_string(other))?;
                }
            }
        }
    }

    workbook.save(path)?;
    info!("Wrote {} rows to {}", dataset.len(), path.display());
    Ok(())
}

fn column_index(col: usize) -> Result<u16, ScraperError> {
    u16::try_from(col).map_err(|_| ScraperError::Extraction(format!("列数が多すぎます: {}", col)))
}
