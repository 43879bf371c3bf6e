//! 出力先アダプタ
//!
//! 検証済みデータセットをファイル（CSV / xlsx）またはPostgreSQLへ書き出す。

pub mod csv;
pub mod postgres;
pub mod spreadsheet;

use std::fmt;
use std::str::FromStr;

use crate::error::ScraperError;

pub use self::csv::{read_csv, write_csv};
pub use self::postgres::{DbConfig, PostgresSink};
pub use self::spreadsheet::{write_xlsx, SHEET_NAME};

/// ロード段階の出力先
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// 実行フォルダ配下に CSV + xlsx
    #[default]
    Dir,
    /// PostgreSQL へ upsert
    Db,
}

impl FromStr for Destination {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dir" => Ok(Destination::Dir),
            "db" => Ok(Destination::Db),
            other => Err(ScraperError::InvalidDestination(other.to_string())),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Dir => write!(f, "dir"),
            Destination::Db => write!(f, "db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_parse() {
        assert_eq!("dir".parse::<Destination>().unwrap(), Destination::Dir);
        assert_eq!(" DB ".parse::<Destination>().unwrap(), Destination::Db);

        let err = "s3".parse::<Destination>().unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ScraperError::InvalidDestination(ref d) if d == "s3"));
    }
}
