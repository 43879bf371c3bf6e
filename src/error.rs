use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("抽出エラー: {0}")]
    Extraction(String),

    /// 一覧アイテムに必須フィールドがない（アイテム単位でスキップ）
    #[error("必須フィールドがありません: {field}")]
    MissingField { field: &'static str },

    #[error("URLエラー: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAMLエラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSVエラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel出力エラー: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("データベースエラー: {0}")]
    Database(#[from] sqlx::Error),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("入力ファイルが存在しません: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("出力先が不正です: {0} ('dir' または 'db' を指定してください)")]
    InvalidDestination(String),

    #[error("テーブル名が不正です: {0}")]
    InvalidTableName(String),
}

impl ScraperError {
    /// ナビゲーション・セレクタ待機のタイムアウトか
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScraperError::Timeout(_))
    }

    /// ページ/レコード単位のリトライ対象か
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScraperError::Timeout(_)
                | ScraperError::Navigation(_)
                | ScraperError::ElementNotFound(_)
                | ScraperError::JavaScript(_)
                | ScraperError::BrowserInit(_)
        )
    }

    /// 実行全体を中断すべきエラーか
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScraperError::Config(_)
                | ScraperError::InputNotFound(_)
                | ScraperError::InvalidDestination(_)
                | ScraperError::InvalidTableName(_)
        )
    }
}
