//! ログ初期化（コンソール + ファイル）

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::error::ScraperError;

pub const LOG_FILE_NAME: &str = "summary.log";
const DEFAULT_FILTER: &str = "info,sqlx::query=warn,chromiumoxide=warn";

/// 実行中保持するログハンドル（drop 時にファイル出力をフラッシュ）
#[must_use = "drop するとファイルログが止まります"]
pub struct Telemetry {
    log_file: PathBuf,
    _guard: WorkerGuard,
}

impl Telemetry {
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

/// サブスクライバを設定する（RUST_LOG で上書き可能）
pub fn init(log_dir: &Path) -> Result<Telemetry, ScraperError> {
    std::fs::create_dir_all(log_dir)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_appender = rolling::never(log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = non_blocking(file_appender);

    let file_layer = fmt::Layer::new()
        .with_writer(file_writer)
        .with_target(false)
        .with_ansi(false);
    let console_layer = fmt::Layer::new()
        .with_writer(std::io::stdout)
        .with_target(false);

    Registry::default()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| ScraperError::Config(format!("ログ初期化に失敗しました: {}", e)))?;

    Ok(Telemetry {
        log_file: log_dir.join(LOG_FILE_NAME),
        _guard: guard,
    })
}
