use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser};
use tower::Service;
use tracing::{error, info};

use marketplace_scraper::{
    telemetry, Destination, PipelineService, RunConfig, ScraperConfig, Stage, StageReport,
    ScraperError, StageRequest,
};

/// 設定・入力の誤りで中断した場合の終了コード
const EXIT_FATAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "marketplace-scraper",
    about = "マーケットプレイス商品の抽出・エンリッチ・検証・ロード"
)]
struct Cli {
    /// 実行設定 YAML
    #[arg(long, env = "SCRAPER_CONFIG", default_value = "configs.yml")]
    config: PathBuf,

    /// 実行グループ（未指定時は default_run.group）
    #[arg(long)]
    run_group: Option<String>,

    /// 実行名（未指定時は default_run.name）
    #[arg(long)]
    run_name: Option<String>,

    /// extract / transform / load / backfill
    #[arg(long)]
    run_mode: Option<String>,

    /// load の出力先 (dir / db)
    #[arg(long, default_value = "dir")]
    destination: String,

    /// 巡回する最大ページ
    #[arg(long)]
    max: Option<u32>,

    /// エンリッチするレコード数の上限
    #[arg(long)]
    limit_records: Option<usize>,

    /// backfill 対象フィールド
    #[arg(long, default_value = "brand")]
    field: String,

    #[arg(long, env = "HEADLESS", default_value_t = true, action = ArgAction::Set)]
    headless: bool,

    /// 失敗したナビゲーションのスクリーンショットをログに出す
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[arg(long, env = "SCRAPER_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,
}

impl Cli {
    fn request(&self, config: &RunConfig) -> anyhow::Result<StageRequest> {
        let default = config.default_run.as_ref();

        let group = self
            .run_group
            .clone()
            .or_else(|| default.and_then(|d| d.group.clone()))
            .ok_or_else(|| anyhow!("--run-group も default_run.group も指定されていません"))?;
        let name = self
            .run_name
            .clone()
            .or_else(|| default.and_then(|d| d.name.clone()))
            .ok_or_else(|| anyhow!("--run-name も default_run.name も指定されていません"))?;
        let stage = match &self.run_mode {
            Some(mode) => mode.parse::<Stage>()?,
            None => default
                .and_then(|d| d.stage)
                .ok_or_else(|| anyhow!("--run-mode も default_run.stage も指定されていません"))?,
        };

        let mut request = StageRequest::new(group, name, stage)
            .with_destination(self.destination.parse::<Destination>()?)
            .with_field(self.field.clone());
        if let Some(max) = self.max {
            request = request.with_max_pages(max);
        }
        if let Some(limit) = self.limit_records {
            request = request.with_limit_records(limit);
        }
        Ok(request)
    }
}

async fn run(cli: &Cli) -> anyhow::Result<StageReport> {
    let run_config = RunConfig::from_path(&cli.config)
        .with_context(|| format!("設定ファイルを読み込めません: {}", cli.config.display()))?;
    let request = cli.request(&run_config)?;

    info!(
        "Run: group={}, name={}, stage={}",
        request.group, request.name, request.stage
    );

    let scraper = ScraperConfig::default()
        .with_headless(cli.headless)
        .with_debug(cli.debug);
    let mut service = PipelineService::new(run_config, scraper);

    let stage = request.stage;
    service
        .call(request)
        .await
        .with_context(|| format!("{} 段階が失敗しました", stage))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry = match telemetry::init(&cli.log_dir) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Logging to {}", telemetry.log_file().display());

    match run(&cli).await {
        Ok(report) => {
            info!(
                "Done: {} -> {} records, outputs: {:?}",
                report.records_in, report.records_out, report.outputs
            );
            if let Some(inserted) = report.inserted {
                info!("Inserted rows: {}", inserted);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

/// 設定・入力の誤りは 2、それ以外の失敗は 1
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ScraperError>() {
        Some(e) if e.is_fatal() => EXIT_FATAL,
        _ => 1,
    }
}
