use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::Local;
use tower::Service;
use tracing::{info, info_span, warn, Instrument};

use crate::backfill::{self, DEFAULT_FIELD};
use crate::browser::BrowserLauncher;
use crate::config::ScraperConfig;
use crate::dataset::Dataset;
use crate::enricher::DetailEnricher;
use crate::error::ScraperError;
use crate::retry::RetryPolicy;
use crate::run_config::{ResolvedRun, RunConfig, Stage};
use crate::schema::PRIORITY_COLUMNS;
use crate::sink::{write_csv, write_xlsx, DbConfig, Destination, PostgresSink};
use crate::storage;
use crate::traits::{PageFetcher, SessionFactory};
use crate::types::{EnrichedRecord, ListingRecord};
use crate::validate::validate;
use crate::walker::PaginationWalker;

/// 段階実行リクエスト
#[derive(Debug, Clone)]
pub struct StageRequest {
    pub group: String,
    pub name: String,
    pub stage: Stage,
    pub destination: Destination,
    /// 巡回する最大ページ（未指定時は設定の max_page_index）
    pub max_pages: Option<u32>,
    /// エンリッチするレコード数の上限
    pub limit_records: Option<usize>,
    /// backfill 対象フィールド
    pub field: String,
}

impl StageRequest {
    pub fn new(group: impl Into<String>, name: impl Into<String>, stage: Stage) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            stage,
            destination: Destination::default(),
            max_pages: None,
            limit_records: None,
            field: DEFAULT_FIELD.to_string(),
        }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn with_limit_records(mut self, limit: usize) -> Self {
        self.limit_records = Some(limit);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

/// 段階実行結果
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    /// 入力レコード数（extract はページ巡回なので 0）
    pub records_in: usize,
    pub records_out: usize,
    pub outputs: Vec<PathBuf>,
    /// db 出力時の挿入件数
    pub inserted: Option<u64>,
}

impl StageReport {
    fn new(stage: Stage, records_in: usize, records_out: usize) -> Self {
        Self {
            stage,
            records_in,
            records_out,
            outputs: Vec::new(),
            inserted: None,
        }
    }
}

/// 1カテゴリ分の段階処理（フェッチャーは呼び出し側が用意する）
#[derive(Debug, Clone)]
pub struct Pipeline {
    run: ResolvedRun,
    walker: PaginationWalker,
    enricher: DetailEnricher,
}

impl Pipeline {
    pub fn new(run: ResolvedRun, config: &ScraperConfig) -> Self {
        let context = run.listing_context(Local::now().date_naive());
        Self {
            walker: PaginationWalker::new(context, config),
            enricher: DetailEnricher::new(config),
            run,
        }
    }

    /// 一覧・詳細ページのリトライ方針を差し替える
    pub fn with_retry(mut self, listing: RetryPolicy, detail: RetryPolicy) -> Self {
        self.walker = self.walker.with_retry(listing);
        self.enricher = self.enricher.with_retry(detail);
        self
    }

    pub fn run(&self) -> &ResolvedRun {
        &self.run
    }

    /// 一覧ページを巡回して一覧JSONを書き出す
    pub async fn extract<F>(
        &self,
        fetcher: &mut F,
        max_pages: Option<u32>,
    ) -> Result<StageReport, ScraperError>
    where
        F: PageFetcher + ?Sized,
    {
        let max_pages = max_pages.or_else(|| self.run.page_cap());
        let records = self
            .walker
            .walk(fetcher, &self.run.page_source(), max_pages)
            .await;

        let path = self.run.extract_path();
        storage::write_json(&path, &records)?;

        let mut report = StageReport::new(Stage::Extract, 0, records.len());
        report.outputs.push(path);
        Ok(report)
    }

    pub fn read_listings(&self) -> Result<Vec<ListingRecord>, ScraperError> {
        storage::read_listings(&self.run.extract_path())
    }

    pub fn read_enriched(&self) -> Result<Vec<EnrichedRecord>, ScraperError> {
        storage::read_enriched(&self.run.transform_path())
    }

    /// 一覧レコードをエンリッチしてエンリッチ済みJSONを書き出す
    pub async fn transform<F>(
        &self,
        fetcher: &mut F,
        listings: Vec<ListingRecord>,
        limit: Option<usize>,
    ) -> Result<StageReport, ScraperError>
    where
        F: PageFetcher + ?Sized,
    {
        let records_in = listings.len();
        let enriched = self.enricher.enrich(fetcher, listings, limit).await;

        let path = self.run.transform_path();
        storage::write_json(&path, &enriched)?;

        let mut report = StageReport::new(Stage::Transform, records_in, enriched.len());
        report.outputs.push(path);
        Ok(report)
    }

    /// 欠損フィールドを再取得し、エンリッチ済みJSONを上書きする
    pub async fn backfill<F>(
        &self,
        fetcher: &mut F,
        records: Vec<EnrichedRecord>,
        field: &str,
    ) -> Result<StageReport, ScraperError>
    where
        F: PageFetcher + ?Sized,
    {
        let records_in = records.len();
        let (records, result) = backfill::backfill(&self.enricher, fetcher, records, field).await?;

        let path = self.run.transform_path();
        storage::write_json(&path, &records)?;

        let mut report = StageReport::new(Stage::Backfill, records_in, result.filled);
        report.outputs.push(path);
        Ok(report)
    }

    /// エンリッチ済みJSONを検証する
    pub fn validated(&self) -> Result<(usize, Dataset), ScraperError> {
        let objects = storage::read_objects(&self.run.transform_path())?;
        let records_in = objects.len();
        Ok((records_in, validate(Dataset::from_objects(objects), &PRIORITY_COLUMNS)))
    }

    /// 検証済みデータをファイルへ書き出す
    pub fn load_to_dir(&self) -> Result<StageReport, ScraperError> {
        let (records_in, dataset) = self.validated()?;
        let (csv_path, xlsx_path) = self.run.load_paths(&Local::now().naive_local());

        write_csv(&dataset, &csv_path)?;
        write_xlsx(&dataset, &xlsx_path)?;

        let mut report = StageReport::new(Stage::Load, records_in, dataset.len());
        report.outputs = vec![csv_path, xlsx_path];
        Ok(report)
    }

    /// 検証済みデータを PostgreSQL に upsert する
    pub async fn load_to_db(&self, db: &DbConfig) -> Result<StageReport, ScraperError> {
        let (records_in, dataset) = self.validated()?;

        let sink = PostgresSink::connect(db, &self.run.table_name).await?;
        let result = sink.upsert(&dataset).await;
        sink.close().await;

        let mut report = StageReport::new(Stage::Load, records_in, dataset.len());
        report.inserted = Some(result?);
        Ok(report)
    }
}

/// tower::Serviceを実装したパイプラインサービス
#[derive(Debug, Clone)]
pub struct PipelineService<L = BrowserLauncher> {
    run_config: Arc<RunConfig>,
    scraper: ScraperConfig,
    launcher: Arc<L>,
}

impl PipelineService<BrowserLauncher> {
    pub fn new(run_config: RunConfig, scraper: ScraperConfig) -> Self {
        let launcher = BrowserLauncher::new(scraper.clone());
        Self {
            run_config: Arc::new(run_config),
            scraper,
            launcher: Arc::new(launcher),
        }
    }
}

impl<L> PipelineService<L> {
    /// セッションの開き方を差し替える
    pub fn with_launcher<M>(self, launcher: M) -> PipelineService<M> {
        PipelineService {
            run_config: self.run_config,
            scraper: self.scraper,
            launcher: Arc::new(launcher),
        }
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.run_config
    }
}

async fn shutdown<S: PageFetcher>(mut session: S) {
    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {}", e);
    }
}

/// 入力を読んでからセッションを開き、どの経路でも閉じる
async fn run_stage<L: SessionFactory>(
    pipeline: Pipeline,
    launcher: &L,
    req: StageRequest,
) -> Result<StageReport, ScraperError> {
    match req.stage {
        Stage::Extract => {
            let mut session = launcher.open().await?;
            let result = pipeline.extract(&mut session, req.max_pages).await;
            shutdown(session).await;
            result
        }
        Stage::Transform => {
            let listings = pipeline.read_listings()?;
            let mut session = launcher.open().await?;
            let result = pipeline
                .transform(&mut session, listings, req.limit_records)
                .await;
            shutdown(session).await;
            result
        }
        Stage::Backfill => {
            let records = pipeline.read_enriched()?;
            let mut session = launcher.open().await?;
            let result = pipeline.backfill(&mut session, records, &req.field).await;
            shutdown(session).await;
            result
        }
        Stage::Load => match req.destination {
            Destination::Dir => pipeline.load_to_dir(),
            Destination::Db => {
                let db = DbConfig::from_env()?;
                pipeline.load_to_db(&db).await
            }
        },
    }
}

impl<L> Service<StageRequest> for PipelineService<L>
where
    L: SessionFactory + 'static,
{
    type Response = StageReport;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: StageRequest) -> Self::Future {
        let run_config = Arc::clone(&self.run_config);
        let scraper = self.scraper.clone();
        let launcher = Arc::clone(&self.launcher);
        let span = info_span!(
            "stage",
            group = %req.group,
            name = %req.name,
            stage = %req.stage
        );

        Box::pin(
            async move {
                info!("段階実行リクエスト受信: destination={}", req.destination);
                let run = run_config.resolve(&req.group, &req.name)?;
                let pipeline = Pipeline::new(run, &scraper);

                let report = run_stage(pipeline, launcher.as_ref(), req).await?;
                info!(
                    "段階実行完了: in={}, out={}, outputs={:?}",
                    report.records_in, report.records_out, report.outputs
                );
                Ok(report)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_request_builder() {
        let req = StageRequest::new("pet-food", "wet-food", Stage::Load)
            .with_destination(Destination::Db)
            .with_max_pages(3)
            .with_limit_records(10)
            .with_field("about");

        assert_eq!(req.group, "pet-food");
        assert_eq!(req.name, "wet-food");
        assert_eq!(req.stage, Stage::Load);
        assert_eq!(req.destination, Destination::Db);
        assert_eq!(req.max_pages, Some(3));
        assert_eq!(req.limit_records, Some(10));
        assert_eq!(req.field, "about");
    }

    #[test]
    fn test_stage_request_defaults() {
        let req = StageRequest::new("g", "n", Stage::Extract);
        assert_eq!(req.destination, Destination::Dir);
        assert_eq!(req.field, "brand");
        assert!(req.max_pages.is_none());
        assert!(req.limit_records.is_none());
    }

    #[tokio::test]
    async fn test_unknown_run_fails_before_launch() {
        let config = RunConfig::from_yaml(
            "marketplace:\n  name: amazon\n  base_url: https://www.amazon.ae\n",
        )
        .unwrap();
        let mut service = PipelineService::new(config, ScraperConfig::default());

        let err = service
            .call(StageRequest::new("pet-food", "wet-food", Stage::Extract))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
