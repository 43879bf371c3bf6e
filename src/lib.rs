//! マーケットプレイス商品スクレイパー
//!
//! - 検索結果の一覧ページを巡回して商品を抽出（extract）
//! - 商品詳細ページで付加情報を取得（transform / backfill）
//! - 正規化・検証して CSV / xlsx / PostgreSQL へ出力（load）
//!
//! # 使用例
//!
//! ```rust,ignore
//! use marketplace_scraper::{PipelineService, RunConfig, ScraperConfig, Stage, StageRequest};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RunConfig::from_path("configs.yml".as_ref()).unwrap();
//!     let mut service = PipelineService::new(config, ScraperConfig::default());
//!
//!     let request = StageRequest::new("pet-food", "wet-food", Stage::Extract)
//!         .with_max_pages(2);
//!
//!     let report = service.call(request).await.unwrap();
//!     println!("Listings saved: {:?}", report.outputs);
//! }
//! ```
//!
//! # フェッチャーを差し替えた実行
//!
//! ```rust,ignore
//! use marketplace_scraper::{BrowserSession, Pipeline, RunConfig, ScraperConfig};
//!
//! let config = ScraperConfig::default().with_headless(false);
//! let run = RunConfig::from_path("configs.yml".as_ref())?.resolve("pet-food", "wet-food")?;
//! let pipeline = Pipeline::new(run, &config);
//!
//! let mut session = BrowserSession::launch(config).await?;
//! let listings = pipeline.read_listings()?;
//! let report = pipeline.transform(&mut session, listings, Some(20)).await?;
//! ```

pub mod backfill;
pub mod browser;
pub mod config;
pub mod dataset;
pub mod enricher;
pub mod error;
pub mod extract;
pub mod retry;
pub mod run_config;
pub mod schema;
pub mod service;
pub mod sink;
pub mod storage;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod validate;
pub mod walker;

pub use browser::{BrowserLauncher, BrowserSession};
pub use config::ScraperConfig;
pub use dataset::Dataset;
pub use enricher::DetailEnricher;
pub use error::ScraperError;
pub use retry::{RetryOutcome, RetryPolicy};
pub use run_config::{ResolvedRun, RunConfig, Stage};
pub use schema::StorageSchema;
pub use service::{Pipeline, PipelineService, StageReport, StageRequest};
pub use sink::Destination;
pub use traits::{PageFetcher, SessionFactory};
pub use types::{EnrichedRecord, ListingRecord};
pub use walker::{PageSource, PaginationWalker};
