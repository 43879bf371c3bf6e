mod common;

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use marketplace_scraper::schema::PRIORITY_COLUMNS;
use marketplace_scraper::sink::read_csv;
use marketplace_scraper::{
    storage, validate::validate, Pipeline, PipelineService, RetryPolicy, RunConfig, ScraperConfig,
    ScraperError, Stage, StageRequest,
};
use serde_json::json;
use tempfile::TempDir;
use tower::Service;

use common::{
    detail_page, detail_url, items, listing_page, Failure, ScriptedFetcher, ScriptedLauncher,
};

fn run_config(data_dir: &TempDir) -> RunConfig {
    run_config_at(data_dir.path())
}

fn run_config_at(data_dir: &Path) -> RunConfig {
    let yaml = format!(
        r#"
data_dir: {}
marketplace:
  name: amazon
  base_url: https://www.amazon.ae
groups:
  pet-food:
    label: Pet Food
    runs:
      wet-food:
        label: Wet Food
        url_template: "https://www.amazon.ae/s?k=wet+cat+food&page={{page_index}}"
        max_page_index: 2
        files:
          extract: "{{category_name}}_listing.json"
          transform: "{{category_name}}_enriched.json"
          load: "{{category_name}}_{{timestamp}}"
"#,
        data_dir.display()
    );
    RunConfig::from_yaml(&yaml).unwrap()
}

fn pipeline(data_dir: &TempDir) -> Pipeline {
    let run = run_config(data_dir).resolve("pet-food", "wet-food").unwrap();
    let config = ScraperConfig::default().with_page_delay(Duration::ZERO);
    Pipeline::new(run, &config).with_retry(RetryPolicy::new(5), RetryPolicy::new(5))
}

fn page(index: u32) -> String {
    format!("https://www.amazon.ae/s?k=wet+cat+food&page={}", index)
}

/// 2ページ×3件の一覧と、全商品の詳細ページ
fn fetcher() -> ScriptedFetcher {
    let mut fetcher = ScriptedFetcher::new()
        .page(page(1), listing_page(&items("P", 3), 4, None))
        .page(page(2), listing_page(&items("Q", 3), 4, None))
        .page(page(3), listing_page(&items("R", 3), 4, None));
    for prefix in ["P", "Q"] {
        for i in 1..=3 {
            let asin = format!("{}{:03}", prefix, i);
            fetcher = fetcher.page(
                detail_url(&asin),
                detail_page(&format!("Detail {}", asin), Some("Whiskas")),
            );
        }
    }
    fetcher
}

#[tokio::test]
async fn extract_transform_load_to_dir() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir);
    let mut fetcher = fetcher();

    let extracted = pipeline.extract(&mut fetcher, None).await.unwrap();
    assert_eq!(extracted.stage, Stage::Extract);
    assert_eq!(extracted.records_out, 6);
    assert!(pipeline.run().extract_path().starts_with(dir.path().join("pet-food").join("wet-food")));
    assert_eq!(fetcher.visits(&page(3)), 0);

    let listings = pipeline.read_listings().unwrap();
    assert_eq!(listings.len(), 6);
    let transformed = pipeline
        .transform(&mut fetcher, listings, None)
        .await
        .unwrap();
    assert_eq!(transformed.records_out, 6);

    let loaded = pipeline.load_to_dir().unwrap();
    assert_eq!(loaded.records_in, 6);
    assert_eq!(loaded.records_out, 6);
    let csv_path = &loaded.outputs[0];
    let xlsx_path = &loaded.outputs[1];
    assert!(xlsx_path.exists());

    let table = read_csv(csv_path).unwrap();
    assert_eq!(table.len(), 6);
    assert_eq!(&table.columns()[..12], &PRIORITY_COLUMNS.map(String::from));

    let urls: BTreeSet<_> = table
        .column_values("product_detail_url")
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    let expected: BTreeSet<_> = ["P001", "P002", "P003", "Q001", "Q002", "Q003"]
        .iter()
        .map(|a| detail_url(a))
        .collect();
    assert_eq!(urls, expected);

    // CSV を読み戻して再検証しても行は変わらない
    let revalidated = validate(table.clone(), &PRIORITY_COLUMNS);
    assert_eq!(revalidated.len(), 6);
    assert_eq!(revalidated.get(0, "price"), Some(&json!(10.5)));
}

#[tokio::test]
async fn transform_keeps_exhausted_record_and_validation_drops_it() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir);
    let mut fetcher = fetcher().fail(detail_url("P002"), Failure::Timeout, 5);

    pipeline.extract(&mut fetcher, Some(1)).await.unwrap();
    let listings = pipeline.read_listings().unwrap();
    assert_eq!(listings.len(), 3);

    let report = pipeline
        .transform(&mut fetcher, listings, Some(2))
        .await
        .unwrap();
    assert_eq!(report.records_in, 3);
    assert_eq!(report.records_out, 2);

    let enriched = pipeline.read_enriched().unwrap();
    assert!(!enriched[0].is_exhausted());
    assert!(enriched[1].is_exhausted());
    assert_eq!(fetcher.visits(&detail_url("P003")), 0);

    // 全試行失敗レコードは brand が null なので検証で落ちる
    let (records_in, dataset) = pipeline.validated().unwrap();
    assert_eq!(records_in, 2);
    assert_eq!(dataset.len(), 1);
}

#[tokio::test]
async fn backfill_fills_missing_brand_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir);

    let mut fetcher = ScriptedFetcher::new()
        .page(page(1), listing_page(&items("P", 2), 1, None))
        .page(detail_url("P001"), detail_page("Detail P001", Some("Whiskas")))
        .page(detail_url("P002"), detail_page("Detail P002", None));

    pipeline.extract(&mut fetcher, None).await.unwrap();
    let listings = pipeline.read_listings().unwrap();
    pipeline.transform(&mut fetcher, listings, None).await.unwrap();

    let before = pipeline.read_enriched().unwrap();
    assert_eq!(before[1].brand, None);

    // ブランドが表示されるようになった詳細ページで再取得
    let mut refreshed = ScriptedFetcher::new()
        .page(detail_url("P002"), detail_page("Detail P002", Some("Felix")));
    let report = pipeline
        .backfill(&mut refreshed, before, "brand")
        .await
        .unwrap();
    assert_eq!(report.records_in, 2);
    assert_eq!(report.records_out, 1);
    assert_eq!(refreshed.visits(&detail_url("P001")), 0);

    let after = storage::read_enriched(&pipeline.run().transform_path()).unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0].brand.as_deref(), Some("Whiskas"));
    assert_eq!(after[1].brand.as_deref(), Some("Felix"));
}

fn service(config: RunConfig, launcher: ScriptedLauncher) -> PipelineService<ScriptedLauncher> {
    let scraper = ScraperConfig::default().with_page_delay(Duration::ZERO);
    PipelineService::new(config, scraper).with_launcher(launcher)
}

#[tokio::test]
async fn service_closes_session_after_successful_stage() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = ScriptedLauncher::new(fetcher());
    let mut service = service(run_config(&dir), launcher.clone());

    let report = service
        .call(StageRequest::new("pet-food", "wet-food", Stage::Extract))
        .await
        .unwrap();

    assert_eq!(report.records_out, 6);
    assert_eq!(launcher.opened(), 1);
    assert_eq!(launcher.closed(), 1);
}

#[tokio::test]
async fn service_closes_session_when_stage_fails() {
    let dir = tempfile::tempdir().unwrap();
    // data_dir がファイルなので出力ディレクトリを作れない
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let launcher = ScriptedLauncher::new(fetcher());
    let mut service = service(run_config_at(&blocker), launcher.clone());

    let err = service
        .call(StageRequest::new("pet-food", "wet-food", Stage::Extract))
        .await
        .unwrap_err();

    assert!(matches!(err, ScraperError::FileIO(_)), "{:?}", err);
    assert_eq!(launcher.opened(), 1);
    assert_eq!(launcher.closed(), 1);
}

#[tokio::test]
async fn service_reads_input_before_opening_session() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = ScriptedLauncher::new(fetcher());
    let mut service = service(run_config(&dir), launcher.clone());

    let err = service
        .call(StageRequest::new("pet-food", "wet-food", Stage::Transform))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(launcher.opened(), 0);
    assert_eq!(launcher.closed(), 0);
}
