//! 実行設定（YAML）
//!
//! `groups.<group>.runs.<name>` で1カテゴリ分のクロール対象と段階ごとのファイル名を宣言し、
//! `(group, name)` から実行に必要な値を解決する。

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use url::Url;

use crate::error::ScraperError;
use crate::extract::ListingContext;
use crate::walker::{PageSource, PAGE_INDEX_PLACEHOLDER};

const CATEGORY_PLACEHOLDER: &str = "{category_name}";
const TIMESTAMP_PLACEHOLDER: &str = "{timestamp}";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// パイプライン段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extract,
    Transform,
    Load,
    Backfill,
}

impl FromStr for Stage {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extract" => Ok(Stage::Extract),
            "transform" => Ok(Stage::Transform),
            "load" => Ok(Stage::Load),
            "backfill" => Ok(Stage::Backfill),
            other => Err(ScraperError::Config(format!(
                "不明な実行モードです: {} (extract / transform / load / backfill)",
                other
            ))),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Load => "load",
            Stage::Backfill => "backfill",
        };
        f.write_str(s)
    }
}

/// ページ巡回方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pagination {
    #[default]
    Template,
    Next,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub marketplace: MarketplaceConfig,
    #[serde(default)]
    pub default_run: Option<DefaultRun>,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupConfig>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceConfig {
    pub name: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultRun {
    pub group: Option<String>,
    pub name: Option<String>,
    pub stage: Option<Stage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub label: Option<String>,
    #[serde(default)]
    pub runs: BTreeMap<String, RunEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunEntry {
    pub label: Option<String>,
    pub url_template: String,
    #[serde(default = "default_min_page")]
    pub min_page_index: u32,
    pub max_page_index: Option<u32>,
    #[serde(default)]
    pub pagination: Pagination,
    pub files: StageFiles,
}

fn default_min_page() -> u32 {
    1
}

/// 段階ごとのファイル名テンプレート
#[derive(Debug, Clone, Deserialize)]
pub struct StageFiles {
    pub extract: String,
    pub transform: String,
    /// 拡張子なし（.csv / .xlsx を付与）
    pub load: String,
}

impl RunConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ScraperError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ScraperError> {
        if !path.exists() {
            return Err(ScraperError::InputNotFound(path.to_path_buf()));
        }
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// (group, name) を解決。欠けているキーは設定エラー
    pub fn resolve(&self, group: &str, name: &str) -> Result<ResolvedRun, ScraperError> {
        let group_config = self
            .groups
            .get(group)
            .ok_or_else(|| ScraperError::Config(format!("groups.{} がありません", group)))?;
        let run = group_config.runs.get(name).ok_or_else(|| {
            ScraperError::Config(format!("groups.{}.runs.{} がありません", group, name))
        })?;

        if !run.url_template.contains(PAGE_INDEX_PLACEHOLDER) {
            return Err(ScraperError::Config(format!(
                "groups.{}.runs.{}.url_template に {} がありません",
                group, name, PAGE_INDEX_PLACEHOLDER
            )));
        }
        let base_url = Url::parse(&self.marketplace.base_url)?;

        let category_name = format!("{}_{}", group, name)
            .replace('-', "_")
            .to_ascii_lowercase();
        let folder = self.data_dir.join(group).join(name);

        Ok(ResolvedRun {
            group: group.to_string(),
            name: name.to_string(),
            marketplace: self.marketplace.name.clone(),
            base_url,
            category: group_config.label.clone().unwrap_or_else(|| group.to_string()),
            subcategory: run.label.clone().unwrap_or_else(|| name.to_string()),
            table_name: category_name.clone(),
            url_template: run.url_template.clone(),
            min_page: run.min_page_index,
            max_page: run.max_page_index,
            pagination: run.pagination,
            files: run.files.clone(),
            category_name,
            folder,
        })
    }
}

/// 解決済みの実行対象
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    pub group: String,
    pub name: String,
    pub marketplace: String,
    pub base_url: Url,
    pub category: String,
    pub subcategory: String,
    /// "<group>_<name>"（ハイフンはアンダースコア）
    pub category_name: String,
    /// <data_dir>/<group>/<name>
    pub folder: PathBuf,
    pub table_name: String,
    pub url_template: String,
    pub min_page: u32,
    pub max_page: Option<u32>,
    pub pagination: Pagination,
    files: StageFiles,
}

impl ResolvedRun {
    fn file(&self, template: &str, timestamp: Option<&NaiveDateTime>) -> PathBuf {
        let mut file = template.replace(CATEGORY_PLACEHOLDER, &self.category_name);
        if let Some(ts) = timestamp {
            file = file.replace(TIMESTAMP_PLACEHOLDER, &ts.format(TIMESTAMP_FORMAT).to_string());
        }
        self.folder.join(file)
    }

    pub fn extract_path(&self) -> PathBuf {
        self.file(&self.files.extract, None)
    }

    pub fn transform_path(&self) -> PathBuf {
        self.file(&self.files.transform, None)
    }

    /// ロード段階の (CSV, xlsx) パス
    pub fn load_paths(&self, now: &NaiveDateTime) -> (PathBuf, PathBuf) {
        let base = self.file(&self.files.load, Some(now));
        (base.with_extension("csv"), base.with_extension("xlsx"))
    }

    pub fn page_source(&self) -> PageSource {
        match self.pagination {
            Pagination::Template => PageSource::Template {
                url_template: self.url_template.clone(),
                min_page: self.min_page,
            },
            Pagination::Next => PageSource::NextControl {
                start_url: PageSource::page_url(&self.url_template, self.min_page),
            },
        }
    }

    /// 設定上の最大ページ数（min から数えたページ数）
    pub fn page_cap(&self) -> Option<u32> {
        self.max_page.map(|max| match self.pagination {
            Pagination::Template => max,
            Pagination::Next => max.saturating_sub(self.min_page) + 1,
        })
    }

    pub fn listing_context(&self, date_collected: NaiveDate) -> ListingContext {
        ListingContext {
            marketplace: self.marketplace.clone(),
            base_url: self.base_url.clone(),
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
            date_collected,
        }
    }
}
