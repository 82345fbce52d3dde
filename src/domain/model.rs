use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::normalize::NormalizeErrorKind;

/// 一列收費資料：欄位名稱 -> 純量值
pub type ChargeRecord = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Hospital {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_short_name")]
    pub short_name: String,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub billing_page: Option<String>,
    #[serde(default)]
    pub last_verified: Option<String>,
}

fn default_name() -> String {
    "Unknown".to_string()
}

fn default_short_name() -> String {
    "hospital".to_string()
}

impl Hospital {
    /// 目錄名稱一律使用小寫
    pub fn directory_name(&self) -> String {
        self.short_name.to_lowercase()
    }

    /// 空白的 file_url 視同未設定
    pub fn download_url(&self) -> Option<&str> {
        self.file_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn last_verified_or_unknown(&self) -> &str {
        self.last_verified.as_deref().unwrap_or("Unknown")
    }
}

/// 固定欄位順序的輸出表格
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl OutputTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Saved { path: PathBuf, bytes: usize },
    /// `.ashx` 檔直接改名為 `.csv`
    Renamed { path: PathBuf, bytes: usize },
    Converted { csv_path: PathBuf, rows: usize },
    /// 下載成功但 JSON 轉換失敗，原始檔保留
    ConversionFailed {
        path: PathBuf,
        kind: NormalizeErrorKind,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub converted: usize,
    pub conversion_failures: usize,
    pub data_dir: PathBuf,
}

impl RunSummary {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: Option<&DownloadOutcome>) {
        self.total += 1;
        let Some(outcome) = outcome else {
            return;
        };

        self.succeeded += 1;
        match outcome {
            DownloadOutcome::Converted { .. } => self.converted += 1,
            DownloadOutcome::ConversionFailed { .. } => self.conversion_failures += 1,
            DownloadOutcome::Saved { .. } | DownloadOutcome::Renamed { .. } => {}
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }
}
