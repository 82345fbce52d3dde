use crate::config::cli::LocalStorage;
use crate::core::fetch::HttpFetcher;
use crate::core::normalize::JsonNormalizer;
use crate::domain::model::{DownloadOutcome, Hospital, RunSummary};
use crate::domain::ports::{ConfigProvider, Fetcher, Storage};
use crate::utils::error::{ChargeError, Result};
use crate::utils::validation;
use std::path::Path;
use url::Url;

const BANNER_WIDTH: usize = 60;

/// Sequentially downloads every configured hospital into
/// `<data_dir>/<short_name>/<run_date>/`.
pub struct ChargeCollector<F: Fetcher, S: Storage> {
    fetcher: F,
    storage: S,
    hospitals: Vec<Hospital>,
    normalizer: JsonNormalizer,
    run_date: String,
}

impl ChargeCollector<HttpFetcher, LocalStorage> {
    pub fn from_config<C: ConfigProvider>(config: &C, hospitals: Vec<Hospital>) -> Result<Self> {
        let fetcher = HttpFetcher::with_timeout_secs(config.timeout_secs())?;
        let storage = LocalStorage::new(config.data_dir());

        Ok(Self::new(fetcher, storage, hospitals)
            .with_normalizer(JsonNormalizer::new(config.nested_values())))
    }
}

impl<F: Fetcher, S: Storage> ChargeCollector<F, S> {
    pub fn new(fetcher: F, storage: S, hospitals: Vec<Hospital>) -> Self {
        Self {
            fetcher,
            storage,
            hospitals,
            normalizer: JsonNormalizer::default(),
            run_date: chrono::Local::now().format("%Y-%m-%d").to_string(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: JsonNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_run_date(mut self, run_date: impl Into<String>) -> Self {
        self.run_date = run_date.into();
        self
    }

    pub fn run_date(&self) -> &str {
        &self.run_date
    }

    pub fn hospitals(&self) -> &[Hospital] {
        &self.hospitals
    }

    /// 下載單一檔案，`.ashx` 改名為 `.csv`，`.json` 轉成 CSV
    pub async fn download_file(&self, url: &str, relative_path: &str) -> Result<DownloadOutcome> {
        let bytes = self.fetcher.fetch(url).await?;
        let size = bytes.len();
        let mut path = self.storage.write_file(relative_path, &bytes).await?;

        let mut renamed = false;
        if has_extension(&path, "ashx") {
            let csv_path = path.with_extension("csv");
            self.storage.rename(&path, &csv_path).await?;
            tracing::info!("  ✓ Automatically converted .ashx to .csv");
            path = csv_path;
            renamed = true;
        }

        if has_extension(&path, "json") {
            // 讀檔、寫檔與 sync_all 都是阻塞 I/O，移到 blocking thread
            let normalizer = self.normalizer;
            let source = path.clone();
            let converted = tokio::task::spawn_blocking(move || normalizer.try_normalize(&source))
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

            // 轉換失敗仍算下載成功，原始 JSON 留在磁碟上
            return Ok(match converted {
                Ok(conversion) => DownloadOutcome::Converted {
                    csv_path: conversion.csv_path,
                    rows: conversion.rows,
                },
                Err(e) => DownloadOutcome::ConversionFailed {
                    path,
                    kind: e.kind(),
                },
            });
        }

        tracing::info!(
            "  ✓ Saved to: {} ({:.1} KB)",
            path.display(),
            size as f64 / 1024.0
        );

        Ok(if renamed {
            DownloadOutcome::Renamed { path, bytes: size }
        } else {
            DownloadOutcome::Saved { path, bytes: size }
        })
    }

    /// `None` when the hospital has no `file_url` or the download failed.
    pub async fn download_hospital(&self, hospital: &Hospital) -> Option<DownloadOutcome> {
        let billing_page = hospital.billing_page.as_deref().unwrap_or("None");

        let Some(file_url) = hospital.download_url() else {
            tracing::warn!("⚠ No file_url configured for {}", hospital.name);
            tracing::warn!("   Billing page: {}", billing_page);
            tracing::warn!(
                "   To add: Find the direct download link and update the hospitals config"
            );
            return None;
        };

        let relative_dir = format!("{}/{}", hospital.directory_name(), self.run_date);

        tracing::info!("📥 {}", hospital.name);
        if let Err(e) = validation::validate_url("file_url", file_url) {
            tracing::error!("  ✗ Failed to download: {}", e);
            tracing::debug!("💡 {}", e.recovery_suggestion());
            return None;
        }

        tracing::info!("   Billing page: {}", billing_page);
        tracing::info!("   Last verified: {}", hospital.last_verified_or_unknown());
        tracing::info!("   Folder: {}", self.storage.resolve(&relative_dir).display());

        let filename = filename_from_url(file_url, &self.run_date);
        let relative_path = format!("{}/{}", relative_dir, filename);

        match self.download_file(file_url, &relative_path).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!("  ✗ Failed to download: {}", e);
                tracing::debug!("💡 {}", e.recovery_suggestion());
                None
            }
        }
    }

    pub async fn download_all(&self) -> Result<RunSummary> {
        if self.hospitals.is_empty() {
            return Err(ChargeError::NoHospitals);
        }

        self.log_banner(true);

        let mut summary = RunSummary::new(self.storage.root().to_path_buf());
        for hospital in &self.hospitals {
            let outcome = self.download_hospital(hospital).await;
            summary.record(outcome.as_ref());
        }

        tracing::info!("{}", "=".repeat(BANNER_WIDTH));
        tracing::info!(
            "✓ Complete! Successfully downloaded {}/{} hospitals",
            summary.succeeded,
            summary.total
        );
        if summary.conversion_failures > 0 {
            tracing::warn!(
                "⚠ {} JSON file(s) could not be converted and were kept as-is",
                summary.conversion_failures
            );
        }
        tracing::info!("Data saved to: {}", summary.data_dir.display());

        Ok(summary)
    }

    /// 依 short_name (不分大小寫) 下載單一醫院
    pub async fn download_specific(&self, short_name: &str) -> Result<RunSummary> {
        let hospital = self
            .hospitals
            .iter()
            .find(|h| h.short_name.eq_ignore_ascii_case(short_name))
            .ok_or_else(|| ChargeError::HospitalNotFound {
                short_name: short_name.to_string(),
                available: self.hospitals.iter().map(|h| h.short_name.clone()).collect(),
            })?;

        self.log_banner(false);

        let mut summary = RunSummary::new(self.storage.root().to_path_buf());
        let outcome = self.download_hospital(hospital).await;
        summary.record(outcome.as_ref());

        tracing::info!("Data saved to: {}", summary.data_dir.display());
        Ok(summary)
    }

    fn log_banner(&self, with_date: bool) {
        tracing::info!("{}", "=".repeat(BANNER_WIDTH));
        tracing::info!("Hospital Billing Data Collector");
        if with_date {
            tracing::info!("Run Date: {}", self.run_date);
        }
        tracing::info!("{}", "=".repeat(BANNER_WIDTH));
    }
}

/// URL 路徑最後一段；沒有副檔名時改用 `charges_<date>.json`
pub fn filename_from_url(url: &str, run_date: &str) -> String {
    let filename = Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .unwrap_or_default();

    if filename.is_empty() || !filename.contains('.') {
        format!("charges_{}.json", run_date)
    } else {
        filename
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
