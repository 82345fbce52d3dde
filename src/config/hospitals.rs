use crate::core::normalize::NestedValues;
use crate::domain::model::Hospital;
use crate::utils::error::{ChargeError, Result};
use crate::utils::validation::{self, Validate};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

pub const DEFAULT_CONFIG_FILE: &str = "hospitals_config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HospitalsConfig {
    #[serde(default)]
    pub hospitals: Vec<Hospital>,
    /// 可被 `--nested-values` 覆蓋
    #[serde(default)]
    pub nested_values: Option<NestedValues>,
}

impl HospitalsConfig {
    /// 從檔案載入；`.toml` 用 TOML 解析，其餘一律當 JSON
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ChargeError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        serde_json::from_str(&processed_content)
            .map_err(|e| ChargeError::config(format!("Invalid JSON in config: {}", e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        toml::from_str(&processed_content)
            .map_err(|e| ChargeError::config(format!("TOML parsing error: {}", e)))
    }

    pub fn is_empty(&self) -> bool {
        self.hospitals.is_empty()
    }
}

/// 替換環境變數 (例如 ${HOSPITAL_BASE_URL})，找不到的保留原樣
fn substitute_env_vars(content: &str) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    });

    re.replace_all(content, |caps: &Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

impl Validate for HospitalsConfig {
    fn validate(&self) -> Result<()> {
        for (index, hospital) in self.hospitals.iter().enumerate() {
            validation::validate_directory_name(
                &format!("hospitals[{}].short_name", index),
                &hospital.short_name,
            )?;

            // 單一醫院的網址錯誤只影響該醫院，不中止整批下載
            if let Some(url) = hospital.download_url() {
                if let Err(e) =
                    validation::validate_url(&format!("hospitals[{}].file_url", index), url)
                {
                    tracing::warn!("⚠ {} will be skipped: {}", hospital.name, e);
                }
            }
        }

        validation::validate_unique(
            "hospitals.short_name",
            self.hospitals.iter().map(|h| h.short_name.as_str()),
        )
    }
}
