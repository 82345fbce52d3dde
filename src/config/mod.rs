pub mod cli;
pub mod hospitals;

#[cfg(feature = "cli")]
pub use self::args::CliConfig;

#[cfg(feature = "cli")]
mod args {
    use crate::core::fetch::DEFAULT_TIMEOUT_SECS;
    use crate::core::normalize::NestedValues;
    use crate::domain::ports::ConfigProvider;
    use crate::utils::error::Result;
    use crate::utils::validation::{self, Validate};
    use clap::Parser;

    pub const DEFAULT_DATA_DIR: &str = "hospital_charges_data";
    pub const MAX_TIMEOUT_SECS: u64 = 600;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "hospital-charges")]
    #[command(about = "Download hospital machine-readable standard charges and normalize them to CSV")]
    #[command(after_help = "Examples:\n  hospital-charges                    # Download all hospitals\n  hospital-charges yale-new-haven     # Download specific hospital")]
    pub struct CliConfig {
        /// Download a specific hospital (short_name from config)
        pub hospital: Option<String>,

        /// Hospital list (JSON, or TOML with a .toml extension)
        #[arg(short, long, default_value = crate::config::hospitals::DEFAULT_CONFIG_FILE)]
        pub config: String,

        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        pub data_dir: String,

        /// HTTP timeout in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        pub timeout: u64,

        /// How nested JSON values are written to CSV cells
        #[arg(long, value_enum)]
        pub nested_values: Option<NestedValues>,

        /// List configured hospitals and exit
        #[arg(long)]
        pub list: bool,

        #[arg(short, long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Emit logs as JSON lines")]
        pub json_logs: bool,
    }

    impl ConfigProvider for CliConfig {
        fn config_file(&self) -> &str {
            &self.config
        }

        fn data_dir(&self) -> &str {
            &self.data_dir
        }

        fn timeout_secs(&self) -> u64 {
            self.timeout
        }

        fn nested_values(&self) -> NestedValues {
            self.nested_values.unwrap_or_default()
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validation::validate_path("config", &self.config)?;
            validation::validate_path("data_dir", &self.data_dir)?;
            validation::validate_range("timeout", self.timeout, 1, MAX_TIMEOUT_SECS)?;
            if let Some(hospital) = &self.hospital {
                validation::validate_non_empty_string("hospital", hospital)?;
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = CliConfig::parse_from(["hospital-charges"]);

            assert_eq!(config.hospital, None);
            assert_eq!(config.config, "hospitals_config.json");
            assert_eq!(config.data_dir(), DEFAULT_DATA_DIR);
            assert_eq!(config.timeout_secs(), 30);
            assert_eq!(config.nested_values(), NestedValues::Stringify);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_specific_hospital_and_overrides() {
            let config = CliConfig::parse_from([
                "hospital-charges",
                "yale-new-haven",
                "--data-dir",
                "/tmp/charges",
                "--timeout",
                "5",
                "--nested-values",
                "flatten",
            ]);

            assert_eq!(config.hospital.as_deref(), Some("yale-new-haven"));
            assert_eq!(config.data_dir(), "/tmp/charges");
            assert_eq!(config.timeout_secs(), 5);
            assert_eq!(config.nested_values(), NestedValues::Flatten);
        }

        #[test]
        fn test_timeout_out_of_range() {
            let config = CliConfig::parse_from(["hospital-charges", "--timeout", "0"]);
            assert!(config.validate().is_err());
        }
    }
}
