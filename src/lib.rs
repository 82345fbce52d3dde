pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::{cli::LocalStorage, hospitals::HospitalsConfig};
pub use self::core::{
    collector::ChargeCollector,
    fetch::HttpFetcher,
    normalize::{normalize, JsonNormalizer, NestedValues, NormalizeError, NormalizeErrorKind},
};
pub use utils::error::{ChargeError, Result};
