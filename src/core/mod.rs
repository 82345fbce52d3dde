pub mod collector;
pub mod fetch;
pub mod normalize;

pub use crate::domain::model::{ChargeRecord, DownloadOutcome, Hospital, OutputTable, RunSummary};
pub use crate::domain::ports::{ConfigProvider, Fetcher, Storage};
pub use crate::utils::error::Result;
