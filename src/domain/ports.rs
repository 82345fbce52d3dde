use crate::core::normalize::NestedValues;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub trait Storage: Send + Sync {
    fn root(&self) -> &Path;
    /// 相對路徑轉成實際路徑
    fn resolve(&self, path: &str) -> PathBuf;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<PathBuf>> + Send;
    fn rename(
        &self,
        from: &Path,
        to: &Path,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn config_file(&self) -> &str;
    fn data_dir(&self) -> &str;
    fn timeout_secs(&self) -> u64;
    fn nested_values(&self) -> NestedValues;
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
