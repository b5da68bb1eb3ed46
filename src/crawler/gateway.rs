//! `CrawlerGateway` trait: the management API operations the console needs.

use async_trait::async_trait;

use super::model::{CrawlerInfo, CrawlerList, CrawlerPatch, CrawlerSpec};
use crate::error::RemoteError;

/// Remote management API for the crawlers of a process.
///
/// Implementations report every failure as a [`RemoteError`]; callers treat
/// those as recoverable.
#[async_trait]
pub trait CrawlerGateway: Send + Sync {
    /// List a process's crawlers together with the process name and status.
    async fn list_crawlers(&self, process_id: i64) -> Result<CrawlerList, RemoteError>;

    /// Create a crawler. `spec` is sent as-is; callers strip invalid limits.
    ///
    /// A 2xx response means the crawler exists. `None` is returned when the
    /// body does not describe it.
    async fn create_crawler(
        &self,
        process_id: i64,
        spec: &CrawlerSpec,
    ) -> Result<Option<CrawlerInfo>, RemoteError>;

    /// Apply a partial update (including start/stop directives).
    async fn update_crawler(
        &self,
        process_id: i64,
        crawler_id: i64,
        patch: &CrawlerPatch,
    ) -> Result<(), RemoteError>;

    /// Delete a crawler.
    async fn delete_crawler(&self, process_id: i64, crawler_id: i64) -> Result<(), RemoteError>;
}
