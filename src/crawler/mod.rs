//! Crawler monitoring and lifecycle control.

pub mod classify;
pub mod controller;
pub mod gateway;
pub mod http;
pub mod model;
pub mod notice;
pub mod poller;

#[cfg(test)]
pub(crate) mod test_support;

pub use classify::{Bucket, BucketSet, bucket_of, classify};
pub use controller::{
    ConfirmAction, LifecycleController, PendingConfirmation, PendingFlags, SaveOutcome,
};
pub use gateway::CrawlerGateway;
pub use http::HttpGateway;
pub use model::{
    CrawlerInfo, CrawlerList, CrawlerPatch, CrawlerSpec, CrawlerStatus, ProcessStatus, TaskType,
};
pub use notice::{CommandKind, Notice, NoticeLevel};
pub use poller::{CrawlerPoller, RefreshHandle, Snapshot, SnapshotReceiver};
