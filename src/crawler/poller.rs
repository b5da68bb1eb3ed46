//! Poll loop: fetches the crawler list on a fixed interval and publishes
//! classified snapshots.
//!
//! The spawned task is the only writer of the snapshot cell. Each successful
//! fetch replaces the snapshot wholesale; a failed fetch is logged and the
//! previous snapshot stays in place. Manual refreshes run one extra fetch
//! without touching the interval schedule. Dropping the poller aborts the
//! task, discarding any fetch still in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::classify::{Bucket, BucketSet, classify};
use super::gateway::CrawlerGateway;
use super::model::{CrawlerList, ProcessStatus};

/// One fetched crawler list, classified.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub process_id: i64,
    pub process_name: String,
    pub process_status: ProcessStatus,
    pub buckets: BucketSet,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn from_list(process_id: i64, list: CrawlerList) -> Self {
        Self {
            process_id,
            buckets: classify(&list.crawler_list),
            process_name: list.process_name,
            process_status: list.process_status,
            fetched_at: Utc::now(),
        }
    }
}

/// Read side of the snapshot cell. `None` until the first successful fetch.
pub type SnapshotReceiver = watch::Receiver<Option<Arc<Snapshot>>>;

/// Requests an immediate extra fetch from a running poller.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl RefreshHandle {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue one refresh. Returns `false` once the poller is gone.
    pub fn refresh(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// Background poller bound to one process.
pub struct CrawlerPoller {
    process_id: i64,
    snapshot_rx: SnapshotReceiver,
    refresh: RefreshHandle,
    handle: JoinHandle<()>,
}

impl CrawlerPoller {
    /// Spawn the poll loop. The first fetch is issued immediately.
    pub fn spawn(gateway: Arc<dyn CrawlerGateway>, process_id: i64, period: Duration) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (refresh, mut refresh_rx) = RefreshHandle::channel();

        let handle = tokio::spawn(async move {
            info!(
                process_id,
                "Crawler poller started, polling every {}ms",
                period.as_millis()
            );

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        poll_once(gateway.as_ref(), process_id, &snapshot_tx, "scheduled").await;
                    }
                    Some(()) = refresh_rx.recv() => {
                        poll_once(gateway.as_ref(), process_id, &snapshot_tx, "manual").await;
                    }
                }
            }
        });

        Self {
            process_id,
            snapshot_rx,
            refresh,
            handle,
        }
    }

    pub fn process_id(&self) -> i64 {
        self.process_id
    }

    pub fn subscribe(&self) -> SnapshotReceiver {
        self.snapshot_rx.clone()
    }

    pub fn refresh_handle(&self) -> RefreshHandle {
        self.refresh.clone()
    }

    /// Most recent successful snapshot.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.snapshot_rx.borrow().clone()
    }
}

impl Drop for CrawlerPoller {
    fn drop(&mut self) {
        self.handle.abort();
        info!(process_id = self.process_id, "Crawler poller stopped");
    }
}

/// Run one fetch and publish the result. Failures keep the last snapshot.
async fn poll_once(
    gateway: &dyn CrawlerGateway,
    process_id: i64,
    snapshot_tx: &watch::Sender<Option<Arc<Snapshot>>>,
    trigger: &'static str,
) {
    match gateway.list_crawlers(process_id).await {
        Ok(list) => {
            let snapshot = Snapshot::from_list(process_id, list);
            debug!(
                process_id,
                trigger,
                crawlers = snapshot.buckets.count(Bucket::All),
                process_status = %snapshot.process_status,
                "Crawler list refreshed"
            );
            snapshot_tx.send_replace(Some(Arc::new(snapshot)));
        }
        Err(e) => {
            warn!(process_id, trigger, "Crawler list fetch failed: {e}");
        }
    }
}
