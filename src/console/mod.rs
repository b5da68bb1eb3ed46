//! Console view model: binds a poller and a lifecycle controller to the
//! process currently on screen and tracks the selected tab.

pub mod cli;
pub mod render;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::crawler::{
    Bucket, CrawlerGateway, CrawlerInfo, CrawlerPoller, LifecycleController, Notice, PendingFlags,
    Snapshot, SnapshotReceiver,
};
use crate::error::PreconditionError;

pub use cli::{ConsoleCommand, parse_command, run_repl};
pub use render::render_view;

/// Poller and controller for one attached process.
struct Session {
    poller: CrawlerPoller,
    controller: Arc<LifecycleController>,
}

impl Drop for Session {
    fn drop(&mut self) {
        // Commands still in flight must not refresh or notify after this.
        self.controller.deactivate();
    }
}

/// What the front end reads from and acts through.
pub struct CrawlerConsole {
    gateway: Arc<dyn CrawlerGateway>,
    poll_interval: Duration,
    notices: mpsc::UnboundedSender<Notice>,
    session: Option<Session>,
    selected: Bucket,
}

impl CrawlerConsole {
    /// Create a detached console. Notices from every session arrive on the
    /// returned receiver.
    pub fn new(
        gateway: Arc<dyn CrawlerGateway>,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notices, rx) = mpsc::unbounded_channel();
        let console = Self {
            gateway,
            poll_interval,
            notices,
            session: None,
            selected: Bucket::default(),
        };
        (console, rx)
    }

    /// Attach to `process_id`, or detach with `None`. Re-activating the same
    /// process keeps the running session; switching resets the tab to `All`.
    pub fn activate(&mut self, process_id: Option<i64>) {
        let Some(process_id) = process_id else {
            self.deactivate();
            return;
        };
        if self.process_id() == Some(process_id) {
            return;
        }

        // Tear the old session down before the new poller issues its first call.
        self.session = None;

        let poller =
            CrawlerPoller::spawn(Arc::clone(&self.gateway), process_id, self.poll_interval);
        let controller = Arc::new(LifecycleController::new(
            process_id,
            Arc::clone(&self.gateway),
            poller.subscribe(),
            poller.refresh_handle(),
            self.notices.clone(),
        ));
        self.session = Some(Session { poller, controller });
        self.selected = Bucket::All;
        info!(process_id, "Console attached to process");
    }

    /// Stop polling and detach the controller.
    pub fn deactivate(&mut self) {
        if let Some(session) = self.session.take() {
            info!(process_id = session.poller.process_id(), "Console detached");
        }
    }

    pub fn process_id(&self) -> Option<i64> {
        self.session.as_ref().map(|s| s.poller.process_id())
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Latest snapshot; `None` while detached or before the first fetch.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.session.as_ref().and_then(|s| s.poller.latest())
    }

    /// Watch the snapshot cell of the current session.
    pub fn subscribe(&self) -> Option<SnapshotReceiver> {
        self.session.as_ref().map(|s| s.poller.subscribe())
    }

    pub fn select_bucket(&mut self, bucket: Bucket) {
        self.selected = bucket;
    }

    pub fn selected_bucket(&self) -> Bucket {
        self.selected
    }

    /// Crawlers in the selected bucket of the latest snapshot.
    pub fn visible(&self) -> Vec<CrawlerInfo> {
        self.snapshot()
            .map(|s| s.buckets.get(self.selected).to_vec())
            .unwrap_or_default()
    }

    /// Controller for the attached process.
    pub fn controller(&self) -> Result<Arc<LifecycleController>, PreconditionError> {
        self.session
            .as_ref()
            .map(|s| Arc::clone(&s.controller))
            .ok_or(PreconditionError::Inactive)
    }

    pub fn pending(&self) -> PendingFlags {
        self.session
            .as_ref()
            .map(|s| s.controller.pending())
            .unwrap_or_default()
    }

    /// Ask for an immediate extra fetch. `false` when detached.
    pub fn refresh(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.poller.refresh_handle().refresh())
    }
}
