//! Lifecycle controller: turns operator actions into gateway calls.
//!
//! Starting is gated on the parent process running. Stop and delete go
//! through a two-step confirmation: the request parks a single
//! [`PendingConfirmation`] and nothing reaches the gateway until it is
//! confirmed. Every successful command asks the poller for one extra fetch.
//!
//! The controller is the single place where failures become notices. Once
//! deactivated it neither refreshes nor notifies, so commands that complete
//! after the console moved on are silently dropped.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::gateway::CrawlerGateway;
use super::model::{CrawlerInfo, CrawlerPatch, CrawlerSpec, ProcessStatus};
use super::notice::{CommandKind, Notice};
use super::poller::{RefreshHandle, SnapshotReceiver};
use crate::error::{ConfirmationError, PreconditionError, RemoteError, Result};

/// Notice text when a start is rejected locally.
pub const PROCESS_NOT_RUNNING_NOTICE: &str = "Process is not running, cannot start crawler";

/// Notice text for an accepted start/stop directive.
const COMMAND_SENT_NOTICE: &str = "Command sent";

/// A destructive action waiting for the operator to confirm it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    Stop { crawler_id: i64 },
    Delete { crawler_id: i64 },
}

impl ConfirmAction {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Stop { .. } => CommandKind::Stop,
            Self::Delete { .. } => CommandKind::Delete,
        }
    }

    pub fn crawler_id(&self) -> i64 {
        match self {
            Self::Stop { crawler_id } | Self::Delete { crawler_id } => *crawler_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    pub id: Uuid,
    pub action: ConfirmAction,
    pub requested_at: DateTime<Utc>,
}

impl PendingConfirmation {
    fn new(action: ConfirmAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            requested_at: Utc::now(),
        }
    }

    /// Question to put to the operator.
    pub fn prompt(&self) -> String {
        match self.action {
            ConfirmAction::Stop { crawler_id } => format!("Stop crawler {crawler_id}?"),
            ConfirmAction::Delete { crawler_id } => format!("Delete crawler {crawler_id}?"),
        }
    }
}

/// Which command kinds currently have a call in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingFlags {
    pub start: bool,
    pub stop: bool,
    pub delete: bool,
    /// Create or update.
    pub save: bool,
}

impl PendingFlags {
    pub fn any(&self) -> bool {
        self.start || self.stop || self.delete || self.save
    }
}

/// Result of a successful create-or-update.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The record is `None` when the server confirmed without describing it.
    Created(Option<CrawlerInfo>),
    Updated { crawler_id: i64 },
}

#[derive(Default)]
struct InFlight {
    start: AtomicUsize,
    stop: AtomicUsize,
    delete: AtomicUsize,
    save: AtomicUsize,
}

impl InFlight {
    fn counter(&self, kind: CommandKind) -> &AtomicUsize {
        match kind {
            CommandKind::Start => &self.start,
            CommandKind::Stop => &self.stop,
            CommandKind::Delete => &self.delete,
            CommandKind::Create | CommandKind::Update => &self.save,
        }
    }

    fn enter(&self, kind: CommandKind) -> InFlightGuard<'_> {
        let counter = self.counter(kind);
        counter.fetch_add(1, Ordering::SeqCst);
        InFlightGuard { counter }
    }

    fn flags(&self) -> PendingFlags {
        PendingFlags {
            start: self.start.load(Ordering::SeqCst) > 0,
            stop: self.stop.load(Ordering::SeqCst) > 0,
            delete: self.delete.load(Ordering::SeqCst) > 0,
            save: self.save.load(Ordering::SeqCst) > 0,
        }
    }
}

struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Orchestrates crawler lifecycle commands for one process.
pub struct LifecycleController {
    process_id: i64,
    gateway: Arc<dyn CrawlerGateway>,
    snapshot: SnapshotReceiver,
    refresh: RefreshHandle,
    notices: mpsc::UnboundedSender<Notice>,
    confirmation: Mutex<Option<PendingConfirmation>>,
    in_flight: InFlight,
    active: AtomicBool,
}

impl LifecycleController {
    pub fn new(
        process_id: i64,
        gateway: Arc<dyn CrawlerGateway>,
        snapshot: SnapshotReceiver,
        refresh: RefreshHandle,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        Self {
            process_id,
            gateway,
            snapshot,
            refresh,
            notices,
            confirmation: Mutex::new(None),
            in_flight: InFlight::default(),
            active: AtomicBool::new(true),
        }
    }

    pub fn process_id(&self) -> i64 {
        self.process_id
    }

    /// Process status from the latest snapshot; `Stopped` until the first
    /// successful fetch.
    pub fn process_status(&self) -> ProcessStatus {
        self.snapshot
            .borrow()
            .as_ref()
            .map(|s| s.process_status.clone())
            .unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Detach from the view. Pending confirmations are discarded and late
    /// completions stop producing refreshes or notices.
    pub fn deactivate(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.lock_confirmation().take();
            debug!(process_id = self.process_id, "Lifecycle controller deactivated");
        }
    }

    pub fn pending(&self) -> PendingFlags {
        self.in_flight.flags()
    }

    pub fn pending_confirmation(&self) -> Option<PendingConfirmation> {
        self.lock_confirmation().clone()
    }

    /// Start a crawler. Rejected locally unless the process is running.
    pub async fn request_start(&self, crawler_id: i64) -> Result<()> {
        self.ensure_active()?;

        let status = self.process_status();
        if !status.is_running() {
            info!(
                process_id = self.process_id,
                crawler_id,
                status = %status,
                "Start rejected, process is not running"
            );
            self.notify(Notice::error(CommandKind::Start, PROCESS_NOT_RUNNING_NOTICE));
            return Err(PreconditionError::ProcessNotRunning {
                process_id: self.process_id,
                status: status.to_string(),
            }
            .into());
        }

        let _guard = self.in_flight.enter(CommandKind::Start);
        let result = self
            .gateway
            .update_crawler(self.process_id, crawler_id, &CrawlerPatch::start(true))
            .await;
        self.finish(CommandKind::Start, Some(crawler_id), result, COMMAND_SENT_NOTICE)
    }

    /// Ask to stop a crawler. Nothing is sent until [`confirm`](Self::confirm).
    pub fn request_stop(&self, crawler_id: i64) -> Result<PendingConfirmation> {
        self.park(ConfirmAction::Stop { crawler_id })
    }

    /// Ask to delete a crawler. Nothing is sent until [`confirm`](Self::confirm).
    pub fn request_delete(&self, crawler_id: i64) -> Result<PendingConfirmation> {
        self.park(ConfirmAction::Delete { crawler_id })
    }

    /// Execute the pending action. With `Some(id)` the id must match the
    /// pending request; on mismatch the request stays pending.
    pub async fn confirm(&self, confirmation_id: Option<Uuid>) -> Result<ConfirmAction> {
        self.ensure_active()?;

        let pending = {
            let mut slot = self.lock_confirmation();
            let Some(pending) = slot.take() else {
                return Err(ConfirmationError::NothingPending.into());
            };
            if let Some(got) = confirmation_id
                && got != pending.id
            {
                let expected = pending.id;
                *slot = Some(pending);
                return Err(ConfirmationError::Mismatch { expected, got }.into());
            }
            pending
        };

        let action = pending.action;
        let kind = action.kind();
        let _guard = self.in_flight.enter(kind);
        match action {
            ConfirmAction::Stop { crawler_id } => {
                // Stopping is allowed whatever the process status.
                let result = self
                    .gateway
                    .update_crawler(self.process_id, crawler_id, &CrawlerPatch::start(false))
                    .await;
                self.finish(kind, Some(crawler_id), result, COMMAND_SENT_NOTICE)?;
            }
            ConfirmAction::Delete { crawler_id } => {
                let result = self.gateway.delete_crawler(self.process_id, crawler_id).await;
                let message = format!("Crawler {crawler_id} deleted");
                self.finish(kind, Some(crawler_id), result, &message)?;
            }
        }
        Ok(action)
    }

    /// Discard the pending action, if any.
    pub fn cancel(&self) -> Option<PendingConfirmation> {
        let cancelled = self.lock_confirmation().take();
        if let Some(p) = &cancelled {
            debug!(confirmation = %p.id, "Confirmation cancelled");
        }
        cancelled
    }

    /// Update `existing` with the full spec, or create a new crawler when
    /// `existing` is `None`. Non-positive task limits are dropped first.
    pub async fn request_create_or_update(
        &self,
        spec: CrawlerSpec,
        existing: Option<i64>,
    ) -> Result<SaveOutcome> {
        self.ensure_active()?;

        let spec = spec.normalized();
        let kind = match existing {
            Some(_) => CommandKind::Update,
            None => CommandKind::Create,
        };
        let _guard = self.in_flight.enter(kind);
        let message = format!("{kind} succeeded");

        match existing {
            Some(crawler_id) => {
                let result = self
                    .gateway
                    .update_crawler(self.process_id, crawler_id, &CrawlerPatch::from(spec))
                    .await;
                self.finish(kind, Some(crawler_id), result, &message)?;
                Ok(SaveOutcome::Updated { crawler_id })
            }
            None => {
                let result = self.gateway.create_crawler(self.process_id, &spec).await;
                let created = self.finish(kind, None, result, &message)?;
                Ok(SaveOutcome::Created(created))
            }
        }
    }

    fn park(&self, action: ConfirmAction) -> Result<PendingConfirmation> {
        self.ensure_active()?;
        let pending = PendingConfirmation::new(action);
        if let Some(old) = self.lock_confirmation().replace(pending.clone()) {
            debug!(replaced = %old.id, "Replacing unconfirmed request");
        }
        Ok(pending)
    }

    /// Log the outcome, then refresh and notify if still active.
    fn finish<T>(
        &self,
        kind: CommandKind,
        crawler_id: Option<i64>,
        result: std::result::Result<T, RemoteError>,
        success_message: &str,
    ) -> Result<T> {
        let active = self.is_active();
        match result {
            Ok(value) => {
                info!(
                    process_id = self.process_id,
                    crawler_id = ?crawler_id,
                    command = %kind,
                    "Crawler command succeeded"
                );
                if active {
                    self.refresh.refresh();
                    self.notify(Notice::success(kind, success_message));
                }
                Ok(value)
            }
            Err(e) => {
                warn!(
                    process_id = self.process_id,
                    crawler_id = ?crawler_id,
                    command = %kind,
                    "Crawler command failed: {e}"
                );
                if active {
                    self.notify(Notice::error(kind, format!("{kind} failed: {e}")));
                }
                Err(e.into())
            }
        }
    }

    fn ensure_active(&self) -> std::result::Result<(), PreconditionError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(PreconditionError::Inactive)
        }
    }

    fn notify(&self, notice: Notice) {
        // The receiver goes away when the front end shuts down.
        let _ = self.notices.send(notice);
    }

    fn lock_confirmation(&self) -> MutexGuard<'_, Option<PendingConfirmation>> {
        self.confirmation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::watch;

    use super::*;
    use crate::crawler::model::{CrawlerList, TaskType};
    use crate::crawler::notice::NoticeLevel;
    use crate::crawler::poller::Snapshot;
    use crate::crawler::test_support::{Call, MockGateway};
    use crate::error::Error;

    struct Harness {
        gw: Arc<MockGateway>,
        ctl: LifecycleController,
        snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
        refresh_rx: mpsc::UnboundedReceiver<()>,
        notices: mpsc::UnboundedReceiver<Notice>,
    }

    impl Harness {
        fn new(status: Option<ProcessStatus>) -> Self {
            let gw = Arc::new(MockGateway::default());
            let initial = status.map(|process_status| {
                Arc::new(Snapshot::from_list(
                    5,
                    CrawlerList {
                        crawler_list: vec![CrawlerInfo::new(2, "stopped", false)],
                        process_name: "main".into(),
                        process_status,
                    },
                ))
            });
            let (snapshot_tx, snapshot_rx) = watch::channel(initial);
            let (refresh, refresh_rx) = RefreshHandle::channel();
            let (notice_tx, notices) = mpsc::unbounded_channel();
            let ctl = LifecycleController::new(5, gw.clone(), snapshot_rx, refresh, notice_tx);
            Self {
                gw,
                ctl,
                snapshot_tx,
                refresh_rx,
                notices,
            }
        }

        fn running() -> Self {
            Self::new(Some(ProcessStatus::Running))
        }

        fn refreshes(&mut self) -> usize {
            let mut n = 0;
            while self.refresh_rx.try_recv().is_ok() {
                n += 1;
            }
            n
        }

        fn drain_notices(&mut self) -> Vec<Notice> {
            let mut out = Vec::new();
            while let Ok(n) = self.notices.try_recv() {
                out.push(n);
            }
            out
        }
    }

    #[tokio::test]
    async fn start_rejected_when_process_stopped() {
        let mut h = Harness::new(Some(ProcessStatus::Stopped));
        let before = h.snapshot_tx.borrow().clone();

        let err = h.ctl.request_start(2).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Precondition(PreconditionError::ProcessNotRunning { process_id: 5, .. })
        ));
        assert!(h.gw.calls().is_empty());
        assert_eq!(h.refreshes(), 0);
        assert_eq!(h.snapshot_tx.borrow().clone(), before);

        let notices = h.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert_eq!(notices[0].message, PROCESS_NOT_RUNNING_NOTICE);
    }

    #[tokio::test]
    async fn start_rejected_before_first_snapshot() {
        let h = Harness::new(None);
        assert_eq!(h.ctl.process_status(), ProcessStatus::Stopped);
        assert!(h.ctl.request_start(2).await.is_err());
        assert!(h.gw.calls().is_empty());
    }

    #[tokio::test]
    async fn start_sends_directive_when_running() {
        let mut h = Harness::running();
        h.ctl.request_start(2).await.unwrap();

        assert_eq!(
            h.gw.calls(),
            vec![Call::Update {
                process_id: 5,
                crawler_id: 2,
                patch: CrawlerPatch::start(true),
            }]
        );
        assert_eq!(h.refreshes(), 1);
        let notices = h.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, "Command sent");
        assert!(!h.ctl.pending().any());
    }

    #[tokio::test]
    async fn start_failure_notifies_once_without_refresh() {
        let mut h = Harness::running();
        h.gw.fail_next_command(RemoteError::new(Some(500), "boom"));

        let err = h.ctl.request_start(2).await.unwrap_err();
        assert!(matches!(err, Error::Remote(ref e) if e.status == Some(500)));
        assert_eq!(h.refreshes(), 0);
        let notices = h.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, "Start failed: HTTP 500: boom");
        // No retry.
        assert_eq!(h.gw.command_calls().len(), 1);
    }

    #[tokio::test]
    async fn stop_waits_for_confirmation() {
        let mut h = Harness::new(Some(ProcessStatus::Stopped));
        let pending = h.ctl.request_stop(3).unwrap();
        assert_eq!(pending.action, ConfirmAction::Stop { crawler_id: 3 });
        assert_eq!(pending.prompt(), "Stop crawler 3?");
        assert!(h.gw.calls().is_empty());

        // Stop goes through even though the process is stopped.
        let action = h.ctl.confirm(Some(pending.id)).await.unwrap();
        assert_eq!(action, ConfirmAction::Stop { crawler_id: 3 });
        assert_eq!(
            h.gw.calls(),
            vec![Call::Update {
                process_id: 5,
                crawler_id: 3,
                patch: CrawlerPatch::start(false),
            }]
        );
        assert_eq!(h.refreshes(), 1);
        assert!(h.ctl.pending_confirmation().is_none());
    }

    #[tokio::test]
    async fn stop_failure_notifies_once_without_refresh() {
        let mut h = Harness::running();
        h.gw.fail_next_command(RemoteError::new(Some(502), "worker unreachable"));
        let pending = h.ctl.request_stop(3).unwrap();

        let err = h.ctl.confirm(Some(pending.id)).await.unwrap_err();
        assert!(matches!(err, Error::Remote(ref e) if e.status == Some(502)));
        assert_eq!(h.refreshes(), 0);
        let notices = h.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert_eq!(notices[0].kind, Some(CommandKind::Stop));
        assert_eq!(notices[0].message, "Stop failed: HTTP 502: worker unreachable");
        // The attempt used up the confirmation; nothing is retried.
        assert!(h.ctl.pending_confirmation().is_none());
        assert_eq!(h.gw.command_calls().len(), 1);
        assert!(!h.ctl.pending().any());
    }

    #[tokio::test]
    async fn delete_failure_notifies_once_without_refresh() {
        let mut h = Harness::running();
        h.gw.fail_next_command(RemoteError::transport("connection reset"));
        h.ctl.request_delete(9).unwrap();

        let err = h.ctl.confirm(None).await.unwrap_err();
        assert!(matches!(err, Error::Remote(ref e) if e.status.is_none()));
        assert_eq!(h.refreshes(), 0);
        let notices = h.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert_eq!(notices[0].kind, Some(CommandKind::Delete));
        assert_eq!(notices[0].message, "Delete failed: connection reset");
        assert!(h.ctl.pending_confirmation().is_none());
        assert_eq!(
            h.gw.command_calls(),
            vec![Call::Delete {
                process_id: 5,
                crawler_id: 9
            }]
        );
    }

    #[tokio::test]
    async fn delete_confirm_issues_delete() {
        let mut h = Harness::running();
        h.ctl.request_delete(9).unwrap();
        h.ctl.confirm(None).await.unwrap();

        assert_eq!(
            h.gw.calls(),
            vec![Call::Delete {
                process_id: 5,
                crawler_id: 9
            }]
        );
        assert_eq!(h.refreshes(), 1);
        assert_eq!(h.drain_notices()[0].message, "Crawler 9 deleted");
    }

    #[tokio::test]
    async fn confirm_mismatch_keeps_request_pending() {
        let h = Harness::running();
        let pending = h.ctl.request_delete(9).unwrap();

        let err = h.ctl.confirm(Some(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Confirmation(ConfirmationError::Mismatch { expected, .. })
                if expected == pending.id
        ));
        assert!(h.gw.calls().is_empty());
        assert_eq!(h.ctl.pending_confirmation(), Some(pending));
    }

    #[tokio::test]
    async fn confirm_with_nothing_pending() {
        let h = Harness::running();
        let err = h.ctl.confirm(None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Confirmation(ConfirmationError::NothingPending)
        ));
    }

    #[tokio::test]
    async fn cancel_discards_request() {
        let h = Harness::running();
        h.ctl.request_stop(1).unwrap();
        assert!(h.ctl.cancel().is_some());
        assert!(h.ctl.cancel().is_none());
        assert!(h.ctl.confirm(None).await.is_err());
        assert!(h.gw.calls().is_empty());
    }

    #[tokio::test]
    async fn new_request_replaces_unconfirmed_one() {
        let h = Harness::running();
        let first = h.ctl.request_stop(1).unwrap();
        let second = h.ctl.request_delete(2).unwrap();
        assert_ne!(first.id, second.id);

        assert!(h.ctl.confirm(Some(first.id)).await.is_err());
        h.ctl.confirm(Some(second.id)).await.unwrap();
        assert_eq!(
            h.gw.command_calls(),
            vec![Call::Delete {
                process_id: 5,
                crawler_id: 2
            }]
        );
    }

    #[tokio::test]
    async fn create_strips_non_positive_limit() {
        let mut h = Harness::running();
        let spec = CrawlerSpec::new("alpha").with_task_count_limit(0);
        let outcome = h.ctl.request_create_or_update(spec, None).await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Created(Some(ref c)) if c.name == "alpha"));

        let spec = CrawlerSpec::new("beta")
            .with_task_type(TaskType::Company)
            .with_task_count_limit(5);
        h.ctl.request_create_or_update(spec, None).await.unwrap();

        let calls = h.gw.calls();
        assert!(matches!(&calls[0], Call::Create { spec, .. } if spec.task_count_limit.is_none()));
        assert!(matches!(&calls[1], Call::Create { spec, .. } if spec.task_count_limit == Some(5)));
        assert_eq!(h.refreshes(), 2);
        assert_eq!(h.drain_notices()[0].message, "Create succeeded");
    }

    #[tokio::test]
    async fn update_sends_full_spec_as_patch() {
        let mut h = Harness::running();
        let spec = CrawlerSpec::new("renamed").with_task_type(TaskType::JobFilter);
        let outcome = h.ctl.request_create_or_update(spec, Some(4)).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Updated { crawler_id: 4 });

        assert_eq!(
            h.gw.calls(),
            vec![Call::Update {
                process_id: 5,
                crawler_id: 4,
                patch: CrawlerPatch {
                    name: Some("renamed".into()),
                    task_type: Some(TaskType::JobFilter),
                    task_count_limit: None,
                    start: None,
                },
            }]
        );
        assert_eq!(h.drain_notices()[0].message, "Update succeeded");
    }

    #[tokio::test]
    async fn save_failure_is_returned_and_notified() {
        let mut h = Harness::running();
        h.gw.fail_next_command(RemoteError::new(Some(409), "name taken"));
        let err = h
            .ctl
            .request_create_or_update(CrawlerSpec::new("dup"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
        assert_eq!(h.refreshes(), 0);
        let notices = h.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, Some(CommandKind::Create));
        assert_eq!(notices[0].message, "Create failed: HTTP 409: name taken");
    }

    #[tokio::test]
    async fn each_success_refreshes_exactly_once() {
        let mut h = Harness::running();
        h.ctl.request_start(1).await.unwrap();
        h.ctl.request_stop(1).unwrap();
        h.ctl.confirm(None).await.unwrap();
        h.ctl.request_delete(1).unwrap();
        h.ctl.confirm(None).await.unwrap();
        h.ctl
            .request_create_or_update(CrawlerSpec::new("n"), None)
            .await
            .unwrap();
        h.ctl
            .request_create_or_update(CrawlerSpec::new("n"), Some(1))
            .await
            .unwrap();
        assert_eq!(h.refreshes(), 5);
    }

    #[tokio::test]
    async fn deactivated_controller_rejects_and_stays_quiet() {
        let mut h = Harness::running();
        h.ctl.request_stop(1).unwrap();
        h.ctl.deactivate();

        assert!(h.ctl.pending_confirmation().is_none());
        assert!(matches!(
            h.ctl.request_start(1).await,
            Err(Error::Precondition(PreconditionError::Inactive))
        ));
        assert!(h.ctl.request_delete(1).is_err());
        assert!(h.gw.calls().is_empty());
        assert!(h.drain_notices().is_empty());
    }

    /// Gateway whose update blocks until released.
    struct SlowGateway {
        inner: MockGateway,
        release: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl CrawlerGateway for SlowGateway {
        async fn list_crawlers(
            &self,
            process_id: i64,
        ) -> std::result::Result<CrawlerList, RemoteError> {
            self.inner.list_crawlers(process_id).await
        }

        async fn create_crawler(
            &self,
            process_id: i64,
            spec: &CrawlerSpec,
        ) -> std::result::Result<Option<CrawlerInfo>, RemoteError> {
            self.inner.create_crawler(process_id, spec).await
        }

        async fn update_crawler(
            &self,
            process_id: i64,
            crawler_id: i64,
            patch: &CrawlerPatch,
        ) -> std::result::Result<(), RemoteError> {
            self.release.notified().await;
            self.inner.update_crawler(process_id, crawler_id, patch).await
        }

        async fn delete_crawler(
            &self,
            process_id: i64,
            crawler_id: i64,
        ) -> std::result::Result<(), RemoteError> {
            self.inner.delete_crawler(process_id, crawler_id).await
        }
    }

    #[tokio::test]
    async fn in_flight_flags_and_late_completion() {
        let gw = Arc::new(SlowGateway {
            inner: MockGateway::default(),
            release: tokio::sync::Notify::new(),
        });
        let snapshot = Arc::new(Snapshot::from_list(
            5,
            CrawlerList {
                process_status: ProcessStatus::Running,
                ..Default::default()
            },
        ));
        let (_snapshot_tx, snapshot_rx) = watch::channel(Some(snapshot));
        let (refresh, mut refresh_rx) = RefreshHandle::channel();
        let (notice_tx, mut notices) = mpsc::unbounded_channel();
        let ctl = Arc::new(LifecycleController::new(
            5,
            gw.clone(),
            snapshot_rx,
            refresh,
            notice_tx,
        ));

        let task = tokio::spawn({
            let ctl = Arc::clone(&ctl);
            async move { ctl.request_start(1).await }
        });
        tokio::time::timeout(Duration::from_secs(1), async {
            while !ctl.pending().start {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(
            ctl.pending(),
            PendingFlags {
                start: true,
                ..Default::default()
            }
        );

        // View moves on before the command completes.
        ctl.deactivate();
        gw.release.notify_one();
        task.await.unwrap().unwrap();

        assert!(!ctl.pending().any());
        assert!(refresh_rx.try_recv().is_err());
        assert!(notices.try_recv().is_err());
    }
}
