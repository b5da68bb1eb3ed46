//! Recording gateway for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::gateway::CrawlerGateway;
use super::model::{CrawlerInfo, CrawlerList, CrawlerPatch, CrawlerSpec};
use crate::error::RemoteError;

/// A gateway call as the mock saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List { process_id: i64 },
    Create { process_id: i64, spec: CrawlerSpec },
    Update { process_id: i64, crawler_id: i64, patch: CrawlerPatch },
    Delete { process_id: i64, crawler_id: i64 },
}

/// In-memory gateway: serves a fixed list and records every call.
#[derive(Default)]
pub struct MockGateway {
    list: Mutex<CrawlerList>,
    calls: Mutex<Vec<Call>>,
    list_failures: Mutex<VecDeque<RemoteError>>,
    command_failure: Mutex<Option<RemoteError>>,
}

impl MockGateway {
    pub fn with_list(list: CrawlerList) -> Self {
        Self {
            list: Mutex::new(list),
            ..Default::default()
        }
    }

    /// Make the next list call fail with `err`.
    pub fn fail_next_list(&self, err: RemoteError) {
        self.list_failures.lock().unwrap().push_back(err);
    }

    /// Make the next create/update/delete call fail with `err`.
    pub fn fail_next_command(&self, err: RemoteError) {
        *self.command_failure.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, Call::List { .. }))
            .count()
    }

    /// Calls other than list.
    pub fn command_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::List { .. }))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn command_result(&self) -> Result<(), RemoteError> {
        match self.command_failure.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CrawlerGateway for MockGateway {
    async fn list_crawlers(&self, process_id: i64) -> Result<CrawlerList, RemoteError> {
        self.record(Call::List { process_id });
        if let Some(err) = self.list_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.list.lock().unwrap().clone())
    }

    async fn create_crawler(
        &self,
        process_id: i64,
        spec: &CrawlerSpec,
    ) -> Result<Option<CrawlerInfo>, RemoteError> {
        self.record(Call::Create {
            process_id,
            spec: spec.clone(),
        });
        self.command_result()?;
        Ok(Some(
            CrawlerInfo::new(100, "stopped", false).with_name(spec.name.clone()),
        ))
    }

    async fn update_crawler(
        &self,
        process_id: i64,
        crawler_id: i64,
        patch: &CrawlerPatch,
    ) -> Result<(), RemoteError> {
        self.record(Call::Update {
            process_id,
            crawler_id,
            patch: patch.clone(),
        });
        self.command_result()
    }

    async fn delete_crawler(&self, process_id: i64, crawler_id: i64) -> Result<(), RemoteError> {
        self.record(Call::Delete {
            process_id,
            crawler_id,
        });
        self.command_result()
    }
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
