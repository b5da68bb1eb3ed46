//! Crawler data model: worker records, process status, and command payloads.
//!
//! Wire names follow the management API (camelCase). Statuses reported by the
//! remote service are open-ended, so unknown values are kept verbatim instead
//! of failing deserialization.

use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Status of a single crawler as reported by the management API.
///
/// Only `starting` and `stopped` carry meaning for classification; every
/// other value is a running-like state and is preserved as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CrawlerStatus {
    Starting,
    Stopped,
    Running,
    /// Any other running-like state reported by the server.
    Other(String),
}

impl CrawlerStatus {
    /// `starting` and `stopped` are the "not running" states.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Starting | Self::Stopped)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Starting => "starting",
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for CrawlerStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "starting" => Self::Starting,
            "stopped" => Self::Stopped,
            "running" => Self::Running,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for CrawlerStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<CrawlerStatus> for String {
    fn from(status: CrawlerStatus) -> Self {
        match status {
            CrawlerStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for CrawlerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the parent process. Crawlers can only be started while it is
/// `Running`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessStatus {
    #[default]
    Stopped,
    Running,
    Other(String),
}

impl ProcessStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ProcessStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "running" => Self::Running,
            // Older servers report the stopped state as "stop".
            "stopped" | "stop" => Self::Stopped,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for ProcessStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<ProcessStatus> for String {
    fn from(status: ProcessStatus) -> Self {
        match status {
            ProcessStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tasks a crawler pulls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskType {
    #[default]
    All,
    JobFilter,
    Company,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::JobFilter => write!(f, "jobFilter"),
            Self::Company => write!(f, "company"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "jobFilter" | "job_filter" | "jobfilter" => Ok(Self::JobFilter),
            "company" => Ok(Self::Company),
            _ => Err(format!("Unknown task type: {}", s)),
        }
    }
}

/// A crawler record as returned by the list operation.
///
/// Only `id`, `status` and `report_auth` are interpreted. Everything else the
/// server sends rides along in `extra` and is serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerInfo {
    pub id: i64,
    pub status: CrawlerStatus,
    /// The crawler failed to authenticate/report to its controller.
    #[serde(default, deserialize_with = "null_as_default")]
    pub report_auth: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CrawlerInfo {
    pub fn new(id: i64, status: impl Into<CrawlerStatus>, report_auth: bool) -> Self {
        Self {
            id,
            status: status.into(),
            report_auth,
            name: String::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Builder: set name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder: attach an opaque field.
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Task type if the server reported one.
    pub fn task_type(&self) -> Option<&str> {
        self.extra.get("taskType").and_then(|v| v.as_str())
    }
}

/// Response of the list operation: the crawlers plus the owning process's
/// name and status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub crawler_list: Vec<CrawlerInfo>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub process_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub process_status: ProcessStatus,
}

/// Form values for creating (or fully updating) a crawler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerSpec {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub task_type: TaskType,
    /// Maximum number of tasks; absent means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_count_limit: Option<i64>,
}

impl CrawlerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_type: TaskType::default(),
            task_count_limit: None,
        }
    }

    /// Builder: set task type.
    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    /// Builder: set task count limit.
    pub fn with_task_count_limit(mut self, limit: i64) -> Self {
        self.task_count_limit = Some(limit);
        self
    }

    /// Drop a zero or negative task limit so it is never transmitted.
    pub fn normalized(mut self) -> Self {
        if self.task_count_limit.is_some_and(|n| n <= 0) {
            self.task_count_limit = None;
        }
        self
    }
}

/// Partial update for an existing crawler. Unset fields are omitted from the
/// request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_count_limit: Option<i64>,
    /// Start (`true`) or stop (`false`) directive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<bool>,
}

impl CrawlerPatch {
    /// Patch carrying only a start/stop directive.
    pub fn start(start: bool) -> Self {
        Self {
            start: Some(start),
            ..Default::default()
        }
    }
}

impl From<CrawlerSpec> for CrawlerPatch {
    fn from(spec: CrawlerSpec) -> Self {
        let spec = spec.normalized();
        Self {
            name: Some(spec.name),
            task_type: Some(spec.task_type),
            task_count_limit: spec.task_count_limit,
            start: None,
        }
    }
}
