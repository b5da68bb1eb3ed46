//! User-facing notices emitted by the lifecycle controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The lifecycle command a notice or in-flight flag refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Start,
    Stop,
    Delete,
    Create,
    Update,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::Stop => write!(f, "Stop"),
            Self::Delete => write!(f, "Delete"),
            Self::Create => write!(f, "Create"),
            Self::Update => write!(f, "Update"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

/// A transient message for the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub kind: Option<CommandKind>,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    fn new(level: NoticeLevel, kind: Option<CommandKind>, message: impl Into<String>) -> Self {
        Self {
            level,
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn success(kind: CommandKind, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, Some(kind), message)
    }

    pub fn error(kind: CommandKind, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, Some(kind), message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, None, message)
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.level {
            NoticeLevel::Success => "✅",
            NoticeLevel::Error => "❌",
            NoticeLevel::Info => "ℹ️ ",
        };
        write!(f, "{icon} {}", self.message)
    }
}
