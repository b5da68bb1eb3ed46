//! Error types for the crawler console.

use uuid::Uuid;

/// Top-level error type for the console.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Confirmation error: {0}")]
    Confirmation(#[from] ConfirmationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failure reported by the management API or the transport underneath it.
///
/// `status` is `None` when no HTTP response was received (connect error,
/// timeout).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe(.status, .message))]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

fn describe(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP {code}: {message}"),
        None => message.to_string(),
    }
}

impl RemoteError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A failure with no HTTP status attached.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Local rejections that never reach the management API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    #[error("Process {process_id} is not running (status: {status}), cannot start crawler")]
    ProcessNotRunning { process_id: i64, status: String },

    #[error("Console is not attached to a process")]
    Inactive,
}

/// Errors from the two-step confirmation protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfirmationError {
    #[error("No action is awaiting confirmation")]
    NothingPending,

    #[error("Confirmation {got} does not match pending request {expected}")]
    Mismatch { expected: Uuid, got: Uuid },
}

/// Result type alias for the console.
pub type Result<T> = std::result::Result<T, Error>;
