//! Error types for boardflow
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, board not initialized)
//! - 3: Backend rejected the status update (change was rolled back)
//! - 4: Operation failed (I/O, serialization, locking)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the boardflow CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const BACKEND_REJECTED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for boardflow operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Duplicate task id in collection: {0}")]
    DuplicateTask(String),

    #[error("Board not initialized at {0} (run `boardflow init`)")]
    BoardNotInitialized(PathBuf),

    // Backend failures (exit code 3)
    #[error("Backend rejected update: {0}")]
    Backend(String),

    #[error("Backend did not answer within {0}ms")]
    BackendTimeout(u64),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::TaskNotFound(_)
            | Error::DuplicateTask(_)
            | Error::BoardNotInitialized(_) => exit_codes::USER_ERROR,

            Error::Backend(_) | Error::BackendTimeout(_) => exit_codes::BACKEND_REJECTED,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output, when the variant has any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::TaskNotFound(id) | Error::DuplicateTask(id) => {
                Some(serde_json::json!({ "task_id": id }))
            }
            Error::BoardNotInitialized(path) | Error::LockFailed(path) => {
                Some(serde_json::json!({ "path": path.display().to_string() }))
            }
            Error::BackendTimeout(ms) => Some(serde_json::json!({ "timeout_ms": ms })),
            _ => None,
        }
    }
}

/// Result type alias for boardflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
