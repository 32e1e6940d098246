//! Error types for tsk
//!
//! Exit codes:
//! - 0: Success
//! - 1: Validation found broken cases (`tsk validate`)
//! - 2: User error (bad args, missing `.tasks`, unknown case)
//! - 3: Blocked by lifecycle policy (invalid transition, broken case)
//! - 4: Operation failed (filesystem, lock, serialization)

use std::path::PathBuf;

use serde_json::json;
use thiserror::Error;

use crate::case::Defect;
use crate::metadata::Status;

/// Exit codes for the tsk CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_FAILED: i32 = 1;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tsk operations
#[derive(Error, Debug)]
pub enum Error {
    // Validation report (exit code 1)
    #[error("Validation failed: {invalid} invalid case(s)")]
    ValidationFailed { invalid: usize },

    // User errors (exit code 2)
    #[error("No .tasks directory found in {0}")]
    TasksRootNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid title {0:?}: no usable slug characters")]
    InvalidTitle(String),

    #[error("Malformed case identifier {name:?}: {reason}")]
    MalformedIdentifier { name: String, reason: String },

    #[error("Case not found: {0}")]
    CaseNotFound(String),

    #[error("Case query {query:?} is ambiguous ({} matches)", .matches.len())]
    AmbiguousCase { query: String, matches: Vec<String> },

    // Policy blocks (exit code 3)
    #[error("Invalid transition for {id}: {from} -> {to} ({reason})")]
    InvalidTransition {
        id: String,
        from: Status,
        to: Status,
        reason: String,
    },

    #[error("Next action required for status {status}")]
    MissingNextAction { status: Status },

    #[error("Case {id} is invalid ({} defect(s))", .defects.len())]
    InvalidCase { id: String, defects: Vec<Defect> },

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
            Error::ValidationFailed { .. } => exit_codes::VALIDATION_FAILED,

            Error::TasksRootNotFound(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::InvalidTitle(_)
            | Error::MalformedIdentifier { .. }
            | Error::CaseNotFound(_)
            | Error::AmbiguousCase { .. } => exit_codes::USER_ERROR,

            Error::InvalidTransition { .. }
            | Error::MissingNextAction { .. }
            | Error::InvalidCase { .. } => exit_codes::POLICY_BLOCKED,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Category name matching the exit code.
    pub fn kind(&self) -> &'static str {
        match self.exit_code() {
            exit_codes::VALIDATION_FAILED => "validation_failed",
            exit_codes::USER_ERROR => "user_error",
            exit_codes::POLICY_BLOCKED => "policy_blocked",
            _ => "operation_failed",
        }
    }

    /// Structured context for machine-readable output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::TasksRootNotFound(path) | Error::LockFailed(path) => {
                Some(json!({ "path": path }))
            }
            Error::ValidationFailed { invalid } => Some(json!({ "invalid": invalid })),
            Error::InvalidTitle(title) => Some(json!({ "title": title })),
            Error::MalformedIdentifier { name, reason } => {
                Some(json!({ "name": name, "reason": reason }))
            }
            Error::CaseNotFound(query) => Some(json!({ "query": query })),
            Error::AmbiguousCase { query, matches } => {
                Some(json!({ "query": query, "matches": matches }))
            }
            Error::InvalidTransition { id, from, to, reason } => Some(json!({
                "id": id,
                "from": from,
                "to": to,
                "reason": reason,
            })),
            Error::MissingNextAction { status } => Some(json!({ "status": status })),
            Error::InvalidCase { id, defects } => Some(json!({
                "id": id,
                "defects": defects,
            })),
            _ => None,
        }
    }
}

/// Result type alias for tsk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error body of the JSON envelope
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub message: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            message: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
