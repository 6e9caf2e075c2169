//! Error taxonomy for the quotabot engine.
//!
//! Step validation failures are *not* errors -- they travel as
//! `Result<T, String>` from `Step::validate` and are shown to the user
//! inline. The enums here cover the failure classes the engine has to
//! recover from or report.

use thiserror::Error;

/// Errors from store operations (sessions, tracked messages, transactions).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the chat transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request reached the transport and was refused (edit rejected,
    /// message already gone, no permission).
    #[error("transport rejected the request: {0}")]
    Rejected(String),

    /// The transport could not be reached at all.
    #[error("transport unreachable: {0}")]
    Unreachable(String),
}

/// Errors from the spreadsheet export collaborator.
///
/// `NotConfigured` is the quiet variant: the primary record is durable
/// either way, and an export that was never set up is not worth a warning.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sheet sync is not configured")]
    NotConfigured,

    #[error("sheet push failed: {0}")]
    Push(String),
}

/// Malformed persisted session state.
///
/// These indicate corruption (or a version skew) in stored rows and are
/// reported, never silently coerced into a default.
#[derive(Debug, Error)]
pub enum SessionStateError {
    #[error("session for command '{kind}' has unknown step '{step}'")]
    UnknownStep { kind: String, step: String },

    #[error("session draft payload is malformed: {0}")]
    MalformedData(String),
}

/// Top-level engine error for conditions a flow cannot recover from
/// in-band (store failures degrade to a retry message before reaching
/// this level; see the dispatcher).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Session(#[from] SessionStateError),
}
