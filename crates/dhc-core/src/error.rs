use thiserror::Error;

use crate::{backend::BackendError, builder::BuildError, fsm::StateError, state::StoreError};

#[derive(Debug, Error)]
pub enum CoreError {
    /// No builder/framework for the requested key, or a broken registration table.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Backend refused to create the workload (name collisions included).
    #[error("submission of '{name}' rejected: {reason}")]
    Submission { name: String, reason: String },

    #[error(transparent)]
    State(#[from] StateError),

    /// Status query failed; retried on the next tick until the poll timeout runs out.
    #[error("status query for '{key}' failed: {reason}")]
    TransientPoll { key: String, reason: String },

    #[error("poller not found: {0}")]
    PollerNotFound(String),

    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Transport independent classification of [`CoreError`].
///
/// API layers map these onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Submission,
    State,
    TransientPoll,
    NotFound,
    InvalidRequest,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Submission => "submission",
            ErrorKind::State => "state",
            ErrorKind::TransientPoll => "transient_poll",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Internal => "internal",
        }
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Configuration(_) => ErrorKind::Configuration,
            CoreError::Submission { .. } => ErrorKind::Submission,
            CoreError::State(_) => ErrorKind::State,
            CoreError::TransientPoll { .. } => ErrorKind::TransientPoll,
            CoreError::PollerNotFound(_) => ErrorKind::NotFound,
            CoreError::Build(_) => ErrorKind::InvalidRequest,
            CoreError::Backend(e) if e.is_transient() => ErrorKind::TransientPoll,
            CoreError::Backend(_) => ErrorKind::Internal,
            CoreError::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
            CoreError::Store(_) => ErrorKind::Internal,
        }
    }
}
