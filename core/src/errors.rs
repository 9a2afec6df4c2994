//! Error taxonomy for the continuation engine
//!
//! Every variant aborts the in-flight capture/restore cycle. The engine never
//! retries: a frame stack that failed once cannot be replayed safely.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by `start`, `resume` and `suspend`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContinuationError {
    /// The recorder was asked to do something its current mode forbids
    /// (suspend while capturing, restore on a busy recorder, ...)
    #[error("illegal recorder state: {0}")]
    IllegalState(String),

    /// A frame stack handed to restore is empty or malformed
    #[error("invalid continuation: {0}")]
    InvalidContinuation(String),

    /// The continuation was already consumed by an earlier resume
    #[error("continuation {id} has already been resumed")]
    AlreadyResumed { id: Uuid },

    /// An instrumented routine did not honor the save/restore protocol
    #[error("instrumentation contract violated in `{routine}`: {detail}")]
    ContractViolation { routine: String, detail: String },
}

impl ContinuationError {
    pub(crate) fn illegal_state(msg: impl Into<String>) -> Self {
        ContinuationError::IllegalState(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ContinuationError::InvalidContinuation(msg.into())
    }

    pub(crate) fn violation(routine: impl Into<String>, detail: impl Into<String>) -> Self {
        let err = ContinuationError::ContractViolation {
            routine: routine.into(),
            detail: detail.into(),
        };
        tracing::warn!(error = %err, "instrumentation contract violation");
        err
    }
}

/// Result alias used throughout the engine
pub type Result<T, E = ContinuationError> = std::result::Result<T, E>;
