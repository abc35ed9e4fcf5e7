/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::async_dispatch::AsyncError;

/// Active-message errors with serialization support
///
/// `NoResources` is the only transient kind: the send path retries it at the
/// next progress opportunity. Every other kind is final for the operation
/// that produced it.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum AmError {
    #[error("Invalid parameter: {0}")]
    #[diagnostic(
        code(am::invalid_parameter),
        help("Check the active-message id range and argument sizes.")
    )]
    InvalidParameter(String),

    #[error("Not implemented: {0}")]
    #[diagnostic(
        code(am::not_implemented),
        help("Reduce the message size or clear the unsupported flags. Retrying unchanged will fail again.")
    )]
    NotImplemented(String),

    #[error("No resources available")]
    #[diagnostic(
        code(am::no_resources),
        help("Transport queues are exhausted. Call progress and retry.")
    )]
    NoResources,

    #[error("Out of memory: {0}")]
    #[diagnostic(
        code(am::no_memory),
        help("The request pool is exhausted. Drive outstanding requests to completion.")
    )]
    NoMemory(String),

    #[error("Transport error: {0}")]
    #[diagnostic(code(am::transport), help("The transport rejected the operation."))]
    Transport(String),

    #[error("Async dispatch error: {0}")]
    #[diagnostic(code(am::async_dispatch))]
    Async(String),

    #[error("Internal error: {0}")]
    #[diagnostic(
        code(am::internal_error),
        help("An unexpected internal error occurred. Please report this issue.")
    )]
    Internal(String),
}

impl AmError {
    /// Whether the error is transient and the operation may be retried
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, AmError::NoResources)
    }

    /// Short status name, as used in request trace output
    pub fn status_name(&self) -> &'static str {
        match self {
            AmError::InvalidParameter(_) => "invalid parameter",
            AmError::NotImplemented(_) => "not implemented",
            AmError::NoResources => "no resources",
            AmError::NoMemory(_) => "out of memory",
            AmError::Transport(_) => "transport error",
            AmError::Async(_) => "async dispatch error",
            AmError::Internal(_) => "internal error",
        }
    }
}

impl From<AsyncError> for AmError {
    fn from(err: AsyncError) -> Self {
        match err {
            AsyncError::InvalidParameter(msg) => AmError::InvalidParameter(msg),
            other => AmError::Async(other.to_string()),
        }
    }
}

/// Render a status the way request traces print it
pub fn status_string(status: &AmResult<()>) -> &'static str {
    match status {
        Ok(()) => "Success",
        Err(e) => e.status_name(),
    }
}

/// Result type for active-message operations
pub type AmResult<T> = std::result::Result<T, AmError>;
