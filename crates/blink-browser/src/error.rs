//! Load and host errors.

use blink_html::ParseError;
use blink_layout::LayoutError;
use serde::Serialize;
use thiserror::Error;

/// Why a load did not complete.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum LoadError {
    /// The markup could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
    /// The request could not be fetched.
    #[error("network error: {0}")]
    Network(String),
    /// The request itself was malformed (empty URL, relative URL, method
    /// the loader does not accept).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The load ran past the configured timeout.
    #[error("load timed out after {0} ms")]
    Timeout(u64),
    /// A newer load or teardown cancelled this one.
    #[error("load cancelled")]
    Cancelled,
    /// The host could not run the load at all.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ParseError> for LoadError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<LayoutError> for LoadError {
    fn from(err: LayoutError) -> Self {
        match err {
            LayoutError::Parse { reason, .. } => Self::Parse(reason),
            LayoutError::InvalidConstraints { reason } => Self::InvalidRequest(reason),
        }
    }
}

/// Errors from host calls other than loads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// A rejected argument (unknown render mode, negative frame size).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The engines could not be started.
    #[error("engine unavailable: {0}")]
    Engine(String),
}
