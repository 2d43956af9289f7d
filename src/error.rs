//! Unified error type.
//!
//! Classification never fails: a filename that is not a verb, entity, or
//! parameter marker is simply answered with `false` / `None`. What remains is
//! the handful of ways a registry can fail to build and a request can fail to
//! run through its lifecycle.

use std::fmt;
use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

use crate::pipeline::Stage;

/// The error type returned by solos' fallible operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A module could not be loaded for a discovered path.
    #[error("failed to resolve module `{}`: {reason}", path.display())]
    Resolution { path: PathBuf, reason: String },

    /// A hook failed and the remaining stages were skipped.
    #[error("`{stage}` failed: {source}")]
    LifecycleAbort { stage: Stage, source: HookError },

    /// `respond` is missing or finished without sending anything.
    #[error("request was not answered")]
    UnansweredRequest,

    /// `after` failed once the response had already gone out.
    #[error("`after` failed once the response was sent: {source}")]
    PostResponseFailure { source: HookError },

    #[error("invalid pattern `{pattern}`: {source}")]
    Pattern { pattern: String, source: regex::Error },

    #[error("uri parameter template `{0}` has no {{param}} placeholder")]
    Template(String),

    /// A dispatch message that no action is registered for.
    #[error("no action matches {0}")]
    Unmatched(String),

    #[error("cannot mount route `{route}`: {reason}")]
    Route { route: String, reason: String },

    #[error("discovery: {0}")]
    Discover(#[from] ignore::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a lifecycle hook, an entity export, or a CRUD call.
///
/// The pipeline treats every `HookError` the same way. The optional status is
/// only read when the boundary layer turns an aborted request into a response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HookError {
    status: Option<StatusCode>,
    message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into() }
    }

    /// A failure the boundary should answer with `status`.
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status: Some(status), message: message.into() }
    }

    pub fn status(&self) -> Option<StatusCode> { self.status }
    pub fn message(&self) -> &str { &self.message }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{status}: {}", self.message),
            None         => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for HookError {}
