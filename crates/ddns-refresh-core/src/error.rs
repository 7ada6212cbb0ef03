//! Error types for the update orchestrator
//!
//! This module defines all error types used throughout the crate, and the
//! [`FailureKind`] taxonomy the update client uses to decide whether a
//! failed attempt is worth retrying.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Longest response body excerpt carried in an error message
const BODY_EXCERPT_LEN: usize = 200;

/// Core error type for the update orchestrator
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (invalid endpoint, duplicate hostname, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The attempt did not complete within the endpoint timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure (refused, reset, DNS resolution, ...)
    #[error("network error: {0}")]
    Network(String),

    /// The update endpoint answered with a non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Excerpt of the response body
        body: String,
    },

    /// The response body could not be understood
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The provider answered with a well-formed failure report
    #[error("{0}")]
    Application(String),

    /// A report sink failed to consume a report
    #[error("Report sink error ({sink}): {message}")]
    Sink {
        /// Sink name
        sink: String,
        /// Error message
        message: String,
    },

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout(after)
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an HTTP status error, keeping only an excerpt of the body
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: excerpt(body),
        }
    }

    /// Create a malformed response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create an application-level failure
    pub fn application(msg: impl Into<String>) -> Self {
        Self::Application(msg.into())
    }

    /// Create a sink error
    pub fn sink(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sink {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Classify this error for the retry policy
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Timeout(_) | Error::Network(_) => FailureKind::Transient,
            Error::Status { status, .. } if (500..=599).contains(status) => FailureKind::Transient,
            Error::Status { .. } => FailureKind::Permanent,
            Error::MalformedResponse(_) | Error::Json(_) => FailureKind::Malformed,
            Error::Application(_) => FailureKind::Application,
            Error::Config(_) | Error::Sink { .. } | Error::Io(_) | Error::Other(_) => {
                FailureKind::Permanent
            }
        }
    }

    /// Whether another attempt may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        self.failure_kind() == FailureKind::Transient
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Why an update attempt failed
///
/// Only [`FailureKind::Transient`] failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Timeout, connection failure or 5xx status
    Transient,
    /// 4xx status (bad token, malformed request)
    Permanent,
    /// Response body could not be parsed
    Malformed,
    /// Provider reported a failure in a well-formed response
    Application,
    /// The run was cancelled before this endpoint completed
    Cancelled,
    /// The worker running the update did not complete
    Internal,
}

impl FailureKind {
    /// Short lowercase label, used by sinks
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::Permanent => "permanent",
            FailureKind::Malformed => "malformed",
            FailureKind::Application => "application",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= BODY_EXCERPT_LEN {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(BODY_EXCERPT_LEN).collect();
    cut.push_str("...");
    cut
}
