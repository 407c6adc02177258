//! Error types for the KotaDB client.
//!
//! Every public operation returns [`KotaDbError`]. It is a closed enum so
//! callers can match on the variant (or on [`ErrorKind`]) instead of parsing
//! messages. This module also holds the classifier that turns one transport
//! attempt into success, a retryable failure or a terminal error.

use std::time::Duration;

use kotadb_core::{codec, CodecError, ValidationError};
use reqwest::StatusCode;

use crate::transport::Response;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, KotaDbError>;

/// Discriminant of [`KotaDbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Validation,
    NotFound,
    Api,
    Connection,
    Timeout,
    Decoding,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum KotaDbError {
    /// Invalid URL, connection string, header or option. Raised at construction,
    /// or before sending when a request cannot be assembled from them.
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Rejected locally before any request was sent.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// HTTP 404.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Any other non-success status the server will not change its mind about.
    #[error("Server error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Network failure or 5xx that survived every allowed attempt.
    #[error("Connection failed after {attempts} attempt(s): {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: TransportFailure,
    },

    /// The last allowed attempt did not complete within the timeout.
    #[error("Request timed out after {timeout:?} ({attempts} attempt(s))")]
    Timeout { timeout: Duration, attempts: u32 },

    /// A success response whose body did not match the expected shape.
    #[error("Decoding error: {0}")]
    Decoding(#[from] CodecError),

    #[error("Request cancelled")]
    Cancelled,
}

/// The underlying cause of a failed attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportFailure {
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),
}

impl KotaDbError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Api { .. } => ErrorKind::Api,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Decoding(_) => ErrorKind::Decoding,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// HTTP status behind the error, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(StatusCode::NOT_FOUND.as_u16()),
            Self::Api { status, .. } => Some(*status),
            Self::Connection {
                source: TransportFailure::Status { status, .. },
                ..
            } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Outcome of a single transport attempt.
#[derive(Debug)]
pub(crate) enum Classified {
    Success(Response),
    Retryable(TransportFailure),
    Terminal(KotaDbError),
}

pub(crate) fn classify_response(response: Response) -> Classified {
    let status = response.status;
    if status.is_success() {
        return Classified::Success(response);
    }

    let message = codec::error_message(&response.body);
    if status == StatusCode::NOT_FOUND {
        Classified::Terminal(KotaDbError::NotFound { message })
    } else if status.is_server_error() {
        Classified::Retryable(TransportFailure::Status {
            status: status.as_u16(),
            message,
        })
    } else {
        Classified::Terminal(KotaDbError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

pub(crate) fn classify_network(err: reqwest::Error) -> Classified {
    if err.is_timeout() {
        // reqwest's own timer; ours normally fires first
        return Classified::Retryable(TransportFailure::TimedOut(Duration::ZERO));
    }
    if err.is_builder() {
        // nothing reached the network
        return Classified::Terminal(KotaDbError::configuration(format!(
            "failed to build request: {err}"
        )));
    }
    Classified::Retryable(TransportFailure::Network(err))
}

/// Final error once no attempts remain.
pub(crate) fn exhausted(last: TransportFailure, attempts: u32, timeout: Duration) -> KotaDbError {
    match last {
        TransportFailure::TimedOut(_) => KotaDbError::Timeout { timeout, attempts },
        source => KotaDbError::Connection { attempts, source },
    }
}
