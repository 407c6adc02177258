//! JSON codec for the KotaDB wire format.
//!
//! Decoding runs in two steps: serde checks that every required field is
//! present with the right type (unknown fields are ignored), then [`Validate`]
//! checks the invariants a well-behaved server guarantees for that shape.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{
    Document, DocumentList, ErrorResponse, HealthStatus, InsertResponse, QueryResult,
    SearchResult, Stats,
};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed {shape} response: {source}")]
    Malformed {
        shape: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {shape} response: {reason}")]
    Invalid { shape: &'static str, reason: String },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CodecError {
    fn invalid(shape: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            shape,
            reason: reason.into(),
        }
    }
}

/// Shape-level checks applied after a successful deserialization
pub trait Validate {
    const SHAPE: &'static str;

    fn validate(&self) -> Result<(), CodecError> {
        Ok(())
    }
}

pub fn decode<T: DeserializeOwned + Validate>(body: &[u8]) -> Result<T, CodecError> {
    let value: T = serde_json::from_slice(body).map_err(|source| CodecError::Malformed {
        shape: T::SHAPE,
        source,
    })?;
    value.validate()?;
    Ok(value)
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(CodecError::Encode)
}

/// Best-effort human message from an error response body
pub fn error_message(body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorResponse>(body) {
        if let Some(message) = parsed.message.or(parsed.error) {
            return message;
        }
    }
    String::from_utf8_lossy(body).trim().to_string()
}

impl Validate for Document {
    const SHAPE: &'static str = "document";

    fn validate(&self) -> Result<(), CodecError> {
        if self.id.is_empty() {
            return Err(CodecError::invalid(Self::SHAPE, "empty id"));
        }
        if !self.path.starts_with('/') {
            return Err(CodecError::invalid(
                Self::SHAPE,
                format!("document {} path {:?} is not rooted at '/'", self.id, self.path),
            ));
        }
        if self.updated_at < self.created_at {
            return Err(CodecError::invalid(
                Self::SHAPE,
                format!("document {} updated_at precedes created_at", self.id),
            ));
        }
        Ok(())
    }
}

impl Validate for SearchResult {
    const SHAPE: &'static str = "search result";

    fn validate(&self) -> Result<(), CodecError> {
        if !self.score.is_finite() {
            return Err(CodecError::invalid(Self::SHAPE, "score is not finite"));
        }
        self.document.validate()
    }
}

impl Validate for QueryResult {
    const SHAPE: &'static str = "query result";

    fn validate(&self) -> Result<(), CodecError> {
        if self.total_count < self.results.len() as u64 {
            return Err(CodecError::invalid(
                Self::SHAPE,
                format!(
                    "total_count {} is smaller than the {} results returned",
                    self.total_count,
                    self.results.len()
                ),
            ));
        }
        if !self.query_time_ms.is_finite() || self.query_time_ms < 0.0 {
            return Err(CodecError::invalid(
                Self::SHAPE,
                format!("query_time_ms {} is negative or not finite", self.query_time_ms),
            ));
        }
        for result in &self.results {
            result.validate()?;
        }
        if self.results.windows(2).any(|w| w[0].score < w[1].score) {
            return Err(CodecError::invalid(
                Self::SHAPE,
                "results are not ordered by descending score",
            ));
        }
        Ok(())
    }
}

impl QueryResult {
    /// Reject a page holding more results than the caller asked for
    pub fn check_limit(&self, limit: Option<u32>) -> Result<(), CodecError> {
        match limit {
            Some(limit) if self.results.len() as u64 > u64::from(limit) => {
                Err(CodecError::invalid(
                    Self::SHAPE,
                    format!("{} results returned for limit {}", self.results.len(), limit),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl Validate for HealthStatus {
    const SHAPE: &'static str = "health";

    fn validate(&self) -> Result<(), CodecError> {
        if self.status.trim().is_empty() {
            return Err(CodecError::invalid(Self::SHAPE, "empty status"));
        }
        Ok(())
    }
}

impl Validate for Stats {
    const SHAPE: &'static str = "stats";
}

impl Validate for InsertResponse {
    const SHAPE: &'static str = "insert";

    fn validate(&self) -> Result<(), CodecError> {
        if self.id.is_empty() {
            return Err(CodecError::invalid(Self::SHAPE, "empty id"));
        }
        Ok(())
    }
}

impl Validate for DocumentList {
    const SHAPE: &'static str = "document list";

    fn validate(&self) -> Result<(), CodecError> {
        let docs = match self {
            DocumentList::Bare(docs) | DocumentList::Wrapped { documents: docs } => docs,
        };
        docs.iter().try_for_each(Validate::validate)
    }
}
