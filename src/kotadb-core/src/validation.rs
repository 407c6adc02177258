//! Client-side input checks run before a request leaves the process.

use crate::models::{DocumentUpdate, HybridSearchOptions, NewDocument, SemanticSearchOptions};

/// Longest idempotency key accepted
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("title must not be blank")]
    EmptyTitle,

    #[error("tags must not be blank")]
    EmptyTag,

    #[error("document id must not be empty")]
    EmptyId,

    #[error("query text must not be blank")]
    EmptyQuery,

    #[error("update must set at least one field")]
    EmptyUpdate,

    #[error("semantic weight {0} is outside [0, 1]")]
    WeightOutOfRange(f32),

    #[error("similarity threshold {0} is not a finite number")]
    InvalidThreshold(f32),

    #[error("invalid idempotency key: {reason}")]
    InvalidIdempotencyKey { reason: &'static str },
}

pub fn validate_path(path: &str) -> Result<(), ValidationError> {
    let invalid = |reason| ValidationError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(invalid("path is empty"));
    }
    if !path.starts_with('/') {
        return Err(invalid("path must start with '/'"));
    }
    if path.contains('\0') {
        return Err(invalid("path contains a null byte"));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(invalid("path must not contain '..'"));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(())
}

pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.iter().any(|t| t.trim().is_empty()) {
        return Err(ValidationError::EmptyTag);
    }
    Ok(())
}

pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyId);
    }
    Ok(())
}

pub fn validate_query(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyQuery);
    }
    Ok(())
}

/// Keys travel in a header, so only visible ASCII is allowed
pub fn validate_idempotency_key(key: &str) -> Result<(), ValidationError> {
    let invalid = |reason| ValidationError::InvalidIdempotencyKey { reason };

    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(invalid("key is longer than 255 bytes"));
    }
    if !key.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(invalid("key must be visible ASCII without whitespace"));
    }
    Ok(())
}

impl NewDocument {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_path(&self.path)?;
        validate_title(&self.title)?;
        validate_tags(&self.tags)
    }
}

impl DocumentUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyUpdate);
        }
        if let Some(path) = &self.path {
            validate_path(path)?;
        }
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(tags) = &self.tags {
            validate_tags(tags)?;
        }
        Ok(())
    }
}

impl HybridSearchOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.semantic_weight {
            Some(w) if !(0.0..=1.0).contains(&w) => Err(ValidationError::WeightOutOfRange(w)),
            _ => Ok(()),
        }
    }
}

impl SemanticSearchOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.threshold {
            Some(t) if !t.is_finite() => Err(ValidationError::InvalidThreshold(t)),
            _ => Ok(()),
        }
    }
}
