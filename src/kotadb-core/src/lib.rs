//! KotaDB Core Types
//!
//! This crate provides the wire-level building blocks shared by KotaDB clients:
//! - Typed entities decoded from server responses (documents, search results, stats)
//! - Request payloads for inserts, partial updates and searches
//! - The JSON codec with response validation
//! - Client-side input validation

pub mod codec;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use codec::{decode, encode, CodecError, Validate};
pub use models::*;
pub use validation::ValidationError;
