//! KotaDB Client Library
//!
//! Async HTTP client for KotaDB REST API servers.
//!
//! ```no_run
//! use kotadb_rs::{Client, NewDocument, SearchOptions};
//!
//! # async fn run() -> kotadb_rs::Result<()> {
//! let db = Client::new("kotadb://localhost:8080/notes")?;
//! let doc = NewDocument::new("/rust/ownership.md", "Ownership", "Each value has one owner.")
//!     .tag("rust");
//! let id = db.insert(&doc).await?;
//! let hits = db.query("owner", &SearchOptions::default().limit(5)).await?;
//! println!("{} hits, first: {:?}", hits.total_count, hits.documents().next().map(|d| &d.id));
//! db.delete(&id).await?;
//! # Ok(())
//! # }
//! ```

mod cancel;
mod client;
pub mod config;
mod error;
pub mod transport;

pub use cancel::CancelHandle;
pub use client::{Client, IdempotencyKey};
pub use config::{ClientOptions, ConfigProvider, ConnectionConfig, ConnectionString, EnvProvider};
pub use error::{ErrorKind, KotaDbError, Result, TransportFailure};
pub use kotadb_core::{
    CodecError, ConnectionStats, Document, DocumentUpdate, HealthStatus, HybridSearchOptions,
    ListOptions, Metadata, NewDocument, PerformanceStats, QueryResult, ResourceStats,
    SearchOptions, SearchResult, SemanticSearchOptions, Stats, ValidationError,
};
