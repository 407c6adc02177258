use std::fmt;
use std::sync::Arc;

use kotadb_core::validation::{validate_id, validate_idempotency_key, validate_query};
use kotadb_core::{
    codec, Document, DocumentList, DocumentUpdate, HealthStatus, HybridSearchOptions,
    InsertResponse, ListOptions, NewDocument, QueryResult, SearchOptions, SemanticSearchOptions,
    Stats, Validate, ValidationError,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cancel::CancelHandle;
use crate::config::{ClientOptions, ConfigProvider, ConnectionConfig, EnvProvider};
use crate::transport::{Request, Transport};
use crate::Result;

/// Caller-supplied token that makes an insert or update safe to retry
///
/// The key is sent as a header, so it is checked when created: non-empty,
/// at most 255 bytes, visible ASCII only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> std::result::Result<Self, ValidationError> {
        let key = key.into();
        validate_idempotency_key(&key)?;
        Ok(Self(key))
    }

    /// A fresh random key (UUID v4)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = ValidationError;

    fn try_from(key: String) -> std::result::Result<Self, Self::Error> {
        Self::new(key)
    }
}

impl TryFrom<&str> for IdempotencyKey {
    type Error = ValidationError;

    fn try_from(key: &str) -> std::result::Result<Self, Self::Error> {
        Self::new(key)
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// KotaDB REST API Client
///
/// Cloning is cheap; clones share the resolved configuration and the HTTP
/// connection pool, so one client can serve concurrent tasks.
#[derive(Clone)]
pub struct Client {
    transport: Arc<Transport>,
    cancel: Option<CancelHandle>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.config().base_url.as_str())
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl Client {
    /// Create a client for an `http(s)://` URL or a `kotadb://` connection string
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_options(ClientOptions::new().url(url))
    }

    /// Create a client configured entirely from `KOTADB_URL` and friends
    pub fn from_env() -> Result<Self> {
        Self::with_options(ClientOptions::new())
    }

    pub fn with_options(options: ClientOptions) -> Result<Self> {
        Self::with_provider(options, &EnvProvider)
    }

    /// Create a client, falling back to `provider` for settings `options` leaves unset
    pub fn with_provider(options: ClientOptions, provider: &dyn ConfigProvider) -> Result<Self> {
        let config = ConnectionConfig::resolve(&options, provider)?;
        debug!(
            base_url = %config.base_url,
            timeout_ms = config.timeout.as_millis() as u64,
            max_retries = config.max_retries,
            "KotaDB client configured"
        );
        Ok(Self {
            transport: Arc::new(Transport::new(config)?),
            cancel: None,
        })
    }

    /// A view of this client whose calls abort when `cancel` fires
    pub fn with_cancel(&self, cancel: CancelHandle) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            cancel: Some(cancel),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.transport.config()
    }

    /// Insert a document and return its server-assigned id
    ///
    /// Sent once: without an idempotency key a retried insert could create a
    /// duplicate.
    pub async fn insert(&self, doc: &NewDocument) -> Result<String> {
        self.insert_inner(doc, None).await
    }

    /// Insert a document, retrying transient failures under `key`
    pub async fn insert_with_idempotency_key(
        &self,
        doc: &NewDocument,
        key: IdempotencyKey,
    ) -> Result<String> {
        self.insert_inner(doc, Some(key)).await
    }

    async fn insert_inner(&self, doc: &NewDocument, key: Option<IdempotencyKey>) -> Result<String> {
        doc.validate()?;
        let request = Request::new(Method::POST, ["documents"])
            .body(codec::encode(doc)?)
            .idempotency_key(key.map(|k| k.0));
        let created: InsertResponse = self.execute(request).await?;
        Ok(created.id)
    }

    /// Get a document by ID
    pub async fn get(&self, id: &str) -> Result<Document> {
        validate_id(id)?;
        self.execute(Request::new(Method::GET, ["documents", id])).await
    }

    /// Apply a partial update; fields left unset keep their stored values
    pub async fn update(&self, id: &str, update: &DocumentUpdate) -> Result<Document> {
        self.update_inner(id, update, None).await
    }

    pub async fn update_with_idempotency_key(
        &self,
        id: &str,
        update: &DocumentUpdate,
        key: IdempotencyKey,
    ) -> Result<Document> {
        self.update_inner(id, update, Some(key)).await
    }

    async fn update_inner(
        &self,
        id: &str,
        update: &DocumentUpdate,
        key: Option<IdempotencyKey>,
    ) -> Result<Document> {
        validate_id(id)?;
        update.validate()?;
        let request = Request::new(Method::PATCH, ["documents", id])
            .body(codec::encode(update)?)
            .idempotency_key(key.map(|k| k.0));
        self.execute(request).await
    }

    /// Delete a document by ID; a missing document is `NotFound`
    ///
    /// Deletes are retried, so a retry after a lost response may report
    /// `NotFound` for a document this call removed.
    pub async fn delete(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        self.transport
            .send(
                &Request::new(Method::DELETE, ["documents", id]),
                self.cancel.as_ref(),
            )
            .await?;
        Ok(())
    }

    /// Full-text search
    ///
    /// A response with more results than `options.limit` is a decoding error.
    pub async fn query(&self, text: &str, options: &SearchOptions) -> Result<QueryResult> {
        validate_query(text)?;
        let request = Request::new(Method::GET, ["search"])
            .query(vec![("q", text.to_string())])
            .query(options.query_pairs());
        self.search(request, options.limit).await
    }

    pub async fn semantic_search(
        &self,
        text: &str,
        options: &SemanticSearchOptions,
    ) -> Result<QueryResult> {
        validate_query(text)?;
        options.validate()?;
        let request = Request::new(Method::GET, ["search", "semantic"])
            .query(vec![("q", text.to_string())])
            .query(options.query_pairs());
        self.search(request, options.limit).await
    }

    /// Search blending text and semantic relevance by `options.semantic_weight`
    pub async fn hybrid_search(
        &self,
        text: &str,
        options: &HybridSearchOptions,
    ) -> Result<QueryResult> {
        validate_query(text)?;
        options.validate()?;
        let request = Request::new(Method::GET, ["search", "hybrid"])
            .query(vec![("q", text.to_string())])
            .query(options.query_pairs());
        self.search(request, options.limit).await
    }

    /// List documents one page at a time
    pub async fn list_all(&self, options: &ListOptions) -> Result<Vec<Document>> {
        let request = Request::new(Method::GET, ["documents"]).query(options.query_pairs());
        let list: DocumentList = self.execute(request).await?;
        Ok(list.into_documents())
    }

    /// Health check
    pub async fn health(&self) -> Result<HealthStatus> {
        self.execute(Request::new(Method::GET, ["health"])).await
    }

    pub async fn stats(&self) -> Result<Stats> {
        self.execute(Request::new(Method::GET, ["stats"])).await
    }

    async fn search(&self, request: Request, limit: Option<u32>) -> Result<QueryResult> {
        let result: QueryResult = self.execute(request).await?;
        result.check_limit(limit)?;
        Ok(result)
    }

    async fn execute<T: DeserializeOwned + Validate>(&self, request: Request) -> Result<T> {
        let response = self.transport.send(&request, self.cancel.as_ref()).await?;
        Ok(codec::decode(&response.body)?)
    }
}
