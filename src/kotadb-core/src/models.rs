use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Open metadata mapping attached to a document
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Document represents a stored document as returned by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub path: String,
    pub title: String,
    #[serde(deserialize_with = "content::deserialize")]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp", alias = "modified_at")]
    pub updated_at: DateTime<Utc>,
    #[serde(alias = "size_bytes")]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// SearchResult pairs a matching document with its relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: Document,
    pub score: f64,
    #[serde(default)]
    pub content_preview: String,
}

/// QueryResult is the response of every search mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub results: Vec<SearchResult>,
    pub total_count: u64,
    pub query_time_ms: f64,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Iterate over the matched documents in rank order
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.results.iter().map(|r| &r.document)
    }
}

/// HealthStatus is the response of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.to_ascii_lowercase().as_str(), "healthy" | "ok")
    }
}

/// Stats is the response of `GET /stats`
///
/// Servers report different subsets, so every section is optional. Sections
/// that are present must be complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default, alias = "total_documents", skip_serializing_if = "Option::is_none")]
    pub document_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<ConnectionStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub active_connections: u64,
    pub total_connections: u64,
    pub rejected_connections: u64,
    pub rate_limited_requests: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub avg_latency_ms: f64,
    pub total_requests: u64,
    pub requests_per_second: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceStats {
    pub memory_usage_bytes: u64,
    pub memory_usage_mb: f64,
    pub cpu_usage_percent: f64,
    pub system_healthy: bool,
}

/// NewDocument is the request body of `POST /documents`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub path: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl NewDocument {
    pub fn new(
        path: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            metadata: None,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Add a single metadata entry, creating the mapping on first use
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }
}

/// DocumentUpdate is the partial request body of `PATCH /documents/{id}`
///
/// Unset fields are left out of the body so the server keeps their current values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl DocumentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Append a tag to the replacement tag list
    pub fn add_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(Vec::new).push(tag.into());
        self
    }

    /// Drop a tag from the replacement tag list
    ///
    /// The server replaces the stored tags with whatever this update sends,
    /// so removing a stored tag needs the current list first; see
    /// [`keep_tags_of`](Self::keep_tags_of).
    pub fn remove_tag(mut self, tag: &str) -> Self {
        self.tags.get_or_insert_with(Vec::new).retain(|t| t != tag);
        self
    }

    /// Seed the replacement tag list with the tags `doc` holds now
    pub fn keep_tags_of(mut self, doc: &Document) -> Self {
        self.tags = Some(doc.tags.clone());
        self
    }

    /// Add a single metadata entry, creating the mapping on first use
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }

    /// Send `metadata` as the complete replacement mapping
    pub fn replace_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_none()
            && self.title.is_none()
            && self.content.is_none()
            && self.tags.is_none()
            && self.metadata.is_none()
    }
}

/// Options for full-text `query`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub tags: Vec<String>,
    /// Exact path, or a pattern with `*` wildcards such as `/knowledge/*`
    pub path: Option<String>,
}

impl SearchOptions {
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn path(mut self, pattern: impl Into<String>) -> Self {
        self.path = Some(pattern.into());
        self
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_opt(&mut pairs, "limit", self.limit);
        push_opt(&mut pairs, "offset", self.offset);
        if !self.tags.is_empty() {
            pairs.push(("tags", self.tags.join(",")));
        }
        push_opt(&mut pairs, "path", self.path.as_deref());
        pairs
    }
}

/// Options for `semantic_search`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticSearchOptions {
    pub limit: Option<u32>,
    /// Minimum similarity a result must reach
    pub threshold: Option<f32>,
}

impl SemanticSearchOptions {
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_opt(&mut pairs, "limit", self.limit);
        push_opt(&mut pairs, "threshold", self.threshold);
        pairs
    }
}

/// Options for `hybrid_search`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HybridSearchOptions {
    pub limit: Option<u32>,
    /// Share of the semantic score in the blend, in `[0, 1]`
    pub semantic_weight: Option<f32>,
}

impl HybridSearchOptions {
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn semantic_weight(mut self, weight: f32) -> Self {
        self.semantic_weight = Some(weight);
        self
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_opt(&mut pairs, "limit", self.limit);
        push_opt(&mut pairs, "semantic_weight", self.semantic_weight);
        pairs
    }
}

/// Pagination for `list_all`; the server picks the limit when unset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListOptions {
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_opt(&mut pairs, "limit", self.limit);
        push_opt(&mut pairs, "offset", self.offset);
        pairs
    }
}

fn push_opt<T: ToString>(
    pairs: &mut Vec<(&'static str, String)>,
    key: &'static str,
    value: Option<T>,
) {
    if let Some(value) = value {
        pairs.push((key, value.to_string()));
    }
}

/// InsertResponse is the part of the `POST /documents` response the client needs
#[derive(Debug, Clone, Deserialize)]
pub struct InsertResponse {
    pub id: String,
}

/// DocumentList accepts both list shapes servers return
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DocumentList {
    Bare(Vec<Document>),
    Wrapped { documents: Vec<Document> },
}

impl DocumentList {
    pub fn into_documents(self) -> Vec<Document> {
        match self {
            DocumentList::Bare(docs) | DocumentList::Wrapped { documents: docs } => docs,
        }
    }
}

/// ErrorResponse represents an API error body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// RFC 3339 strings, or integer Unix seconds as older servers send them
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(i64),
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| de::Error::custom(format!("invalid timestamp {text:?}: {e}"))),
            Raw::Seconds(secs) => DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {secs}"))),
        }
    }
}

/// Text, or the UTF-8 byte array the HTTP server uses for stored content
mod content {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Ok(text),
            Raw::Bytes(bytes) => String::from_utf8(bytes)
                .map_err(|e| de::Error::custom(format!("content is not valid UTF-8: {e}"))),
        }
    }
}
