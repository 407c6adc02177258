//! In-process mock KotaDB server for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use kotadb_rs::{
    Client, ClientOptions, Document, DocumentUpdate, NewDocument, QueryResult, SearchResult,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Default)]
pub struct MockDb {
    docs: Mutex<Vec<Document>>,
    idempotent_inserts: Mutex<HashMap<String, String>>,
    pub requests: AtomicUsize,
}

impl MockDb {
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn mock_router(db: Arc<MockDb>) -> Router {
    Router::new()
        .route("/documents", get(list_documents).post(create_document))
        .route(
            "/documents/{id}",
            get(get_document).patch(update_document).delete(delete_document),
        )
        .route("/search", get(text_search))
        .route("/search/semantic", get(semantic_search))
        .route("/search/hybrid", get(hybrid_search))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(db)
}

/// Serve `router` on an ephemeral localhost port
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub async fn spawn_mock() -> (Arc<MockDb>, SocketAddr) {
    let db = Arc::new(MockDb::default());
    let addr = spawn(mock_router(db.clone())).await;
    (db, addr)
}

/// Client that ignores the process environment and backs off quickly
pub fn client_for(url: impl Into<String>, options: ClientOptions) -> Client {
    let options = ClientOptions {
        url: Some(url.into()),
        retry_base_delay: options.retry_base_delay.or(Some(Duration::from_millis(1))),
        ..options
    };
    Client::with_provider(options, &HashMap::<String, String>::new()).unwrap()
}

pub fn http_client(addr: SocketAddr) -> Client {
    client_for(format!("http://{addr}"), ClientOptions::new())
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": status.canonical_reason(), "message": message}))).into_response()
}

async fn create_document(
    State(db): State<Arc<MockDb>>,
    headers: HeaderMap,
    Json(req): Json<NewDocument>,
) -> Response {
    db.hit();
    let key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(key) = &key {
        if let Some(id) = db.idempotent_inserts.lock().unwrap().get(key) {
            return (StatusCode::OK, Json(json!({"id": id}))).into_response();
        }
    }

    let mut docs = db.docs.lock().unwrap();
    if docs.iter().any(|d| d.path == req.path) {
        return error(StatusCode::CONFLICT, "a document with this path already exists");
    }

    let now = Utc::now();
    let doc = Document {
        id: uuid::Uuid::new_v4().to_string(),
        size: req.content.len() as u64,
        path: req.path,
        title: req.title,
        content: req.content,
        tags: req.tags,
        created_at: now,
        updated_at: now,
        metadata: req.metadata,
    };
    if let Some(key) = key {
        db.idempotent_inserts
            .lock()
            .unwrap()
            .insert(key, doc.id.clone());
    }
    docs.push(doc.clone());
    (StatusCode::CREATED, Json(doc)).into_response()
}

async fn get_document(State(db): State<Arc<MockDb>>, Path(id): Path<String>) -> Response {
    db.hit();
    match db.docs.lock().unwrap().iter().find(|d| d.id == id) {
        Some(doc) => Json(doc.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "Document not found"),
    }
}

async fn update_document(
    State(db): State<Arc<MockDb>>,
    Path(id): Path<String>,
    Json(update): Json<DocumentUpdate>,
) -> Response {
    db.hit();
    let mut docs = db.docs.lock().unwrap();
    let Some(doc) = docs.iter_mut().find(|d| d.id == id) else {
        return error(StatusCode::NOT_FOUND, "Document not found");
    };

    if let Some(path) = update.path {
        doc.path = path;
    }
    if let Some(title) = update.title {
        doc.title = title;
    }
    if let Some(content) = update.content {
        doc.size = content.len() as u64;
        doc.content = content;
    }
    if let Some(tags) = update.tags {
        doc.tags = tags;
    }
    if let Some(metadata) = update.metadata {
        doc.metadata = Some(metadata);
    }
    doc.updated_at = Utc::now().max(doc.created_at + chrono::Duration::milliseconds(1));
    Json(doc.clone()).into_response()
}

async fn delete_document(State(db): State<Arc<MockDb>>, Path(id): Path<String>) -> Response {
    db.hit();
    let mut docs = db.docs.lock().unwrap();
    match docs.iter().position(|d| d.id == id) {
        Some(index) => {
            docs.remove(index);
            StatusCode::NO_CONTENT.into_response()
        }
        None => error(StatusCode::NOT_FOUND, "Document not found"),
    }
}

#[derive(Debug, Deserialize)]
struct PageParams {
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_documents(State(db): State<Arc<MockDb>>, Query(page): Query<PageParams>) -> Response {
    db.hit();
    let docs: Vec<Document> = db
        .docs
        .lock()
        .unwrap()
        .iter()
        .skip(page.offset.unwrap_or(0))
        .take(page.limit.unwrap_or(50))
        .cloned()
        .collect();
    Json(docs).into_response()
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
    limit: Option<usize>,
    offset: Option<usize>,
    tags: Option<String>,
    path: Option<String>,
    threshold: Option<f64>,
    semantic_weight: Option<f64>,
}

fn occurrences(doc: &Document, needle: &str) -> usize {
    let haystack = format!("{} {}", doc.title, doc.content).to_lowercase();
    haystack.matches(&needle.to_lowercase()).count()
}

/// `*` wildcards at either end; anything else is an exact match
fn path_matches(path: &str, pattern: &str) -> bool {
    let needle = pattern.trim_matches('*');
    match (pattern.starts_with('*'), pattern.ends_with('*')) {
        _ if !pattern.contains('*') => path == pattern,
        (true, true) => path.contains(needle),
        (true, false) => path.ends_with(needle),
        (false, true) => path.starts_with(needle),
        (false, false) => path.contains(&pattern.replace('*', "")),
    }
}

fn ranked(db: &MockDb, params: &SearchParams, score: impl Fn(usize) -> f64) -> QueryResult {
    let tags: Vec<&str> = params
        .tags
        .as_deref()
        .map(|t| t.split(',').collect())
        .unwrap_or_default();

    let mut results: Vec<SearchResult> = db
        .docs
        .lock()
        .unwrap()
        .iter()
        .filter(|d| tags.iter().all(|t| d.tags.iter().any(|dt| dt == t)))
        .filter(|d| params.path.as_deref().map_or(true, |p| path_matches(&d.path, p)))
        .filter_map(|d| {
            let hits = occurrences(d, &params.q);
            (hits > 0).then(|| SearchResult {
                document: d.clone(),
                score: score(hits),
                content_preview: d.content.chars().take(40).collect(),
            })
        })
        .filter(|r| params.threshold.map_or(true, |t| r.score >= t))
        .collect();
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());

    let total_count = results.len() as u64;
    let results = results
        .into_iter()
        .skip(params.offset.unwrap_or(0))
        .take(params.limit.unwrap_or(10))
        .collect();
    QueryResult {
        results,
        total_count,
        query_time_ms: 0.25,
    }
}

fn semantic_score(hits: usize) -> f64 {
    1.0 - 1.0 / (1.0 + hits as f64)
}

async fn text_search(
    State(db): State<Arc<MockDb>>,
    Query(params): Query<SearchParams>,
) -> Response {
    db.hit();
    Json(ranked(&db, &params, |hits| hits as f64)).into_response()
}

async fn semantic_search(
    State(db): State<Arc<MockDb>>,
    Query(params): Query<SearchParams>,
) -> Response {
    db.hit();
    Json(ranked(&db, &params, semantic_score)).into_response()
}

async fn hybrid_search(
    State(db): State<Arc<MockDb>>,
    Query(params): Query<SearchParams>,
) -> Response {
    db.hit();
    let weight = params.semantic_weight.unwrap_or(0.5);
    Json(ranked(&db, &params, |hits| {
        weight * semantic_score(hits) + (1.0 - weight) * hits as f64
    }))
    .into_response()
}

async fn health(State(db): State<Arc<MockDb>>) -> Response {
    db.hit();
    Json(json!({"status": "healthy", "version": "0.5.0", "uptime_seconds": 42})).into_response()
}

async fn stats(State(db): State<Arc<MockDb>>) -> Response {
    db.hit();
    let docs = db.docs.lock().unwrap();
    Json(json!({
        "document_count": docs.len(),
        "total_size_bytes": docs.iter().map(|d| d.size).sum::<u64>(),
        "connections": {
            "active_connections": 1,
            "total_connections": 3,
            "rejected_connections": 0,
            "rate_limited_requests": 0
        }
    }))
    .into_response()
}
