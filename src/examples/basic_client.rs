//! Basic Client Example
//!
//! Walks a document through insert, search, update and delete against a
//! running KotaDB server.
//!
//! Run with: KOTADB_URL=kotadb://localhost:8080/demo cargo run --example basic_client

use std::time::Duration;

use kotadb_rs::{
    CancelHandle, Client, ClientOptions, DocumentUpdate, HybridSearchOptions, IdempotencyKey,
    ListOptions, NewDocument, SearchOptions,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kotadb_rs=debug"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .try_init()?;

    // URL comes from KOTADB_URL; timeout and retries are set here
    let db = Client::with_options(
        ClientOptions::new()
            .timeout(Duration::from_secs(10))
            .retries(5),
    )?;
    println!("Connected to {}\n", db.config().base_url);

    let health = db.health().await?;
    println!("🩺 Server status: {}", health.status);

    let doc = NewDocument::new(
        "/knowledge/rust-patterns.md",
        "Rust Design Patterns",
        "Builders, newtypes and RAII guards keep invariants in the type system.",
    )
    .tags(["rust", "patterns"])
    .metadata("author", "demo");

    // the key makes the insert safe to retry
    let id = db
        .insert_with_idempotency_key(&doc, IdempotencyKey::generate())
        .await?;
    println!("📝 Inserted document: {}", id);

    let results = db
        .query("patterns", &SearchOptions::default().limit(5))
        .await?;
    println!(
        "🔍 Text search: {} of {} results in {:.2} ms",
        results.len(),
        results.total_count,
        results.query_time_ms
    );
    for (i, hit) in results.results.iter().enumerate() {
        println!("   {}. {} (score: {:.4})", i + 1, hit.document.title, hit.score);
    }

    let hybrid = db
        .hybrid_search(
            "type-level invariants",
            &HybridSearchOptions::default().semantic_weight(0.7).limit(3),
        )
        .await?;
    println!("🔀 Hybrid search: {} results", hybrid.len());

    let updated = db
        .update(&id, &DocumentUpdate::new().title("Rust Design Patterns (revised)"))
        .await?;
    println!("✏️  Updated title: {}", updated.title);

    let page = db.list_all(&ListOptions::default().limit(10)).await?;
    println!("📚 First page holds {} documents", page.len());

    // a cancelled handle aborts calls made through its view
    let cancel = CancelHandle::new();
    cancel.cancel();
    if let Err(e) = db.with_cancel(cancel).stats().await {
        println!("⏹  Cancelled call: {}", e);
    }

    let stats = db.stats().await?;
    println!("📊 Documents stored: {:?}", stats.document_count);

    db.delete(&id).await?;
    match db.get(&id).await {
        Err(e) if e.is_not_found() => println!("🗑  Deleted {}", id),
        other => println!("unexpected result after delete: {:?}", other.map(|d| d.id)),
    }

    Ok(())
}
