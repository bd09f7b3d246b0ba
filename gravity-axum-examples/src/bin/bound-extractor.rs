//! Example: binding in plain axum handlers
//!
//! `Bound<T>` runs the same binder a controller uses, without the dispatch
//! stages around it. Decode failures reject with the JSON error body.
//!
//! Run with: cargo run --bin bound-extractor

use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use gravity_axum::time::OffsetDateTime;
use gravity_axum::{BindRequest, Bound};
use serde::Serialize;

/// `GET /search?q=rex&since=2024-01-01T00:00:00Z&within=90s&fields=name,tag`
#[derive(Debug, Default, BindRequest)]
#[bind(ignore_body)]
struct Search {
    #[bind(query = "q")]
    q: String,
    #[bind(query = "since")]
    since: Option<OffsetDateTime>,
    #[bind(query = "within")]
    within: Option<Duration>,
    #[bind(query = "fields")]
    fields: Vec<String>,
}

#[derive(Serialize)]
struct Echo {
    q: String,
    since: Option<String>,
    within_ms: Option<u128>,
    fields: Vec<String>,
}

async fn search(Bound(search): Bound<Search>) -> Json<Echo> {
    Json(Echo {
        q: search.q,
        since: search.since.map(|ts| ts.to_string()),
        within_ms: search.within.map(|d| d.as_millis()),
        fields: search.fields,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gravity_axum_examples::init_tracing();

    let app = Router::new().route("/search", get(search));

    let addr = gravity_axum_examples::server_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    println!("=== Example: Bound extractor ===");
    println!("Server listening on http://{}", addr);
    println!();
    println!("Test with:");
    println!("  curl 'http://localhost:3000/search?q=rex&within=1m30s&fields=name,tag'");
    println!("  curl 'http://localhost:3000/search?within=-5s'");

    axum::serve(listener, app).await?;
    Ok(())
}
