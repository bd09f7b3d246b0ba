//! Example: pet store controllers
//!
//! Serves `GET /pets` and `POST /pets` through gravity-axum controllers with
//! error and fault boundaries.
//!
//! Run with: cargo run --bin pet-store

use axum::Router;
use axum::routing::get;
use gravity_axum_examples::pets::{self, Store};

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gravity_axum_examples::init_tracing();

    let app = Router::new()
        .merge(pets::router(Store::default()))
        .route("/health", get(health));

    let addr = gravity_axum_examples::server_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    println!("=== Example: Pet Store ===");
    println!("Server listening on http://{}", addr);
    println!();
    println!("Test with:");
    println!("  curl -X POST 'http://localhost:3000/pets' \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"name\": \"rex\", \"tag\": \"dog\"}}'");
    println!("  curl 'http://localhost:3000/pets?tag=dog&limit=10'");

    axum::serve(listener, app).await?;
    Ok(())
}
