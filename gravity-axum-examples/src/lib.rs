use std::net::{AddrParseError, SocketAddr};

pub mod pets;

/// Returns the server address from the PORT env var, defaulting to 3000.
///
/// # Example
///
/// ```ignore
/// let addr = gravity_axum_examples::server_addr()?;
/// let listener = tokio::net::TcpListener::bind(addr).await?;
/// ```
pub fn server_addr() -> Result<SocketAddr, AddrParseError> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    format!("0.0.0.0:{port}").parse()
}

/// Install a `tracing` subscriber honoring `RUST_LOG`, defaulting to debug
/// output for the dispatch layer.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gravity_axum=debug".into()),
        )
        .init();
}
