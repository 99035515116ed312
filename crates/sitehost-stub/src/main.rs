//! Standalone content API stub for local development.
//!
//! ```text
//! STUB_PORT=8091 sitehost-stub
//! CONTENT_API_URL=http://localhost:8091 STORAGE_OWNER=dev STORAGE_TOKEN=x sitehost doctor
//! ```

use std::net::SocketAddr;

use sitehost_content_client::MemoryContentApi;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port: u16 = std::env::var("STUB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8091);
    let public_url = std::env::var("STUB_PUBLIC_URL")
        .unwrap_or_else(|_| format!("http://localhost:{port}"));

    let api = MemoryContentApi::new();
    api.set_download_base(public_url);
    let app = sitehost_stub::router(api);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("sitehost-stub listening on {addr}");
    axum::serve(listener, app.into_make_service()).await
}
