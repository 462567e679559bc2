//! Standalone entrypoint: binds `HOST:PORT` from settings and serves until
//! Ctrl-C or SIGTERM.

use anyhow::Context;
use wildlife_sightings::{logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let ctx = wildlife_sightings::bootstrap()
        .await
        .context("startup failed")?;

    let addr = ctx.settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    server::run(ctx, listener, server::shutdown_signal()).await
}
