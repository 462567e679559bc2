//! Wildlife Sightings: Shuttle entrypoint.
//! Boots the datastore and hands a lifecycle-aware service to the Shuttle runtime.
//!
//! For a plain process without Shuttle, use the `serve` binary.

use std::net::SocketAddr;

use wildlife_sightings::{logging, server, AppContext};

struct SightingService {
    ctx: AppContext,
}

#[async_trait::async_trait]
impl shuttle_runtime::Service for SightingService {
    async fn bind(self, addr: SocketAddr) -> Result<(), shuttle_runtime::Error> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("binding {addr}: {e}"))?;
        server::run(self.ctx, listener, server::shutdown_signal()).await?;
        Ok(())
    }
}

#[shuttle_runtime::main]
async fn shuttle_main() -> Result<SightingService, shuttle_runtime::Error> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    // Store connectivity failure is fatal: the runtime reports the error and exits.
    let ctx = wildlife_sightings::bootstrap().await?;
    Ok(SightingService { ctx })
}
