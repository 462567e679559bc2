// src/server.rs
//! Process lifecycle: serve, then stop the sweeper and close the store.

use std::future::Future;

use anyhow::Context;
use tokio::net::TcpListener;

use crate::api;
use crate::context::AppContext;
use crate::sweeper::{Sweeper, SweeperCfg};

/// Runs the HTTP server and the expiry sweeper until `shutdown` resolves.
///
/// On shutdown the listener stops accepting, in-flight requests drain, the
/// sweeper finishes its current cycle, and the store is closed last.
pub async fn run<F>(ctx: AppContext, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sweeper = Sweeper::spawn(
        ctx.store.clone(),
        SweeperCfg {
            interval_secs: ctx.settings.sweep_interval_secs,
        },
    );

    let addr = listener.local_addr().ok();
    tracing::info!(addr = ?addr, "listening");

    let served = axum::serve(listener, api::router(ctx.clone()))
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server");

    tracing::info!("http server stopped; shutting down background tasks");
    sweeper.shutdown().await;
    ctx.store.close().await.context("closing datastore")?;
    served
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("ctrl-c received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
}
