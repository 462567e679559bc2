// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod media;
pub mod metrics;
pub mod server;
pub mod sighting;
pub mod store;
pub mod sweeper;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::context::AppContext;
pub use crate::error::SightingError;
pub use crate::sighting::{Animal, ExpiryPolicy, Location, Sighting, SightingDraft};
pub use crate::store::SightingStore;

use config::Settings;

/// Loads settings, then connects the datastore.
///
/// Shared by both entrypoints, which load `.env` before tracing starts. An
/// unreachable datastore is returned as an error so the process can exit
/// instead of serving without a store.
pub async fn bootstrap() -> anyhow::Result<AppContext> {
    let settings = Settings::load_default()?;
    AppContext::bootstrap(settings).await
}
