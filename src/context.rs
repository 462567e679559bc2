// src/context.rs
//! Process-scoped context handed to request handlers and the sweeper.

use std::sync::Arc;

use anyhow::Context as _;

use crate::config::Settings;
use crate::media::{self, DisabledMediaHost, MediaHost};
use crate::metrics::Metrics;
use crate::sighting::ExpiryPolicy;
use crate::store::{self, SightingStore};

#[derive(Clone)]
pub struct AppContext {
    pub store: SightingStore,
    pub media: Arc<dyn MediaHost>,
    pub settings: Arc<Settings>,
    /// Prometheus handle; `/metrics` is only routed when present.
    pub metrics: Option<Metrics>,
}

impl AppContext {
    pub fn new(store: SightingStore, media: Arc<dyn MediaHost>, settings: Settings) -> Self {
        Self {
            store,
            media,
            settings: Arc::new(settings),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Context over a fresh in-memory store with default settings and no
    /// media host. Handy for tests and local tooling.
    pub fn in_memory() -> Self {
        Self::new(
            SightingStore::in_memory(),
            Arc::new(DisabledMediaHost),
            Settings::default(),
        )
    }

    /// Connects the datastore, builds the media client and installs the
    /// Prometheus recorder.
    ///
    /// A datastore that cannot be reached is an error here; the caller is
    /// expected to exit rather than serve without a store.
    pub async fn bootstrap(settings: Settings) -> anyhow::Result<Self> {
        let backend = store::connect(&settings.database_url, settings.db_max_connections)
            .await
            .with_context(|| format!("connecting datastore '{}'", redact(&settings.database_url)))?;

        let store = SightingStore::new(backend, ExpiryPolicy::from_secs(settings.expiry_secs))
            .with_max_list_limit(settings.max_list_limit);
        let media = media::from_settings(&settings.media)?;
        let metrics = match Metrics::init() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(error = %e, "metrics disabled");
                None
            }
        };

        tracing::info!(
            backend = store.backend_name(),
            expiry_secs = settings.expiry_secs,
            sweep_interval_secs = settings.sweep_interval_secs,
            media_enabled = settings.media.upload_url.is_some(),
            "context ready"
        );
        let mut ctx = Self::new(store, media, settings);
        ctx.metrics = metrics;
        Ok(ctx)
    }
}

/// Strips credentials (`user:pass@`) from a connection string for logging.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
