// src/store/mod.rs
//! # Sighting Store
//! Lifecycle operations over a pluggable document backend.
//!
//! The backend only knows about documents and timestamp cutoffs; this layer
//! owns validation, the clock and the expiry window.

mod collection;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, SightingError};
use crate::sighting::{ExpiryPolicy, Sighting, SightingDraft};

pub use memory::MemoryBackend;
pub use postgres::PgBackend;

pub const DEFAULT_MAX_LIST_LIMIT: usize = 500;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Persistence seam. Each call is atomic with respect to a single document.
#[async_trait::async_trait]
pub trait SightingBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn insert(&self, sighting: Sighting) -> Result<Sighting>;

    async fn get(&self, id: Uuid) -> Result<Option<Sighting>>;

    /// Documents with `last_active_at > cutoff`, newest `created_at` first.
    async fn find_active(&self, cutoff: DateTime<Utc>, limit: Option<usize>) -> Result<Vec<Sighting>>;

    /// Sets `last_active_at` on a document newer than `cutoff`; `None` if
    /// the document is missing or already past the cutoff.
    async fn touch(&self, id: Uuid, cutoff: DateTime<Utc>, at: DateTime<Utc>) -> Result<Option<Sighting>>;

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// `(total, active)` document counts.
    async fn counts(&self, cutoff: DateTime<Utc>) -> Result<(usize, usize)>;

    async fn ping(&self) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Opens the backend named by a datastore connection string.
///
/// Supported: `memory://` and `postgres://` (or `postgresql://`).
pub async fn connect(url: &str, max_connections: u32) -> Result<Arc<dyn SightingBackend>> {
    let url = url.trim();
    let backend: Arc<dyn SightingBackend> = if url == "memory" || url.starts_with("memory://") {
        Arc::new(MemoryBackend::new())
    } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Arc::new(PgBackend::connect(url, max_connections).await?)
    } else {
        let scheme = url.split("://").next().unwrap_or_default();
        return Err(SightingError::store(format!(
            "unsupported datastore scheme '{scheme}'"
        )));
    };

    backend.ping().await?;
    tracing::info!(target: "sightings::store", backend = backend.name(), "datastore connected");
    Ok(backend)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreHealth {
    pub backend: &'static str,
    pub connected: bool,
    pub total: usize,
    pub active: usize,
}

/// Cheap-to-clone handle shared by request handlers and the sweeper.
#[derive(Clone)]
pub struct SightingStore {
    backend: Arc<dyn SightingBackend>,
    clock: Arc<dyn Clock>,
    policy: ExpiryPolicy,
    max_list_limit: usize,
}

impl SightingStore {
    pub fn new(backend: Arc<dyn SightingBackend>, policy: ExpiryPolicy) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            policy,
            max_list_limit: DEFAULT_MAX_LIST_LIMIT,
        }
    }

    /// In-memory store on the system clock with the default window.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), ExpiryPolicy::default())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_max_list_limit(mut self, max: usize) -> Self {
        self.max_list_limit = max.max(1);
        self
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.policy
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Validates and persists a new sighting with `created_at == last_active_at == now`.
    pub async fn create(&self, draft: SightingDraft) -> Result<Sighting> {
        let new = draft.validate()?;
        let sighting = Sighting::from_new(new, self.clock.now());
        let stored = self.backend.insert(sighting).await?;

        counter!("sightings_created_total").increment(1);
        tracing::info!(
            target: "sightings::store",
            id = %stored.id,
            animal = %stored.animal,
            is_baby = stored.is_baby,
            "sighting created"
        );
        Ok(stored)
    }

    /// Active sightings, newest first. `limit` is clamped to the configured maximum.
    pub async fn list_active(&self, limit: Option<usize>) -> Result<Vec<Sighting>> {
        let limit = match limit {
            Some(0) => return Err(SightingError::validation("limit must be at least 1")),
            Some(n) => n.min(self.max_list_limit),
            None => self.max_list_limit,
        };
        let cutoff = self.policy.cutoff(self.clock.now());
        self.backend.find_active(cutoff, Some(limit)).await
    }

    /// Detail fetch; expired records are reported as missing.
    pub async fn get(&self, id: Uuid) -> Result<Sighting> {
        let now = self.clock.now();
        match self.backend.get(id).await? {
            Some(s) if self.policy.is_active(&s, now) => Ok(s),
            _ => Err(SightingError::not_found(id)),
        }
    }

    /// "Still here": pushes `last_active_at` forward; `created_at` is untouched.
    pub async fn refresh(&self, id: Uuid) -> Result<Sighting> {
        let now = self.clock.now();
        let cutoff = self.policy.cutoff(now);
        let updated = self
            .backend
            .touch(id, cutoff, now)
            .await?
            .ok_or_else(|| SightingError::not_found(id))?;

        counter!("sightings_refreshed_total").increment(1);
        tracing::debug!(target: "sightings::store", %id, "sighting refreshed");
        Ok(updated)
    }

    /// Permanently removes every expired sighting; returns how many went.
    pub async fn delete_expired(&self) -> Result<u64> {
        let cutoff = self.policy.cutoff(self.clock.now());
        self.backend.delete_older_than(cutoff).await
    }

    pub async fn health(&self) -> Result<StoreHealth> {
        self.backend.ping().await?;
        let cutoff = self.policy.cutoff(self.clock.now());
        let (total, active) = self.backend.counts(cutoff).await?;
        Ok(StoreHealth {
            backend: self.backend.name(),
            connected: true,
            total,
            active,
        })
    }

    pub async fn close(&self) -> Result<()> {
        self.backend.close().await?;
        tracing::info!(target: "sightings::store", backend = self.backend.name(), "datastore closed");
        Ok(())
    }
}
