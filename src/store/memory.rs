// src/store/memory.rs
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::collection::Collection;
use super::SightingBackend;
use crate::error::Result;
use crate::sighting::Sighting;

/// Process-local document map. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: RwLock<Collection>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SightingBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, sighting: Sighting) -> Result<Sighting> {
        self.inner.write().await.insert(sighting.clone());
        Ok(sighting)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Sighting>> {
        Ok(self.inner.read().await.get(id).cloned())
    }

    async fn find_active(&self, cutoff: DateTime<Utc>, limit: Option<usize>) -> Result<Vec<Sighting>> {
        Ok(self.inner.read().await.active_since(cutoff, limit))
    }

    async fn touch(&self, id: Uuid, cutoff: DateTime<Utc>, at: DateTime<Utc>) -> Result<Option<Sighting>> {
        Ok(self.inner.write().await.touch(id, cutoff, at))
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        Ok(self.inner.write().await.remove_older_than(cutoff))
    }

    async fn counts(&self, cutoff: DateTime<Utc>) -> Result<(usize, usize)> {
        let c = self.inner.read().await;
        Ok((c.len(), c.count_active(cutoff)))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
