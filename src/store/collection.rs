// src/store/collection.rs
//! Document map behind the memory backend. Mirrors the cutoff rules the
//! Postgres backend applies in SQL.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::sighting::Sighting;

#[derive(Debug, Default)]
pub(crate) struct Collection {
    docs: HashMap<Uuid, Sighting>,
}

impl Collection {
    pub(crate) fn len(&self) -> usize {
        self.docs.len()
    }

    pub(crate) fn insert(&mut self, sighting: Sighting) {
        self.docs.insert(sighting.id, sighting);
    }

    pub(crate) fn get(&self, id: Uuid) -> Option<&Sighting> {
        self.docs.get(&id)
    }

    /// Records with `last_active_at > cutoff`, newest `created_at` first.
    pub(crate) fn active_since(&self, cutoff: DateTime<Utc>, limit: Option<usize>) -> Vec<Sighting> {
        let mut out: Vec<Sighting> = self
            .docs
            .values()
            .filter(|s| s.last_active_at > cutoff)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(n) = limit {
            out.truncate(n);
        }
        out
    }

    pub(crate) fn count_active(&self, cutoff: DateTime<Utc>) -> usize {
        self.docs.values().filter(|s| s.last_active_at > cutoff).count()
    }

    /// Bumps `last_active_at` of a still-active document.
    ///
    /// The new value is `max(at, previous + 1ms)` so successive refreshes
    /// strictly increase it even when the clock has not moved.
    pub(crate) fn touch(&mut self, id: Uuid, cutoff: DateTime<Utc>, at: DateTime<Utc>) -> Option<Sighting> {
        let doc = self.docs.get_mut(&id)?;
        if doc.last_active_at <= cutoff {
            return None;
        }
        let floor = doc.last_active_at + Duration::milliseconds(1);
        doc.last_active_at = at.max(floor);
        Some(doc.clone())
    }

    /// Removes documents with `last_active_at <= cutoff`; returns how many.
    pub(crate) fn remove_older_than(&mut self, cutoff: DateTime<Utc>) -> u64 {
        let before = self.docs.len();
        self.docs.retain(|_, s| s.last_active_at > cutoff);
        (before - self.docs.len()) as u64
    }
}
