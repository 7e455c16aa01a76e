//! In-memory content store
//!
//! Keeps everything in process memory, for tests and embedding.

use crate::crawler::FetchedContent;
use crate::state::AuState;
use crate::storage::traits::{ContentStore, StorageError, StorageResult};
use crate::storage::StoredContent;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    content: HashMap<(String, String), StoredContent>,
    states: BTreeMap<String, AuState>,
}

/// Content store backed by maps
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> StorageResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Returns every URL stored for a unit, sorted
    pub fn urls(&self, unit_id: &str) -> StorageResult<Vec<String>> {
        let inner = self.inner()?;
        let mut urls: Vec<String> = inner
            .content
            .keys()
            .filter(|(unit, _)| unit == unit_id)
            .map(|(_, url)| url.clone())
            .collect();
        urls.sort();
        Ok(urls)
    }
}

impl ContentStore for MemoryStore {
    fn store_content(&self, unit_id: &str, content: &FetchedContent) -> StorageResult<()> {
        let stored = StoredContent {
            unit_id: unit_id.to_string(),
            url: content.url.clone(),
            final_url: content.final_url.clone(),
            content_type: content.content_type.clone(),
            status_code: content.status_code,
            body: content.body.clone(),
            fetched_at: Utc::now(),
        };
        self.inner()?
            .content
            .insert((unit_id.to_string(), content.url.clone()), stored);
        Ok(())
    }

    fn has_content(&self, unit_id: &str, url: &str) -> StorageResult<bool> {
        Ok(self
            .inner()?
            .content
            .contains_key(&(unit_id.to_string(), url.to_string())))
    }

    fn load_content(&self, unit_id: &str, url: &str) -> StorageResult<Option<StoredContent>> {
        Ok(self
            .inner()?
            .content
            .get(&(unit_id.to_string(), url.to_string()))
            .cloned())
    }

    fn count_urls(&self, unit_id: &str) -> StorageResult<u64> {
        Ok(self
            .inner()?
            .content
            .keys()
            .filter(|(unit, _)| unit == unit_id)
            .count() as u64)
    }

    fn load_au_state(&self, unit_id: &str) -> StorageResult<AuState> {
        Ok(self
            .inner()?
            .states
            .get(unit_id)
            .cloned()
            .unwrap_or_else(|| AuState::new(unit_id)))
    }

    fn save_au_state(&self, state: &AuState) -> StorageResult<()> {
        self.inner()?
            .states
            .insert(state.unit_id.clone(), state.clone());
        Ok(())
    }

    fn list_au_states(&self) -> StorageResult<Vec<AuState>> {
        Ok(self.inner()?.states.values().cloned().collect())
    }
}
