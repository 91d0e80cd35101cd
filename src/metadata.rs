use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::key::CompositeKey;
use crate::models::{CalouroRecord, CalouroStatus};

/// What the house has recorded about one calouro.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StudentMeta {
    pub is_favorited: bool,
    pub status: CalouroStatus,
    pub db_id: Option<u64>,
}

/// Favorite/status state keyed by [`CompositeKey`]. Unknown keys read as
/// [`StudentMeta::default`].
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    entries: HashMap<CompositeKey, StudentMeta>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole map with the given persisted records.
    pub fn hydrate(&mut self, records: &[CalouroRecord]) {
        self.entries = records
            .iter()
            .map(|record| {
                (
                    record.entry.key(),
                    StudentMeta {
                        is_favorited: record.favourite,
                        status: record.status,
                        db_id: Some(record.id),
                    },
                )
            })
            .collect();
    }

    pub fn get(&self, key: &CompositeKey) -> StudentMeta {
        self.entries.get(key).copied().unwrap_or_default()
    }

    /// Returns the value the entry held before the write.
    pub fn set_favorite(&mut self, key: &CompositeKey, value: bool) -> bool {
        let entry = self.entries.entry(key.clone()).or_default();
        std::mem::replace(&mut entry.is_favorited, value)
    }

    /// Returns the value the entry held before the write.
    pub fn set_status(&mut self, key: &CompositeKey, status: CalouroStatus) -> CalouroStatus {
        let entry = self.entries.entry(key.clone()).or_default();
        std::mem::replace(&mut entry.status, status)
    }

    pub fn set_db_id(&mut self, key: &CompositeKey, id: u64) {
        self.entries.entry(key.clone()).or_default().db_id = Some(id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Store handle shared between the dashboard and in-flight mutation tasks.
/// The lock is only ever taken for short synchronous sections.
#[derive(Debug, Clone, Default)]
pub struct SharedMetadata(Arc<Mutex<MetadataStore>>);

impl SharedMetadata {
    pub fn new(store: MetadataStore) -> Self {
        Self(Arc::new(Mutex::new(store)))
    }

    pub fn lock(&self) -> MutexGuard<'_, MetadataStore> {
        // A panic while holding the guard leaves plain data behind; keep using it.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &CompositeKey) -> StudentMeta {
        self.lock().get(key)
    }

    pub fn snapshot(&self) -> MetadataStore {
        self.lock().clone()
    }
}
