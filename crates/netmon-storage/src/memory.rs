//! In-memory record store.
//!
//! Holds raw tagged records per collection. Used for local development
//! (seeded from a JSON file) and as a test double.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::traits::RecordStore;
use crate::types::RawRecord;

/// A record store backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    collections: RwLock<HashMap<String, Vec<RawRecord>>>,
    scans: AtomicU64,
}

impl InMemoryRecordStore {
    /// Creates an empty store with no collections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding a single collection.
    #[must_use]
    pub fn with_collection(name: impl Into<String>, records: Vec<RawRecord>) -> Self {
        let mut collections = HashMap::new();
        collections.insert(name.into(), records);
        Self {
            collections: RwLock::new(collections),
            scans: AtomicU64::new(0),
        }
    }

    /// Builds a store from seed JSON shaped as `{"collection": [record, ...]}`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the JSON does not have that shape.
    pub fn from_seed_json(json: &str) -> Result<Self, StorageError> {
        let collections: HashMap<String, Vec<RawRecord>> = serde_json::from_str(json)
            .map_err(|e| StorageError::unavailable(format!("invalid seed data: {e}")))?;
        Ok(Self {
            collections: RwLock::new(collections),
            scans: AtomicU64::new(0),
        })
    }

    /// Builds a store from a seed file (see [`Self::from_seed_json`]).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the file cannot be read or parsed.
    pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            StorageError::unavailable(format!("cannot read seed file {}: {e}", path.display()))
        })?;
        Self::from_seed_json(&json)
    }

    /// Appends a record to `collection`, creating the collection if needed.
    pub async fn insert(&self, collection: &str, record: RawRecord) {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(record);
    }

    /// Number of scans served so far.
    #[must_use]
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn scan_all(&self, collection: &str) -> Result<Vec<RawRecord>, StorageError> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .cloned()
            .ok_or_else(|| StorageError::unavailable(format!("collection not found: {collection}")))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
