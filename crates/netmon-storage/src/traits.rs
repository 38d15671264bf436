//! Record store abstraction.

use async_trait::async_trait;

use crate::decode::decode_record;
use crate::error::StorageError;
use crate::types::{DeviceRecord, RawRecord};

/// A key-value store holding self-describing device records.
///
/// Implementations are read-only from the gateway's point of view and must
/// be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use netmon_storage::{RecordStore, StorageError, fetch_devices};
///
/// async fn list(store: &dyn RecordStore) -> Result<usize, StorageError> {
///     Ok(fetch_devices(store, "netmon_devices").await?.len())
/// }
/// ```
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns every record of `collection`, in store order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` for any transport or service failure,
    /// including a collection that does not exist.
    async fn scan_all(&self, collection: &str) -> Result<Vec<RawRecord>, StorageError>;

    /// Short backend name used in logs.
    fn backend_name(&self) -> &'static str;
}

/// Scans `collection` and decodes every record.
///
/// # Errors
///
/// Returns `StorageError::Unavailable` if the scan fails, or
/// `StorageError::Decode` for the first record that cannot be decoded.
pub async fn fetch_devices(
    store: &dyn RecordStore,
    collection: &str,
) -> Result<Vec<DeviceRecord>, StorageError> {
    let raw = store.scan_all(collection).await?;

    tracing::debug!(
        backend = store.backend_name(),
        collection,
        records = raw.len(),
        "Scanned device collection"
    );

    raw.iter()
        .map(|record| decode_record(record).map_err(StorageError::from))
        .collect()
}
