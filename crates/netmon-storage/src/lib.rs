//! # netmon-storage
//!
//! Device record retrieval for the netmon gateway.
//!
//! The device table lives in a key-value store that describes every
//! attribute with a type tag (`{"S": "router1"}`, `{"BOOL": true}`,
//! `{"M": {...}}`). This crate scans a collection and turns those tagged
//! records into plain [`DeviceRecord`]s that serialize to ordinary JSON.
//!
//! ## Overview
//!
//! - [`RecordStore`] is the backend contract: a full scan of one collection.
//! - [`DynamoRecordStore`] reads DynamoDB tables over the JSON HTTP API.
//! - [`InMemoryRecordStore`] serves seeded collections from memory.
//! - [`decode_record`] converts a raw record; [`fetch_devices`] does both.
//!
//! ## Example
//!
//! ```ignore
//! use netmon_storage::{InMemoryRecordStore, fetch_devices};
//!
//! let store = InMemoryRecordStore::from_seed_file("devices.json")?;
//! let devices = fetch_devices(&store, "netmon_devices").await?;
//! let body = serde_json::to_string(&devices)?;
//! ```

mod decode;
pub mod dynamo;
mod error;
mod memory;
pub mod sigv4;
mod traits;
mod types;

pub use decode::{decode, decode_json, decode_record, encode, encode_record, record};
pub use dynamo::{DynamoConfig, DynamoRecordStore};
pub use error::{DecodeError, StorageError};
pub use memory::InMemoryRecordStore;
pub use sigv4::AwsCredentials;
pub use traits::{RecordStore, fetch_devices};
pub use types::{AttributeValue, DeviceRecord, Number, RawRecord, Value};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared record store trait object.
pub type DynRecordStore = std::sync::Arc<dyn RecordStore>;
