//! stowage: durable, authenticated at-rest storage of opaque blobs on a
//! single local device
//!
//! Built for resource-constrained offline systems (automotive head-units,
//! embedded displays) where data must survive power loss, resist tampering,
//! and be re-decryptable only on the originating device. Keys are never
//! persisted: the master key is re-derived on every startup from a
//! device-bound identity via HKDF-SHA256 and used with AES-256-GCM.
//!
//! ```no_run
//! use stowage::{StaticIdentity, StorageManager};
//!
//! let mut manager = StorageManager::new("/var/lib/stowage", &StaticIdentity::new("DeviceSN001"), None);
//! assert!(manager.is_initialized());
//! manager.store("vin-cache", b"WVWZZZ...").unwrap();
//! let plain = manager.retrieve("vin-cache").unwrap();
//! ```

pub mod device_id;
pub mod manager;

pub use device_id::MachineIdProvider;
pub use manager::StorageManager;

pub use stowage_core::{RecordId, StowageConfig, StowageError, StowageResult};
pub use stowage_crypto::{IdentityProvider, KeyDeriver, StaticIdentity};
pub use stowage_store::BlobStore;
pub use stowage_watch::{DirectoryWatcher, EventMask, EventSink, WatchedEvent};
