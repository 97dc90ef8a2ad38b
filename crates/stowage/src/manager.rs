//! The coordinator: composes the blob store and the directory watcher behind
//! one storage-facing API.

use std::path::PathBuf;

use tracing::{error, info, warn};

use stowage_core::{RecordId, StowageConfig, StowageError, StowageResult};
use stowage_crypto::{IdentityProvider, KeyDeriver, DEFAULT_PERSONALIZATION};
use stowage_store::BlobStore;
use stowage_watch::{DirectoryWatcher, EventSink};

/// Facade over the blob store and the storage-root watcher.
///
/// Construction is storage-ready iff the blob store initialized; once that
/// fails, every operation returns `NotInitialized`. The watcher is started
/// immediately and registered on the storage root, but its failure only
/// degrades [`watcher_active`](Self::watcher_active); storage keeps working
/// without it.
///
/// Move-only by construction; dropping the manager stops the watcher (joining
/// its monitor thread) before the store and its key material are torn down.
pub struct StorageManager {
    store: Option<BlobStore>,
    watcher: Option<DirectoryWatcher>,
    watcher_active: bool,
}

impl StorageManager {
    /// Open a manager over `root` with default key-derivation parameters.
    pub fn new(
        root: impl Into<PathBuf>,
        identity: &dyn IdentityProvider,
        sink: Option<EventSink>,
    ) -> Self {
        Self::with_parameters(
            root,
            identity,
            sink,
            KeyDeriver::default(),
            DEFAULT_PERSONALIZATION,
            true,
        )
    }

    /// Open a manager from a parsed configuration file.
    pub fn from_config(
        config: &StowageConfig,
        identity: &dyn IdentityProvider,
        sink: Option<EventSink>,
    ) -> Self {
        let deriver = match &config.crypto.hkdf_info {
            Some(info) => KeyDeriver::with_info(info.as_bytes()),
            None => KeyDeriver::default(),
        };
        Self::with_parameters(
            config.storage.root.clone(),
            identity,
            sink,
            deriver,
            config.crypto.personalization.as_bytes(),
            config.watcher.enabled,
        )
    }

    fn with_parameters(
        root: impl Into<PathBuf>,
        identity: &dyn IdentityProvider,
        sink: Option<EventSink>,
        deriver: KeyDeriver,
        personalization: &[u8],
        watch: bool,
    ) -> Self {
        let root = root.into();

        let store = match BlobStore::open_with(&root, identity, deriver, personalization) {
            Ok(store) => Some(store),
            Err(e) => {
                error!(root = %root.display(), "storage initialization failed: {e}");
                None
            }
        };

        let (watcher, watcher_active) = match (&store, watch) {
            (Some(_), true) => start_watcher(&root, sink),
            _ => (None, false),
        };

        Self {
            store,
            watcher,
            watcher_active,
        }
    }

    /// Whether storage operations are available.
    pub fn is_initialized(&self) -> bool {
        self.store.is_some()
    }

    /// Whether the storage root is being watched for external changes.
    pub fn watcher_active(&self) -> bool {
        self.watcher_active
    }

    pub fn store(&mut self, id: &str, plaintext: &[u8]) -> StowageResult<()> {
        self.store
            .as_mut()
            .ok_or(StowageError::NotInitialized)?
            .store(id, plaintext)
    }

    pub fn retrieve(&self, id: &str) -> StowageResult<Vec<u8>> {
        self.ready()?.retrieve(id)
    }

    pub fn delete(&self, id: &str) -> StowageResult<()> {
        self.ready()?.delete(id)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.store.as_ref().is_some_and(|s| s.exists(id))
    }

    pub fn list(&self) -> StowageResult<Vec<RecordId>> {
        self.ready()?.list()
    }

    fn ready(&self) -> StowageResult<&BlobStore> {
        self.store.as_ref().ok_or(StowageError::NotInitialized)
    }
}

impl Drop for StorageManager {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            if let Err(e) = watcher.stop() {
                warn!("watcher shutdown failed during teardown: {e}");
            }
        }
    }
}

fn start_watcher(
    root: &std::path::Path,
    sink: Option<EventSink>,
) -> (Option<DirectoryWatcher>, bool) {
    let watcher = DirectoryWatcher::new(sink);
    match watcher.start().and_then(|()| watcher.add_watch(root)) {
        Ok(()) => {
            info!(root = %root.display(), "watching storage root");
            (Some(watcher), true)
        }
        Err(e) => {
            warn!(root = %root.display(), "file watcher unavailable: {e}");
            let _ = watcher.stop();
            (None, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_crypto::StaticIdentity;
    use tempfile::TempDir;

    #[test]
    fn initialized_manager_reports_watcher_active() {
        let dir = TempDir::new().unwrap();
        let manager = StorageManager::new(dir.path(), &StaticIdentity::new("dev"), None);
        assert!(manager.is_initialized());
        assert!(manager.watcher_active());
    }

    #[test]
    fn failed_store_init_disables_everything() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let mut manager = StorageManager::new(&blocker, &StaticIdentity::new("dev"), None);

        assert!(!manager.is_initialized());
        assert!(!manager.watcher_active());
        assert!(matches!(
            manager.store("x", b"data"),
            Err(StowageError::NotInitialized)
        ));
        assert!(matches!(
            manager.retrieve("x"),
            Err(StowageError::NotInitialized)
        ));
        assert!(matches!(
            manager.delete("x"),
            Err(StowageError::NotInitialized)
        ));
        assert!(matches!(
            manager.list(),
            Err(StowageError::NotInitialized)
        ));
        assert!(!manager.exists("x"));
    }

    #[test]
    fn empty_identity_disables_storage() {
        let dir = TempDir::new().unwrap();
        let manager = StorageManager::new(dir.path(), &StaticIdentity::new(Vec::new()), None);
        assert!(!manager.is_initialized());
    }

    #[test]
    fn config_can_disable_the_watcher() {
        let dir = TempDir::new().unwrap();
        let mut config = StowageConfig::default();
        config.storage.root = dir.path().to_path_buf();
        config.watcher.enabled = false;

        let manager = StorageManager::from_config(&config, &StaticIdentity::new("dev"), None);
        assert!(manager.is_initialized());
        assert!(!manager.watcher_active());
    }

    #[test]
    fn config_hkdf_info_separates_keys() {
        let dir = TempDir::new().unwrap();
        let identity = StaticIdentity::new("dev");

        let mut config = StowageConfig::default();
        config.storage.root = dir.path().to_path_buf();
        config.watcher.enabled = false;

        {
            let mut manager = StorageManager::from_config(&config, &identity, None);
            manager.store("cfg", b"secret").unwrap();
        }

        config.crypto.hkdf_info = Some("other-application".into());
        let manager = StorageManager::from_config(&config, &identity, None);
        assert!(matches!(
            manager.retrieve("cfg"),
            Err(StowageError::AuthenticationFailed)
        ));
    }
}
