use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use stowage_core::{record, RecordId, StowageError, StowageResult};
use stowage_crypto::{Codec, IdentityProvider, KeyDeriver, MasterKey, DEFAULT_PERSONALIZATION};
use stowage_fs as fsio;

use crate::{BACKUP_SUFFIX, MAIN_SUFFIX, TEMP_SUFFIX};

/// Encrypted blob store rooted at a single directory.
///
/// Not internally synchronized: callers serialize access to one store.
/// The master key lives only in this struct and is zeroized on drop.
pub struct BlobStore {
    root: PathBuf,
    master_key: MasterKey,
    codec: Codec,
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("root", &self.root)
            .field("master_key", &"<redacted>")
            .field("codec", &"<redacted>")
            .finish()
    }
}

impl BlobStore {
    /// Open (creating the root directory if needed) with the default HKDF
    /// parameters and codec personalization.
    pub fn open(root: impl Into<PathBuf>, identity: &dyn IdentityProvider) -> StowageResult<Self> {
        Self::open_with(root, identity, KeyDeriver::default(), DEFAULT_PERSONALIZATION)
    }

    /// Open with explicit key-derivation parameters and RNG personalization.
    ///
    /// Any failure here means there is no usable store; the caller decides
    /// whether that is fatal (the coordinator keeps reporting `NotInitialized`
    /// for every subsequent operation).
    pub fn open_with(
        root: impl Into<PathBuf>,
        identity: &dyn IdentityProvider,
        deriver: KeyDeriver,
        personalization: &[u8],
    ) -> StowageResult<Self> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(StowageError::InvalidArgument(
                "storage root cannot be empty".into(),
            ));
        }
        fsio::ensure_dir(&root)?;

        let identity_bytes = identity.identity()?;
        let master_key = deriver.derive_master_key(&identity_bytes)?;

        let codec = Codec::new(personalization);
        if !codec.is_initialized() {
            return Err(StowageError::NotInitialized);
        }

        info!(root = %root.display(), "blob store initialized");
        Ok(Self {
            root,
            master_key,
            codec,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn main_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}{MAIN_SUFFIX}"))
    }

    fn backup_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}{BACKUP_SUFFIX}"))
    }

    fn temp_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}{TEMP_SUFFIX}"))
    }

    /// Encrypt `plaintext` and atomically replace the record's content.
    ///
    /// The previous MAIN (if any) becomes BACKUP. At any interruption point at
    /// least one of MAIN/BACKUP holds either the new or the previous
    /// ciphertext.
    pub fn store(&mut self, id: &str, plaintext: &[u8]) -> StowageResult<()> {
        record::validate(id)?;

        let blob = self
            .codec
            .encrypt(plaintext, self.master_key.as_bytes(), &[])?;

        let main = self.main_path(id);
        let backup = self.backup_path(id);
        let temp = self.temp_path(id);

        if let Err(e) = fsio::atomic_write(&temp, &blob) {
            error!(id, "staging write failed: {e}");
            let _ = fsio::delete(&temp);
            return Err(e);
        }

        if fsio::exists(&main) {
            if fsio::exists(&backup) {
                if let Err(e) = fsio::delete(&backup) {
                    warn!(id, "could not remove old backup, it may persist: {e}");
                }
            }
            if let Err(e) = fs::rename(&main, &backup) {
                // The new MAIN will still be written below; only the rollback
                // copy is at risk.
                warn!(id, "could not move current blob to backup: {e}");
            } else {
                debug!(id, "moved current blob to backup slot");
            }
        }

        if let Err(source) = fs::rename(&temp, &main) {
            error!(id, "commit rename failed: {source}");
            if !fsio::exists(&main) && fsio::exists(&backup) {
                match fs::rename(&backup, &main) {
                    Ok(()) => info!(id, "restored previous blob after failed commit"),
                    Err(e) => error!(id, "could not restore previous blob: {e}"),
                }
            }
            let _ = fsio::delete(&temp);
            return Err(StowageError::FileRename {
                from: temp,
                to: main,
                source,
            });
        }

        info!(id, "record stored");
        Ok(())
    }

    /// Decrypt and return the record's plaintext.
    ///
    /// Falls back to BACKUP when MAIN is unreadable or fails authentication,
    /// healing MAIN from the raw backup ciphertext. The heal writes the
    /// backup bytes verbatim (no re-encryption) so the original nonce and tag
    /// stay authenticable. A corrupt MAIN is only discarded once the backup
    /// has proven good; if the backup is missing or corrupt too, the on-disk
    /// state is left untouched.
    pub fn retrieve(&self, id: &str) -> StowageResult<Vec<u8>> {
        record::validate(id)?;

        let main = self.main_path(id);
        let backup = self.backup_path(id);

        let mut main_was_corrupt = false;
        match fsio::read_all(&main) {
            Ok(raw) => match self.codec.decrypt(&raw, self.master_key.as_bytes(), &[]) {
                Ok(plain) => return Ok(plain),
                Err(e) => {
                    warn!(id, "main blob failed to decrypt, trying backup: {e}");
                    main_was_corrupt = true;
                }
            },
            Err(e) => {
                debug!(id, "main blob unreadable, trying backup: {e}");
            }
        }

        let backup_raw = match fsio::read_all(&backup) {
            Ok(raw) => raw,
            Err(_) => return Err(StowageError::DataNotFound(id.to_string())),
        };
        let plain = self
            .codec
            .decrypt(&backup_raw, self.master_key.as_bytes(), &[])?;

        // The backup is known good, so the corrupt main can go before the heal.
        if main_was_corrupt {
            if let Err(e) = fsio::delete(&main) {
                warn!(id, "could not remove corrupt main blob: {e}");
            }
        }

        match fsio::atomic_write(&main, &backup_raw) {
            Ok(()) => info!(id, "restored main blob from backup"),
            Err(e) => {
                warn!(id, "recovered from backup but could not restore main blob: {e}");
            }
        }
        Ok(plain)
    }

    /// Remove MAIN and BACKUP. Absent slots are not errors; the call is
    /// idempotent. Staging files are left for the next store to reclaim.
    pub fn delete(&self, id: &str) -> StowageResult<()> {
        record::validate(id)?;

        let main_result = fsio::delete(&self.main_path(id));
        let backup_result = fsio::delete(&self.backup_path(id));
        main_result?;
        backup_result?;

        info!(id, "record deleted (if it existed)");
        Ok(())
    }

    /// Whether the record exists in either slot. Note the asymmetry with
    /// [`list`](Self::list), which only reports records with a MAIN file.
    pub fn exists(&self, id: &str) -> bool {
        if record::validate(id).is_err() {
            return false;
        }
        fsio::exists(&self.main_path(id)) || fsio::exists(&self.backup_path(id))
    }

    /// Record ids with a MAIN file, sorted lexicographically. BACKUP-only
    /// records are excluded; file names that do not map to a valid id are
    /// skipped with a warning.
    pub fn list(&self) -> StowageResult<Vec<RecordId>> {
        let names = fsio::list_regular(&self.root)?;

        let mut ids = Vec::new();
        for name in names {
            let Some(stem) = name.strip_suffix(MAIN_SUFFIX) else {
                continue;
            };
            match RecordId::new(stem) {
                Ok(id) => ids.push(id),
                Err(_) => {
                    warn!(file = %name, "storage entry does not map to a valid record id, skipping");
                }
            }
        }
        ids.sort();
        debug!(count = ids.len(), "listed records");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_crypto::StaticIdentity;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> BlobStore {
        BlobStore::open(dir.path(), &StaticIdentity::new("unit-test-device")).unwrap()
    }

    #[test]
    fn open_rejects_empty_root() {
        let err =
            BlobStore::open("", &StaticIdentity::new("dev")).unwrap_err();
        assert!(matches!(err, StowageError::InvalidArgument(_)));
    }

    #[test]
    fn open_rejects_empty_identity() {
        let dir = TempDir::new().unwrap();
        let err = BlobStore::open(dir.path(), &StaticIdentity::new(Vec::new())).unwrap_err();
        assert!(matches!(err, StowageError::InvalidArgument(_)));
    }

    #[test]
    fn open_creates_root_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested/store");
        let store = BlobStore::open(&root, &StaticIdentity::new("dev")).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root);
    }

    #[test]
    fn open_fails_when_root_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let err = BlobStore::open(&blocker, &StaticIdentity::new("dev")).unwrap_err();
        assert!(matches!(err, StowageError::OperationFailed(_)));
    }

    #[test]
    fn slot_paths_share_the_main_prefix() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert_eq!(store.main_path("cfg"), dir.path().join("cfg.enc"));
        assert_eq!(store.backup_path("cfg"), dir.path().join("cfg.enc.bak"));
        assert_eq!(store.temp_path("cfg"), dir.path().join("cfg.enc.tmp"));
    }

    #[test]
    fn operations_validate_ids() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        for id in ["", "a/b", "a\\b", "..", "up..down"] {
            assert!(
                matches!(store.store(id, b"x"), Err(StowageError::InvalidArgument(_))),
                "store must reject {id:?}"
            );
            assert!(
                matches!(store.retrieve(id), Err(StowageError::InvalidArgument(_))),
                "retrieve must reject {id:?}"
            );
            assert!(
                matches!(store.delete(id), Err(StowageError::InvalidArgument(_))),
                "delete must reject {id:?}"
            );
            assert!(!store.exists(id), "exists must be false for {id:?}");
        }
    }

    #[test]
    fn store_then_retrieve_roundtrips() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        store.store("cfg", &[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(store.retrieve("cfg").unwrap(), [0x01, 0x02, 0x03]);
    }

    #[test]
    fn missing_record_is_data_not_found() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert!(matches!(
            store.retrieve("nope"),
            Err(StowageError::DataNotFound(_))
        ));
    }
}
