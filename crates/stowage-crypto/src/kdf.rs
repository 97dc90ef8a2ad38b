//! Key derivation: device identity → master key via HKDF-SHA256 (RFC 5869)

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use stowage_core::{StowageError, StowageResult};

use crate::KEY_SIZE;

/// Default HKDF salt. Stable across versions: changing it orphans every
/// blob written by earlier releases.
pub const HKDF_SALT_V1: &[u8] = b"stowage-hkdf-salt-v1";

/// Default HKDF info string, stable for the same reason as the salt.
pub const HKDF_INFO_V1: &[u8] = b"stowage-aes-256-gcm-key-v1";

/// A 256-bit master key derived from the device identity.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// HKDF-SHA256 key deriver with fixed salt and info strings.
///
/// Stateless: the same inputs yield the same key across calls and processes.
/// Immutable after construction.
pub struct KeyDeriver {
    salt: Vec<u8>,
    info: Vec<u8>,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self {
            salt: HKDF_SALT_V1.to_vec(),
            info: HKDF_INFO_V1.to_vec(),
        }
    }
}

impl KeyDeriver {
    pub fn new(salt: impl Into<Vec<u8>>, info: impl Into<Vec<u8>>) -> Self {
        Self {
            salt: salt.into(),
            info: info.into(),
        }
    }

    /// Default salt with a caller-chosen info string, for per-application
    /// context separation.
    pub fn with_info(info: impl Into<Vec<u8>>) -> Self {
        Self {
            salt: HKDF_SALT_V1.to_vec(),
            info: info.into(),
        }
    }

    /// Derive `key_len` bytes of key material from the device identity.
    pub fn derive(&self, identity: &[u8], key_len: usize) -> StowageResult<Zeroizing<Vec<u8>>> {
        if identity.is_empty() {
            return Err(StowageError::InvalidArgument(
                "cannot derive key from an empty identity".into(),
            ));
        }
        if key_len == 0 {
            return Err(StowageError::InvalidArgument(
                "requested key length is zero".into(),
            ));
        }

        let hkdf = Hkdf::<Sha256>::new(Some(&self.salt), identity);
        let mut okm = Zeroizing::new(vec![0u8; key_len]);
        hkdf.expand(&self.info, &mut okm)
            .map_err(|e| StowageError::KeyDerivationFailed(format!("HKDF expand: {e}")))?;
        Ok(okm)
    }

    /// Derive the 256-bit master key.
    pub fn derive_master_key(&self, identity: &[u8]) -> StowageResult<MasterKey> {
        let okm = self.derive(identity, KEY_SIZE)?;
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&okm);
        Ok(MasterKey::from_bytes(bytes))
    }
}
