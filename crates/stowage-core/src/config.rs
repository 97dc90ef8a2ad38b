use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level library configuration (loadable from stowage.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StowageConfig {
    pub storage: StorageConfig,
    pub crypto: CryptoConfig,
    pub watcher: WatcherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory under which all records are kept
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// HKDF info string override for per-application key separation.
    /// Changing this orphans records written under the previous value.
    pub hkdf_info: Option<String>,
    /// Personalization string mixed into the codec's RNG seed
    pub personalization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Whether to watch the storage root for external changes (default: true)
    pub enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/stowage"),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            hkdf_info: None,
            personalization: "stowage-codec-seed-v1".into(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
