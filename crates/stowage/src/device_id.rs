//! Linux device identity: the systemd machine id.
//!
//! `/etc/machine-id` is stable across reboots, which the key-derivation
//! contract requires (an identity that changes orphans every stored record).

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use tracing::{debug, warn};
use zeroize::Zeroizing;

use stowage_core::{StowageError, StowageResult};
use stowage_crypto::IdentityProvider;

const MACHINE_ID_PATH: &str = "/etc/machine-id";
const DBUS_MACHINE_ID_PATH: &str = "/var/lib/dbus/machine-id";

/// Identity provider backed by the machine id, cached after the first
/// successful read.
#[derive(Default)]
pub struct MachineIdProvider {
    cached: OnceLock<Zeroizing<Vec<u8>>>,
}

impl MachineIdProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityProvider for MachineIdProvider {
    fn identity(&self) -> StowageResult<Zeroizing<Vec<u8>>> {
        if let Some(id) = self.cached.get() {
            return Ok(id.clone());
        }
        let id = read_machine_id()?;
        Ok(self.cached.get_or_init(|| Zeroizing::new(id)).clone())
    }
}

fn read_machine_id() -> StowageResult<Vec<u8>> {
    for path in [MACHINE_ID_PATH, DBUS_MACHINE_ID_PATH] {
        match read_trimmed(Path::new(path)) {
            Ok(id) if !id.is_empty() => {
                debug!(path, "device identity loaded");
                return Ok(id);
            }
            Ok(_) => warn!(path, "machine id file is empty, trying fallback"),
            Err(e) => debug!(path, "machine id unavailable: {e}"),
        }
    }
    Err(StowageError::OperationFailed(
        "no machine id available on this system".into(),
    ))
}

fn read_trimmed(path: &Path) -> StowageResult<Vec<u8>> {
    let raw = fs::read(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => StowageError::PathNotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => StowageError::AccessDenied(path.to_path_buf()),
        _ => StowageError::FileRead {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let end = raw
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    Ok(raw[..end].to_vec())
}
