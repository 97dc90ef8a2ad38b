//! Device identity sources for key derivation.

use stowage_core::StowageResult;
use zeroize::Zeroizing;

/// Source of the stable, device-bound byte string used as input keying
/// material for the master key.
///
/// The same device must yield the same bytes across reboots; absent that,
/// previously stored records become unrecoverable.
pub trait IdentityProvider {
    fn identity(&self) -> StowageResult<Zeroizing<Vec<u8>>>;
}

/// Fixed identity supplied by the caller, e.g. a provisioning serial number.
pub struct StaticIdentity {
    bytes: Zeroizing<Vec<u8>>,
}

impl StaticIdentity {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes.into()),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn identity(&self) -> StowageResult<Zeroizing<Vec<u8>>> {
        Ok(self.bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_identity_is_stable() {
        let id = StaticIdentity::new("DeviceSN001");
        assert_eq!(id.identity().unwrap().as_slice(), b"DeviceSN001");
        assert_eq!(id.identity().unwrap(), id.identity().unwrap());
    }

    #[test]
    fn empty_identity_is_representable() {
        // Rejection happens at key derivation, not construction.
        let id = StaticIdentity::new(Vec::new());
        assert!(id.identity().unwrap().is_empty());
    }
}
