//! stowage-crypto: device-bound key derivation and AEAD blob framing
//!
//! Encrypted blob format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! Key hierarchy:
//! ```text
//! Device identity (opaque bytes, from an IdentityProvider)
//!   └── Master key: HKDF-SHA256(salt, identity, info), never persisted,
//!       re-derived on every startup, zeroized on drop
//! ```
//!
//! Nonces are sampled per encryption from a ChaCha20 CSPRNG seeded once per
//! codec instance with OS entropy mixed with a caller personalization string.

pub mod aead;
pub mod identity;
pub mod kdf;

pub use aead::{Codec, DEFAULT_PERSONALIZATION};
pub use identity::{IdentityProvider, StaticIdentity};
pub use kdf::{KeyDeriver, MasterKey, HKDF_INFO_V1, HKDF_SALT_V1};

/// Size of the AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the GCM nonce in bytes (96-bit, the GCM-optimal length)
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Smallest legal blob: empty plaintext still carries nonce and tag
pub const FRAME_MIN: usize = NONCE_SIZE + TAG_SIZE;
