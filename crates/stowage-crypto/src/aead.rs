//! AES-256-GCM codec producing self-framing blobs
//!
//! Blob layout: `[12 bytes nonce][N bytes ciphertext][16 bytes tag]`,
//! minimum 28 bytes (empty plaintext is legal).

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use tracing::error;

use stowage_core::{StowageError, StowageResult};

use crate::{FRAME_MIN, KEY_SIZE, NONCE_SIZE};

/// Default RNG personalization when the caller has no application-specific one.
pub const DEFAULT_PERSONALIZATION: &[u8] = b"stowage-codec-seed-v1";

/// Authenticated encryption codec.
///
/// Holds a per-instance ChaCha20 CSPRNG for nonce generation, seeded once at
/// construction from OS entropy mixed with the caller's personalization
/// string. If seeding fails the codec stays permanently uninitialized and
/// every encrypt/decrypt call fails fast with `NotInitialized`.
///
/// The codec borrows the key on each call and keeps no key material itself.
pub struct Codec {
    rng: Option<ChaCha20Rng>,
}

impl Codec {
    pub fn new(personalization: &[u8]) -> Self {
        let rng = match seed_rng(personalization) {
            Ok(rng) => Some(rng),
            Err(e) => {
                error!("codec RNG seeding failed, codec is unusable: {e}");
                None
            }
        };
        Self { rng }
    }

    pub fn is_initialized(&self) -> bool {
        self.rng.is_some()
    }

    /// Encrypt `plaintext` under `key`, binding `aad` into the tag.
    ///
    /// Returns `[nonce][ciphertext][tag]` with a fresh random nonce.
    pub fn encrypt(
        &mut self,
        plaintext: &[u8],
        key: &[u8],
        aad: &[u8],
    ) -> StowageResult<Vec<u8>> {
        let rng = self.rng.as_mut().ok_or(StowageError::NotInitialized)?;
        let cipher = new_cipher(key)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| StowageError::EncryptionFailed("AES-GCM seal".into()))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a `[nonce][ciphertext][tag]` blob under `key`.
    ///
    /// A tag mismatch (tampering or wrong key) yields `AuthenticationFailed`.
    pub fn decrypt(&self, blob: &[u8], key: &[u8], aad: &[u8]) -> StowageResult<Vec<u8>> {
        if self.rng.is_none() {
            return Err(StowageError::NotInitialized);
        }
        let cipher = new_cipher(key)?;

        if blob.len() < FRAME_MIN {
            return Err(StowageError::InvalidArgument(format!(
                "ciphertext blob too short: {} bytes (minimum {FRAME_MIN})",
                blob.len()
            )));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| StowageError::AuthenticationFailed)
    }
}

fn new_cipher(key: &[u8]) -> StowageResult<Aes256Gcm> {
    if key.len() != KEY_SIZE {
        return Err(StowageError::InvalidKey {
            expected: KEY_SIZE,
            got: key.len(),
        });
    }
    Aes256Gcm::new_from_slice(key)
        .map_err(|e| StowageError::CryptoLibrary(format!("AES-GCM key setup: {e}")))
}

/// Seed = SHA-256(32 bytes OS entropy || personalization).
fn seed_rng(personalization: &[u8]) -> Result<ChaCha20Rng, getrandom::Error> {
    let mut entropy = [0u8; 32];
    getrandom::getrandom(&mut entropy)?;

    let mut hasher = Sha256::new();
    hasher.update(entropy);
    hasher.update(personalization);
    let seed: [u8; 32] = hasher.finalize().into();
    Ok(ChaCha20Rng::from_seed(seed))
}
