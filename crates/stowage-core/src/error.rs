use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type StowageResult<T> = Result<T, StowageError>;

/// Closed error taxonomy for the stowage library.
///
/// Every fallible operation across the crates returns one of these kinds.
/// A few variants are reserved for callers layering policy on top (noted
/// below); the core itself never produces them.
#[derive(Debug, Error)]
pub enum StowageError {
    // ── Argument / state ──────────────────────────────────────────────────
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not initialized")]
    NotInitialized,

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("unknown error: {0}")]
    Unknown(String),

    // ── Filesystem ────────────────────────────────────────────────────────
    #[error("opening {path}: {source}")]
    FileOpen { path: PathBuf, source: io::Error },

    #[error("reading {path}: {source}")]
    FileRead { path: PathBuf, source: io::Error },

    #[error("writing {path}: {source}")]
    FileWrite { path: PathBuf, source: io::Error },

    #[error("removing {path}: {source}")]
    FileRemove { path: PathBuf, source: io::Error },

    #[error("renaming {from} to {to}: {source}")]
    FileRename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("access denied: {0}")]
    AccessDenied(PathBuf),

    // ── Cryptography ──────────────────────────────────────────────────────
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// AEAD tag mismatch: the ciphertext was tampered with or the key is wrong.
    #[error("authentication failed: ciphertext tag mismatch")]
    AuthenticationFailed,

    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("invalid key: expected {expected} bytes, got {got}")]
    InvalidKey { expected: usize, got: usize },

    /// Reserved: the codec generates its own nonces and never sees bad ones.
    #[error("invalid IV: {0}")]
    InvalidIv(String),

    #[error("crypto library error: {0}")]
    CryptoLibrary(String),

    // ── Storage semantics ─────────────────────────────────────────────────
    #[error("no data stored under id '{0}'")]
    DataNotFound(String),

    /// Reserved: the store overwrites on re-store rather than rejecting.
    #[error("data already exists under id '{0}'")]
    DataAlreadyExists(String),

    /// Reserved for callers that serialize structured records into blobs.
    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    /// Reserved for callers that serialize structured records into blobs.
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    // ── Directory watcher ─────────────────────────────────────────────────
    #[error("watcher start failed: {0}")]
    WatcherStartFailed(String),

    #[error("watcher read failed: {0}")]
    WatcherReadFailed(String),

    /// Reserved: tamper policy is the caller's to build on top of watch events.
    #[error("file tampered: {0}")]
    FileTampered(PathBuf),
}
