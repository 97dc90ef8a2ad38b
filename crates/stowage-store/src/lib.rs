//! stowage-store: durable encrypted blob store over a directory
//!
//! Each record occupies up to three sibling files in the storage root:
//! ```text
//! <id>.enc       current authoritative ciphertext (MAIN)
//! <id>.enc.bak   previous ciphertext, kept for rollback/recovery (BACKUP)
//! <id>.enc.tmp   staging file during a store, never present at quiescence
//! ```
//! A record exists iff MAIN or BACKUP exists. Store replaces MAIN atomically
//! and moves the old MAIN aside as BACKUP; retrieve falls back to BACKUP when
//! MAIN is missing or fails authentication, healing MAIN from the raw backup
//! ciphertext as a side effect.

mod store;

pub use store::BlobStore;

/// Suffix of the authoritative ciphertext file
pub const MAIN_SUFFIX: &str = ".enc";

/// Suffix of the rollback/recovery copy
pub const BACKUP_SUFFIX: &str = ".enc.bak";

/// Suffix of the staging file written during a store
pub const TEMP_SUFFIX: &str = ".enc.tmp";
