//! stowage-fs: crash-safe file primitives for the blob store
//!
//! The core primitive is [`atomic_write`]: write-to-temp, fsync, same-directory
//! rename, fsync-parent. After it returns, either the new content is durably
//! visible at the target path or the old content (if any) still is; no partial
//! state survives a crash, assuming same-filesystem rename.

mod durable;

pub use durable::{atomic_write, delete, ensure_dir, exists, list_regular, read_all};

/// Suffix of the internal staging file used by [`atomic_write`].
pub const WRITE_TMP_SUFFIX: &str = "._atomicwrite_tmp";
