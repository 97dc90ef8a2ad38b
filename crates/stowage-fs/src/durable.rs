use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use stowage_core::{StowageError, StowageResult};

use crate::WRITE_TMP_SUFFIX;

/// Write `data` to `path` so that a crash at any point leaves either the old
/// content or the new content at `path`, never a mix.
///
/// Sequence: ensure parent dir, write all bytes to `path + "._atomicwrite_tmp"`
/// (mode 0644), fsync the temp file, close it, rename onto `path`, fsync the
/// parent directory. The directory fsync is best-effort: on failure the rename
/// may not survive power loss, which is logged as a warning but does not fail
/// the call.
pub fn atomic_write(path: &Path, data: &[u8]) -> StowageResult<()> {
    if path.as_os_str().is_empty() {
        return Err(StowageError::InvalidArgument(
            "target path for atomic write is empty".into(),
        ));
    }
    if let Some(parent) = nonempty_parent(path) {
        ensure_dir(parent)?;
    }

    let tmp = staging_path(path);
    write_synced(&tmp, data)?;

    if let Err(source) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(StowageError::FileRename {
            from: tmp,
            to: path.to_path_buf(),
            source,
        });
    }
    debug!(path = %path.display(), "atomic write committed");

    sync_parent_dir(path);
    Ok(())
}

/// Read the entire file. An empty file yields an empty vector.
pub fn read_all(path: &Path) -> StowageResult<Vec<u8>> {
    fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => StowageError::PathNotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => StowageError::AccessDenied(path.to_path_buf()),
        _ => StowageError::FileRead {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Remove the file. Absence is success.
pub fn delete(path: &Path) -> StowageResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StowageError::FileRemove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// Names (not paths) of the regular files directly inside `dir`, in no
/// guaranteed order. Entries that cannot be inspected are skipped with a
/// warning; non-UTF-8 names cannot be valid record ids and are skipped too.
pub fn list_regular(dir: &Path) -> StowageResult<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|source| match source.kind() {
        ErrorKind::NotFound => StowageError::PathNotFound(dir.to_path_buf()),
        ErrorKind::PermissionDenied => StowageError::AccessDenied(dir.to_path_buf()),
        _ => StowageError::FileOpen {
            path: dir.to_path_buf(),
            source,
        },
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), "skipping unreadable directory entry: {e}");
                continue;
            }
        };
        let is_file = match entry.file_type() {
            Ok(ft) => ft.is_file(),
            Err(e) => {
                warn!(entry = %entry.path().display(), "could not determine entry type: {e}");
                continue;
            }
        };
        if !is_file {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => {
                warn!(dir = %dir.display(), name = ?raw, "skipping non-UTF-8 file name");
            }
        }
    }
    Ok(names)
}

/// Recursively create `path` as a directory (mode 0755). Fails with
/// `OperationFailed` if any component exists as a non-directory.
pub fn ensure_dir(path: &Path) -> StowageResult<()> {
    if path.as_os_str().is_empty() {
        return Err(StowageError::InvalidArgument(
            "directory path is empty".into(),
        ));
    }
    if path.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(path)
        .map_err(|e| {
            StowageError::OperationFailed(format!(
                "creating directory {}: {e}",
                path.display()
            ))
        })
}

fn staging_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(WRITE_TMP_SUFFIX);
    PathBuf::from(os)
}

fn nonempty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn write_synced(tmp: &Path, data: &[u8]) -> StowageResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(tmp)
        .map_err(|source| match source.kind() {
            ErrorKind::PermissionDenied => StowageError::AccessDenied(tmp.to_path_buf()),
            _ => StowageError::FileOpen {
                path: tmp.to_path_buf(),
                source,
            },
        })?;

    let result = write_and_sync(&mut file, data);
    drop(file);
    if let Err(source) = result {
        let _ = fs::remove_file(tmp);
        return Err(StowageError::FileWrite {
            path: tmp.to_path_buf(),
            source,
        });
    }
    Ok(())
}

fn write_and_sync(file: &mut File, data: &[u8]) -> io::Result<()> {
    file.write_all(data)?;
    file.sync_all()
}

/// Best-effort fsync of the directory containing `path`, so the rename itself
/// survives power loss.
fn sync_parent_dir(path: &Path) {
    let dir = nonempty_parent(path).unwrap_or_else(|| Path::new("."));
    match File::open(dir) {
        Ok(handle) => {
            if let Err(e) = handle.sync_all() {
                warn!(
                    dir = %dir.display(),
                    "directory fsync failed, rename may not be durable across power loss: {e}"
                );
            }
        }
        Err(e) => {
            warn!(
                dir = %dir.display(),
                "could not open directory for fsync, rename may not be durable across power loss: {e}"
            );
        }
    }
}
