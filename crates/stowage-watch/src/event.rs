use std::path::PathBuf;

use bitflags::bitflags;

bitflags! {
    /// What happened to a watched path. Multiple bits may be set per event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventMask: u32 {
        /// File content was modified
        const MODIFY = 1 << 0;
        /// A file opened for writing was closed
        const CLOSE_WRITE = 1 << 1;
        /// Metadata (permissions, timestamps, ...) changed
        const ATTRIB = 1 << 2;
        /// An entry was created inside a watched directory
        const CREATE = 1 << 3;
        /// An entry was deleted from a watched directory
        const DELETE = 1 << 4;
        /// An entry was moved out of a watched directory
        const MOVED_FROM = 1 << 5;
        /// An entry was moved into a watched directory
        const MOVED_TO = 1 << 6;
        /// The watched path itself was deleted
        const DELETE_SELF = 1 << 7;
        /// The watched path itself was moved
        const MOVE_SELF = 1 << 8;
        /// The kernel event queue overflowed; events were lost
        const QUEUE_OVERFLOW = 1 << 9;
        /// The kernel dropped this watch (target gone or unmounted)
        const WATCH_REMOVED = 1 << 10;
        /// The affected entry is a directory
        const IS_DIR = 1 << 11;
    }
}

impl EventMask {
    /// Space-separated names of the set bits, e.g. `"CREATE ISDIR"`.
    pub fn describe(self) -> String {
        const NAMES: &[(EventMask, &str)] = &[
            (EventMask::MODIFY, "MODIFY"),
            (EventMask::CLOSE_WRITE, "CLOSE_WRITE"),
            (EventMask::ATTRIB, "ATTRIB"),
            (EventMask::CREATE, "CREATE"),
            (EventMask::DELETE, "DELETE"),
            (EventMask::MOVED_FROM, "MOVED_FROM"),
            (EventMask::MOVED_TO, "MOVED_TO"),
            (EventMask::DELETE_SELF, "DELETE_SELF"),
            (EventMask::MOVE_SELF, "MOVE_SELF"),
            (EventMask::QUEUE_OVERFLOW, "Q_OVERFLOW"),
            (EventMask::WATCH_REMOVED, "WATCH_REMOVED"),
            (EventMask::IS_DIR, "ISDIR"),
        ];

        let mut parts = Vec::new();
        for (flag, name) in NAMES {
            if self.contains(*flag) {
                parts.push(*name);
            }
        }
        parts.join(" ")
    }
}

/// A single filesystem change delivered to the event sink.
#[derive(Debug, Clone)]
pub struct WatchedEvent {
    /// The path the watch was registered on
    pub watched_path: PathBuf,
    /// Affected child entry for a directory watch; empty for a file watch
    /// (and for synthesized events like queue overflow)
    pub entry_name: String,
    pub mask: EventMask,
    pub is_dir: bool,
    /// Human-readable rendering of `mask`
    pub textual_name: String,
}

impl WatchedEvent {
    /// Full path of the affected item (`watched_path` joined with the entry
    /// name when one is present).
    pub fn full_path(&self) -> PathBuf {
        if self.entry_name.is_empty() {
            self.watched_path.clone()
        } else {
            self.watched_path.join(&self.entry_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_names_all_set_bits() {
        let mask = EventMask::CREATE | EventMask::IS_DIR;
        assert_eq!(mask.describe(), "CREATE ISDIR");
    }

    #[test]
    fn describe_empty_mask_is_empty() {
        assert_eq!(EventMask::empty().describe(), "");
    }

    #[test]
    fn full_path_joins_entry_name() {
        let ev = WatchedEvent {
            watched_path: PathBuf::from("/tmp/root"),
            entry_name: "child.enc".into(),
            mask: EventMask::CREATE,
            is_dir: false,
            textual_name: EventMask::CREATE.describe(),
        };
        assert_eq!(ev.full_path(), PathBuf::from("/tmp/root/child.enc"));
    }

    #[test]
    fn full_path_without_entry_is_watched_path() {
        let ev = WatchedEvent {
            watched_path: PathBuf::from("/tmp/root/file"),
            entry_name: String::new(),
            mask: EventMask::DELETE_SELF,
            is_dir: false,
            textual_name: EventMask::DELETE_SELF.describe(),
        };
        assert_eq!(ev.full_path(), PathBuf::from("/tmp/root/file"));
    }
}
