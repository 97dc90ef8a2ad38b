//! stowage-watch: background directory watcher over inotify
//!
//! One monitor thread per watcher instance blocks in `poll(2)` over the
//! inotify descriptor and a self-pipe; `stop()` writes a wake byte and joins
//! the thread. Events are resolved to their registered paths under a
//! short-held lock and handed to an optional sink on the monitor thread.

mod event;
mod watcher;

pub use event::{EventMask, WatchedEvent};
pub use watcher::{DirectoryWatcher, EventSink};
