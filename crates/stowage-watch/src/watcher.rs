use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use inotify::{Inotify, WatchDescriptor, WatchMask, Watches};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, error, info, warn};

use stowage_core::{StowageError, StowageResult};

use crate::event::{EventMask, WatchedEvent};

/// Callback invoked on the monitor thread for every event.
///
/// Must not call `stop()` on the same watcher (that would deadlock on the
/// join) and must not block indefinitely.
pub type EventSink = Arc<dyn Fn(&WatchedEvent) + Send + Sync + 'static>;

#[derive(Default)]
struct Registry {
    wd_to_path: HashMap<WatchDescriptor, PathBuf>,
    path_to_wd: HashMap<PathBuf, WatchDescriptor>,
}

enum State {
    Idle,
    Running {
        watches: Watches,
        wake_tx: File,
        monitor: JoinHandle<()>,
    },
    Stopped,
}

/// Background watcher over one or more filesystem paths.
///
/// `start()` initializes the inotify facility and a wake-up pipe, then spawns
/// the monitor thread. `stop()` is safe to call from any thread except the
/// monitor thread itself, tolerates never-started and already-stopped states,
/// and latches a terminal state: a stopped watcher cannot be restarted.
pub struct DirectoryWatcher {
    state: Mutex<State>,
    registry: Arc<Mutex<Registry>>,
    sink: Option<EventSink>,
}

impl DirectoryWatcher {
    pub fn new(sink: Option<EventSink>) -> Self {
        Self {
            state: Mutex::new(State::Idle),
            registry: Arc::new(Mutex::new(Registry::default())),
            sink,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*lock(&self.state), State::Running { .. })
    }

    /// Start the monitor thread. Calling `start` on a running watcher is a
    /// no-op; calling it after `stop` has completed fails.
    pub fn start(&self) -> StowageResult<()> {
        let mut state = lock(&self.state);
        match &*state {
            State::Running { .. } => {
                warn!("watcher start called while already running");
                return Ok(());
            }
            State::Stopped => {
                return Err(StowageError::WatcherStartFailed(
                    "watcher has been stopped; create a new instance".into(),
                ));
            }
            State::Idle => {}
        }

        let inotify = Inotify::init()
            .map_err(|e| StowageError::WatcherStartFailed(format!("inotify init: {e}")))?;
        let watches = inotify.watches();

        let (wake_rx, wake_tx) = nix::unistd::pipe()
            .map_err(|e| StowageError::WatcherStartFailed(format!("wake pipe: {e}")))?;

        let registry = Arc::clone(&self.registry);
        let sink = self.sink.clone();
        let monitor = std::thread::Builder::new()
            .name("stowage-watch".into())
            .spawn(move || monitor_loop(inotify, File::from(wake_rx), registry, sink))
            .map_err(|e| StowageError::WatcherStartFailed(format!("monitor thread: {e}")))?;

        *state = State::Running {
            watches,
            wake_tx: File::from(wake_tx),
            monitor,
        };
        info!("directory watcher started");
        Ok(())
    }

    /// Register a watch on an existing path. Watching the same path twice is
    /// a no-op.
    pub fn add_watch(&self, path: &Path) -> StowageResult<()> {
        let mut state = lock(&self.state);
        let State::Running { watches, .. } = &mut *state else {
            return Err(StowageError::NotInitialized);
        };
        if path.as_os_str().is_empty() {
            return Err(StowageError::InvalidArgument(
                "watch path cannot be empty".into(),
            ));
        }
        if !path.exists() {
            return Err(StowageError::PathNotFound(path.to_path_buf()));
        }

        let mut registry = lock(&self.registry);
        if registry.path_to_wd.contains_key(path) {
            debug!(path = %path.display(), "path is already being watched");
            return Ok(());
        }

        let wd = watches.add(path, watch_mask()).map_err(|e| {
            StowageError::WatcherStartFailed(format!("adding watch on {}: {e}", path.display()))
        })?;
        registry.wd_to_path.insert(wd.clone(), path.to_path_buf());
        registry.path_to_wd.insert(path.to_path_buf(), wd);
        info!(path = %path.display(), "watch added");
        Ok(())
    }

    /// Drop the watch on `path`. A path that was never watched is not an
    /// error.
    pub fn remove_watch(&self, path: &Path) -> StowageResult<()> {
        let mut state = lock(&self.state);
        let State::Running { watches, .. } = &mut *state else {
            return Err(StowageError::NotInitialized);
        };

        let mut registry = lock(&self.registry);
        let Some(wd) = registry.path_to_wd.remove(path) else {
            debug!(path = %path.display(), "path was not being watched");
            return Ok(());
        };
        registry.wd_to_path.remove(&wd);

        if let Err(e) = watches.remove(wd) {
            warn!(path = %path.display(), "kernel watch removal failed: {e}");
        }
        info!(path = %path.display(), "watch removed");
        Ok(())
    }

    /// Signal the monitor thread, join it, release all descriptors and clear
    /// the watch maps. Safe to call repeatedly and in any lifecycle state;
    /// afterwards the watcher is terminal.
    pub fn stop(&self) -> StowageResult<()> {
        let mut state = lock(&self.state);
        match std::mem::replace(&mut *state, State::Stopped) {
            State::Running {
                watches: _,
                mut wake_tx,
                monitor,
            } => {
                info!("stopping watch monitor thread");
                if let Err(e) = wake_tx.write_all(b"S") {
                    // The monitor may have exited on its own and closed the
                    // read end; joining below still reaps it.
                    warn!("could not signal watch monitor: {e}");
                }
                let join_result = monitor.join();

                let mut registry = lock(&self.registry);
                registry.wd_to_path.clear();
                registry.path_to_wd.clear();
                drop(registry);

                if join_result.is_err() {
                    error!("watch monitor thread panicked");
                    return Err(StowageError::OperationFailed(
                        "watch monitor thread panicked".into(),
                    ));
                }
                info!("directory watcher stopped");
                Ok(())
            }
            State::Idle => {
                debug!("stop called before start; watcher is now terminal");
                Ok(())
            }
            State::Stopped => {
                debug!("watcher already stopped");
                Ok(())
            }
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn watch_mask() -> WatchMask {
    WatchMask::MODIFY
        | WatchMask::CLOSE_WRITE
        | WatchMask::ATTRIB
        | WatchMask::CREATE
        | WatchMask::DELETE
        | WatchMask::MOVED_FROM
        | WatchMask::MOVED_TO
        | WatchMask::DELETE_SELF
        | WatchMask::MOVE_SELF
}

/// Poison-tolerant lock: the maps stay usable even if a sink panicked while
/// an API thread held the lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn monitor_loop(
    mut inotify: Inotify,
    mut wake_rx: File,
    registry: Arc<Mutex<Registry>>,
    sink: Option<EventSink>,
) {
    let mut buffer = [0u8; 4096];
    info!("watch monitor thread running");

    loop {
        let (wake_ready, events_ready) = {
            let inotify_fd = unsafe { BorrowedFd::borrow_raw(inotify.as_raw_fd()) };
            let mut fds = [
                PollFd::new(inotify_fd, PollFlags::POLLIN),
                PollFd::new(wake_rx.as_fd(), PollFlags::POLLIN),
            ];
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    error!("poll failed in watch monitor: {e}");
                    break;
                }
            }
            let ready = |pfd: &PollFd<'_>| {
                pfd.revents().is_some_and(|r| {
                    r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
                })
            };
            (ready(&fds[1]), ready(&fds[0]))
        };

        if wake_ready {
            let mut drain = [0u8; 16];
            let _ = wake_rx.read(&mut drain);
            info!("stop signal received, watch monitor exiting");
            break;
        }

        if events_ready {
            let events = match inotify.read_events(&mut buffer) {
                Ok(events) => events,
                // Readiness without data can happen; just poll again.
                Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("reading inotify events failed: {e}");
                    break;
                }
            };
            for event in events {
                handle_event(&event, &registry, sink.as_deref());
            }
        }
    }

    debug!("watch monitor thread finished");
}

fn handle_event(
    event: &inotify::Event<&OsStr>,
    registry: &Mutex<Registry>,
    sink: Option<&(dyn Fn(&WatchedEvent) + Send + Sync)>,
) {
    use inotify::EventMask as Raw;

    if event.mask.contains(Raw::Q_OVERFLOW) {
        warn!("inotify event queue overflowed, events were lost");
        let overflow = WatchedEvent {
            watched_path: PathBuf::new(),
            entry_name: String::new(),
            mask: EventMask::QUEUE_OVERFLOW,
            is_dir: false,
            textual_name: EventMask::QUEUE_OVERFLOW.describe(),
        };
        if let Some(sink) = sink {
            sink(&overflow);
        }
        return;
    }

    // Resolve the descriptor while holding the lock, then release it before
    // logging or calling the sink.
    let watched_path = {
        let registry = lock(registry);
        match registry.wd_to_path.get(&event.wd) {
            Some(path) => path.clone(),
            None => {
                // A watch removed just before its queued events were read.
                warn!(wd = ?event.wd, "event for unknown watch descriptor");
                return;
            }
        }
    };

    let mask = map_mask(event.mask);
    let entry_name = event
        .name
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let watched_event = WatchedEvent {
        watched_path: watched_path.clone(),
        entry_name,
        mask,
        is_dir: event.mask.contains(Raw::ISDIR),
        textual_name: mask.describe(),
    };

    info!(
        path = %watched_path.display(),
        entry = %watched_event.entry_name,
        events = %watched_event.textual_name,
        "filesystem event"
    );

    if event.mask.contains(Raw::IGNORED) {
        // Kernel-side removal (target deleted, moved or unmounted).
        let mut registry = lock(registry);
        registry.wd_to_path.remove(&event.wd);
        registry.path_to_wd.remove(&watched_path);
        info!(path = %watched_path.display(), "kernel removed watch");
    }

    if let Some(sink) = sink {
        sink(&watched_event);
    }
}

fn map_mask(raw: inotify::EventMask) -> EventMask {
    use inotify::EventMask as Raw;

    const PAIRS: &[(inotify::EventMask, EventMask)] = &[
        (Raw::MODIFY, EventMask::MODIFY),
        (Raw::CLOSE_WRITE, EventMask::CLOSE_WRITE),
        (Raw::ATTRIB, EventMask::ATTRIB),
        (Raw::CREATE, EventMask::CREATE),
        (Raw::DELETE, EventMask::DELETE),
        (Raw::MOVED_FROM, EventMask::MOVED_FROM),
        (Raw::MOVED_TO, EventMask::MOVED_TO),
        (Raw::DELETE_SELF, EventMask::DELETE_SELF),
        (Raw::MOVE_SELF, EventMask::MOVE_SELF),
        (Raw::Q_OVERFLOW, EventMask::QUEUE_OVERFLOW),
        (Raw::IGNORED, EventMask::WATCH_REMOVED),
        (Raw::ISDIR, EventMask::IS_DIR),
    ];

    let mut mask = EventMask::empty();
    for (from, to) in PAIRS {
        if raw.contains(*from) {
            mask |= *to;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_mask_translates_known_bits() {
        use inotify::EventMask as Raw;

        let mapped = map_mask(Raw::CREATE | Raw::ISDIR);
        assert!(mapped.contains(EventMask::CREATE));
        assert!(mapped.contains(EventMask::IS_DIR));
        assert!(!mapped.contains(EventMask::DELETE));

        assert_eq!(map_mask(Raw::IGNORED), EventMask::WATCH_REMOVED);
        assert_eq!(map_mask(Raw::Q_OVERFLOW), EventMask::QUEUE_OVERFLOW);
    }

    #[test]
    fn watch_mask_covers_the_full_event_set() {
        let mask = watch_mask();
        for flag in [
            WatchMask::MODIFY,
            WatchMask::CLOSE_WRITE,
            WatchMask::ATTRIB,
            WatchMask::CREATE,
            WatchMask::DELETE,
            WatchMask::MOVED_FROM,
            WatchMask::MOVED_TO,
            WatchMask::DELETE_SELF,
            WatchMask::MOVE_SELF,
        ] {
            assert!(mask.contains(flag), "missing {flag:?}");
        }
    }

    #[test]
    fn stop_before_start_is_tolerated_and_terminal() {
        let watcher = DirectoryWatcher::new(None);
        watcher.stop().unwrap();
        watcher.stop().unwrap();
        assert!(matches!(
            watcher.start(),
            Err(StowageError::WatcherStartFailed(_))
        ));
    }

    #[test]
    fn add_watch_requires_start() {
        let watcher = DirectoryWatcher::new(None);
        let err = watcher.add_watch(Path::new("/tmp")).unwrap_err();
        assert!(matches!(err, StowageError::NotInitialized));
    }
}
