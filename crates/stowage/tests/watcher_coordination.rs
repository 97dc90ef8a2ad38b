//! Scenario: a coordinator-held watcher observes external writes to the
//! storage root, and shutdown silences delivery.

use std::fs;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use stowage::{EventMask, StaticIdentity, StorageManager, WatchedEvent};

const EVENT_WAIT: Duration = Duration::from_secs(2);

fn init_logs() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn external_create_reaches_the_sink_until_shutdown() {
    init_logs();
    let dir = TempDir::new().unwrap();
    let (tx, rx) = mpsc::channel();

    let manager = StorageManager::new(
        dir.path(),
        &StaticIdentity::new("DeviceSN001"),
        Some(Arc::new(move |ev: &WatchedEvent| {
            let _ = tx.send(ev.clone());
        })),
    );
    assert!(manager.watcher_active());

    // A write from outside the store entirely.
    fs::write(dir.path().join("ext.txt"), b"intruder").unwrap();

    let deadline = std::time::Instant::now() + EVENT_WAIT;
    let ev = loop {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(ev) if ev.mask.contains(EventMask::CREATE) => break ev,
            Ok(_) => continue,
            Err(_) => panic!("no CREATE event within {EVENT_WAIT:?}"),
        }
    };
    assert_eq!(ev.watched_path, dir.path());
    assert_eq!(ev.entry_name, "ext.txt");

    drop(manager);

    // After coordinator shutdown no further events are delivered.
    fs::write(dir.path().join("late.txt"), b"too late").unwrap();
    assert!(
        rx.recv_timeout(Duration::from_millis(300)).is_err(),
        "events must stop after the coordinator is dropped"
    );
}

#[test]
fn own_store_operations_are_visible_as_events() {
    init_logs();
    let dir = TempDir::new().unwrap();
    let (tx, rx) = mpsc::channel();

    let mut manager = StorageManager::new(
        dir.path(),
        &StaticIdentity::new("DeviceSN001"),
        Some(Arc::new(move |ev: &WatchedEvent| {
            let _ = tx.send(ev.clone());
        })),
    );

    manager.store("cfg", b"payload").unwrap();

    // The store's own writes go through the watched root; at least one event
    // for the record's file family must surface.
    let deadline = std::time::Instant::now() + EVENT_WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(ev) if ev.entry_name.starts_with("cfg.enc") => break,
            Ok(_) => continue,
            Err(_) => panic!("store produced no observable events"),
        }
    }
}

#[test]
fn sink_may_use_an_unrelated_store() {
    let watched = TempDir::new().unwrap();
    let side = TempDir::new().unwrap();
    let side_root = side.path().to_path_buf();
    let (tx, rx) = mpsc::channel();

    let manager = StorageManager::new(
        watched.path(),
        &StaticIdentity::new("DeviceSN001"),
        Some(Arc::new(move |ev: &WatchedEvent| {
            if ev.mask.contains(EventMask::CREATE) && ev.entry_name == "trigger" {
                // Blob store calls on an unrelated store are legal from the sink.
                let mut audit =
                    StorageManager::new(&side_root, &StaticIdentity::new("audit-dev"), None);
                let _ = audit.store("last-event", ev.entry_name.as_bytes());
                let _ = tx.send(());
            }
        })),
    );
    assert!(manager.watcher_active());

    fs::write(watched.path().join("trigger"), b"x").unwrap();
    rx.recv_timeout(EVENT_WAIT).expect("sink never ran");

    let audit = StorageManager::new(side.path(), &StaticIdentity::new("audit-dev"), None);
    assert_eq!(audit.retrieve("last-event").unwrap(), b"trigger");
}
