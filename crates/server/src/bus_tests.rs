// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wf_core::{NodeId, NodeStatus, RunId};

fn ready(node: &str) -> Event {
    Event::NodeReady {
        node_id: NodeId::from_string(node),
        label: format!("echo {node}"),
        run_id: Some(RunId::from_string("run-1")),
    }
}

#[test]
fn subscribers_fire_in_registration_order() {
    let bus = EventBus::new(None);
    let seen = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second", "third"] {
        let seen = Arc::clone(&seen);
        bus.subscribe(EventType::NodeReady, move |_| {
            seen.lock().push(tag);
            Ok(())
        });
    }

    bus.emit(&ready("node-a"));
    assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
}

#[test]
fn handlers_only_receive_their_type() {
    let bus = EventBus::new(None);
    let ready_hits = Arc::new(AtomicUsize::new(0));
    let complete_hits = Arc::new(AtomicUsize::new(0));

    {
        let hits = Arc::clone(&ready_hits);
        bus.subscribe(EventType::NodeReady, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    {
        let hits = Arc::clone(&complete_hits);
        bus.subscribe(EventType::RunComplete, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    bus.emit(&ready("node-a"));
    bus.emit(&Event::RunComplete { run_id: RunId::from_string("run-1") });

    assert_eq!(ready_hits.load(Ordering::SeqCst), 1);
    assert_eq!(complete_hits.load(Ordering::SeqCst), 1);
}

#[test]
fn failing_handler_does_not_stop_later_ones() {
    let bus = EventBus::new(None);
    let hits = Arc::new(AtomicUsize::new(0));

    bus.subscribe(EventType::NodeReady, |_| Err(BusError("boom".into())));
    {
        let hits = Arc::clone(&hits);
        bus.subscribe(EventType::NodeReady, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    bus.emit(&ready("node-a"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn events_append_to_log_as_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.log");
    let bus = EventBus::new(Some(path.clone()));

    bus.emit(&ready("node-a"));
    bus.emit(&Event::NodeFinished {
        node_id: NodeId::from_string("node-a"),
        status: NodeStatus::Ran,
        run_id: None,
    });

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["type"], "NODE_READY");
    assert_eq!(first["payload"]["node_id"], "node-a");
    assert!(first["timestamp"].is_string());
}

#[test]
fn log_rotates_at_cap_to_smallest_free_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.log");
    let bus = EventBus::with_log_cap(Some(path.clone()), 64);

    for _ in 0..12 {
        bus.emit(&ready("node-with-a-long-name"));
    }

    assert!(path.exists());
    assert!(PathBuf::from(format!("{}.1", path.display())).exists());
    assert!(PathBuf::from(format!("{}.2", path.display())).exists());
}

#[test]
fn rotation_skips_taken_suffixes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.log");
    std::fs::write(format!("{}.1", path.display()), b"older rotation\n").unwrap();

    let bus = EventBus::with_log_cap(Some(path.clone()), 1);
    bus.emit(&ready("node-a"));
    bus.emit(&ready("node-b"));

    // The pre-existing .1 is untouched; the new rotation landed on .2.
    assert_eq!(
        std::fs::read_to_string(format!("{}.1", path.display())).unwrap(),
        "older rotation\n"
    );
    assert!(PathBuf::from(format!("{}.2", path.display())).exists());
}

#[test]
fn no_log_configured_is_pub_sub_only() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(None);
    bus.emit(&ready("node-a"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn clear_subscribers_empties_registry() {
    let bus = EventBus::new(None);
    bus.subscribe(EventType::NodeReady, |_| Ok(()));
    assert_eq!(bus.subscriber_count(EventType::NodeReady), 1);
    bus.clear_subscribers();
    assert_eq!(bus.subscriber_count(EventType::NodeReady), 0);
}
