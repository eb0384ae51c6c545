// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use wf_core::WorkspaceId;

fn ctx_in(dir: &tempfile::TempDir) -> Arc<WorkspaceContext> {
    let path = dir.path().join("wf.graphml");
    let (ctx, _rx) = crate::context::build(
        WorkspaceId::for_path(&path),
        path,
        dir.path().join("cache"),
        None,
    );
    ctx
}

#[test]
fn lighten_strips_heavy_attributes_and_graph_meta() {
    let data = json!({
        "nodes": [{
            "id": "node-a", "label": "echo A", "x": 0.0, "y": 0.0, "status": "ran",
            "command": "echo A", "stdout": "A\n", "stderr": "", "pid": "42",
            "error_code": "0", "log": "legacy"
        }],
        "links": [],
        "graph": { "wrapper": "bash -c '{}'" },
    });

    let light = lighten(&data);
    let node = &light["nodes"][0];
    assert_eq!(node["label"], "echo A");
    for heavy in ["command", "stdout", "stderr", "pid", "error_code", "log"] {
        assert!(node.get(heavy).is_none(), "{heavy} survived");
    }
    assert_eq!(light["graph"], json!({}));
}

#[test]
fn transport_event_serializes_with_event_tag() {
    let event = TransportEvent::NodeReady {
        node_id: NodeId::from_string("node-a"),
        label: "echo A".into(),
        run_id: Some(RunId::from_string("run-1")),
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["event"], "node_ready");
    assert_eq!(value["node_id"], "node-a");

    let complete = TransportEvent::RunComplete { run_id: RunId::from_string("run-1") };
    assert_eq!(serde_json::to_value(&complete).unwrap()["event"], "run_complete");
}

#[test]
fn audience_rules() {
    let run = RunId::from_string("run-1");
    let other = RunId::from_string("run-2");
    let graph = TransportEvent::GraphUpdate { data: json!({}) };
    let ready = TransportEvent::NodeReady {
        node_id: NodeId::from_string("node-a"),
        label: String::new(),
        run_id: Some(run.clone()),
    };
    let complete = TransportEvent::RunComplete { run_id: run.clone() };

    assert!(graph.delivers_to(ClientKind::Gui, None));
    assert!(graph.delivers_to(ClientKind::Runner, None));

    assert!(!ready.delivers_to(ClientKind::Gui, None));
    assert!(ready.delivers_to(ClientKind::Runner, None));

    assert!(!complete.delivers_to(ClientKind::Gui, Some(&run)));
    assert!(complete.delivers_to(ClientKind::Runner, Some(&run)));
    assert!(!complete.delivers_to(ClientKind::Runner, Some(&other)));
    // A runner that has not learned its run id yet still hears it.
    assert!(complete.delivers_to(ClientKind::Runner, None));
}

#[test]
fn bus_events_reach_the_room_translated() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx_in(&dir);
    register_event_handlers(&ctx);
    let mut room_rx = ctx.room.subscribe();

    ctx.bus.emit(&Event::NodeReady {
        node_id: NodeId::from_string("node-a"),
        label: "echo A".into(),
        run_id: None,
    });
    match room_rx.try_recv().unwrap() {
        TransportEvent::NodeReady { node_id, .. } => assert_eq!(node_id.as_str(), "node-a"),
        other => panic!("unexpected transport event: {other:?}"),
    }

    ctx.bus.emit(&Event::NodeFailed {
        node_id: NodeId::from_string("node-a"),
        status: NodeStatus::Fail,
        run_id: None,
    });
    match room_rx.try_recv().unwrap() {
        TransportEvent::StatusChange { status, .. } => assert_eq!(status, NodeStatus::Fail),
        other => panic!("unexpected transport event: {other:?}"),
    }
}

#[test]
fn graph_update_is_lightened_for_transport() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx_in(&dir);
    register_event_handlers(&ctx);
    let mut room_rx = ctx.room.subscribe();

    ctx.bus.emit(&Event::GraphUpdated {
        data: json!({
            "nodes": [{ "id": "node-a", "stdout": "big" }],
            "links": [],
            "graph": { "wrapper": "{}" },
        }),
    });

    match room_rx.try_recv().unwrap() {
        TransportEvent::GraphUpdate { data } => {
            assert!(data["nodes"][0].get("stdout").is_none());
        }
        other => panic!("unexpected transport event: {other:?}"),
    }
}
