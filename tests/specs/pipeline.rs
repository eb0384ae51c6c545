// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution scenarios: chains, gates, subsets, failures.

use crate::prelude::*;

#[tokio::test]
async fn linear_blocking_chain_completes() {
    let server = TestServer::start().await;
    let (a, b, c) = echo_chain(&server.store(), EdgeType::Blocking);

    server.execute(Vec::new()).await;

    let graph = server.graph();
    for node_id in [&a, &b, &c] {
        let node = graph.node(node_id).unwrap();
        assert_eq!(node.status, NodeStatus::Ran, "{} did not finish", node.label);
        let exec = node.exec.as_ref().expect("execution record missing");
        assert_eq!(exec.error_code, "0");
        assert!(!exec.pid.is_empty());
    }
    assert_eq!(graph.node(&a).unwrap().exec.as_ref().unwrap().stdout, "A\n");
    assert_eq!(graph.node(&c).unwrap().exec.as_ref().unwrap().stdout, "C\n");

    // The run was torn down after RUN_COMPLETE.
    let ctx = server.registry.get(&server.workspace_id()).unwrap();
    assert!(ctx.runs.lock().active_runs.is_empty());
}

#[tokio::test]
async fn non_blocking_edge_triggers_downstream() {
    let server = TestServer::start().await;
    let store = server.store();
    let a = store.add_node("echo A", 0.0, 0.0, NodeStatus::Empty).unwrap();
    let b = store.add_node("echo B", 0.0, 100.0, NodeStatus::Empty).unwrap();
    store.add_edge(&a, &b, EdgeType::NonBlocking).unwrap();

    server.execute(Vec::new()).await;

    let graph = server.graph();
    assert_eq!(graph.node(&a).unwrap().status, NodeStatus::Ran);
    assert_eq!(graph.node(&b).unwrap().status, NodeStatus::Ran);
}

#[tokio::test]
async fn blocking_gate_waits_for_both_parents() {
    let server = TestServer::start().await;
    let store = server.store();
    let a = store.add_node("echo A", 0.0, 0.0, NodeStatus::Empty).unwrap();
    let b = store.add_node("echo B", 100.0, 0.0, NodeStatus::Empty).unwrap();
    let c = store.add_node("echo C", 50.0, 100.0, NodeStatus::Empty).unwrap();
    store.add_edge(&a, &c, EdgeType::Blocking).unwrap();
    store.add_edge(&b, &c, EdgeType::Blocking).unwrap();

    server.execute(Vec::new()).await;

    let graph = server.graph();
    for node_id in [&a, &b, &c] {
        assert_eq!(graph.node(node_id).unwrap().status, NodeStatus::Ran);
    }
    // C ran exactly once, after both parents.
    assert_eq!(graph.node(&c).unwrap().exec.as_ref().unwrap().stdout, "C\n");
}

#[tokio::test]
async fn subset_run_leaves_outside_nodes_untouched() {
    let server = TestServer::start().await;
    let store = server.store();
    let a = store.add_node("echo A", 0.0, 0.0, NodeStatus::Empty).unwrap();
    let b = store.add_node("echo B", 0.0, 100.0, NodeStatus::Empty).unwrap();
    store.add_edge(&a, &b, EdgeType::NonBlocking).unwrap();

    server.execute(vec![a.to_string()]).await;

    let graph = server.graph();
    assert_eq!(graph.node(&a).unwrap().status, NodeStatus::Ran);
    assert_eq!(graph.node(&b).unwrap().status, NodeStatus::Empty);
    assert!(graph.node(&b).unwrap().exec.is_none());
}

#[tokio::test]
async fn failing_node_blocks_downstream_and_records_exit_code() {
    let server = TestServer::start().await;
    let store = server.store();
    let a = store.add_node("exit 3", 0.0, 0.0, NodeStatus::Empty).unwrap();
    let b = store.add_node("echo B", 0.0, 100.0, NodeStatus::Empty).unwrap();
    store.add_edge(&a, &b, EdgeType::Blocking).unwrap();

    server.execute(Vec::new()).await;

    let graph = server.graph();
    let failed = graph.node(&a).unwrap();
    assert_eq!(failed.status, NodeStatus::Fail);
    assert_eq!(failed.exec.as_ref().unwrap().error_code, "3");
    // Failure poisons the downstream cone.
    assert_eq!(graph.node(&b).unwrap().status, NodeStatus::Empty);
}

#[tokio::test]
async fn second_run_resumes_from_failed_node() {
    let server = TestServer::start().await;
    let store = server.store();
    let marker = server.workfile().with_file_name("marker");
    // Fails until the marker file exists.
    let a = store
        .add_node(&format!("test -f {}", marker.display()), 0.0, 0.0, NodeStatus::Empty)
        .unwrap();

    server.execute(Vec::new()).await;
    assert_eq!(server.graph().node(&a).unwrap().status, NodeStatus::Fail);

    std::fs::write(&marker, b"").unwrap();
    server.execute(Vec::new()).await;
    assert_eq!(server.graph().node(&a).unwrap().status, NodeStatus::Ran);
}

#[tokio::test]
async fn wrapper_is_applied_to_labels() {
    let server = TestServer::start().await;
    let store = server.store();
    let a = store.add_node("echo wrapped", 0.0, 0.0, NodeStatus::Empty).unwrap();
    store.edit_wrapper("sh -c '{}'").unwrap();

    server.execute(Vec::new()).await;

    let exec = server.graph().node(&a).unwrap().exec.clone().unwrap();
    assert_eq!(exec.command, "sh -c 'echo wrapped'");
    assert_eq!(exec.stdout, "wrapped\n");
}

#[tokio::test]
async fn stdout_and_stderr_are_captured_separately() {
    let server = TestServer::start().await;
    let store = server.store();
    let a = store
        .add_node("echo out; echo err >&2", 0.0, 0.0, NodeStatus::Empty)
        .unwrap();

    server.execute(Vec::new()).await;

    let exec = server.graph().node(&a).unwrap().exec.clone().unwrap();
    assert_eq!(exec.stdout, "out\n");
    assert_eq!(exec.stderr, "err\n");

    let (status, body) =
        server.get(&format!("get-node-log/{a}")).await;
    assert_eq!(status, 200);
    let log = body["log"].as_str().unwrap();
    assert!(log.contains("STDOUT:\nout\n"));
    assert!(log.contains("STDERR:\nerr\n"));
}
