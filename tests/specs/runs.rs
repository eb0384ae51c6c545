// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run admission and workspace diagnostics over the HTTP surface.

use crate::prelude::*;
use serde_json::json;

#[tokio::test]
async fn cyclic_blocking_graph_is_rejected() {
    let server = TestServer::start().await;
    let store = server.store();
    let x = store.add_node("echo X", 0.0, 0.0, NodeStatus::Empty).unwrap();
    let y = store.add_node("echo Y", 0.0, 100.0, NodeStatus::Empty).unwrap();
    store.add_edge(&x, &y, EdgeType::Blocking).unwrap();
    store.add_edge(&y, &x, EdgeType::Blocking).unwrap();

    // Attach the workspace, then ask for a run.
    let (status, _) = server
        .post("client-connect", json!({ "workfile_path": server.workfile() }))
        .await;
    assert_eq!(status, 200);

    let (status, body) = server.post("run", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Run blocked: blocking edges contain a cycle");

    // Nothing moved.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.graph().nodes().all(|n| n.status == NodeStatus::Empty));
}

#[tokio::test]
async fn non_blocking_cycles_are_allowed_to_start() {
    let server = TestServer::start().await;
    let store = server.store();
    let x = store.add_node("echo X", 0.0, 0.0, NodeStatus::Empty).unwrap();
    let y = store.add_node("echo Y", 0.0, 100.0, NodeStatus::Empty).unwrap();
    store.add_edge(&x, &y, EdgeType::Blocking).unwrap();
    store.add_edge(&y, &x, EdgeType::NonBlocking).unwrap();

    server
        .post("client-connect", json!({ "workfile_path": server.workfile() }))
        .await;
    let (status, body) = server.post("run", json!({})).await;
    assert_eq!(status, 202, "{body}");
}

#[tokio::test]
async fn runs_endpoint_tracks_active_run() {
    let server = TestServer::start().await;
    let store = server.store();
    // A node that blocks long enough to observe the run in flight.
    store.add_node("sleep 5", 0.0, 0.0, NodeStatus::Empty).unwrap();

    server
        .post("client-connect", json!({ "workfile_path": server.workfile() }))
        .await;
    let (status, body) = server.post("run", json!({})).await;
    assert_eq!(status, 202);
    let run_id = body["run_id"].as_str().unwrap().to_string();

    server.wait_for(|g| g.nodes().any(|n| n.status == NodeStatus::Run)).await;

    let (status, body) = server.get("runs").await;
    assert_eq!(status, 200);
    let runs = body["runs"].as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["run_id"], run_id.as_str());
    assert_eq!(runs[0]["subset_only"], false);
}

#[tokio::test]
async fn stop_fails_running_nodes_and_halts_propagation() {
    let server = TestServer::start().await;
    let store = server.store();
    let a = store.add_node("sleep 30", 0.0, 0.0, NodeStatus::Empty).unwrap();
    let b = store.add_node("echo B", 0.0, 100.0, NodeStatus::Empty).unwrap();
    store.add_edge(&a, &b, EdgeType::Blocking).unwrap();

    // Start through a detached runner task; it exits when the stop
    // completes the run.
    let runner_server = server.base_url.clone();
    let workfile = server.workfile();
    let runner = tokio::spawn(async move {
        let mut client = wf_runner::RunnerClient::new(runner_server, workfile);
        let _ = client.run(Vec::new()).await;
    });

    server.wait_for(|g| g.node(&a).map(|n| n.status) == Some(NodeStatus::Running)).await;

    let (status, body) = server.post("stop", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["stopped_nodes"][0], json!(a));
    assert_eq!(body["killed"], 1);

    server.wait_for(|g| g.node(&a).map(|n| n.status) == Some(NodeStatus::Fail)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.graph().node(&b).unwrap().status, NodeStatus::Empty);

    tokio::time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("runner did not exit after stop")
        .unwrap();
}

#[tokio::test]
async fn workspaces_endpoint_reflects_attachment() {
    let server = TestServer::start().await;
    server.store().load().unwrap();

    let before: serde_json::Value = reqwest::get(format!("{}/workspaces", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(before["workspaces"].as_array().unwrap().len(), 0);

    server
        .post("client-connect", json!({ "workfile_path": server.workfile() }))
        .await;

    let after: serde_json::Value = reqwest::get(format!("{}/workspaces", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let workspaces = after["workspaces"].as_array().unwrap();
    assert_eq!(workspaces.len(), 1);
    assert_eq!(workspaces[0]["workspace_id"], json!(server.workspace_id()));
}

#[tokio::test]
async fn same_path_reuses_workspace_identity() {
    let server = TestServer::start().await;
    server.store().load().unwrap();

    let register = |_: u32| async {
        reqwest::Client::new()
            .post(format!("{}/workspace/register", server.base_url))
            .json(&json!({ "path": server.workfile() }))
            .send()
            .await
            .unwrap()
            .json::<serde_json::Value>()
            .await
            .unwrap()
    };

    let first = register(1).await;
    let second = register(2).await;
    assert_eq!(first["workspace_id"], second["workspace_id"]);
    assert_eq!(first["workspace_id"], json!(server.workspace_id()));
}
