// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workfile persistence scenarios: save-as, identity, teardown.

use crate::prelude::*;
use serde_json::json;

#[tokio::test]
async fn save_as_writes_equal_graph_under_new_identity() {
    let server = TestServer::start().await;
    let store = server.store();
    let (a, _, _) = echo_chain(&store, EdgeType::Blocking);
    store.edit_wrapper("bash -c '{}'").unwrap();
    store.edit_status(wf_core::ElementKind::Node, a.as_str(), "ran").unwrap();

    server
        .post("client-connect", json!({ "workfile_path": server.workfile() }))
        .await;

    let new_path = server.workfile().with_file_name("copy.graphml");
    let (status, body) = server.post("save-as", json!({ "new_path": new_path })).await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["status"], "saved");

    // Semantic equality: nodes, edges, statuses and wrapper all carry over.
    let copy = GraphStore::graphml(&new_path).load().unwrap();
    assert_eq!(copy, server.graph());
    assert_eq!(copy.node(&a).unwrap().status, NodeStatus::Ran);
    assert_eq!(copy.wrapper, "bash -c '{}'");

    // The new identity is the deterministic hash of the new path.
    assert_eq!(
        body["new_workspace_id"],
        json!(WorkspaceId::for_path(&new_path))
    );
}

#[tokio::test]
async fn get_graph_strips_logs_but_node_log_endpoint_serves_them() {
    let server = TestServer::start().await;
    let store = server.store();
    let a = store.add_node("echo A", 0.0, 0.0, NodeStatus::Empty).unwrap();
    store
        .save_node_execution_data(
            &a,
            wf_core::ExecRecord {
                command: "echo A".into(),
                stdout: "A\n".into(),
                stderr: String::new(),
                pid: "11".into(),
                error_code: "0".into(),
            },
        )
        .unwrap();

    server
        .post("client-connect", json!({ "workfile_path": server.workfile() }))
        .await;

    let (_, graph) = server.get("get-graph").await;
    assert!(graph["nodes"][0].get("stdout").is_none());
    assert!(graph["nodes"][0].get("pid").is_none());
    assert_eq!(graph["graph"]["wrapper"], "{}");

    let (_, log) = server.get(&format!("get-node-log/{a}")).await;
    assert!(log["log"].as_str().unwrap().contains("STDOUT:\nA\n"));
}

#[tokio::test]
async fn delete_workspace_clears_cache_and_context() {
    let server = TestServer::start().await;
    server
        .post("client-connect", json!({ "workfile_path": server.workfile() }))
        .await;

    let ctx = server.registry.get(&server.workspace_id()).unwrap();
    // Force a sidecar into the cache dir.
    ctx.enqueue(
        wf_server::Mutation::EditWrapper { wrapper: "{}".into() },
        Some("sidecar-key".into()),
    );
    let cache_dir = ctx.cache_dir.clone();
    server.wait_for(|g| g.wrapper == "{}").await;
    assert!(cache_dir.join("sidecar-key.json").exists());

    let status = reqwest::Client::new()
        .delete(server.workspace_url())
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status.as_u16(), 200);
    assert!(server.registry.get(&server.workspace_id()).is_none());
    assert!(!cache_dir.exists());

    // The workfile itself survives workspace teardown.
    assert!(server.workfile().exists());
}

#[tokio::test]
async fn finished_statuses_persist_in_the_workfile() {
    let server = TestServer::start().await;
    let (a, b, c) = echo_chain(&server.store(), EdgeType::NonBlocking);
    server.execute(Vec::new()).await;

    // A fresh store handle (as another process would open) sees the
    // finished state, self-described in the workfile.
    let reopened = GraphStore::graphml(server.workfile()).load().unwrap();
    for node_id in [&a, &b, &c] {
        assert_eq!(reopened.node(node_id).unwrap().status, NodeStatus::Ran);
        assert!(reopened.node(node_id).unwrap().exec.is_some());
    }
}
