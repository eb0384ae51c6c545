// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for scenario specs.

#![allow(dead_code)]

pub use std::time::Duration;
pub use wf_core::{EdgeStatus, EdgeType, NodeId, NodeStatus, WorkGraph, WorkspaceId};
pub use wf_storage::GraphStore;

use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use wf_server::{router, AppState, BindInfo, ServerRegistry};

/// A live server bound to an OS-assigned loopback port.
pub struct TestServer {
    pub base_url: String,
    pub registry: Arc<ServerRegistry>,
    http: reqwest::Client,
    dir: tempfile::TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let registry = ServerRegistry::new(dir.path().join("cache"), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = AppState {
            registry: Arc::clone(&registry),
            bind: BindInfo { host: "127.0.0.1".into(), port },
        };
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router(state)).await {
                eprintln!("test server exited: {e}");
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            registry,
            http: reqwest::Client::new(),
            dir,
        }
    }

    pub fn workfile(&self) -> PathBuf {
        self.dir.path().join("wf.graphml")
    }

    pub fn store(&self) -> GraphStore {
        GraphStore::graphml(self.workfile())
    }

    pub fn workspace_id(&self) -> WorkspaceId {
        WorkspaceId::for_path(&self.workfile())
    }

    pub fn workspace_url(&self) -> String {
        format!("{}/workspace/{}", self.base_url, self.workspace_id())
    }

    pub async fn post(&self, endpoint: &str, body: Value) -> (u16, Value) {
        let response = self
            .http
            .post(format!("{}/{endpoint}", self.workspace_url()))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, endpoint: &str) -> (u16, Value) {
        let response = self
            .http
            .get(format!("{}/{endpoint}", self.workspace_url()))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    /// Run the real runner client against this server to completion.
    pub async fn execute(&self, selected: Vec<String>) {
        let mut runner =
            wf_runner::RunnerClient::new(self.base_url.clone(), self.workfile());
        tokio::time::timeout(Duration::from_secs(20), runner.run(selected))
            .await
            .expect("run did not complete in time")
            .expect("runner failed");
    }

    pub fn graph(&self) -> WorkGraph {
        self.store().load().unwrap()
    }

    pub async fn wait_for(&self, check: impl Fn(&WorkGraph) -> bool) {
        for _ in 0..600 {
            if check(&self.graph()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("graph never reached expected state");
    }
}

/// Three-node helper: labels echo their own name.
pub fn echo_chain(store: &GraphStore, edge_type: EdgeType) -> (NodeId, NodeId, NodeId) {
    let a = store.add_node("echo A", 0.0, 0.0, NodeStatus::Empty).unwrap();
    let b = store.add_node("echo B", 0.0, 100.0, NodeStatus::Empty).unwrap();
    let c = store.add_node("echo C", 0.0, 200.0, NodeStatus::Empty).unwrap();
    store.add_edge(&a, &b, edge_type).unwrap();
    store.add_edge(&b, &c, edge_type).unwrap();
    (a, b, c)
}
