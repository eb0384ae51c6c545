// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! wf-runner: headless execution client.
//!
//! A runner attaches to a workspace, starts a run, and joins the event
//! channel as a runner. Each `node_ready` spawns the node's command
//! through the shell; the execution record and terminal status are
//! reported back through the HTTP surface, which feeds the scheduler.
//! The runner detaches when the server signals `run_complete` for its
//! run.

pub mod exec;

use futures_util::StreamExt;
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("event channel error: {0}")]
    Channel(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// One runner attached to one workspace.
pub struct RunnerClient {
    http: reqwest::Client,
    server_url: String,
    workfile_path: PathBuf,
    workspace_url: String,
    workspace_id: String,
    run_id: Option<String>,
}

impl RunnerClient {
    pub fn new(server_url: impl Into<String>, workfile_path: PathBuf) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
            workfile_path,
            workspace_url: String::new(),
            workspace_id: String::new(),
            run_id: None,
        }
    }

    /// Register, start a run (optionally a subset), and execute
    /// `node_ready` events until the run completes.
    ///
    /// The event channel is joined before `/run` so the first
    /// `node_ready` cannot race past us.
    pub async fn run(&mut self, selected: Vec<String>) -> Result<(), RunnerError> {
        self.register().await?;
        self.post_workspace("client-connect", json!({
            "workfile_path": self.workfile_path,
            "client_type": "runner",
        }))
        .await?;

        let channel_url = format!(
            "{}/workspace/{}/events?client_type=runner",
            self.server_url.replacen("http", "ws", 1),
            self.workspace_id,
        );
        let (socket, _) = tokio_tungstenite::connect_async(channel_url).await?;
        info!("joined room ws:{}", self.workspace_id);

        let response =
            self.post_workspace("run", json!({ "nodes": selected })).await?;
        let Some(run_id) = response["run_id"].as_str().map(str::to_string) else {
            return Err(RunnerError::Server(format!("no run_id in response: {response}")));
        };
        if response["status"] == "no nodes to start" {
            info!("nothing to start");
            self.disconnect(&run_id).await;
            return Ok(());
        }
        self.run_id = Some(run_id.clone());
        info!(run = %run_id, "run started");

        let result = self.pump_events(socket, &run_id).await;
        self.disconnect(&run_id).await;
        result
    }

    async fn register(&mut self) -> Result<(), RunnerError> {
        let response = self
            .http
            .post(format!("{}/workspace/register", self.server_url))
            .json(&json!({ "path": self.workfile_path }))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        self.workspace_id = response["workspace_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RunnerError::Server("register returned no workspace_id".into()))?;
        self.workspace_url = response["url"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("{}/workspace/{}", self.server_url, self.workspace_id)
            });
        info!(workspace = %self.workspace_id, "registered");
        Ok(())
    }

    /// Read the event channel until `run_complete` for our run.
    async fn pump_events<S>(&self, socket: S, run_id: &str) -> Result<(), RunnerError>
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        let mut stream = socket;

        while let Some(message) = stream.next().await {
            let message = message?;
            let Message::Text(text) = message else { continue };
            let Ok(event) = serde_json::from_str::<Value>(&text) else {
                warn!(text = %text, "undecodable channel event");
                continue;
            };
            match event["event"].as_str() {
                Some("node_ready") => {
                    let event_run = event["run_id"].as_str();
                    if event_run.is_some_and(|r| r != run_id) {
                        debug!("ignoring node_ready for another run");
                        continue;
                    }
                    let (Some(node_id), Some(label)) =
                        (event["node_id"].as_str(), event["label"].as_str())
                    else {
                        warn!(%event, "invalid node_ready event");
                        continue;
                    };
                    self.spawn_execution(node_id.to_string(), label.to_string());
                }
                Some("run_complete") => {
                    if event["run_id"].as_str() == Some(run_id) {
                        info!(run = %run_id, "server signaled run completion");
                        break;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Execute one node off the event loop so later `node_ready` events
    /// are not starved by a long-running command.
    fn spawn_execution(&self, node_id: String, label: String) {
        let worker = ExecutionHandle {
            http: self.http.clone(),
            workspace_url: self.workspace_url.clone(),
            run_id: self.run_id.clone(),
        };
        tokio::spawn(async move {
            worker.execute_node(&node_id, &label).await;
        });
    }

    async fn disconnect(&self, run_id: &str) {
        let result = self
            .post_workspace(
                "client-disconnect",
                json!({ "client_type": "runner", "client_id": run_id }),
            )
            .await;
        match result {
            Ok(_) => info!("notified server of disconnect"),
            Err(e) => error!("failed to notify server of disconnect: {e}"),
        }
    }

    async fn post_workspace(&self, endpoint: &str, body: Value) -> Result<Value, RunnerError> {
        let base = if self.workspace_url.is_empty() {
            format!("{}/workspace/{}", self.server_url, self.workspace_id)
        } else {
            self.workspace_url.clone()
        };
        Ok(self
            .http
            .post(format!("{base}/{endpoint}"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?)
    }
}

/// The per-node execution worker: reports `running`, runs the command
/// under the graph's wrapper, then reports the record and the terminal
/// status.
struct ExecutionHandle {
    http: reqwest::Client,
    workspace_url: String,
    run_id: Option<String>,
}

impl ExecutionHandle {
    async fn execute_node(&self, node_id: &str, label: &str) {
        info!(node = node_id, "executing node");
        let wrapper = self.fetch_wrapper().await;

        let running = match exec::spawn(&wrapper, label) {
            Ok(exec::Spawned::Running(running)) => running,
            Ok(exec::Spawned::Empty(outcome)) => {
                self.report(node_id, &outcome).await;
                self.set_status(node_id, "ran").await;
                return;
            }
            Err(e) => {
                error!(node = node_id, "spawn failed: {e}");
                self.save_record(node_id, label, "", &format!("[Runner internal error]\n{e}"), "", "")
                    .await;
                self.set_status(node_id, "fail").await;
                return;
            }
        };

        // Put the pid on file before reporting `running` so a stop
        // request always has something to kill.
        self.save_record(node_id, running.command(), "", "", running.pid(), "").await;
        self.set_status(node_id, "running").await;

        match running.wait().await {
            Ok(outcome) => {
                self.report(node_id, &outcome).await;
                if outcome.succeeded() {
                    info!(node = node_id, "node completed");
                    self.set_status(node_id, "ran").await;
                } else {
                    warn!(node = node_id, code = outcome.exit_code, "node failed");
                    self.set_status(node_id, "fail").await;
                }
            }
            Err(e) => {
                error!(node = node_id, "wait failed: {e}");
                self.save_record(node_id, label, "", &format!("[Runner internal error]\n{e}"), "", "")
                    .await;
                self.set_status(node_id, "fail").await;
            }
        }
    }

    async fn report(&self, node_id: &str, outcome: &exec::ExecOutcome) {
        self.save_record(
            node_id,
            &outcome.command,
            &outcome.stdout,
            &outcome.stderr,
            &outcome.pid,
            &outcome.exit_code.to_string(),
        )
        .await;
    }

    /// The wrapper can change between executions; read it fresh.
    async fn fetch_wrapper(&self) -> String {
        let graph = self
            .http
            .get(format!("{}/get-graph", self.workspace_url))
            .send()
            .await
            .ok();
        let Some(response) = graph else { return wf_core::graph::DEFAULT_WRAPPER.into() };
        response
            .json::<Value>()
            .await
            .ok()
            .and_then(|data| data["graph"]["wrapper"].as_str().map(str::to_string))
            .unwrap_or_else(|| wf_core::graph::DEFAULT_WRAPPER.into())
    }

    async fn set_status(&self, node_id: &str, value: &str) {
        let mut payload = json!({
            "element_type": "node",
            "element_id": node_id,
            "value": value,
        });
        if let (Some(obj), Some(run_id)) = (payload.as_object_mut(), &self.run_id) {
            obj.insert("run_id".into(), json!(run_id));
        }
        if let Err(e) = self.post("edit-status", payload).await {
            error!(node = node_id, "failed to set status {value}: {e}");
        }
    }

    async fn save_record(
        &self,
        node_id: &str,
        command: &str,
        stdout: &str,
        stderr: &str,
        pid: &str,
        error_code: &str,
    ) {
        let payload = json!({
            "node_id": node_id,
            "command": command,
            "stdout": stdout,
            "stderr": stderr,
            "pid": pid,
            "error_code": error_code,
        });
        if let Err(e) = self.post("save-node-log", payload).await {
            error!(node = node_id, "failed to send execution record: {e}");
        }
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<(), RunnerError> {
        self.http
            .post(format!("{}/{endpoint}", self.workspace_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
