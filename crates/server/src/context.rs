// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace runtime state.
//!
//! A context exists while clients are attached to a workfile. It owns the
//! mutation queue feeding the single worker, the run bookkeeping tables,
//! the client registries and the event bus. HTTP handlers only enqueue;
//! the worker is the sole graph writer for the workspace.

use crate::bus::EventBus;
use crate::listener::channel::TransportEvent;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use wf_core::{
    ClientId, EdgeId, EdgeType, ElementKind, ExecRecord, NodeId, NodeStatus, RequestId, RunId,
    WorkspaceId,
};
use wf_storage::{GraphStore, NodePosition, StatusUpdate};

/// Bound on remembered idempotency keys; older keys may be re-processed.
pub const PROCESSED_REQUEST_CAP: usize = 1000;

/// A graph mutation queued for the worker.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Mutation {
    AddNode { label: String, x: f64, y: f64, status: NodeStatus },
    RemoveNode { node_id: NodeId },
    AddEdge { source: NodeId, target: NodeId, edge_type: EdgeType },
    RemoveEdge { source: NodeId, target: NodeId },
    EditEdgeType { source: NodeId, target: NodeId, edge_type: EdgeType },
    EditStatus { kind: ElementKind, element_id: String, value: String },
    EditStatuses { updates: Vec<StatusUpdate> },
    EditNodePosition { node_id: NodeId, x: f64, y: f64 },
    EditNodePositions { positions: Vec<NodePosition> },
    EditWrapper { wrapper: String },
    EditNodeLabel { node_id: NodeId, label: String },
    SaveNodeLog { node_id: NodeId, log: String },
    SaveNodeExecution { node_id: NodeId, record: ExecRecord },
    RemoveNodeLogs { node_ids: Vec<NodeId> },
}

/// Queue message; `Shutdown` is the sentinel that stops the worker.
#[derive(Debug)]
pub enum WorkerMsg {
    Apply(Mutation),
    Shutdown,
}

/// Result of an enqueue attempt, serialized straight into the 202 body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EnqueueOutcome {
    Queued {
        #[serde(skip_serializing_if = "Option::is_none")]
        idempotency_key: Option<String>,
    },
    Duplicate { idempotency_key: String },
}

/// Metadata for one active run.
#[derive(Debug, Clone)]
pub struct RunMeta {
    /// In-scope nodes; empty means "full pipeline" (no restriction).
    pub nodes: HashSet<NodeId>,
    pub subset_only: bool,
    pub created_at: DateTime<Utc>,
}

impl Default for RunMeta {
    fn default() -> Self {
        Self { nodes: HashSet::new(), subset_only: false, created_at: Utc::now() }
    }
}

/// Run bookkeeping tables, guarded together.
#[derive(Debug, Default)]
pub struct RunTable {
    pub active_runs: HashMap<RunId, RunMeta>,
    pub active_node_run: HashMap<NodeId, RunId>,
    pub edge_run_map: HashMap<EdgeId, RunId>,
}

impl RunTable {
    /// Scope and subset flag for a run; `(empty, false)` when unknown.
    pub fn scope_of(&self, run_id: Option<&RunId>) -> (HashSet<NodeId>, bool) {
        run_id
            .and_then(|id| self.active_runs.get(id))
            .map(|meta| (meta.nodes.clone(), meta.subset_only))
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.active_runs.clear();
        self.active_node_run.clear();
        self.edge_run_map.clear();
    }
}

/// A connected client as seen by the diagnostics endpoints.
#[derive(Debug, Clone)]
pub struct ClientMeta {
    pub connected_at: DateTime<Utc>,
    pub session_id: Option<String>,
}

/// Client registries plus the lifecycle counter.
#[derive(Debug, Default)]
pub struct ClientTable {
    /// The §3 client_count: number of attach/detach pairs outstanding.
    pub count: u32,
    pub gui: indexmap::IndexMap<ClientId, ClientMeta>,
    pub runner: indexmap::IndexMap<RunId, ClientMeta>,
}

/// Bounded FIFO of idempotency keys with set lookups.
#[derive(Debug, Default)]
struct ProcessedRequests {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl ProcessedRequests {
    /// Record a key; returns false when it was already present.
    fn insert(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        if self.order.len() == PROCESSED_REQUEST_CAP {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        self.order.push_back(key.to_string());
        self.seen.insert(key.to_string());
        true
    }
}

/// All state for one open workfile.
pub struct WorkspaceContext {
    pub workspace_id: WorkspaceId,
    pub workfile_path: PathBuf,
    pub cache_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub store: GraphStore,
    pub bus: EventBus,
    /// Fan-out channel for the workspace room (`ws:<workspace_id>`).
    pub room: broadcast::Sender<TransportEvent>,
    pub runs: Mutex<RunTable>,
    queue_tx: mpsc::UnboundedSender<WorkerMsg>,
    clients: Mutex<ClientTable>,
    processed: Mutex<ProcessedRequests>,
    pub(crate) worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkspaceContext {
    pub fn new(
        workspace_id: WorkspaceId,
        workfile_path: PathBuf,
        cache_dir: PathBuf,
        bus: EventBus,
        room: broadcast::Sender<TransportEvent>,
        queue_tx: mpsc::UnboundedSender<WorkerMsg>,
    ) -> Self {
        let store = GraphStore::graphml(&workfile_path);
        Self {
            workspace_id,
            workfile_path,
            cache_dir,
            created_at: Utc::now(),
            store,
            bus,
            room,
            runs: Mutex::new(RunTable::default()),
            queue_tx,
            clients: Mutex::new(ClientTable::default()),
            processed: Mutex::new(ProcessedRequests::default()),
            worker: Mutex::new(None),
        }
    }

    // -- queue --

    /// Queue a mutation, deduplicating on the idempotency key.
    pub fn enqueue(&self, mutation: Mutation, idempotency_key: Option<String>) -> EnqueueOutcome {
        if let Some(key) = idempotency_key.as_deref().filter(|k| !k.is_empty()) {
            // Mark before queueing so a racing duplicate cannot slip past.
            if !self.processed.lock().insert(key) {
                info!(workspace = %self.workspace_id, key, "skipping duplicate request");
                return EnqueueOutcome::Duplicate { idempotency_key: key.to_string() };
            }
        }

        self.cache_request(&mutation, idempotency_key.as_deref());

        if self.queue_tx.send(WorkerMsg::Apply(mutation)).is_err() {
            warn!(workspace = %self.workspace_id, "mutation queue closed; dropping request");
        }
        EnqueueOutcome::Queued { idempotency_key }
    }

    /// Record run bookkeeping for a status edit, then queue it.
    ///
    /// Setting a node to `run` claims it for the run; `running`/`ran`/
    /// `fail` adopt nodes the run does not know yet. Edge `to_run` edits
    /// remember the owning run so readiness checks can recover it.
    pub fn enqueue_status(
        &self,
        kind: ElementKind,
        element_id: &str,
        value: &str,
        run_id: Option<&RunId>,
    ) -> EnqueueOutcome {
        if let Some(run_id) = run_id {
            let mut runs = self.runs.lock();
            match kind {
                ElementKind::Node => {
                    let node_id = NodeId::from_string(element_id);
                    let RunTable { active_runs, active_node_run, .. } = &mut *runs;
                    let meta = active_runs.entry(run_id.clone()).or_default();
                    match value {
                        "run" => {
                            active_node_run.insert(node_id.clone(), run_id.clone());
                            meta.nodes.insert(node_id);
                        }
                        "running" | "ran" | "fail" => {
                            if !active_node_run.contains_key(&node_id) {
                                active_node_run.insert(node_id.clone(), run_id.clone());
                                meta.nodes.insert(node_id);
                            }
                        }
                        _ => {}
                    }
                }
                ElementKind::Edge => {
                    runs.edge_run_map.insert(EdgeId::from_string(element_id), run_id.clone());
                }
            }
        }

        self.enqueue(
            Mutation::EditStatus {
                kind,
                element_id: element_id.to_string(),
                value: value.to_string(),
            },
            None,
        )
    }

    /// Stop the worker once the queued mutations drain.
    pub fn shutdown_worker(&self) {
        let _ = self.queue_tx.send(WorkerMsg::Shutdown);
    }

    /// JSON sidecar of the request for crash diagnostics, best-effort.
    fn cache_request(&self, mutation: &Mutation, idempotency_key: Option<&str>) {
        let request_id = idempotency_key
            .map(|k| k.to_string())
            .unwrap_or_else(|| RequestId::new().to_string());
        let payload = json!({
            "request": mutation,
            "idempotency_key": idempotency_key,
        });
        let path = self.cache_dir.join(format!("{request_id}.json"));
        let write = std::fs::create_dir_all(&self.cache_dir)
            .and_then(|_| std::fs::write(&path, payload.to_string()));
        if let Err(e) = write {
            warn!(workspace = %self.workspace_id, "failed to cache request: {e}");
        }
    }

    // -- clients --

    /// Called when a client attaches.
    pub fn increment_clients(&self) -> u32 {
        let mut clients = self.clients.lock();
        clients.count += 1;
        clients.count
    }

    /// Called when a client detaches. Clamped at zero; going below zero
    /// is a double-disconnect anomaly and is logged, not raised.
    pub fn decrement_clients(&self) -> u32 {
        let mut clients = self.clients.lock();
        if clients.count == 0 {
            warn!(
                workspace = %self.workspace_id,
                "client count underflow: decrement at zero (double-disconnect)"
            );
            return 0;
        }
        clients.count -= 1;
        clients.count
    }

    pub fn client_count(&self) -> u32 {
        self.clients.lock().count
    }

    /// True when no clients remain and the context should be destroyed.
    pub fn should_destroy(&self) -> bool {
        self.clients.lock().count == 0
    }

    pub fn add_gui_client(&self, client_id: ClientId, session_id: Option<String>) {
        self.clients
            .lock()
            .gui
            .insert(client_id, ClientMeta { connected_at: Utc::now(), session_id });
    }

    pub fn remove_gui_client(&self, client_id: &ClientId) -> bool {
        self.clients.lock().gui.shift_remove(client_id).is_some()
    }

    pub fn add_runner_client(&self, run_id: RunId, session_id: Option<String>) {
        self.clients
            .lock()
            .runner
            .insert(run_id, ClientMeta { connected_at: Utc::now(), session_id });
    }

    pub fn remove_runner_client(&self, run_id: &RunId) -> bool {
        self.clients.lock().runner.shift_remove(run_id).is_some()
    }

    /// Snapshot of the client registries for the diagnostics endpoints.
    pub fn client_snapshot(&self) -> (Vec<(ClientId, ClientMeta)>, Vec<(RunId, ClientMeta)>) {
        let clients = self.clients.lock();
        (
            clients.gui.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            clients.runner.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        )
    }

    /// The only gui client, when exactly one gui and no runner is
    /// attached (disconnect fallback).
    pub fn sole_gui_client(&self) -> Option<ClientId> {
        let clients = self.clients.lock();
        if clients.gui.len() == 1 && clients.runner.is_empty() {
            clients.gui.keys().next().cloned()
        } else {
            None
        }
    }
}

/// Build a detached context plus its queue receiver (tests and registry).
pub(crate) fn build(
    workspace_id: WorkspaceId,
    workfile_path: PathBuf,
    cache_dir: PathBuf,
    event_log: Option<PathBuf>,
) -> (Arc<WorkspaceContext>, mpsc::UnboundedReceiver<WorkerMsg>) {
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let (room, _) = broadcast::channel(256);
    let ctx = Arc::new(WorkspaceContext::new(
        workspace_id,
        workfile_path,
        cache_dir,
        EventBus::new(event_log),
        room,
        queue_tx,
    ));
    (ctx, queue_rx)
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
