// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The mutation worker: single consumer of a workspace's queue.
//!
//! Exactly one worker task runs per workspace and it is the only writer
//! to the workspace's graph file, which is what makes load-modify-save
//! safe without file locks. After each applied mutation it re-reads the
//! graph, emits `GRAPH_UPDATED`, runs the scheduler reactions for status
//! edits, and kicks off a run-completion scan once the queue is empty.

use crate::context::{Mutation, WorkerMsg, WorkspaceContext};
use crate::scheduler;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use wf_core::Event;
use wf_storage::{GraphStore, StatusApplied, StoreError};

/// Spawn the worker task for a context.
pub fn spawn(
    ctx: Arc<WorkspaceContext>,
    queue_rx: mpsc::UnboundedReceiver<WorkerMsg>,
) -> JoinHandle<()> {
    tokio::spawn(run(ctx, queue_rx))
}

async fn run(ctx: Arc<WorkspaceContext>, mut queue_rx: mpsc::UnboundedReceiver<WorkerMsg>) {
    info!(workspace = %ctx.workspace_id, "mutation worker started");
    while let Some(msg) = queue_rx.recv().await {
        let mutation = match msg {
            WorkerMsg::Shutdown => break,
            WorkerMsg::Apply(mutation) => mutation,
        };

        match apply(&ctx.store, &mutation) {
            Ok(applied) => broadcast_and_react(&ctx, applied),
            Err(e) => {
                // The mutation is dropped; the next successful one
                // restores a consistent on-disk state.
                warn!(
                    workspace = %ctx.workspace_id,
                    operation = mutation_name(&mutation),
                    "mutation failed: {e}"
                );
            }
        }

        if queue_rx.is_empty() {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move { scheduler::completion_scan(&ctx) });
        }
    }
    info!(workspace = %ctx.workspace_id, "mutation worker stopped");
}

/// Reload the just-written graph, emit `GRAPH_UPDATED`, then fire the
/// scheduler reactions for a status edit.
fn broadcast_and_react(ctx: &WorkspaceContext, applied: Option<StatusApplied>) {
    let mut graph = match ctx.store.load() {
        Ok(graph) => graph,
        Err(e) => {
            warn!(workspace = %ctx.workspace_id, "failed to reload graph after mutation: {e}");
            return;
        }
    };
    ctx.bus.emit(&Event::GraphUpdated { data: graph.node_link() });
    if let Some(applied) = applied {
        scheduler::react(ctx, &mut graph, &applied);
    }
}

fn apply(store: &GraphStore, mutation: &Mutation) -> Result<Option<StatusApplied>, StoreError> {
    match mutation {
        Mutation::AddNode { label, x, y, status } => {
            store.add_node(label, *x, *y, *status)?;
            Ok(None)
        }
        Mutation::RemoveNode { node_id } => {
            store.remove_node(node_id)?;
            Ok(None)
        }
        Mutation::AddEdge { source, target, edge_type } => {
            store.add_edge(source, target, *edge_type)?;
            Ok(None)
        }
        Mutation::RemoveEdge { source, target } => {
            store.remove_edge(source, target)?;
            Ok(None)
        }
        Mutation::EditEdgeType { source, target, edge_type } => {
            store.edit_edge_type(source, target, *edge_type)?;
            Ok(None)
        }
        Mutation::EditStatus { kind, element_id, value } => {
            store.edit_status(*kind, element_id, value).map(Some)
        }
        Mutation::EditStatuses { updates } => {
            store.edit_statuses(updates)?;
            Ok(None)
        }
        Mutation::EditNodePosition { node_id, x, y } => {
            store.edit_node_position(node_id, *x, *y)?;
            Ok(None)
        }
        Mutation::EditNodePositions { positions } => {
            let (updated, missing) = store.edit_node_positions(positions)?;
            if !missing.is_empty() {
                warn!(updated, missing = missing.len(), "position batch had unknown nodes");
            }
            Ok(None)
        }
        Mutation::EditWrapper { wrapper } => {
            store.edit_wrapper(wrapper)?;
            Ok(None)
        }
        Mutation::EditNodeLabel { node_id, label } => {
            store.edit_node_label(node_id, label)?;
            Ok(None)
        }
        Mutation::SaveNodeLog { node_id, log } => {
            store.save_node_log(node_id, log)?;
            Ok(None)
        }
        Mutation::SaveNodeExecution { node_id, record } => {
            store.save_node_execution_data(node_id, record.clone())?;
            Ok(None)
        }
        Mutation::RemoveNodeLogs { node_ids } => {
            store.remove_node_logs(node_ids)?;
            Ok(None)
        }
    }
}

fn mutation_name(mutation: &Mutation) -> &'static str {
    match mutation {
        Mutation::AddNode { .. } => "add_node",
        Mutation::RemoveNode { .. } => "remove_node",
        Mutation::AddEdge { .. } => "add_edge",
        Mutation::RemoveEdge { .. } => "remove_edge",
        Mutation::EditEdgeType { .. } => "edit_edge_type",
        Mutation::EditStatus { .. } => "edit_status",
        Mutation::EditStatuses { .. } => "edit_statuses",
        Mutation::EditNodePosition { .. } => "edit_node_position",
        Mutation::EditNodePositions { .. } => "edit_node_positions",
        Mutation::EditWrapper { .. } => "edit_wrapper",
        Mutation::EditNodeLabel { .. } => "edit_node_label",
        Mutation::SaveNodeLog { .. } => "save_node_log",
        Mutation::SaveNodeExecution { .. } => "save_node_execution",
        Mutation::RemoveNodeLogs { .. } => "remove_node_logs",
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
