// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reactive scheduling rules.
//!
//! The scheduler runs inside the mutation worker as reactions to status
//! transitions. Nodes completing mark their outgoing edges `to_run`;
//! edges reaching `to_run` test their target's readiness. Readiness has
//! two pathways: any single non-blocking in-edge fires the target on its
//! own, while the blocking pathway fires only when every blocking
//! in-edge is satisfied. Both pathways may re-fire the same target
//! across a run's lifetime; a target that is currently queued or live is
//! never re-fired. All follow-up edits go back through the context's
//! queue, preserving the single-writer invariant.

use crate::context::WorkspaceContext;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};
use wf_core::{
    EdgeId, EdgeStatus, EdgeType, ElementKind, Event, NodeId, NodeStatus, RunId, WorkGraph,
};
use wf_storage::StatusApplied;

/// Refusal to start a run.
#[derive(Debug, Error, PartialEq)]
pub enum RunPlanError {
    #[error("Run blocked: blocking edges contain a cycle")]
    BlockedCycle,
}

/// The initial shape of a run, computed before any mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub to_start: Vec<NodeId>,
    /// In-scope nodes; empty for a full-pipeline run.
    pub scope: HashSet<NodeId>,
    pub subset_only: bool,
}

/// Decide the initial nodes for a run request.
///
/// A selection yields a subset run started from the selection-induced
/// roots; otherwise failed nodes resume if any exist, else the clean
/// graph roots start, else all roots restart.
pub fn plan_run(graph: &WorkGraph, selected: Option<&[NodeId]>) -> Result<RunPlan, RunPlanError> {
    match selected.filter(|sel| !sel.is_empty()) {
        Some(selected) => {
            let scope: HashSet<NodeId> = selected.iter().cloned().collect();
            if graph.blocking_cycle_within(&scope) {
                return Err(RunPlanError::BlockedCycle);
            }
            let mut to_start = graph.roots_within(&scope);
            if to_start.is_empty() {
                to_start = selected.to_vec();
            }
            Ok(RunPlan { to_start, scope, subset_only: true })
        }
        None => {
            if graph.has_blocking_cycle() {
                return Err(RunPlanError::BlockedCycle);
            }
            let failed: Vec<NodeId> = graph
                .nodes()
                .filter(|n| n.status == NodeStatus::Fail)
                .map(|n| n.id.clone())
                .collect();
            let to_start = if !failed.is_empty() {
                info!(count = failed.len(), "resuming from failed nodes");
                failed
            } else {
                let clean_roots: Vec<NodeId> = graph
                    .roots()
                    .into_iter()
                    .filter(|n| {
                        graph.node(n).map(|node| node.status == NodeStatus::Empty).unwrap_or(false)
                    })
                    .collect();
                if clean_roots.is_empty() {
                    // Every root carries a leftover status; restart them all.
                    graph.roots()
                } else {
                    clean_roots
                }
            };
            Ok(RunPlan { to_start, scope: HashSet::new(), subset_only: false })
        }
    }
}

/// Lifecycle reactions for one applied status edit.
pub fn react(ctx: &WorkspaceContext, graph: &mut WorkGraph, applied: &StatusApplied) {
    match applied {
        StatusApplied::Node(node_id, status) => on_node_status(ctx, graph, node_id, *status),
        StatusApplied::Edge(edge_id, EdgeStatus::ToRun) => on_edge_to_run(ctx, graph, edge_id),
        StatusApplied::Edge(_, EdgeStatus::Empty) => {}
    }
}

fn on_node_status(
    ctx: &WorkspaceContext,
    graph: &mut WorkGraph,
    node_id: &NodeId,
    status: NodeStatus,
) {
    let run_id = ctx.runs.lock().active_node_run.get(node_id).cloned();
    match status {
        NodeStatus::Run => {
            let label = graph.node(node_id).map(|n| n.label.clone()).unwrap_or_default();
            ctx.bus.emit(&Event::NodeReady { node_id: node_id.clone(), label, run_id });
        }
        NodeStatus::Running => {
            ctx.bus.emit(&Event::NodeStarted { node_id: node_id.clone(), status, run_id });
        }
        NodeStatus::Ran => {
            ctx.bus.emit(&Event::NodeFinished {
                node_id: node_id.clone(),
                status,
                run_id: run_id.clone(),
            });
            propagate_completion(ctx, graph, node_id, run_id);
        }
        NodeStatus::Fail => {
            // Failure blocks the downstream cone for this run: no edge
            // propagation happens.
            ctx.bus.emit(&Event::NodeFailed { node_id: node_id.clone(), status, run_id });
        }
        NodeStatus::Empty => {}
    }
}

/// Node completed: mark its outgoing edges `to_run` for the owning run.
fn propagate_completion(
    ctx: &WorkspaceContext,
    graph: &mut WorkGraph,
    node_id: &NodeId,
    run_id: Option<RunId>,
) {
    if !graph.contains_node(node_id) {
        warn!(node = %node_id, "completed node not found in graph");
        return;
    }

    // Mint ids for any out-edges that lack one; a single save covers all.
    let mut minted = false;
    for edge in graph.edges_mut() {
        if edge.source == *node_id && edge.id.is_none() {
            edge.id = Some(EdgeId::new());
            minted = true;
        }
    }
    if minted {
        if let Err(e) = ctx.store.save(graph) {
            warn!(node = %node_id, "failed to persist minted edge ids: {e}");
        }
    }

    let (scope, subset_only) = ctx.runs.lock().scope_of(run_id.as_ref());
    let out_edges: Vec<(EdgeId, NodeId)> = graph
        .out_edges(node_id)
        .filter_map(|e| e.id.clone().map(|id| (id, e.target.clone())))
        .collect();
    debug!(node = %node_id, edges = out_edges.len(), "propagating completion");
    for (edge_id, target) in out_edges {
        if subset_only && !scope.contains(&target) {
            debug!(target = %target, "target outside subset run, skipping edge");
            continue;
        }
        ctx.enqueue_status(ElementKind::Edge, edge_id.as_str(), "to_run", run_id.as_ref());
    }
}

/// Edge became `to_run`: test the target's readiness and re-arm.
fn on_edge_to_run(ctx: &WorkspaceContext, graph: &WorkGraph, edge_id: &EdgeId) {
    let Some(edge) = graph.edge_by_id(edge_id) else {
        warn!(edge = %edge_id, "ready edge not found in graph");
        return;
    };
    let source = edge.source.clone();
    let target = edge.target.clone();
    let trigger_type = edge.edge_type;

    // Recover the owning run, falling back to the source's mapping.
    let (run_id, scope, subset_only) = {
        let runs = ctx.runs.lock();
        let run_id = runs
            .edge_run_map
            .get(edge_id)
            .cloned()
            .or_else(|| runs.active_node_run.get(&source).cloned());
        let (scope, subset_only) = runs.scope_of(run_id.as_ref());
        (run_id, scope, subset_only)
    };
    if subset_only && !scope.contains(&target) {
        debug!(target = %target, "target not in subset run, skipping");
        return;
    }

    let fired = match trigger_type {
        // Any single completed non-blocking predecessor fires the target.
        EdgeType::NonBlocking => true,
        // The blocking pathway fires only when all blocking in-edges are
        // satisfied.
        EdgeType::Blocking => graph
            .in_edges(&target)
            .filter(|e| e.edge_type == EdgeType::Blocking)
            .all(|e| e.status == EdgeStatus::ToRun),
    };
    if !fired {
        let satisfied = graph
            .in_edges(&target)
            .filter(|e| e.edge_type == EdgeType::Blocking && e.status == EdgeStatus::ToRun)
            .count();
        let total =
            graph.in_edges(&target).filter(|e| e.edge_type == EdgeType::Blocking).count();
        debug!(target = %target, satisfied, total, "target not ready");
        return;
    }

    // Clear the in-edges that participated in the trigger so subsequent
    // completions can re-arm them.
    let participants: Vec<EdgeId> = graph
        .in_edges(&target)
        .filter(|e| e.edge_type == trigger_type && e.status == EdgeStatus::ToRun)
        .filter_map(|e| e.id.clone())
        .collect();
    for participant in participants {
        ctx.enqueue_status(ElementKind::Edge, participant.as_str(), "", run_id.as_ref());
    }

    // Re-fire the target unless it is already queued or live.
    let current = graph.node(&target).map(|n| n.status).unwrap_or_default();
    if !current.is_active() {
        info!(target = %target, "dependencies met, queueing node");
        ctx.enqueue_status(ElementKind::Node, target.as_str(), "", run_id.as_ref());
        ctx.enqueue_status(ElementKind::Node, target.as_str(), "run", run_id.as_ref());
    } else {
        debug!(target = %target, status = %current, "target already active, not queueing");
    }
}

/// Scan active runs for completion: a run is complete when no in-scope
/// node is queued or live. Idempotent across overlapping scans.
pub fn completion_scan(ctx: &WorkspaceContext) {
    let Ok(graph) = ctx.store.load() else {
        return;
    };

    let finished: Vec<RunId> = {
        let runs = ctx.runs.lock();
        runs.active_runs
            .iter()
            .filter(|(run_id, meta)| {
                let still_active = if meta.nodes.is_empty() {
                    // No tracked nodes yet: look at everything mapped to
                    // this run.
                    runs.active_node_run.iter().any(|(node, mapped)| {
                        mapped == *run_id
                            && graph.node(node).map(|n| n.status.is_active()).unwrap_or(false)
                    })
                } else {
                    meta.nodes
                        .iter()
                        .any(|n| graph.node(n).map(|node| node.status.is_active()).unwrap_or(false))
                };
                !still_active
            })
            .map(|(run_id, _)| run_id.clone())
            .collect()
    };

    for run_id in finished {
        {
            let mut runs = ctx.runs.lock();
            if runs.active_runs.remove(&run_id).is_none() {
                continue;
            }
            runs.active_node_run.retain(|_, mapped| mapped != &run_id);
            runs.edge_run_map.retain(|_, mapped| mapped != &run_id);
        }
        info!(run = %run_id, "run complete");
        ctx.bus.emit(&Event::RunComplete { run_id });
    }
}

/// Report from a stop request.
#[derive(Debug, Default, Serialize)]
pub struct StopReport {
    pub killed: usize,
    pub errors: Vec<String>,
    pub stopped_nodes: Vec<NodeId>,
}

/// Hard-kill every live node process (optionally only those owned by one
/// run) and enqueue `fail` for each. Failed nodes do not propagate, so
/// downstream execution ceases.
pub fn stop_running_nodes(ctx: &WorkspaceContext, only_run: Option<&RunId>) -> StopReport {
    let graph = match ctx.store.load() {
        Ok(graph) => graph,
        Err(_) => {
            return StopReport {
                killed: 0,
                errors: vec!["graph_load_failed".to_string()],
                stopped_nodes: Vec::new(),
            }
        }
    };

    let mut report = StopReport::default();
    for node in graph.nodes() {
        if node.status != NodeStatus::Running {
            continue;
        }
        if let Some(run_id) = only_run {
            let mapped = ctx.runs.lock().active_node_run.get(&node.id).cloned();
            if mapped.as_ref().is_some_and(|m| m != run_id) {
                continue;
            }
        }
        report.stopped_nodes.push(node.id.clone());

        let pid_str = node.exec.as_ref().map(|e| e.pid.trim().to_string()).unwrap_or_default();
        if !pid_str.is_empty() && pid_str.chars().all(|c| c.is_ascii_digit()) {
            match pid_str.parse::<i32>() {
                Ok(pid) => match nix::sys::signal::kill(
                    nix::unistd::Pid::from_raw(pid),
                    nix::sys::signal::Signal::SIGKILL,
                ) {
                    Ok(()) => report.killed += 1,
                    Err(e) => report.errors.push(format!("{}:{}:{}", node.id, pid_str, e)),
                },
                Err(e) => report.errors.push(format!("{}:{}:{}", node.id, pid_str, e)),
            }
        }
    }

    for node_id in &report.stopped_nodes {
        let run_id = ctx.runs.lock().active_node_run.get(node_id).cloned();
        ctx.enqueue_status(ElementKind::Node, node_id.as_str(), "fail", run_id.as_ref());
        if only_run.is_some() {
            ctx.runs.lock().active_node_run.remove(node_id);
        }
    }

    info!(
        workspace = %ctx.workspace_id,
        killed = report.killed,
        stopped = report.stopped_nodes.len(),
        "stop: killed processes and failed running nodes"
    );
    report
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
