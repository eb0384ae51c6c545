// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run lifecycle endpoints: start, inspect, stop, save-as, teardown.

use crate::listener::error::{ApiError, ApiResult};
use crate::listener::{require_ctx, AppState};
use crate::scheduler;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use wf_core::{ElementKind, NodeId, NodeStatus, RunId, WorkspaceId};
use wf_storage::GraphStore;

#[derive(Debug, Default, Deserialize)]
pub struct RunBody {
    /// Selected node ids; absent or empty means full pipeline.
    #[serde(default)]
    nodes: Option<Vec<String>>,
    #[serde(default, alias = "socketio_sid")]
    session_id: Option<String>,
    /// Lazy-create fallback when the workspace is not attached yet.
    #[serde(default)]
    workfile_path: Option<String>,
}

/// `POST …/run`: start or resume a workflow run.
pub async fn run_pipeline(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    body: Option<Json<RunBody>>,
) -> ApiResult<impl IntoResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let ctx = match require_ctx(&state, &workspace_id) {
        Ok(ctx) => ctx,
        Err(_) => {
            let path = body
                .workfile_path
                .as_deref()
                .filter(|p| !p.is_empty())
                .ok_or(ApiError::WorkspaceNotFound)?;
            let absolute = std::path::absolute(path)
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            state.registry.get_or_create(
                WorkspaceId::from_string(&workspace_id),
                &absolute,
                true,
            )
        }
    };

    let graph = ctx.store.load().map_err(|e| ApiError::Internal(e.to_string()))?;
    let selected: Option<Vec<NodeId>> = body
        .nodes
        .filter(|nodes| !nodes.is_empty())
        .map(|nodes| nodes.into_iter().map(NodeId::from_string).collect());

    let plan = scheduler::plan_run(&graph, selected.as_deref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let run_id = RunId::new();
    ctx.add_runner_client(run_id.clone(), body.session_id);
    {
        let mut runs = ctx.runs.lock();
        let meta = runs.active_runs.entry(run_id.clone()).or_default();
        meta.nodes = plan.scope.clone();
        meta.subset_only = plan.subset_only;
    }

    if plan.to_start.is_empty() {
        return Ok((
            StatusCode::OK,
            Json(json!({ "status": "no nodes to start", "run_id": run_id })),
        ));
    }

    info!(
        run = %run_id,
        nodes = plan.to_start.len(),
        subset = plan.subset_only,
        "starting run"
    );
    for node_id in &plan.to_start {
        // Always clear first so a leftover status cannot mask the
        // run transition.
        ctx.enqueue_status(ElementKind::Node, node_id.as_str(), "", Some(&run_id));
        ctx.enqueue_status(ElementKind::Node, node_id.as_str(), "run", Some(&run_id));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "started", "run_id": run_id, "client_id": run_id })),
    ))
}

/// `GET …/runs`: active runs with progress counts.
pub async fn list_runs(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    let graph = ctx.store.load().ok();

    let runs = {
        let table = ctx.runs.lock();
        table
            .active_runs
            .iter()
            .map(|(run_id, meta)| {
                let nodes_total = if meta.nodes.is_empty() {
                    graph.as_ref().map(|g| g.node_count()).unwrap_or(0)
                } else {
                    meta.nodes.len()
                };
                let mut nodes_running = 0;
                let mut nodes_failed = 0;
                if let Some(graph) = &graph {
                    for node in graph.nodes() {
                        if !meta.nodes.is_empty() && !meta.nodes.contains(&node.id) {
                            continue;
                        }
                        if let Some(mapped) = table.active_node_run.get(&node.id) {
                            if mapped != run_id {
                                continue;
                            }
                        }
                        match node.status {
                            NodeStatus::Running => nodes_running += 1,
                            NodeStatus::Fail => nodes_failed += 1,
                            _ => {}
                        }
                    }
                }
                json!({
                    "run_id": run_id,
                    "subset_only": meta.subset_only,
                    "nodes_total": nodes_total,
                    "nodes_running": nodes_running,
                    "nodes_failed": nodes_failed,
                })
            })
            .collect::<Vec<_>>()
    };

    Ok(Json(json!({ "runs": runs })))
}

/// `POST …/stop`: kill every live node process and fail those nodes,
/// which stops downstream propagation.
pub async fn stop_runs(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    let report = scheduler::stop_running_nodes(&ctx, None);
    Ok(Json(serde_json::to_value(report).unwrap_or_default()))
}

/// `DELETE /workspace/<id>`: stop active runs, destroy the context and
/// clear the workspace cache.
pub async fn delete_workspace(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> impl IntoResponse {
    let workspace_id = WorkspaceId::from_string(&workspace_id);
    if let Some(ctx) = state.registry.get(&workspace_id) {
        scheduler::stop_running_nodes(&ctx, None);
        state.registry.destroy(&workspace_id);
    } else {
        // Still clear any cache left behind by an earlier context.
        state.registry.clean_workspace_cache(&workspace_id);
    }
    Json(json!({ "status": "removed", "workspace_id": workspace_id }))
}

#[derive(Debug, Deserialize)]
pub struct SaveAsBody {
    #[serde(default)]
    new_path: Option<String>,
}

/// `POST …/save-as`: copy the graph (statuses intact) to a new path and
/// report the workspace identity it would open under.
pub async fn save_as(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<SaveAsBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    if !ctx.runs.lock().active_runs.is_empty() {
        return Err(ApiError::Conflict(
            "Cannot save during active workflow execution".into(),
        ));
    }
    let new_path = body
        .new_path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("new_path required".into()))?;
    let absolute = std::path::absolute(&new_path)
        .map_err(|e| ApiError::BadRequest(format!("bad path: {e}")))?;

    let graph = ctx.store.load().map_err(|e| ApiError::Internal(e.to_string()))?;
    GraphStore::graphml(&absolute)
        .save(&graph)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let new_workspace_id = WorkspaceId::for_path(&absolute);
    info!(
        from = %ctx.workfile_path.display(),
        to = %absolute.display(),
        new_workspace = %new_workspace_id,
        "saved workflow copy"
    );
    Ok(Json(json!({
        "status": "saved",
        "new_path": absolute,
        "new_workspace_id": new_workspace_id,
        "new_base_url": state.bind.workspace_url(&new_workspace_id),
    })))
}
