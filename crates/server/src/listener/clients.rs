// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health, diagnostics, registration and client lifecycle endpoints.

use crate::listener::channel::ClientKind;
use crate::listener::error::{ApiError, ApiResult};
use crate::listener::{require_ctx, AppState};
use crate::scheduler;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use wf_core::{ClientId, NodeStatus, RunId, WorkspaceId};
use wf_storage::GraphStore;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `GET /workspaces`: diagnostic listing of attached workspaces.
pub async fn list_workspaces(State(state): State<AppState>) -> impl IntoResponse {
    let workspaces: Vec<_> = state
        .registry
        .all()
        .into_iter()
        .map(|ctx| {
            let (gui, runner) = ctx.client_snapshot();
            json!({
                "workspace_id": ctx.workspace_id,
                "workfile_path": ctx.workfile_path,
                "client_count": ctx.client_count(),
                "clients": { "gui": gui.len(), "runner": runner.len() },
                "created_at": ctx.created_at.to_rfc3339(),
            })
        })
        .collect();

    Json(json!({
        "server": {
            "host": state.bind.host,
            "port": state.bind.port,
            "lan_enabled": state.bind.lan_enabled(),
        },
        "workspaces": workspaces,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    #[serde(default, alias = "workfile_path")]
    path: Option<String>,
}

/// `POST /workspace/register`: attach a workfile by path.
pub async fn register_workspace(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> ApiResult<impl IntoResponse> {
    let path = body
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("path required".into()))?;
    let absolute = std::path::absolute(&path)
        .map_err(|e| ApiError::BadRequest(format!("bad path: {e}")))?;
    let workspace_id = WorkspaceId::for_path(&absolute);

    // Surface codec failures now rather than from the worker later.
    GraphStore::graphml(&absolute)
        .load()
        .map_err(|e| ApiError::Internal(format!("Failed to load graph: {e}")))?;

    let ctx = state.registry.get_or_create(workspace_id.clone(), &absolute, true);
    let (gui, runner) = ctx.client_snapshot();
    Ok(Json(json!({
        "workspace_id": workspace_id,
        "url": state.bind.workspace_url(&workspace_id),
        "path": absolute,
        "client_count": ctx.client_count(),
        "clients": { "gui": gui.len(), "runner": runner.len() },
    })))
}

#[derive(Debug, Deserialize)]
pub struct ClientConnectBody {
    #[serde(default)]
    workfile_path: Option<String>,
    #[serde(default)]
    client_type: Option<String>,
    #[serde(default, alias = "socketio_sid")]
    session_id: Option<String>,
}

/// `POST …/client-connect`: attach a client, creating the context lazily
/// on the first connect. Unknown client types fall back to gui.
pub async fn client_connect(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<ClientConnectBody>,
) -> ApiResult<impl IntoResponse> {
    let workfile_path = body
        .workfile_path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("workfile_path required".into()))?;
    let absolute = std::path::absolute(&workfile_path)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let workspace_id = WorkspaceId::from_string(&workspace_id);
    let ctx = state.registry.get_or_create(workspace_id.clone(), &absolute, true);

    let kind = match body.client_type.as_deref() {
        Some("runner") => ClientKind::Runner,
        // Unknown client types default to gui for backwards compatibility.
        _ => ClientKind::Gui,
    };
    let client_id = match kind {
        ClientKind::Gui => {
            let client_id = ClientId::new();
            ctx.add_gui_client(client_id.clone(), body.session_id);
            Some(client_id)
        }
        // Runner clients register through /run; accepted but not listed.
        ClientKind::Runner => None,
    };

    Ok(Json(json!({
        "status": "connected",
        "workspace_id": workspace_id,
        "client_id": client_id,
        "client_type": kind,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientDisconnectBody {
    #[serde(default)]
    client_type: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
}

/// `POST …/client-disconnect`: detach a client; the context is destroyed
/// once the count returns to zero and queued mutations drain.
pub async fn client_disconnect(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    body: Option<Json<ClientDisconnectBody>>,
) -> impl IntoResponse {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let workspace_id = WorkspaceId::from_string(&workspace_id);
    let Some(ctx) = state.registry.get(&workspace_id) else {
        return Json(json!({ "status": "disconnected" }));
    };

    match (body.client_type.as_deref(), body.client_id) {
        (Some("gui"), Some(client_id)) => {
            ctx.remove_gui_client(&ClientId::from_string(client_id));
        }
        (Some("runner"), Some(client_id)) => {
            // A departing runner abandons its run: kill what it left
            // behind and forget the bookkeeping.
            let run_id = RunId::from_string(client_id);
            scheduler::stop_running_nodes(&ctx, Some(&run_id));
            ctx.remove_runner_client(&run_id);
            let mut runs = ctx.runs.lock();
            runs.active_runs.remove(&run_id);
            runs.active_node_run.retain(|_, mapped| mapped != &run_id);
        }
        _ => {
            // No identifiers: drop the sole gui client if unambiguous.
            if let Some(only) = ctx.sole_gui_client() {
                ctx.remove_gui_client(&only);
            }
        }
    }

    ctx.decrement_clients();
    if ctx.should_destroy() {
        info!(workspace = %workspace_id, "last client left, destroying workspace");
        state.registry.destroy(&workspace_id);
    }
    Json(json!({ "status": "disconnected", "workspace_id": workspace_id }))
}

/// `GET …/clients`: connected clients with per-runner progress counts.
pub async fn list_clients(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    let (gui, runner) = ctx.client_snapshot();
    let graph = ctx.store.load().ok();

    let gui: Vec<_> = gui
        .into_iter()
        .map(|(client_id, meta)| {
            json!({
                "client_id": client_id,
                "connected_at": meta.connected_at.to_rfc3339(),
                "session_id": meta.session_id,
            })
        })
        .collect();

    let runner: Vec<_> = runner
        .into_iter()
        .map(|(run_id, meta)| {
            let (nodes_total, nodes_running, nodes_failed) = {
                let runs = ctx.runs.lock();
                let tracked =
                    runs.active_runs.get(&run_id).map(|m| m.nodes.len()).unwrap_or(0);
                let total = if tracked > 0 {
                    tracked
                } else {
                    graph.as_ref().map(|g| g.node_count()).unwrap_or(0)
                };
                let mut running = 0;
                let mut failed = 0;
                if let Some(graph) = &graph {
                    for node in graph.nodes() {
                        if runs.active_node_run.get(&node.id) != Some(&run_id) {
                            continue;
                        }
                        match node.status {
                            NodeStatus::Running => running += 1,
                            NodeStatus::Fail => failed += 1,
                            _ => {}
                        }
                    }
                }
                (total, running, failed)
            };
            json!({
                "client_id": run_id,
                "run_id": run_id,
                "connected_at": meta.connected_at.to_rfc3339(),
                "session_id": meta.session_id,
                "nodes_total": nodes_total,
                "nodes_running": nodes_running,
                "nodes_failed": nodes_failed,
            })
        })
        .collect();

    Ok(Json(json!({ "gui": gui, "runner": runner })))
}
