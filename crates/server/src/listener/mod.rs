// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport: routing keyed by workspace id.
//!
//! Handlers validate request shape synchronously (4xx straight away) and
//! enqueue anything that depends on graph state, acknowledging with 202.
//! Read-only snapshot endpoints load the workfile directly; atomic
//! renames on the write side mean a read is at worst briefly stale.

pub mod channel;
pub mod clients;
pub mod error;
pub mod graph;
pub mod runs;

use crate::context::WorkspaceContext;
use crate::registry::ServerRegistry;
use axum::routing::{delete, get, post};
use axum::Router;
use error::{ApiError, ApiResult};
use std::sync::Arc;
use wf_core::WorkspaceId;

/// Where the server believes it is bound; used to mint workspace URLs.
#[derive(Debug, Clone)]
pub struct BindInfo {
    pub host: String,
    pub port: u16,
}

impl BindInfo {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn workspace_url(&self, workspace_id: &WorkspaceId) -> String {
        format!("{}/workspace/{}", self.base_url(), workspace_id)
    }

    /// Bound beyond loopback, reachable from the LAN.
    pub fn lan_enabled(&self) -> bool {
        !matches!(self.host.as_str(), "127.0.0.1" | "localhost")
    }
}

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServerRegistry>,
    pub bind: BindInfo,
}

/// Resolve an attached workspace or 404.
pub(crate) fn require_ctx(
    state: &AppState,
    workspace_id: &str,
) -> ApiResult<Arc<WorkspaceContext>> {
    state
        .registry
        .get(&WorkspaceId::from_string(workspace_id))
        .ok_or(ApiError::WorkspaceNotFound)
}

/// Build the full route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(clients::health))
        .route("/workspaces", get(clients::list_workspaces))
        .route("/workspace/register", post(clients::register_workspace))
        .route("/workspace/:workspace_id", delete(runs::delete_workspace))
        .route("/workspace/:workspace_id/events", get(channel::events))
        .route("/workspace/:workspace_id/get-graph", get(graph::get_graph))
        .route("/workspace/:workspace_id/get-node-log/:node_id", get(graph::get_node_log))
        .route("/workspace/:workspace_id/add-node", post(graph::add_node))
        .route("/workspace/:workspace_id/remove-node", post(graph::remove_node))
        .route("/workspace/:workspace_id/add-edge", post(graph::add_edge))
        .route("/workspace/:workspace_id/remove-edge", post(graph::remove_edge))
        .route("/workspace/:workspace_id/edit-edge-type", post(graph::edit_edge_type))
        .route("/workspace/:workspace_id/edit-status", post(graph::edit_status))
        .route("/workspace/:workspace_id/edit-statuses", post(graph::edit_statuses))
        .route("/workspace/:workspace_id/edit-node-position", post(graph::edit_node_position))
        .route("/workspace/:workspace_id/edit-node-positions", post(graph::edit_node_positions))
        .route("/workspace/:workspace_id/edit-wrapper", post(graph::edit_wrapper))
        .route("/workspace/:workspace_id/edit-node-label", post(graph::edit_node_label))
        .route("/workspace/:workspace_id/save-node-log", post(graph::save_node_log))
        .route("/workspace/:workspace_id/remove-node-logs", post(graph::remove_node_logs))
        .route("/workspace/:workspace_id/client-connect", post(clients::client_connect))
        .route("/workspace/:workspace_id/client-disconnect", post(clients::client_disconnect))
        .route("/workspace/:workspace_id/clients", get(clients::list_clients))
        .route("/workspace/:workspace_id/run", post(runs::run_pipeline))
        .route("/workspace/:workspace_id/runs", get(runs::list_runs))
        .route("/workspace/:workspace_id/stop", post(runs::stop_runs))
        .route("/workspace/:workspace_id/save-as", post(runs::save_as))
        .with_state(state)
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
