// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graph read and mutation endpoints.

use crate::context::Mutation;
use crate::listener::error::{ApiError, ApiResult};
use crate::listener::{require_ctx, AppState};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use wf_core::{EdgeType, ElementKind, ExecRecord, NodeId, NodeStatus, RunId};
use wf_storage::{NodePosition, StatusUpdate};

const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

/// Idempotency key from the header or the request body.
fn idempotency_key(headers: &HeaderMap, body_key: Option<String>) -> Option<String> {
    headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(body_key)
        .filter(|k| !k.is_empty())
}

fn queued(outcome: crate::context::EnqueueOutcome) -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(outcome))
}

/// `GET …/get-graph`: node-link projection without heavy log fields,
/// plus the wrapper template.
pub async fn get_graph(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    let graph = ctx.store.load().map_err(|e| ApiError::Internal(e.to_string()))?;
    let mut data = graph.node_link_light();
    data["graph"] = json!({ "wrapper": graph.wrapper });
    Ok(Json(data))
}

/// `GET …/get-node-log/<node_id>`: the full execution record as a fixed
/// human-readable block.
pub async fn get_node_log(
    State(state): State<AppState>,
    Path((workspace_id, node_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    let graph = ctx.store.load().map_err(|e| ApiError::Internal(e.to_string()))?;
    let node = graph.node(&NodeId::from_string(&node_id)).ok_or(ApiError::NodeNotFound)?;

    let log = if let Some(exec) = &node.exec {
        format!(
            "COMMAND:\n{}\n\nSTDOUT:\n{}\n\nSTDERR:\n{}\n\nPID:\n{}\n\nError code:\n{}",
            exec.command, exec.stdout, exec.stderr, exec.pid, exec.error_code
        )
    } else if let Some(log) = &node.log {
        log.clone()
    } else {
        "[No log available for this node]".to_string()
    };
    Ok(Json(json!({ "log": log })))
}

#[derive(Debug, Deserialize)]
pub struct AddNodeBody {
    label: String,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    idempotency_key: Option<String>,
}

pub async fn add_node(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<AddNodeBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    let status: NodeStatus = body
        .status
        .as_deref()
        .unwrap_or("")
        .parse()
        .map_err(|e: wf_core::UnknownValue| ApiError::BadRequest(e.to_string()))?;
    let key = idempotency_key(&headers, body.idempotency_key);
    Ok(queued(ctx.enqueue(
        Mutation::AddNode { label: body.label, x: body.x, y: body.y, status },
        key,
    )))
}

#[derive(Debug, Deserialize)]
pub struct RemoveNodeBody {
    node_id: String,
}

pub async fn remove_node(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<RemoveNodeBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    Ok(queued(ctx.enqueue(
        Mutation::RemoveNode { node_id: NodeId::from_string(body.node_id) },
        None,
    )))
}

#[derive(Debug, Deserialize)]
pub struct EdgeBody {
    source: String,
    target: String,
    #[serde(default)]
    edge_type: Option<String>,
}

fn parse_edge_type(raw: Option<&str>) -> ApiResult<EdgeType> {
    raw.unwrap_or("")
        .parse()
        .map_err(|e: wf_core::UnknownValue| ApiError::BadRequest(e.to_string()))
}

pub async fn add_edge(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<EdgeBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    let edge_type = parse_edge_type(body.edge_type.as_deref())?;
    Ok(queued(ctx.enqueue(
        Mutation::AddEdge {
            source: NodeId::from_string(body.source),
            target: NodeId::from_string(body.target),
            edge_type,
        },
        None,
    )))
}

pub async fn remove_edge(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<EdgeBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    Ok(queued(ctx.enqueue(
        Mutation::RemoveEdge {
            source: NodeId::from_string(body.source),
            target: NodeId::from_string(body.target),
        },
        None,
    )))
}

pub async fn edit_edge_type(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<EdgeBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    let edge_type = parse_edge_type(body.edge_type.as_deref())?;
    Ok(queued(ctx.enqueue(
        Mutation::EditEdgeType {
            source: NodeId::from_string(body.source),
            target: NodeId::from_string(body.target),
            edge_type,
        },
        None,
    )))
}

#[derive(Debug, Deserialize)]
pub struct EditStatusBody {
    element_type: String,
    element_id: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    run_id: Option<String>,
}

pub async fn edit_status(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<EditStatusBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    let kind = parse_kind_and_value(&body.element_type, &body.value)?;
    let run_id = body.run_id.filter(|r| !r.is_empty()).map(RunId::from_string);
    Ok(queued(ctx.enqueue_status(kind, &body.element_id, &body.value, run_id.as_ref())))
}

/// Parse the element kind and reject unknown status values at ingress.
fn parse_kind_and_value(element_type: &str, value: &str) -> ApiResult<ElementKind> {
    let kind: ElementKind = element_type
        .parse()
        .map_err(|e: wf_core::UnknownValue| ApiError::BadRequest(e.to_string()))?;
    match kind {
        ElementKind::Node => {
            value
                .parse::<NodeStatus>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        }
        ElementKind::Edge => {
            value
                .parse::<wf_core::EdgeStatus>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        }
    }
    Ok(kind)
}

#[derive(Debug, Deserialize)]
pub struct EditStatusesBody {
    #[serde(default)]
    updates: Vec<StatusUpdateBody>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateBody {
    element_type: String,
    element_id: String,
    #[serde(default)]
    value: String,
}

pub async fn edit_statuses(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<EditStatusesBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    if body.updates.is_empty() {
        return Err(ApiError::BadRequest("updates array required".into()));
    }
    let mut updates = Vec::with_capacity(body.updates.len());
    for update in body.updates {
        let kind = parse_kind_and_value(&update.element_type, &update.value)?;
        updates.push(StatusUpdate {
            kind,
            element_id: update.element_id,
            value: update.value,
        });
    }
    Ok(queued(ctx.enqueue(Mutation::EditStatuses { updates }, None)))
}

#[derive(Debug, Deserialize)]
pub struct EditNodePositionBody {
    node_id: String,
    x: f64,
    y: f64,
}

pub async fn edit_node_position(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<EditNodePositionBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    Ok(queued(ctx.enqueue(
        Mutation::EditNodePosition {
            node_id: NodeId::from_string(body.node_id),
            x: body.x,
            y: body.y,
        },
        None,
    )))
}

#[derive(Debug, Deserialize)]
pub struct EditNodePositionsBody {
    #[serde(default)]
    positions: Vec<EditNodePositionBody>,
}

pub async fn edit_node_positions(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<EditNodePositionsBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    if body.positions.is_empty() {
        return Err(ApiError::BadRequest("positions array required".into()));
    }
    let positions = body
        .positions
        .into_iter()
        .map(|p| NodePosition { node_id: NodeId::from_string(p.node_id), x: p.x, y: p.y })
        .collect();
    Ok(queued(ctx.enqueue(Mutation::EditNodePositions { positions }, None)))
}

#[derive(Debug, Deserialize)]
pub struct EditWrapperBody {
    #[serde(default)]
    wrapper: Option<String>,
}

pub async fn edit_wrapper(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<EditWrapperBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    let wrapper = body.wrapper.ok_or_else(|| ApiError::BadRequest("wrapper required".into()))?;
    Ok(queued(ctx.enqueue(Mutation::EditWrapper { wrapper }, None)))
}

#[derive(Debug, Deserialize)]
pub struct EditNodeLabelBody {
    node_id: String,
    label: String,
}

pub async fn edit_node_label(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<EditNodeLabelBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    Ok(queued(ctx.enqueue(
        Mutation::EditNodeLabel {
            node_id: NodeId::from_string(body.node_id),
            label: body.label,
        },
        None,
    )))
}

#[derive(Debug, Deserialize)]
pub struct SaveNodeLogBody {
    node_id: String,
    #[serde(default)]
    log: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    pid: Option<Value>,
    #[serde(default)]
    error_code: Option<Value>,
}

/// Numbers and strings are both accepted for pid/error_code.
fn text_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// `POST …/save-node-log`: structured execution record, or the legacy
/// single `log` field for old runners.
pub async fn save_node_log(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<SaveNodeLogBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    let node_id = NodeId::from_string(&body.node_id);

    let structured = body.command.is_some()
        || body.stdout.is_some()
        || body.stderr.is_some()
        || body.pid.is_some()
        || body.error_code.is_some();

    let mutation = if structured {
        Mutation::SaveNodeExecution {
            node_id,
            record: ExecRecord {
                command: body.command.unwrap_or_default(),
                stdout: body.stdout.unwrap_or_default(),
                stderr: body.stderr.unwrap_or_default(),
                pid: text_field(body.pid.as_ref()),
                error_code: text_field(body.error_code.as_ref()),
            },
        }
    } else {
        Mutation::SaveNodeLog { node_id, log: body.log.unwrap_or_default() }
    };
    Ok(queued(ctx.enqueue(mutation, None)))
}

#[derive(Debug, Deserialize)]
pub struct RemoveNodeLogsBody {
    #[serde(default)]
    node_ids: Vec<String>,
}

pub async fn remove_node_logs(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<RemoveNodeLogsBody>,
) -> ApiResult<impl IntoResponse> {
    let ctx = require_ctx(&state, &workspace_id)?;
    if body.node_ids.is_empty() {
        return Err(ApiError::BadRequest("node_ids array required".into()));
    }
    let node_ids = body.node_ids.into_iter().map(NodeId::from_string).collect();
    Ok(queued(ctx.enqueue(Mutation::RemoveNodeLogs { node_ids }, None)))
}
