// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event channel: WebSocket rooms and domain-to-transport fan-out.
//!
//! Every workspace owns a broadcast channel (its room, `ws:<id>`).
//! Connected clients subscribe through `GET /workspace/<id>/events`;
//! bus handlers registered at context creation translate selected domain
//! events into transport events on the room. Audience rules: graph and
//! status updates go to everyone, `node_ready` only to runners, and
//! `run_complete` to the runner that owns the run.

use crate::context::WorkspaceContext;
use crate::listener::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use wf_core::{Event, EventType, NodeId, NodeStatus, RunId};

/// What kind of client joined the room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    #[default]
    Gui,
    Runner,
}

/// Messages that cross the process boundary to room members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransportEvent {
    /// Node-link projection with heavyweight log attributes stripped.
    GraphUpdate { data: Value },
    NodeReady {
        node_id: NodeId,
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<RunId>,
    },
    StatusChange {
        node_id: NodeId,
        status: NodeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<RunId>,
    },
    RunComplete { run_id: RunId },
}

impl TransportEvent {
    /// True when this event should reach the given room member.
    ///
    /// A runner that joined before its `/run` answered has no run id
    /// yet; it still receives `run_complete` and filters client-side.
    fn delivers_to(&self, kind: ClientKind, member_run: Option<&RunId>) -> bool {
        match self {
            TransportEvent::GraphUpdate { .. } | TransportEvent::StatusChange { .. } => true,
            TransportEvent::NodeReady { .. } => kind == ClientKind::Runner,
            TransportEvent::RunComplete { run_id } => {
                kind == ClientKind::Runner && member_run.map_or(true, |member| member == run_id)
            }
        }
    }
}

/// Subscribe the translation handlers for one workspace room.
pub fn register_event_handlers(ctx: &Arc<WorkspaceContext>) {
    {
        let room = ctx.room.clone();
        ctx.bus.subscribe(EventType::GraphUpdated, move |event| {
            if let Event::GraphUpdated { data } = event {
                let _ = room.send(TransportEvent::GraphUpdate { data: lighten(data) });
            }
            Ok(())
        });
    }
    {
        let room = ctx.room.clone();
        ctx.bus.subscribe(EventType::NodeReady, move |event| {
            if let Event::NodeReady { node_id, label, run_id } = event {
                let _ = room.send(TransportEvent::NodeReady {
                    node_id: node_id.clone(),
                    label: label.clone(),
                    run_id: run_id.clone(),
                });
            }
            Ok(())
        });
    }
    for event_type in [EventType::NodeStarted, EventType::NodeFinished, EventType::NodeFailed] {
        let room = ctx.room.clone();
        ctx.bus.subscribe(event_type, move |event| {
            let (node_id, status, run_id) = match event {
                Event::NodeStarted { node_id, status, run_id }
                | Event::NodeFinished { node_id, status, run_id }
                | Event::NodeFailed { node_id, status, run_id } => (node_id, status, run_id),
                _ => return Ok(()),
            };
            let _ = room.send(TransportEvent::StatusChange {
                node_id: node_id.clone(),
                status: *status,
                run_id: run_id.clone(),
            });
            Ok(())
        });
    }
    {
        let room = ctx.room.clone();
        ctx.bus.subscribe(EventType::RunComplete, move |event| {
            if let Event::RunComplete { run_id } = event {
                let _ = room.send(TransportEvent::RunComplete { run_id: run_id.clone() });
            }
            Ok(())
        });
    }
}

const HEAVY_ATTRS: [&str; 6] = ["log", "stdout", "stderr", "pid", "command", "error_code"];

/// Strip heavyweight log attributes from a node-link projection to bound
/// transport payload size.
pub fn lighten(data: &Value) -> Value {
    let mut light = data.clone();
    if let Some(nodes) = light.get_mut("nodes").and_then(Value::as_array_mut) {
        for node in nodes {
            if let Some(obj) = node.as_object_mut() {
                for attr in HEAVY_ATTRS {
                    obj.remove(attr);
                }
            }
        }
    }
    if let Some(obj) = light.as_object_mut() {
        obj.insert("graph".into(), Value::Object(Default::default()));
    }
    light
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub client_type: Option<ClientKind>,
    #[serde(default)]
    pub run_id: Option<String>,
}

/// `GET /workspace/<id>/events`: join the workspace room.
pub async fn events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let Some(ctx) = state.registry.get(&wf_core::WorkspaceId::from_string(&workspace_id)) else {
        return crate::listener::error::ApiError::WorkspaceNotFound.into_response();
    };
    let kind = query.client_type.unwrap_or_default();
    let run_id = query.run_id.map(RunId::from_string);
    ws.on_upgrade(move |socket| session(socket, ctx, kind, run_id))
}

async fn session(
    socket: WebSocket,
    ctx: Arc<WorkspaceContext>,
    kind: ClientKind,
    run_id: Option<RunId>,
) {
    info!(
        workspace = %ctx.workspace_id,
        kind = ?kind,
        "client joined room ws:{}",
        ctx.workspace_id
    );
    let mut room_rx = ctx.room.subscribe();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            received = room_rx.recv() => match received {
                Ok(event) => {
                    if !event.delivers_to(kind, run_id.as_ref()) {
                        continue;
                    }
                    let Ok(text) = serde_json::to_string(&event) else { continue };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(workspace = %ctx.workspace_id, skipped, "slow room member lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
    info!(workspace = %ctx.workspace_id, "client left room ws:{}", ctx.workspace_id);
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
