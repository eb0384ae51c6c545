// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain events for the workspace server.
//!
//! These are semantic facts about state changes, not transport messages.
//! The transport layer decides which of them cross the process boundary
//! and to which clients.

use crate::graph::NodeId;
use crate::id::RunId;
use crate::status::NodeStatus;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// The closed set of event types, used to key subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "GRAPH_UPDATED")]
    GraphUpdated,
    #[serde(rename = "NODE_READY")]
    NodeReady,
    #[serde(rename = "NODE_STARTED")]
    NodeStarted,
    #[serde(rename = "NODE_FINISHED")]
    NodeFinished,
    #[serde(rename = "NODE_FAILED")]
    NodeFailed,
    #[serde(rename = "RUN_COMPLETE")]
    RunComplete,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::GraphUpdated,
        EventType::NodeReady,
        EventType::NodeStarted,
        EventType::NodeFinished,
        EventType::NodeFailed,
        EventType::RunComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::GraphUpdated => "GRAPH_UPDATED",
            EventType::NodeReady => "NODE_READY",
            EventType::NodeStarted => "NODE_STARTED",
            EventType::NodeFinished => "NODE_FINISHED",
            EventType::NodeFailed => "NODE_FAILED",
            EventType::RunComplete => "RUN_COMPLETE",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events emitted by the mutation worker and scheduler.
///
/// Serializes with `{"type": "EVENT_NAME", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The graph file changed; carries the full node-link projection.
    #[serde(rename = "GRAPH_UPDATED")]
    GraphUpdated { data: Value },

    /// A node entered `run`; at least one runner should execute it.
    #[serde(rename = "NODE_READY")]
    NodeReady {
        node_id: NodeId,
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<RunId>,
    },

    /// A runner reported a live process for the node.
    #[serde(rename = "NODE_STARTED")]
    NodeStarted {
        node_id: NodeId,
        status: NodeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<RunId>,
    },

    /// The node's process exited zero.
    #[serde(rename = "NODE_FINISHED")]
    NodeFinished {
        node_id: NodeId,
        status: NodeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<RunId>,
    },

    /// The node's process exited nonzero or was killed.
    #[serde(rename = "NODE_FAILED")]
    NodeFailed {
        node_id: NodeId,
        status: NodeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<RunId>,
    },

    /// No in-scope node of the run is queued or live anymore.
    #[serde(rename = "RUN_COMPLETE")]
    RunComplete { run_id: RunId },
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::GraphUpdated { .. } => EventType::GraphUpdated,
            Event::NodeReady { .. } => EventType::NodeReady,
            Event::NodeStarted { .. } => EventType::NodeStarted,
            Event::NodeFinished { .. } => EventType::NodeFinished,
            Event::NodeFailed { .. } => EventType::NodeFailed,
            Event::RunComplete { .. } => EventType::RunComplete,
        }
    }

    /// The payload object written to the event log (fields without the
    /// type tag).
    pub fn payload(&self) -> Value {
        match self {
            Event::GraphUpdated { data } => data.clone(),
            Event::NodeReady { node_id, label, run_id } => {
                json!({ "node_id": node_id, "label": label, "run_id": run_id })
            }
            Event::NodeStarted { node_id, status, run_id }
            | Event::NodeFinished { node_id, status, run_id }
            | Event::NodeFailed { node_id, status, run_id } => {
                json!({ "node_id": node_id, "status": status, "run_id": run_id })
            }
            Event::RunComplete { run_id } => json!({ "run_id": run_id }),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
