// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wf-core: Domain model for the Workforce workspace server.
//!
//! Holds the typed work graph (nodes, edges, statuses), the domain event
//! set, id generation, and the wrapper template used to compose shell
//! commands. No I/O lives here; persistence is `wf-storage`.

pub mod event;
pub mod graph;
pub mod id;
pub mod status;
pub mod workspace;
pub mod wrapper;

pub use event::{Event, EventType};
pub use graph::{Edge, EdgeId, ExecRecord, Node, NodeId, WorkGraph};
pub use id::{short, ClientId, RequestId, RunId};
pub use status::{EdgeStatus, EdgeType, ElementKind, NodeStatus, UnknownValue};
pub use workspace::WorkspaceId;
