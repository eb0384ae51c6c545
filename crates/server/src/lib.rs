// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wf-server: the Workforce workspace server.
//!
//! A single process multiplexes many open workfiles. Each workfile gets a
//! workspace context with its own mutation queue, mutation worker and
//! event bus; all graph writes for a workspace are serialized through its
//! worker. The HTTP surface enqueues mutations and answers read-only
//! snapshots; the scheduler reacts to status transitions and drives runs
//! across the dependency graph.

pub mod bus;
pub mod context;
pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod registry;
pub mod scheduler;
pub mod worker;

pub use bus::{BusError, EventBus};
pub use context::{EnqueueOutcome, Mutation, WorkerMsg, WorkspaceContext};
pub use lifecycle::{Config, LifecycleError};
pub use listener::{router, AppState, BindInfo};
pub use registry::ServerRegistry;
