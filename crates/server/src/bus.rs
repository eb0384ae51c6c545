// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process publish/subscribe of domain events.
//!
//! Subscribers register per event type and are invoked synchronously in
//! registration order. A failing subscriber is logged and does not stop
//! later subscribers. When a log path is configured, every emitted event
//! is appended as one JSON line before subscribers run; the log rotates
//! by size to `<path>.N`, choosing the smallest untaken N.

use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error};
use wf_core::{Event, EventType};

const DEFAULT_LOG_CAP: u64 = 10 * 1024 * 1024;

/// Error returned by a subscriber; isolated per handler.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BusError(pub String);

type Handler = Box<dyn Fn(&Event) -> Result<(), BusError> + Send + Sync>;

/// Per-workspace event bus with an optional JSON-lines log.
pub struct EventBus {
    subscribers: Mutex<HashMap<EventType, Vec<Handler>>>,
    log: Option<EventLog>,
}

struct EventLog {
    path: PathBuf,
    max_bytes: u64,
}

impl EventBus {
    pub fn new(log_path: Option<PathBuf>) -> Self {
        Self::with_log_cap(log_path, DEFAULT_LOG_CAP)
    }

    pub fn with_log_cap(log_path: Option<PathBuf>, max_bytes: u64) -> Self {
        let log = log_path.map(|path| EventLog { path, max_bytes });
        if let Some(log) = &log {
            if let Some(parent) = log.path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        Self { subscribers: Mutex::new(HashMap::new()), log }
    }

    /// Register a handler for one event type.
    pub fn subscribe<F>(&self, event_type: EventType, handler: F)
    where
        F: Fn(&Event) -> Result<(), BusError> + Send + Sync + 'static,
    {
        self.subscribers.lock().entry(event_type).or_default().push(Box::new(handler));
        debug!(event_type = %event_type, "subscribed handler");
    }

    /// Emit an event: append to the log, then invoke subscribers in
    /// registration order.
    pub fn emit(&self, event: &Event) {
        if let Some(log) = &self.log {
            if let Err(e) = log.append(event) {
                error!(path = %log.path.display(), "failed to log event: {e}");
            }
        }

        // Handlers run under the lock; they are expected to be quick
        // (channel sends and queue pushes), and subscription changes only
        // happen at context creation/destruction.
        let subscribers = self.subscribers.lock();
        if let Some(handlers) = subscribers.get(&event.event_type()) {
            for handler in handlers {
                if let Err(e) = handler(event) {
                    error!(event_type = %event.event_type(), "event handler failed: {e}");
                }
            }
        }
    }

    /// Drop every subscription (workspace teardown).
    pub fn clear_subscribers(&self) {
        self.subscribers.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self, event_type: EventType) -> usize {
        self.subscribers.lock().get(&event_type).map(Vec::len).unwrap_or(0)
    }
}

impl EventLog {
    fn append(&self, event: &Event) -> std::io::Result<()> {
        if let Ok(meta) = std::fs::metadata(&self.path) {
            if meta.len() >= self.max_bytes {
                self.rotate();
            }
        }

        let line = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "type": event.event_type().as_str(),
            "payload": event.payload(),
        });
        let mut file =
            std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }

    /// Rename to `<path>.N` with the smallest untaken N; new writes
    /// continue at the original path.
    fn rotate(&self) {
        let mut n = 1u32;
        let target = loop {
            let candidate = PathBuf::from(format!("{}.{n}", self.path.display()));
            if !candidate.exists() {
                break candidate;
            }
            n += 1;
        };
        match std::fs::rename(&self.path, &target) {
            Ok(()) => debug!(to = %target.display(), "rotated event log"),
            Err(e) => error!(path = %self.path.display(), "failed to rotate event log: {e}"),
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
