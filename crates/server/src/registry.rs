// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide registry of workspace contexts.
//!
//! The registry is the only process-wide state; it is created at
//! bootstrap and injected into the transport layer. Contexts are built
//! lazily on first attach and torn down when the last client leaves.
//! The cache root is cycled on startup so abandoned workspace caches do
//! not grow without bound.

use crate::context::{self, WorkspaceContext};
use crate::listener::channel;
use crate::worker;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use wf_core::WorkspaceId;

const MAX_CACHE_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const MAX_CACHE_BYTES: u64 = 500 * 1024 * 1024;

pub struct ServerRegistry {
    contexts: Mutex<HashMap<WorkspaceId, Arc<WorkspaceContext>>>,
    cache_root: PathBuf,
    event_log: Option<PathBuf>,
}

impl ServerRegistry {
    pub fn new(cache_root: PathBuf, event_log: Option<PathBuf>) -> Arc<Self> {
        Arc::new(Self { contexts: Mutex::new(HashMap::new()), cache_root, event_log })
    }

    /// Read without creating.
    pub fn get(&self, workspace_id: &WorkspaceId) -> Option<Arc<WorkspaceContext>> {
        self.contexts.lock().get(workspace_id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<WorkspaceContext>> {
        self.contexts.lock().values().cloned().collect()
    }

    /// Fetch or lazily build the context for a workspace, optionally
    /// counting the caller as a client.
    pub fn get_or_create(
        &self,
        workspace_id: WorkspaceId,
        workfile_path: &Path,
        increment_clients: bool,
    ) -> Arc<WorkspaceContext> {
        let (ctx, queue_rx) = {
            let mut contexts = self.contexts.lock();
            if let Some(ctx) = contexts.get(&workspace_id) {
                if increment_clients {
                    ctx.increment_clients();
                }
                return Arc::clone(ctx);
            }

            let cache_dir = self.cache_root.join(workspace_id.as_str());
            if let Err(e) = std::fs::create_dir_all(&cache_dir) {
                warn!(workspace = %workspace_id, "failed to create cache dir: {e}");
            }
            let (ctx, queue_rx) = context::build(
                workspace_id.clone(),
                workfile_path.to_path_buf(),
                cache_dir,
                self.event_log.clone(),
            );
            if increment_clients {
                ctx.increment_clients();
            }
            contexts.insert(workspace_id.clone(), Arc::clone(&ctx));
            info!(
                workspace = %workspace_id,
                path = %workfile_path.display(),
                clients = ctx.client_count(),
                "created workspace context"
            );
            (ctx, queue_rx)
        };

        // Wire subscriptions and start the worker outside the map lock.
        channel::register_event_handlers(&ctx);
        let handle = worker::spawn(Arc::clone(&ctx), queue_rx);
        *ctx.worker.lock() = Some(handle);
        ctx
    }

    /// Tear down a workspace: drop subscriptions and run tables, stop
    /// the worker after queued mutations drain, delete the cache.
    /// Idempotent; destroying an unknown workspace is a no-op.
    pub fn destroy(&self, workspace_id: &WorkspaceId) -> bool {
        let Some(ctx) = self.contexts.lock().remove(workspace_id) else {
            return false;
        };
        ctx.bus.clear_subscribers();
        ctx.runs.lock().clear();
        ctx.shutdown_worker();
        self.clean_workspace_cache(workspace_id);
        info!(workspace = %workspace_id, "destroyed workspace context");
        true
    }

    /// Ask every worker to stop (graceful process shutdown).
    pub fn shutdown_all(&self) {
        for ctx in self.all() {
            ctx.shutdown_worker();
        }
    }

    /// Remove the cache directory of one workspace.
    pub fn clean_workspace_cache(&self, workspace_id: &WorkspaceId) {
        let path = self.cache_root.join(workspace_id.as_str());
        if path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(workspace = %workspace_id, "failed to remove cache: {e}");
            } else {
                debug!(workspace = %workspace_id, "cleaned workspace cache");
            }
        }
    }

    /// Drop old caches, then evict oldest-first down to the size cap.
    pub fn cycle_caches(&self) {
        self.cycle_caches_with(MAX_CACHE_AGE, MAX_CACHE_BYTES);
    }

    pub fn cycle_caches_with(&self, max_age: Duration, max_bytes: u64) {
        let entries = match std::fs::read_dir(&self.cache_root) {
            Ok(entries) => entries,
            Err(_) => return, // no cache to clean yet
        };

        let now = SystemTime::now();
        let mut caches: Vec<(PathBuf, SystemTime, u64)> = Vec::new();
        let mut total: u64 = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let size = dir_size(&path);
            total += size;
            caches.push((path, modified, size));
        }

        for (path, modified, size) in &caches {
            let age = now.duration_since(*modified).unwrap_or_default();
            if age > max_age {
                if std::fs::remove_dir_all(path).is_ok() {
                    info!(path = %path.display(), age_days = age.as_secs() / 86_400, "removed old cache");
                    total = total.saturating_sub(*size);
                }
            }
        }

        if total > max_bytes {
            let mut survivors: Vec<_> =
                caches.into_iter().filter(|(path, _, _)| path.exists()).collect();
            survivors.sort_by_key(|(_, modified, _)| *modified);
            for (path, _, size) in survivors {
                if total <= max_bytes {
                    break;
                }
                if std::fs::remove_dir_all(&path).is_ok() {
                    info!(path = %path.display(), "removed cache to stay under size cap");
                    total = total.saturating_sub(size);
                }
            }
        }
    }
}

fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
