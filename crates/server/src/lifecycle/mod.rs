// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstrap and singleton enforcement.
//!
//! One server process per machine: a start lock taken by exclusive
//! create guards against racing starts (stale locks older than 30
//! seconds are reclaimed), and a PID file records where the live server
//! is bound. Termination removes both and asks every workspace worker to
//! stop.

use crate::env;
use crate::registry::ServerRegistry;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Locks older than this are presumed left by a dead process.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

const PID_FILE: &str = "server.pid";
const LOCK_FILE: &str = "server.lock";

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("another server start is in progress or the server is already running")]
    LockBusy,

    #[error("server already running on http://{host}:{port} (pid {pid})")]
    AlreadyRunning { host: String, port: u16, pid: i32 },

    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub cache_root: PathBuf,
    pub log_dir: PathBuf,
    pub event_log: PathBuf,
    pub skip_lock: bool,
}

impl Config {
    /// Environment wins over arguments; arguments win over defaults.
    pub fn resolve(
        host: Option<String>,
        port: Option<u16>,
        log_dir: Option<PathBuf>,
    ) -> Self {
        let data_dir = env::data_dir();
        let log_dir = env::log_dir_from_env().or(log_dir).unwrap_or_else(|| data_dir.clone());
        Self {
            host: env::host_from_env()
                .or(host)
                .unwrap_or_else(|| env::DEFAULT_HOST.to_string()),
            port: env::port_from_env().or(port).unwrap_or(env::DEFAULT_PORT),
            cache_root: env::cache_root(),
            event_log: env::event_log_path(),
            data_dir,
            log_dir,
            skip_lock: env::skip_lock_from_env(),
        }
    }

    pub fn pid_path(&self) -> PathBuf {
        self.data_dir.join(PID_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(LOCK_FILE)
    }
}

/// A started server: bound socket, registry, and the teardown guard.
pub struct Bootstrap {
    pub listener: TcpListener,
    pub registry: std::sync::Arc<ServerRegistry>,
    pub guard: ShutdownGuard,
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap").finish_non_exhaustive()
    }
}

/// Owns the singleton artifacts for teardown.
pub struct ShutdownGuard {
    registry: std::sync::Arc<ServerRegistry>,
    config: Config,
    lock_held: bool,
}

impl ShutdownGuard {
    /// Graceful teardown: stop every worker, drop the PID file and lock.
    pub fn shutdown(&self) {
        self.registry.shutdown_all();
        let _ = std::fs::remove_file(self.config.pid_path());
        if self.lock_held {
            release_lock(&self.config.lock_path());
        }
        info!("server shutdown complete");
    }
}

/// Acquire the singleton, bind, and write the PID file.
pub async fn startup(config: Config) -> Result<Bootstrap, LifecycleError> {
    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::create_dir_all(&config.log_dir)?;

    let lock_held = if config.skip_lock { false } else { acquire_lock(&config.lock_path())? };

    match startup_locked(&config).await {
        Ok(mut bootstrap) => {
            bootstrap.guard.lock_held = lock_held;
            Ok(bootstrap)
        }
        Err(e) => {
            // A failed start must not leave artifacts behind; the lock
            // is ours to release, the PID file belongs to a live server
            // only when AlreadyRunning.
            if lock_held {
                release_lock(&config.lock_path());
            }
            if !matches!(e, LifecycleError::AlreadyRunning { .. }) {
                let _ = std::fs::remove_file(config.pid_path());
            }
            Err(e)
        }
    }
}

async fn startup_locked(config: &Config) -> Result<Bootstrap, LifecycleError> {
    // An existing PID file pointing at a live process means we are done.
    if let Some((host, port, pid)) = read_pid_file(&config.pid_path()) {
        if pid_alive(pid) {
            return Err(LifecycleError::AlreadyRunning { host, port, pid });
        }
        let _ = std::fs::remove_file(config.pid_path());
        info!(pid, "removed stale PID file");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| LifecycleError::BindFailed { addr: addr.clone(), source })?;

    write_pid_file(&config.pid_path(), &config.host, config.port, std::process::id() as i32)?;

    let registry =
        ServerRegistry::new(config.cache_root.clone(), Some(config.event_log.clone()));
    registry.cycle_caches();
    spawn_cache_cycler(std::sync::Arc::clone(&registry));

    info!(addr, "server bound, waiting for client connections");
    let guard =
        ShutdownGuard { registry: registry.clone(), config: config.clone(), lock_held: false };
    Ok(Bootstrap { listener, registry, guard })
}

/// Re-run cache cycling every hour for long-lived servers.
fn spawn_cache_cycler(registry: std::sync::Arc<ServerRegistry>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        interval.tick().await; // the first tick fires immediately
        loop {
            interval.tick().await;
            registry.cycle_caches();
        }
    });
}

/// Exclusive-create lock with stale reclamation.
fn acquire_lock(path: &Path) -> Result<bool, LifecycleError> {
    if let Ok(meta) = std::fs::metadata(path) {
        let age = meta
            .modified()
            .ok()
            .and_then(|m| m.elapsed().ok())
            .unwrap_or(Duration::ZERO);
        if age > STALE_LOCK_AGE {
            warn!(path = %path.display(), "removing stale start lock");
            let _ = std::fs::remove_file(path);
        }
    }

    match std::fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            let _ = writeln!(file, "{}", std::process::id());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(LifecycleError::LockBusy),
        Err(e) => Err(e.into()),
    }
}

fn release_lock(path: &Path) {
    let _ = std::fs::remove_file(path);
}

/// `host:port\npid\n`
pub fn write_pid_file(path: &Path, host: &str, port: u16, pid: i32) -> std::io::Result<()> {
    std::fs::write(path, format!("{host}:{port}\n{pid}\n"))
}

/// Parse the PID file; any corruption reads as absent.
pub fn read_pid_file(path: &Path) -> Option<(String, u16, i32)> {
    let contents = std::fs::read_to_string(path).ok()?;
    let mut lines = contents.lines();
    let addr = lines.next()?;
    let (host, port) = addr.rsplit_once(':')?;
    let port = port.parse().ok()?;
    let pid = lines.next()?.trim().parse().ok()?;
    Some((host.to_string(), port, pid))
}

/// Signal 0 probe.
pub fn pid_alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
