// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variables and platform paths.

use std::path::PathBuf;

pub const ENV_HOST: &str = "WORKFORCE_HOST";
pub const ENV_PORT: &str = "WORKFORCE_PORT";
/// Base URL ancillary tools use for health checks, overriding host/port.
pub const ENV_URL: &str = "WORKFORCE_URL";
pub const ENV_LOG_DIR: &str = "WORKFORCE_LOG_DIR";
/// Advanced/debug only: skip the start lock.
pub const ENV_SKIP_LOCK: &str = "WORKFORCE_SKIP_LOCK";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

const APP_DIR: &str = "workforce";

/// Server data root, e.g. `$XDG_DATA_HOME/workforce`.
pub fn data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

/// Server cache root, e.g. `$XDG_CACHE_HOME/workforce`.
pub fn cache_root() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

/// Append-only domain event log, `~/.workforce/events.log`.
pub fn event_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".workforce")
        .join("events.log")
}

pub fn host_from_env() -> Option<String> {
    std::env::var(ENV_HOST).ok().filter(|v| !v.is_empty())
}

pub fn port_from_env() -> Option<u16> {
    std::env::var(ENV_PORT).ok().and_then(|v| v.parse().ok())
}

pub fn log_dir_from_env() -> Option<PathBuf> {
    std::env::var(ENV_LOG_DIR).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

pub fn skip_lock_from_env() -> bool {
    matches!(std::env::var(ENV_SKIP_LOCK).ok().as_deref(), Some("1") | Some("true") | Some("True"))
}
