// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wf server start|stop|list`.

use anyhow::{bail, Context};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use wf_server::env;
use wf_server::lifecycle::{pid_alive, read_pid_file, Config};

const START_TIMEOUT: Duration = Duration::from_secs(10);

pub fn default_server_url() -> String {
    let host = env::host_from_env().unwrap_or_else(|| env::DEFAULT_HOST.to_string());
    let port = env::port_from_env().unwrap_or(env::DEFAULT_PORT);
    format!("http://{host}:{port}")
}

/// Locate the daemon binary: next to this executable, else on PATH.
fn daemon_binary() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("wfd")))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from("wfd"))
}

pub async fn start(
    host: Option<String>,
    port: Option<u16>,
    foreground: bool,
    log_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = Config::resolve(host, port, log_dir.clone());

    if let Some((host, port, pid)) = read_pid_file(&config.pid_path()) {
        if pid_alive(pid) {
            println!("Server already running on http://{host}:{port} (pid {pid})");
            return Ok(());
        }
    }

    let mut command = std::process::Command::new(daemon_binary());
    command.arg("--host").arg(&config.host).arg("--port").arg(config.port.to_string());
    if let Some(log_dir) = &log_dir {
        command.arg("--log-dir").arg(log_dir);
    }

    if foreground {
        let status = command.status().context("failed to launch wfd")?;
        if !status.success() {
            bail!("server exited with {status}");
        }
        return Ok(());
    }

    println!("Starting background server on http://{}:{}", config.host, config.port);
    command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    let child = command.spawn().context("failed to launch wfd")?;

    // Health-check until the server answers or the timeout elapses.
    let url = format!("http://{}:{}/workspaces", config.host, config.port);
    let client = reqwest::Client::new();
    let deadline = std::time::Instant::now() + START_TIMEOUT;
    while std::time::Instant::now() < deadline {
        if let Ok(response) = client.get(&url).timeout(Duration::from_secs(1)).send().await {
            if response.status().is_success() {
                println!("Server is ready (pid {})", child.id());
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    bail!("background server failed to start within {}s", START_TIMEOUT.as_secs());
}

pub fn stop() -> anyhow::Result<()> {
    let config = Config::resolve(None, None, None);

    let Some((_, _, pid)) = read_pid_file(&config.pid_path()) else {
        println!("No server registered. Use 'wf server start' to launch one.");
        clear_caches(&config);
        return Ok(());
    };

    if !pid_alive(pid) {
        println!("Server pid {pid} not alive; cleaning up artifacts");
        let _ = std::fs::remove_file(config.pid_path());
        clear_caches(&config);
        return Ok(());
    }

    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGTERM)
        .with_context(|| format!("failed to signal server pid {pid}"))?;

    // Wait briefly for a clean exit.
    for _ in 0..20 {
        std::thread::sleep(Duration::from_millis(250));
        if !pid_alive(pid) {
            break;
        }
    }
    if pid_alive(pid) {
        println!("Server pid {pid} is still alive after SIGTERM");
    } else {
        println!("Server stopped");
    }

    let _ = std::fs::remove_file(config.pid_path());
    clear_caches(&config);
    Ok(())
}

fn clear_caches(config: &Config) {
    if config.cache_root.exists() {
        let _ = std::fs::remove_dir_all(&config.cache_root);
    }
}

pub async fn list(server_url: Option<String>) -> anyhow::Result<()> {
    let config = Config::resolve(None, None, None);
    let base_url = match server_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => match read_pid_file(&config.pid_path()) {
            Some((host, port, pid)) if pid_alive(pid) => format!("http://{host}:{port}"),
            Some(_) => {
                let _ = std::fs::remove_file(config.pid_path());
                println!("Server is not running.");
                println!("Start the server with: wf server start");
                return Ok(());
            }
            None => {
                println!("Server is not running.");
                println!("Start the server with: wf server start");
                return Ok(());
            }
        },
    };

    let data: serde_json::Value = reqwest::Client::new()
        .get(format!("{base_url}/workspaces"))
        .timeout(Duration::from_secs(2))
        .send()
        .await
        .context("error communicating with server")?
        .json()
        .await?;

    let port = data["server"]["port"].as_u64().unwrap_or(0);
    println!("Workforce server on port {port}");
    println!("Access URL: {base_url}");

    let empty = Vec::new();
    let workspaces = data["workspaces"].as_array().unwrap_or(&empty);
    if workspaces.is_empty() {
        println!("\nNo active workspaces");
        println!("Open a workfile with: wf run <workfile>");
        return Ok(());
    }

    println!("\nActive workspaces ({}):", workspaces.len());
    for ws in workspaces {
        let id = ws["workspace_id"].as_str().unwrap_or("?");
        println!("\n  Workspace: {id}");
        println!("  File:      {}", ws["workfile_path"].as_str().unwrap_or("?"));
        println!("  Clients:   {}", ws["client_count"]);
        println!("  URL:       {base_url}/workspace/{id}");
    }
    Ok(())
}
