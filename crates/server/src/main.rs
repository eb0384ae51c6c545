// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wfd: the Workforce workspace server daemon.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wf_server::lifecycle::{self, Config, LifecycleError};
use wf_server::listener::{router, AppState, BindInfo};

#[derive(Debug, Parser)]
#[command(name = "wfd", about = "Workforce workspace server", version)]
struct Args {
    /// Bind host (WORKFORCE_HOST overrides)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (WORKFORCE_PORT overrides)
    #[arg(long)]
    port: Option<u16>,

    /// Directory for server logs (WORKFORCE_LOG_DIR overrides)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    let config = Config::resolve(args.host, args.port, args.log_dir);

    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!("failed to create log directory: {e}");
        std::process::exit(1);
    }
    // Rotating file logging, configured exactly once for the process.
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "server.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(config)) {
        match &e {
            LifecycleError::AlreadyRunning { host, port, pid } => {
                eprintln!("Server already running on http://{host}:{port} (pid {pid})");
            }
            other => eprintln!("server failed to start: {other}"),
        }
        std::process::exit(1);
    }
}

async fn serve(config: Config) -> Result<(), LifecycleError> {
    let lifecycle::Bootstrap { listener, registry, guard } =
        lifecycle::startup(config.clone()).await?;
    let bind = BindInfo { host: config.host.clone(), port: config.port };
    info!(url = bind.base_url(), "starting Workforce server");

    let app = router(AppState { registry, bind });
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    guard.shutdown();
    result.map_err(LifecycleError::Io)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(e) => {
            tracing::error!("failed to install SIGTERM handler: {e}");
            let _ = ctrl_c.await;
            return;
        }
    };
    tokio::select! {
        _ = ctrl_c => info!("interrupt received, shutting down"),
        _ = terminate.recv() => info!("termination signal received, shutting down"),
    }
}
