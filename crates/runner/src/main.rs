// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wf-runner: execute a workfile against a running Workforce server.

use clap::Parser;
use std::path::PathBuf;
use wf_runner::RunnerClient;

#[derive(Debug, Parser)]
#[command(name = "wf-runner", about = "Workforce headless runner", version)]
struct Args {
    /// The workfile to execute
    workfile: PathBuf,

    /// Server base URL (WORKFORCE_URL overrides the default)
    #[arg(long)]
    server: Option<String>,

    /// Restrict the run to these node ids (repeatable)
    #[arg(long = "node")]
    nodes: Vec<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let server = args
        .server
        .or_else(|| std::env::var("WORKFORCE_URL").ok())
        .unwrap_or_else(|| "http://127.0.0.1:5000".to_string());

    let mut client = RunnerClient::new(server, args.workfile);
    if let Err(e) = client.run(args.nodes).await {
        eprintln!("runner failed: {e}");
        std::process::exit(1);
    }
}
