// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wf: operator CLI for the Workforce server.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "wf", about = "Workforce workflow runner", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage the machine-wide server
    #[command(subcommand)]
    Server(ServerCommand),

    /// Execute a workfile (starts a runner against the server)
    Run {
        workfile: PathBuf,

        /// Restrict the run to these node ids (repeatable)
        #[arg(long = "node")]
        nodes: Vec<String>,

        /// Server base URL (WORKFORCE_URL overrides the default)
        #[arg(long)]
        server: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ServerCommand {
    /// Start the server (background by default)
    Start {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        /// Stay attached instead of daemonizing
        #[arg(long)]
        foreground: bool,

        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Stop the server and clear workspace caches
    Stop,

    /// List active workspaces
    List {
        /// Query this server instead of the locally registered one
        #[arg(long)]
        server_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Server(ServerCommand::Start { host, port, foreground, log_dir }) => {
            commands::server::start(host, port, foreground, log_dir).await
        }
        Command::Server(ServerCommand::Stop) => commands::server::stop(),
        Command::Server(ServerCommand::List { server_url }) => {
            commands::server::list(server_url).await
        }
        Command::Run { workfile, nodes, server } => {
            commands::run::run(workfile, nodes, server).await
        }
    }
}
