// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wf run`: execute a workfile through a runner client.

use crate::commands::server;
use std::path::PathBuf;
use wf_runner::RunnerClient;

pub async fn run(
    workfile: PathBuf,
    nodes: Vec<String>,
    server_url: Option<String>,
) -> anyhow::Result<()> {
    let server_url = server_url
        .or_else(|| std::env::var(wf_server::env::ENV_URL).ok())
        .unwrap_or_else(server::default_server_url);

    let mut client = RunnerClient::new(server_url, workfile);
    client.run(nodes).await?;
    Ok(())
}
