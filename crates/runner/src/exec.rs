// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell execution of one node's command.
//!
//! Spawning and waiting are separate steps so the caller can report the
//! pid while the process is still alive (the stop path hard-kills by
//! the pid on file).

use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Everything a single execution produced, ready to report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    /// The exact command line handed to the shell.
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub pid: String,
    pub exit_code: i32,
}

impl ExecOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Result of composing and spawning a node command.
pub enum Spawned {
    /// The composed command was empty; nothing ran.
    Empty(ExecOutcome),
    Running(RunningNode),
}

/// A live node process.
pub struct RunningNode {
    child: tokio::process::Child,
    command: String,
    pid: String,
}

/// Compose the node label under the wrapper and start it through
/// `sh -c`. An empty composed command completes successfully without
/// spawning anything.
pub fn spawn(wrapper: &str, label: &str) -> std::io::Result<Spawned> {
    let command = wf_core::wrapper::compose(wrapper, label);
    if command.trim().is_empty() {
        return Ok(Spawned::Empty(ExecOutcome {
            command,
            stdout: String::new(),
            stderr: "[No command to run]".to_string(),
            pid: String::new(),
            exit_code: 0,
        }));
    }

    debug!(command, "spawning node process");
    let child = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let pid = child.id().map(|p| p.to_string()).unwrap_or_default();
    Ok(Spawned::Running(RunningNode { child, command, pid }))
}

impl RunningNode {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn pid(&self) -> &str {
        &self.pid
    }

    /// Drain output and wait for exit.
    pub async fn wait(mut self) -> std::io::Result<ExecOutcome> {
        // Drain both pipes concurrently so a full stderr cannot wedge a
        // process that is still writing stdout.
        let (stdout, stderr) =
            tokio::join!(read_pipe(self.child.stdout.take()), read_pipe(self.child.stderr.take()));
        let (stdout, stderr) = (stdout?, stderr?);
        let status = self.child.wait().await?;

        Ok(ExecOutcome {
            command: self.command,
            stdout,
            stderr,
            pid: self.pid,
            // A signal-killed process has no exit code; report -1 like a
            // generic failure.
            exit_code: status.code().unwrap_or(-1),
        })
    }
}

/// Spawn and wait in one step.
pub async fn execute(wrapper: &str, label: &str) -> std::io::Result<ExecOutcome> {
    match spawn(wrapper, label)? {
        Spawned::Empty(outcome) => Ok(outcome),
        Spawned::Running(running) => running.wait().await,
    }
}

async fn read_pipe<R: AsyncReadExt + Unpin>(pipe: Option<R>) -> std::io::Result<String> {
    let mut buf = String::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_string(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
