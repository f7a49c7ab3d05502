// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process runner.
//!
//! Executes commands as direct child processes via `tokio::process`, capturing
//! stdout and stderr.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

use super::traits::*;

/// Runner that spawns real processes on the host.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    /// Environment variables applied to every command (per-command values win).
    pub base_env: Vec<(String, String)>,
}

impl ProcessRunner {
    /// Create a new process runner.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    fn runner_type(&self) -> &'static str {
        "process"
    }

    async fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let start = Instant::now();
        debug!(command = %spec, "Executing command");

        let mut cmd = Command::new(spec.program());
        cmd.args(spec.argv())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &self.base_env {
            cmd.env(key, value);
        }
        for (key, value) in spec.envs() {
            cmd.env(key, value);
        }
        if let Some(dir) = spec.working_dir() {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|source| RunnerError::SpawnFailed {
            program: spec.program().to_string(),
            source,
        })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let duration_ms = start.elapsed().as_millis() as u64;

        if !spec.is_success(exit_code) {
            warn!(command = %spec, exit_code, duration_ms, "Command failed");
        } else {
            debug!(command = %spec, exit_code, duration_ms, "Command finished");
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms,
        })
    }
}
