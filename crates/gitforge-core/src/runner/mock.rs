// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock runner for testing.
//!
//! A runner implementation that records every command it is asked to run
//! without touching the host, optionally failing selected commands or
//! creating marker files to emulate a command's side effects.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::traits::*;

#[derive(Debug, Clone)]
struct FailureRule {
    fragment: String,
    exit_code: i32,
    stderr: String,
}

#[derive(Debug, Clone)]
struct MarkerRule {
    fragment: String,
    marker: PathBuf,
}

/// Mock runner for testing.
///
/// Clones share the invocation log and the failure switch, so a test can keep
/// a handle while the orchestrator owns another.
#[derive(Clone, Default)]
pub struct MockRunner {
    invocations: Arc<Mutex<Vec<CommandSpec>>>,
    failures: Vec<FailureRule>,
    markers: Vec<MarkerRule>,
    failures_disabled: Arc<AtomicBool>,
    /// If true, every command fails with exit code 1
    pub fail_by_default: bool,
}

impl MockRunner {
    /// Create a new mock runner where every command succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock runner that fails every command.
    pub fn failing() -> Self {
        Self {
            fail_by_default: true,
            ..Self::default()
        }
    }

    /// Fail commands whose command line contains `fragment`.
    pub fn fail_on(mut self, fragment: impl Into<String>, exit_code: i32) -> Self {
        let fragment = fragment.into();
        self.failures.push(FailureRule {
            stderr: format!("mock failure for `{}`", fragment),
            fragment,
            exit_code,
        });
        self
    }

    /// Create `marker` whenever a command containing `fragment` succeeds.
    pub fn create_on_success(
        mut self,
        fragment: impl Into<String>,
        marker: impl Into<PathBuf>,
    ) -> Self {
        self.markers.push(MarkerRule {
            fragment: fragment.into(),
            marker: marker.into(),
        });
        self
    }

    /// Stop failing commands from now on (affects every clone).
    pub fn clear_failures(&self) {
        self.failures_disabled.store(true, Ordering::SeqCst);
    }

    /// All commands executed so far, in order.
    pub async fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations.lock().await.clone()
    }

    /// Command lines executed so far, in order.
    pub async fn command_lines(&self) -> Vec<String> {
        self.invocations
            .lock()
            .await
            .iter()
            .map(CommandSpec::command_line)
            .collect()
    }

    /// Number of commands executed so far.
    pub async fn invocation_count(&self) -> usize {
        self.invocations.lock().await.len()
    }

    /// Forget recorded invocations.
    pub async fn reset(&self) {
        self.invocations.lock().await.clear();
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    fn runner_type(&self) -> &'static str {
        "mock"
    }

    async fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.invocations.lock().await.push(spec.clone());
        let line = spec.command_line();

        let failures_disabled = self.failures_disabled.load(Ordering::SeqCst);

        if self.fail_by_default && !failures_disabled {
            return Ok(CommandOutput {
                exit_code: 1,
                stderr: "Mock failure".to_string(),
                ..Default::default()
            });
        }

        if let Some(rule) = self
            .failures
            .iter()
            .filter(|_| !failures_disabled)
            .find(|r| line.contains(&r.fragment))
        {
            return Ok(CommandOutput {
                exit_code: rule.exit_code,
                stderr: rule.stderr.clone(),
                ..Default::default()
            });
        }

        for rule in self.markers.iter().filter(|r| line.contains(&r.fragment)) {
            if let Some(parent) = rule.marker.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&rule.marker, b"").await?;
        }

        Ok(CommandOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_runner_records_invocations() {
        let runner = MockRunner::new();

        runner.execute(&CommandSpec::new("apt-get").arg("update")).await.unwrap();
        runner
            .execute(&CommandSpec::new("apt-get").args(["install", "-y", "nginx"]))
            .await
            .unwrap();

        assert_eq!(runner.invocation_count().await, 2);
        assert_eq!(
            runner.command_lines().await,
            vec!["apt-get update", "apt-get install -y nginx"]
        );
    }

    #[tokio::test]
    async fn test_mock_runner_fail_on_fragment() {
        let runner = MockRunner::new().fail_on("make install", 2);

        let ok = runner.execute(&CommandSpec::new("make")).await.unwrap();
        assert_eq!(ok.exit_code, 0);

        let failed = runner
            .execute(&CommandSpec::new("make").arg("install"))
            .await
            .unwrap();
        assert_eq!(failed.exit_code, 2);

        let handle = runner.clone();
        handle.clear_failures();
        let retried = runner
            .execute(&CommandSpec::new("make").arg("install"))
            .await
            .unwrap();
        assert_eq!(retried.exit_code, 0);
    }

    #[tokio::test]
    async fn test_mock_runner_failing() {
        let runner = MockRunner::failing();
        let spec = CommandSpec::new("true");

        let err = run_checked(&runner, &spec).await.unwrap_err();
        assert!(matches!(err, RunnerError::ExitCode { exit_code: 1, .. }));
    }

    #[tokio::test]
    async fn test_mock_runner_creates_markers() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("nested").join("done");
        let runner = MockRunner::new().create_on_success("build", &marker);

        runner.execute(&CommandSpec::new("echo")).await.unwrap();
        assert!(!marker.exists());

        runner.execute(&CommandSpec::new("build")).await.unwrap();
        assert!(marker.exists());
    }
}
