// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Command runner trait definitions.
//!
//! Defines the typed command description and the abstract interface for
//! executing it. Commands are never assembled from shell strings: every
//! invocation is a program plus an argument vector.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from runner operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// The program could not be spawned at all.
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        /// Program that failed to start.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// Process exited with an exit code outside the expected set.
    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    ExitCode {
        /// Command line that failed.
        command: String,
        /// Exit code from the process (-1 when killed by a signal).
        exit_code: i32,
        /// Standard error output.
        stderr: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// A single external command invocation.
///
/// Built with a small builder so step definitions read as data:
///
/// ```
/// use gitforge_core::runner::CommandSpec;
///
/// let spec = CommandSpec::new("git")
///     .args(["clone", "https://example.com/repo.git", "repo"])
///     .current_dir("/home/git")
///     .run_as("git");
/// assert_eq!(spec.program(), "sudo");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    run_as: Option<String>,
    success_codes: Vec<i32>,
}

impl CommandSpec {
    /// Create a spec for `program` with no arguments, expecting exit code 0.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            run_as: None,
            success_codes: vec![0],
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the command from `dir`.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for the command.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Run the command as another system user (`sudo -u <user> -H`).
    pub fn run_as(mut self, user: impl Into<String>) -> Self {
        self.run_as = Some(user.into());
        self
    }

    /// Replace the set of exit codes treated as success.
    pub fn success_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.success_codes = codes.into_iter().collect();
        self
    }

    /// The program actually executed (`sudo` when running as another user).
    pub fn program(&self) -> &str {
        if self.run_as.is_some() {
            "sudo"
        } else {
            &self.program
        }
    }

    /// The full argument vector actually passed to [`program`](Self::program).
    pub fn argv(&self) -> Vec<String> {
        match &self.run_as {
            Some(user) => {
                let mut argv = vec![
                    "-u".to_string(),
                    user.clone(),
                    "-H".to_string(),
                    self.program.clone(),
                ];
                argv.extend(self.args.iter().cloned());
                argv
            }
            None => self.args.clone(),
        }
    }

    /// Working directory, if any.
    pub fn working_dir(&self) -> Option<&std::path::Path> {
        self.working_dir.as_deref()
    }

    /// Extra environment variables.
    pub fn envs(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Whether `exit_code` counts as success for this command.
    pub fn is_success(&self, exit_code: i32) -> bool {
        self.success_codes.contains(&exit_code)
    }

    /// Human-readable command line, for logs and error messages only.
    pub fn command_line(&self) -> String {
        let mut line = self.program().to_string();
        for arg in self.argv() {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('\'');
                line.push_str(&arg);
                line.push('\'');
            } else {
                line.push_str(&arg);
            }
        }
        line
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code (-1 when the process was terminated by a signal).
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Turn an unexpected exit code into [`RunnerError::ExitCode`].
    pub fn check(self, spec: &CommandSpec) -> Result<Self> {
        if spec.is_success(self.exit_code) {
            Ok(self)
        } else {
            Err(RunnerError::ExitCode {
                command: spec.command_line(),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Trait for command runners.
///
/// Runners are PURE execution engines - they never look at installation
/// state. A non-success exit code is not an error at this level; callers use
/// [`run_checked`] when the exit code should fail the operation.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runner type identifier (e.g., "process", "mock")
    fn runner_type(&self) -> &'static str;

    /// Execute a command synchronously, waiting for completion.
    ///
    /// There is no timeout at this layer; a hung command blocks the caller.
    async fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Execute `spec` and fail on exit codes outside its success set.
pub async fn run_checked(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<CommandOutput> {
    runner.execute(spec).await?.check(spec)
}
