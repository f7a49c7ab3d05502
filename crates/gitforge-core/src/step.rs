// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provisioning steps and the step executor.
//!
//! A step is data: a name, a precondition, and an ordered list of actions.
//! The executor skips the step when its precondition holds, otherwise runs
//! the actions in order and stops at the first failure. Nothing is rolled
//! back; steps are expected to be re-run.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::precondition::{MarkerProbe, Precondition};
use crate::runner::{CommandRunner, CommandSpec, RunnerError, run_checked};

/// Failure of a single action inside a step.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ActionError {
    /// An external command failed.
    #[error(transparent)]
    Command(#[from] RunnerError),

    /// A downloaded artifact did not match its expected digest.
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// File that was verified.
        path: PathBuf,
        /// Expected SHA-256 (hex).
        expected: String,
        /// Actual SHA-256 (hex).
        actual: String,
    },

    /// Filesystem operation failed.
    #[error("{operation} {path}: {source}")]
    Io {
        /// What was being attempted.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// A provisioning step failed.
#[derive(Debug, Error)]
#[error("step {position} ({step}) failed: {source}")]
pub struct StepError {
    /// 1-based position of the step in its pipeline (1 for a standalone step).
    pub position: usize,
    /// Step name.
    pub step: String,
    /// Underlying failure.
    #[source]
    pub source: ActionError,
}

/// Single side-effecting action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run an external command.
    Run(CommandSpec),
    /// Verify the SHA-256 digest of a file.
    VerifySha256 {
        /// File to hash.
        path: PathBuf,
        /// Expected lowercase hex digest.
        expected: String,
    },
    /// Point `link` at `target`, replacing whatever is at `link`.
    Symlink {
        /// Link target.
        target: PathBuf,
        /// Link location.
        link: PathBuf,
    },
}

impl From<CommandSpec> for Action {
    fn from(spec: CommandSpec) -> Self {
        Self::Run(spec)
    }
}

/// Named provisioning step.
#[derive(Debug, Clone)]
pub struct ProvisioningStep {
    /// Step name (used in logs, effects, and errors).
    pub name: String,
    /// Skip condition.
    pub precondition: Precondition,
    /// Ordered actions.
    pub actions: Vec<Action>,
}

impl ProvisioningStep {
    /// Create a step with no precondition and no actions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            precondition: Precondition::Never,
            actions: Vec::new(),
        }
    }

    /// Skip the step while `precondition` holds.
    pub fn unless(mut self, precondition: Precondition) -> Self {
        self.precondition = precondition;
        self
    }

    /// Append a command action.
    pub fn run(mut self, spec: CommandSpec) -> Self {
        self.actions.push(Action::Run(spec));
        self
    }

    /// Append a checksum verification action.
    pub fn verify_sha256(mut self, path: impl Into<PathBuf>, expected: impl Into<String>) -> Self {
        self.actions.push(Action::VerifySha256 {
            path: path.into(),
            expected: expected.into(),
        });
        self
    }

    /// Append a symlink action.
    pub fn symlink(mut self, target: impl Into<PathBuf>, link: impl Into<PathBuf>) -> Self {
        self.actions.push(Action::Symlink {
            target: target.into(),
            link: link.into(),
        });
        self
    }
}

/// What the executor did with a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The precondition held; nothing was executed.
    Skipped,
    /// Every action ran successfully.
    Executed {
        /// Number of actions performed.
        actions: usize,
    },
}

/// Runs provisioning steps against a command runner and marker probe.
#[derive(Clone)]
pub struct StepExecutor {
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn MarkerProbe>,
}

impl StepExecutor {
    /// Create an executor.
    pub fn new(runner: Arc<dyn CommandRunner>, probe: Arc<dyn MarkerProbe>) -> Self {
        Self { runner, probe }
    }

    /// Run a standalone step.
    pub async fn run(&self, step: &ProvisioningStep) -> Result<StepOutcome, StepError> {
        self.run_at(step, 1).await
    }

    /// Run a step that sits at `position` (1-based) in a pipeline.
    pub async fn run_at(
        &self,
        step: &ProvisioningStep,
        position: usize,
    ) -> Result<StepOutcome, StepError> {
        if step.precondition.is_satisfied(self.probe.as_ref()) {
            debug!(step = %step.name, "Precondition satisfied, skipping step");
            return Ok(StepOutcome::Skipped);
        }

        info!(step = %step.name, actions = step.actions.len(), "Running provisioning step");

        for action in &step.actions {
            if let Err(source) = self.perform(action).await {
                warn!(step = %step.name, error = %source, "Provisioning step failed");
                return Err(StepError {
                    position,
                    step: step.name.clone(),
                    source,
                });
            }
        }

        Ok(StepOutcome::Executed {
            actions: step.actions.len(),
        })
    }

    async fn perform(&self, action: &Action) -> Result<(), ActionError> {
        match action {
            Action::Run(spec) => {
                run_checked(self.runner.as_ref(), spec).await?;
                Ok(())
            }
            Action::VerifySha256 { path, expected } => {
                let bytes = tokio::fs::read(path).await.map_err(|source| ActionError::Io {
                    operation: "read",
                    path: path.clone(),
                    source,
                })?;
                let actual = format!("{:x}", Sha256::digest(&bytes));
                if actual.eq_ignore_ascii_case(expected) {
                    Ok(())
                } else {
                    Err(ActionError::ChecksumMismatch {
                        path: path.clone(),
                        expected: expected.clone(),
                        actual,
                    })
                }
            }
            Action::Symlink { target, link } => {
                if tokio::fs::symlink_metadata(link).await.is_ok() {
                    if tokio::fs::read_link(link).await.ok().as_ref() == Some(target) {
                        return Ok(());
                    }
                    tokio::fs::remove_file(link)
                        .await
                        .map_err(|source| ActionError::Io {
                            operation: "remove",
                            path: link.clone(),
                            source,
                        })?;
                }
                tokio::fs::symlink(target, link)
                    .await
                    .map_err(|source| ActionError::Io {
                        operation: "symlink",
                        path: link.clone(),
                        source,
                    })
            }
        }
    }
}
