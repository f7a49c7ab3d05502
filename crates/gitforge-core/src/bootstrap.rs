// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! One-shot database bootstrap.
//!
//! The task clears the transient cache and then seeds the database. It is not
//! retried here; the orchestrator leaves `bootstrapped` unset on failure and
//! the next reconfiguration runs the whole task again, so the seed commands
//! must be seed-if-absent.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::info;

use crate::runner::{CommandRunner, CommandSpec, RunnerError, run_checked};
use crate::state::ConnectionDescriptor;

/// Stage of the bootstrap task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapStage {
    /// Flushing the cache store.
    ClearCache,
    /// Seeding the database.
    Seed,
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClearCache => f.write_str("clear cache"),
            Self::Seed => f.write_str("seed"),
        }
    }
}

/// Bootstrap failed.
#[derive(Debug, Error)]
#[error("bootstrap failed during {stage}: {source}")]
pub struct BootstrapError {
    /// Stage that failed.
    pub stage: BootstrapStage,
    /// Command failure.
    #[source]
    pub source: RunnerError,
}

/// Commands making up the bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapTask {
    /// Cache flush commands, run first.
    pub clear_cache: Vec<CommandSpec>,
    /// Database seed commands.
    pub seed: Vec<CommandSpec>,
}

impl BootstrapTask {
    /// Run every cache command, then every seed command. The seed reads its
    /// connection settings from the already rendered configuration;
    /// `connection` names the target for logs.
    pub async fn run(
        &self,
        runner: &dyn CommandRunner,
        connection: &ConnectionDescriptor,
    ) -> Result<(), BootstrapError> {
        for spec in &self.clear_cache {
            run_checked(runner, spec)
                .await
                .map_err(|source| BootstrapError {
                    stage: BootstrapStage::ClearCache,
                    source,
                })?;
        }

        info!(database = %connection, "Seeding database");
        for spec in &self.seed {
            run_checked(runner, spec)
                .await
                .map_err(|source| BootstrapError {
                    stage: BootstrapStage::Seed,
                    source,
                })?;
        }

        Ok(())
    }
}
