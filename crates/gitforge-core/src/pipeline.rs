// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ordered provisioning pipeline.
//!
//! Steps run strictly in order and the first failure stops the pipeline:
//! later steps may depend on earlier ones (runtime before application clone).
//! The pipeline does not persist anything; the caller records completion.

use serde::Serialize;
use tracing::info;

use crate::step::{ProvisioningStep, StepError, StepExecutor, StepOutcome};

/// Per-step entry of a [`PipelineReport`].
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Step name.
    pub step: String,
    /// What happened.
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    /// One entry per step, in execution order.
    pub steps: Vec<StepReport>,
}

impl PipelineReport {
    /// Number of steps whose actions actually ran.
    pub fn executed(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Executed { .. }))
            .count()
    }

    /// Number of steps skipped via their precondition.
    pub fn skipped(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::Skipped)
            .count()
    }
}

/// Fixed, ordered sequence of provisioning steps.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    steps: Vec<ProvisioningStep>,
}

impl Pipeline {
    /// Create a pipeline from an ordered list of steps.
    pub fn new(steps: Vec<ProvisioningStep>) -> Self {
        Self { steps }
    }

    /// The steps, in order.
    pub fn steps(&self) -> &[ProvisioningStep] {
        &self.steps
    }

    /// Run every step in order, stopping at the first failure.
    pub async fn run_all(&self, executor: &StepExecutor) -> Result<PipelineReport, StepError> {
        let mut report = PipelineReport::default();

        for (index, step) in self.steps.iter().enumerate() {
            let outcome = executor.run_at(step, index + 1).await?;
            report.steps.push(StepReport {
                step: step.name.clone(),
                outcome,
            });
        }

        info!(
            executed = report.executed(),
            skipped = report.skipped(),
            "Provisioning pipeline finished"
        );

        Ok(report)
    }
}
