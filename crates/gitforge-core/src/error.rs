// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for gitforge-core.
//!
//! Every handler failure is an [`OrchestratorError`]; the variant tells which
//! component failed and [`OrchestratorError::error_code`] gives a stable code
//! for status reporting.

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::persistence::StateError;
use crate::render::RenderError;
use crate::service::ServiceError;
use crate::step::StepError;

/// Result type using OrchestratorError
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors surfaced by the orchestrator while handling an event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchestratorError {
    /// A provisioning step failed. `installed` stays false.
    #[error(transparent)]
    Step(#[from] StepError),

    /// Rendering or writing a config file failed. Files rendered before the
    /// failure stay in place.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A service could not be started or restarted.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The bootstrap task failed. `bootstrapped` stays false.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// Reading or writing persisted state failed.
    #[error(transparent)]
    State(#[from] StateError),
}

impl OrchestratorError {
    /// Stable error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Step(_) => "STEP_FAILED",
            Self::Render(_) => "RENDER_FAILED",
            Self::Service(_) => "SERVICE_FAILED",
            Self::Bootstrap(_) => "BOOTSTRAP_FAILED",
            Self::State(_) => "STATE_FAILED",
        }
    }
}
