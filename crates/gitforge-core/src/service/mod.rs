// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service module - OS service control backends.

pub mod mock;
pub mod systemd;

pub use mock::MockServiceManager;
pub use systemd::SystemdServiceManager;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runner::RunnerError;

/// Action applied to a named service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    /// Start the service.
    Start,
    /// Stop the service.
    Stop,
    /// Restart the service (starting it when stopped).
    Restart,
}

impl ServiceAction {
    /// Returns the string representation of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl std::fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from service control.
#[derive(Debug, Error)]
#[error("failed to {action} service '{service}': {source}")]
pub struct ServiceError {
    /// Service name.
    pub service: String,
    /// Requested action.
    pub action: ServiceAction,
    /// Underlying failure.
    #[source]
    pub source: RunnerError,
}

/// Trait for service managers.
#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// Apply `action` to the service `name`.
    async fn control(&self, name: &str, action: ServiceAction) -> Result<(), ServiceError>;

    /// Whether the service is currently running. Query failures count as not running.
    async fn is_running(&self, name: &str) -> bool;
}
