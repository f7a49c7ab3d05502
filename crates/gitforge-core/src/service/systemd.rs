// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! systemd service manager.
//!
//! Drives `systemctl` through a [`CommandRunner`], so it is exercised with the
//! mock runner in tests exactly like provisioning commands.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{ServiceAction, ServiceError, ServiceManager};
use crate::runner::{CommandRunner, CommandSpec, run_checked};

/// Service manager backed by `systemctl`.
#[derive(Clone)]
pub struct SystemdServiceManager {
    runner: Arc<dyn CommandRunner>,
    systemctl: String,
}

impl SystemdServiceManager {
    /// Create a manager that runs `systemctl` through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            systemctl: "systemctl".to_string(),
        }
    }

    /// Use a different `systemctl` binary (e.g. a wrapper inside containers).
    pub fn with_systemctl(mut self, systemctl: impl Into<String>) -> Self {
        self.systemctl = systemctl.into();
        self
    }
}

#[async_trait]
impl ServiceManager for SystemdServiceManager {
    async fn control(&self, name: &str, action: ServiceAction) -> Result<(), ServiceError> {
        info!(service = %name, action = %action, "Controlling service");
        let spec = CommandSpec::new(&self.systemctl).args([action.as_str(), name]);
        run_checked(self.runner.as_ref(), &spec)
            .await
            .map(|_| ())
            .map_err(|source| ServiceError {
                service: name.to_string(),
                action,
                source,
            })
    }

    async fn is_running(&self, name: &str) -> bool {
        let spec = CommandSpec::new(&self.systemctl).args(["is-active", "--quiet", name]);
        matches!(self.runner.execute(&spec).await, Ok(output) if output.exit_code == 0)
    }
}
