// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Externally reported unit status.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::LifecyclePhase;

/// Status message while provisioning runs.
pub const INSTALLING: &str = "Installing gitlab server";
/// Status message while no database connection is known.
pub const WAITING_FOR_DATABASE: &str = "Waiting for database relation";
/// Status message while the bootstrap task runs.
pub const BOOTSTRAPPING: &str = "Bootstrapping gitlab server";
/// Status message once bootstrap succeeded.
pub const READY: &str = "Ready";

/// Unit status with a human readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum UnitStatus {
    /// Work in progress (installing, bootstrapping).
    Maintenance(String),
    /// Waiting on an external party.
    Waiting(String),
    /// The last event failed; needs operator attention or a retry.
    Blocked(String),
    /// Serving.
    Active(String),
}

impl UnitStatus {
    /// Status name, e.g. `"blocked"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Maintenance(_) => "maintenance",
            Self::Waiting(_) => "waiting",
            Self::Blocked(_) => "blocked",
            Self::Active(_) => "active",
        }
    }

    /// Status message.
    pub fn message(&self) -> &str {
        match self {
            Self::Maintenance(m) | Self::Waiting(m) | Self::Blocked(m) | Self::Active(m) => m,
        }
    }

    /// Whether the status is [`UnitStatus::Blocked`].
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    /// Steady-state status for a lifecycle phase.
    pub fn for_phase(phase: LifecyclePhase) -> Self {
        match phase {
            LifecyclePhase::Uninstalled => Self::Maintenance(INSTALLING.to_string()),
            LifecyclePhase::AwaitingDatabase => Self::Waiting(WAITING_FOR_DATABASE.to_string()),
            LifecyclePhase::Bootstrapping => Self::Maintenance(BOOTSTRAPPING.to_string()),
            LifecyclePhase::Ready => Self::Active(READY.to_string()),
        }
    }
}

impl Default for UnitStatus {
    fn default() -> Self {
        Self::for_phase(LifecyclePhase::Uninstalled)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}
