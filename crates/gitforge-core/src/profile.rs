// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stack profiles.
//!
//! A profile describes one concrete stack purely as data: which steps
//! provision it, which files configure it, which services run it and how its
//! database is bootstrapped. The orchestrator iterates these lists in order
//! and knows nothing about their content.

use crate::bootstrap::BootstrapTask;
use crate::relation::DatabaseRequirements;
use crate::render::{ConfigTemplate, TemplateSource};
use crate::state::InstallationState;
use crate::step::ProvisioningStep;

/// Data describing a provisionable stack.
pub trait StackProfile: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Ordered provisioning steps run on install.
    fn provisioning_steps(&self) -> Vec<ProvisioningStep>;

    /// Template sources, registered once with the renderer.
    fn template_sources(&self) -> Vec<TemplateSource>;

    /// Config files for the current state, in render order. Files that do not
    /// depend on the database connection come first.
    fn config_templates(&self, state: &InstallationState) -> Vec<ConfigTemplate>;

    /// Services restarted on every reconfiguration.
    fn base_services(&self) -> Vec<String>;

    /// Services restarted only once the database is bootstrapped and a
    /// connection is present.
    fn database_services(&self) -> Vec<String>;

    /// Service that must be running before bootstrap, if any.
    fn socket_service(&self) -> Option<String> {
        None
    }

    /// Commands making up the one-shot bootstrap.
    fn bootstrap_task(&self) -> BootstrapTask;

    /// What the leader declares on the database relation.
    fn database_requirements(&self) -> DatabaseRequirements;
}
