// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database relation state tracking.
//!
//! Only notifications naming the expected database mutate
//! [`InstallationState`]; everything else is a no-op.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state::{ConnectionDescriptor, InstallationState};

/// What this unit asks of the database provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRequirements {
    /// Database name.
    pub database: String,
    /// Extensions to enable, in declaration order.
    pub extensions: Vec<String>,
}

impl DatabaseRequirements {
    /// Create requirements for `database`.
    pub fn new<I, S>(database: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            database: database.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Reaction to a relation-joined notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinDecision {
    /// Leader: declare these requirements to the provider.
    Declare(DatabaseRequirements),
    /// Non-leader before the leader declared: retry later.
    Defer,
    /// Requirements already declared with the expected name.
    Accept,
}

/// Applies relation notifications to the installation state.
#[derive(Debug, Clone)]
pub struct RelationTracker {
    requirements: DatabaseRequirements,
}

impl RelationTracker {
    /// Create a tracker expecting `requirements.database`.
    pub fn new(requirements: DatabaseRequirements) -> Self {
        Self { requirements }
    }

    /// Expected database name.
    pub fn expected_database(&self) -> &str {
        &self.requirements.database
    }

    /// Requirements the leader declares.
    pub fn requirements(&self) -> &DatabaseRequirements {
        &self.requirements
    }

    fn matches(&self, database: &str) -> bool {
        database == self.requirements.database
    }

    /// Relation joined. `declared` is the database name already present on the
    /// relation, if any.
    pub fn on_joined(&self, is_leader: bool, declared: Option<&str>) -> JoinDecision {
        if is_leader {
            info!(database = %self.requirements.database, "Declaring database requirements");
            return JoinDecision::Declare(self.requirements.clone());
        }

        if declared.is_some_and(|name| self.matches(name)) {
            JoinDecision::Accept
        } else {
            debug!(declared = ?declared, "Leader has not declared the database yet");
            JoinDecision::Defer
        }
    }

    /// Primary changed. Returns whether `state` was mutated.
    pub fn on_master_changed(
        &self,
        state: &mut InstallationState,
        database: &str,
        master: Option<&ConnectionDescriptor>,
    ) -> bool {
        if !self.matches(database) {
            debug!(database = %database, "Ignoring master change for foreign database");
            return false;
        }

        match master {
            Some(descriptor) => info!(master = %descriptor, "Database primary updated"),
            None => info!("Database primary unavailable"),
        }
        state.set_database_connection(master.cloned());
        true
    }

    /// Standbys changed. Returns whether `state` was mutated.
    pub fn on_standby_changed(
        &self,
        state: &mut InstallationState,
        database: &str,
        standbys: &[ConnectionDescriptor],
    ) -> bool {
        if !self.matches(database) {
            debug!(database = %database, "Ignoring standby change for foreign database");
            return false;
        }

        info!(count = standbys.len(), "Database standbys updated");
        state.set_read_replicas(standbys.to_vec());
        true
    }
}
