// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Orchestrator assembly for the GitLab stack.
//!
//! [`GitforgeRuntime`] wires the GitLab profile to its collaborators. Every
//! collaborator can be replaced, which is how the integration tests run the
//! full lifecycle against mocks:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gitforge_core::runner::MockRunner;
//! use gitforge_host::runtime::GitforgeRuntime;
//!
//! let orchestrator = GitforgeRuntime::builder()
//!     .config(config)
//!     .runner(Arc::new(MockRunner::new()))
//!     .build()
//!     .await?;
//! ```

use std::sync::Arc;

use gitforge_core::persistence::{SqliteStateStore, StateStore};
use gitforge_core::precondition::{FsProbe, MarkerProbe};
use gitforge_core::render::{FileSink, FsFileSink};
use gitforge_core::runner::{CommandRunner, ProcessRunner};
use gitforge_core::service::{ServiceManager, SystemdServiceManager};
use gitforge_core::{Orchestrator, OrchestratorParts};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::gitlab::GitlabProfile;

/// Entry point for building an orchestrator.
pub struct GitforgeRuntime;

impl GitforgeRuntime {
    /// Start a builder with defaults for a real host.
    pub fn builder() -> GitforgeRuntimeBuilder {
        GitforgeRuntimeBuilder::new()
    }
}

/// Builder for the GitLab orchestrator.
#[derive(Default)]
pub struct GitforgeRuntimeBuilder {
    config: Option<Config>,
    is_leader: Option<bool>,
    runner: Option<Arc<dyn CommandRunner>>,
    probe: Option<Arc<dyn MarkerProbe>>,
    services: Option<Arc<dyn ServiceManager>>,
    sink: Option<Arc<dyn FileSink>>,
    store: Option<Arc<dyn StateStore>>,
}

impl GitforgeRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration. Default: [`Config::default`].
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the leader flag from the configuration.
    pub fn leader(mut self, is_leader: bool) -> Self {
        self.is_leader = Some(is_leader);
        self
    }

    /// Command runner. Default: [`ProcessRunner`].
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Marker probe. Default: [`FsProbe`].
    pub fn probe(mut self, probe: Arc<dyn MarkerProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Service manager. Default: systemd driven through the runner.
    pub fn services(mut self, services: Arc<dyn ServiceManager>) -> Self {
        self.services = Some(services);
        self
    }

    /// File sink. Default: [`FsFileSink`].
    pub fn sink(mut self, sink: Arc<dyn FileSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// State store. Default: SQLite at `config.state_path`.
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Assemble the orchestrator.
    ///
    /// Opens (and migrates) the state database unless a store was supplied,
    /// and parses every template.
    pub async fn build(self) -> Result<Orchestrator> {
        let config = self.config.unwrap_or_default();
        let is_leader = self.is_leader.unwrap_or(config.is_leader);

        let runner = self
            .runner
            .unwrap_or_else(|| Arc::new(ProcessRunner::new()));
        let probe = self.probe.unwrap_or_else(|| Arc::new(FsProbe));
        let services = self
            .services
            .unwrap_or_else(|| Arc::new(SystemdServiceManager::new(runner.clone())));
        let sink = self.sink.unwrap_or_else(|| Arc::new(FsFileSink::new()));

        let store: Arc<dyn StateStore> = match self.store {
            Some(store) => store,
            None => {
                debug!(path = %config.state_path.display(), "Opening state store");
                Arc::new(SqliteStateStore::from_path(&config.state_path).await?)
            }
        };

        let profile = Arc::new(GitlabProfile::new(&config)?);
        let runner_type = runner.runner_type();

        let orchestrator = Orchestrator::new(OrchestratorParts {
            profile,
            runner,
            probe,
            services,
            sink,
            store,
            is_leader,
        })?;

        info!(
            runner = runner_type,
            database = %config.database_name,
            is_leader,
            "Orchestrator ready"
        );

        Ok(orchestrator)
    }
}
