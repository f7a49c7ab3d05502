// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle orchestrator.
//!
//! Consumes one [`Event`] at a time and decides which provisioning,
//! reconfiguration and bootstrap actions are safe to run. Persisted state is
//! written only after the work it records has succeeded, so a crash at any
//! point leaves the store saying "not yet done".
//!
//! Every reconfiguration runs in the same order:
//!
//! 1. render every config template (database-independent ones first)
//! 2. restart the base services
//! 3. when a connection is known and bootstrap has not succeeded yet: make
//!    sure the socket service is running, then run the bootstrap task
//! 4. when bootstrapped and a connection is known: restart the database
//!    services

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::bootstrap::BootstrapTask;
use crate::error::Result;
use crate::event::Event;
use crate::persistence::StateStore;
use crate::pipeline::Pipeline;
use crate::precondition::MarkerProbe;
use crate::profile::StackProfile;
use crate::relation::{JoinDecision, RelationTracker};
use crate::render::{FileSink, Renderer};
use crate::runner::CommandRunner;
use crate::service::{ServiceAction, ServiceManager};
use crate::state::{InstallationState, LifecyclePhase};
use crate::status::{self, UnitStatus};
use crate::step::{StepExecutor, StepOutcome};

/// How an event was treated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Disposition {
    /// The handler ran.
    Applied,
    /// The event does not apply in the current state (e.g. config-changed
    /// before install). Nothing was done.
    Skipped(String),
    /// The event was queued for redelivery.
    Deferred,
    /// The event refers to something this unit does not track.
    Ignored(String),
}

/// A side effect performed, or requested from the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Step skipped because its precondition held.
    StepSkipped {
        /// Step name.
        step: String,
    },
    /// Step actions ran.
    StepExecuted {
        /// Step name.
        step: String,
        /// Number of actions run.
        actions: usize,
    },
    /// `installed` became true.
    Installed,
    /// A config file was written.
    FileRendered {
        /// Template id.
        template_id: String,
        /// Target path.
        path: PathBuf,
        /// SHA-256 of the written bytes.
        sha256: String,
    },
    /// A service was restarted.
    ServiceRestarted {
        /// Service name.
        service: String,
    },
    /// A stopped service was started.
    ServiceStarted {
        /// Service name.
        service: String,
    },
    /// `bootstrapped` became true.
    Bootstrapped,
    /// The driver must declare these requirements on the database relation.
    RequirementsDeclared {
        /// Database name.
        database: String,
        /// Extensions.
        extensions: Vec<String>,
    },
    /// Relation data for the expected database was recorded.
    RelationUpdated {
        /// Database name.
        database: String,
    },
    /// The event was queued for redelivery.
    EventDeferred {
        /// Event name.
        event: String,
    },
}

/// Result of handling one event.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// Event name.
    pub event: String,
    /// How the event was treated.
    pub disposition: Disposition,
    /// Phase after handling.
    pub phase: LifecyclePhase,
    /// Reported status after handling.
    pub status: UnitStatus,
    /// State after handling.
    pub state: InstallationState,
    /// Side effects, in the order they happened.
    pub effects: Vec<Effect>,
}

impl Outcome {
    /// Whether the handler ran.
    pub fn is_applied(&self) -> bool {
        self.disposition == Disposition::Applied
    }

    /// Number of effects matching `pred`.
    pub fn count(&self, pred: impl Fn(&Effect) -> bool) -> usize {
        self.effects.iter().filter(|e| pred(e)).count()
    }
}

/// Result of [`Orchestrator::dispatch`].
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    /// Outcomes of previously deferred events, replayed first.
    pub replayed: Vec<Outcome>,
    /// Outcome of the dispatched event.
    pub outcome: Outcome,
}

/// Collaborators an [`Orchestrator`] is assembled from.
pub struct OrchestratorParts {
    /// The stack being managed.
    pub profile: Arc<dyn StackProfile>,
    /// Executes external commands.
    pub runner: Arc<dyn CommandRunner>,
    /// Evaluates step preconditions.
    pub probe: Arc<dyn MarkerProbe>,
    /// Controls OS services.
    pub services: Arc<dyn ServiceManager>,
    /// Materializes rendered config files.
    pub sink: Arc<dyn FileSink>,
    /// Persists state.
    pub store: Arc<dyn StateStore>,
    /// Whether this unit is the elected leader.
    pub is_leader: bool,
}

/// The lifecycle state machine.
pub struct Orchestrator {
    profile: Arc<dyn StackProfile>,
    runner: Arc<dyn CommandRunner>,
    executor: StepExecutor,
    pipeline: Pipeline,
    renderer: Renderer,
    services: Arc<dyn ServiceManager>,
    store: Arc<dyn StateStore>,
    relation: RelationTracker,
    bootstrap: BootstrapTask,
    is_leader: bool,
}

impl Orchestrator {
    /// Assemble an orchestrator. Fails when a template source does not parse.
    pub fn new(parts: OrchestratorParts) -> Result<Self> {
        let OrchestratorParts {
            profile,
            runner,
            probe,
            services,
            sink,
            store,
            is_leader,
        } = parts;

        let renderer = Renderer::new(profile.template_sources(), sink)?;
        let pipeline = Pipeline::new(profile.provisioning_steps());
        let relation = RelationTracker::new(profile.database_requirements());
        let bootstrap = profile.bootstrap_task();
        let executor = StepExecutor::new(runner.clone(), probe);

        debug!(
            profile = profile.name(),
            steps = pipeline.steps().len(),
            is_leader,
            "Orchestrator assembled"
        );

        Ok(Self {
            profile,
            runner,
            executor,
            pipeline,
            renderer,
            services,
            store,
            relation,
            bootstrap,
            is_leader,
        })
    }

    /// Whether this unit acts as leader.
    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    /// Change leadership, e.g. after an election.
    pub fn set_leader(&mut self, is_leader: bool) {
        self.is_leader = is_leader;
    }

    /// Current persisted state.
    pub async fn state(&self) -> Result<InstallationState> {
        Ok(self.store.load().await?)
    }

    /// Last reported status, or the steady status for the current phase.
    pub async fn status(&self) -> Result<UnitStatus> {
        match self.store.load_status().await? {
            Some(status) => Ok(status),
            None => Ok(steady_status(&self.store.load().await?)),
        }
    }

    /// Replay deferred events, oldest first, then handle `event`.
    ///
    /// If a replayed event fails, it and every event after it go back on the
    /// queue, followed by `event`, and the error is returned. `event` is then
    /// handled by a later dispatch once the queue drains.
    pub async fn dispatch(&mut self, event: Event) -> Result<DispatchReport> {
        let deferred = self.store.take_deferred().await?;
        if !deferred.is_empty() {
            info!(count = deferred.len(), "Replaying deferred events");
        }

        let mut replayed = Vec::with_capacity(deferred.len());
        let mut pending = deferred.into_iter();
        while let Some(queued) = pending.next() {
            match self.handle(&queued).await {
                Ok(outcome) => replayed.push(outcome),
                Err(err) => {
                    self.store.defer_event(&queued).await?;
                    for rest in pending.by_ref() {
                        self.store.defer_event(&rest).await?;
                    }
                    self.store.defer_event(&event).await?;
                    warn!(event = %event, "Deferred behind a failed replay");
                    return Err(err);
                }
            }
        }

        let outcome = self.handle(&event).await?;
        Ok(DispatchReport { replayed, outcome })
    }

    /// Handle one event to completion.
    ///
    /// On failure the status becomes [`UnitStatus::Blocked`] and the error is
    /// returned; persisted flags are untouched.
    pub async fn handle(&mut self, event: &Event) -> Result<Outcome> {
        info!(event = %event, "Handling event");
        let mut state = self.store.load().await?;
        let mut effects = Vec::new();

        let disposition = match self.apply(event, &mut state, &mut effects).await {
            Ok(disposition) => disposition,
            Err(err) => {
                error!(event = %event, code = err.error_code(), error = %err, "Event handler failed");
                let blocked = UnitStatus::Blocked(err.to_string());
                if let Err(store_err) = self.store.save_status(&blocked).await {
                    warn!(error = %store_err, "Failed to record blocked status");
                }
                return Err(err);
            }
        };

        let status = match &disposition {
            Disposition::Applied => {
                let status = steady_status(&state);
                self.store.save_status(&status).await?;
                status
            }
            _ => match self.store.load_status().await? {
                Some(previous) => previous,
                None => steady_status(&state),
            },
        };

        info!(
            event = %event,
            disposition = ?disposition,
            phase = %state.phase(),
            effects = effects.len(),
            "Event handled"
        );

        Ok(Outcome {
            event: event.name().to_string(),
            disposition,
            phase: state.phase(),
            status,
            state,
            effects,
        })
    }

    async fn apply(
        &self,
        event: &Event,
        state: &mut InstallationState,
        effects: &mut Vec<Effect>,
    ) -> Result<Disposition> {
        match event {
            Event::Install => self.install(state, effects).await,
            Event::ConfigChanged => self.reconfigure(state, effects).await,
            Event::DatabaseRelationJoined { database } => {
                match self.relation.on_joined(self.is_leader, database.as_deref()) {
                    JoinDecision::Declare(requirements) => {
                        effects.push(Effect::RequirementsDeclared {
                            database: requirements.database,
                            extensions: requirements.extensions,
                        });
                        Ok(Disposition::Applied)
                    }
                    JoinDecision::Defer => {
                        self.store.defer_event(event).await?;
                        effects.push(Effect::EventDeferred {
                            event: event.name().to_string(),
                        });
                        Ok(Disposition::Deferred)
                    }
                    JoinDecision::Accept => Ok(Disposition::Applied),
                }
            }
            Event::MasterChanged { database, master } => {
                if !self
                    .relation
                    .on_master_changed(state, database, master.as_ref())
                {
                    return Ok(self.foreign(database));
                }
                self.relation_updated(database, state, effects).await
            }
            Event::StandbyChanged { database, standbys } => {
                if !self.relation.on_standby_changed(state, database, standbys) {
                    return Ok(self.foreign(database));
                }
                self.relation_updated(database, state, effects).await
            }
        }
    }

    fn foreign(&self, database: &str) -> Disposition {
        Disposition::Ignored(format!(
            "database '{}' is not '{}'",
            database,
            self.relation.expected_database()
        ))
    }

    /// Persist a relation mutation, then reconfigure. The relation update
    /// stands even when the reconfiguration is skipped or fails.
    async fn relation_updated(
        &self,
        database: &str,
        state: &mut InstallationState,
        effects: &mut Vec<Effect>,
    ) -> Result<Disposition> {
        self.store.save(state).await?;
        effects.push(Effect::RelationUpdated {
            database: database.to_string(),
        });
        self.reconfigure(state, effects).await?;
        Ok(Disposition::Applied)
    }

    async fn install(
        &self,
        state: &mut InstallationState,
        effects: &mut Vec<Effect>,
    ) -> Result<Disposition> {
        if state.installed() {
            return Ok(Disposition::Skipped("already installed".to_string()));
        }

        self.store
            .save_status(&UnitStatus::Maintenance(status::INSTALLING.to_string()))
            .await?;

        let report = self.pipeline.run_all(&self.executor).await?;
        effects.extend(report.steps.into_iter().map(|entry| match entry.outcome {
            StepOutcome::Skipped => Effect::StepSkipped { step: entry.step },
            StepOutcome::Executed { actions } => Effect::StepExecuted {
                step: entry.step,
                actions,
            },
        }));

        state.mark_installed();
        self.store.save(state).await?;
        effects.push(Effect::Installed);
        info!(profile = self.profile.name(), "Installation complete");

        Ok(Disposition::Applied)
    }

    async fn reconfigure(
        &self,
        state: &mut InstallationState,
        effects: &mut Vec<Effect>,
    ) -> Result<Disposition> {
        if !state.installed() {
            debug!("Reconfiguration requested before installation finished");
            return Ok(Disposition::Skipped("not installed".to_string()));
        }

        for template in self.profile.config_templates(state) {
            let rendered = self.renderer.render(&template).await?;
            effects.push(Effect::FileRendered {
                template_id: rendered.template_id,
                path: rendered.path,
                sha256: rendered.sha256,
            });
        }

        for service in self.profile.base_services() {
            self.restart(service, effects).await?;
        }

        if let Some(connection) = state.database_connection().cloned()
            && !state.bootstrapped()
        {
            self.store
                .save_status(&UnitStatus::Maintenance(status::BOOTSTRAPPING.to_string()))
                .await?;

            if let Some(socket) = self.profile.socket_service()
                && !self.services.is_running(&socket).await
            {
                self.services.control(&socket, ServiceAction::Start).await?;
                effects.push(Effect::ServiceStarted { service: socket });
            }

            self.bootstrap.run(self.runner.as_ref(), &connection).await?;

            if state.mark_bootstrapped() {
                self.store.save(state).await?;
                effects.push(Effect::Bootstrapped);
                info!(database = %connection, "Bootstrap complete");
            }
        }

        if state.bootstrapped() && state.database_connection().is_some() {
            for service in self.profile.database_services() {
                self.restart(service, effects).await?;
            }
        } else if state.bootstrapped() {
            warn!("Database connection absent; database services left as they are");
        }

        Ok(Disposition::Applied)
    }

    async fn restart(&self, service: String, effects: &mut Vec<Effect>) -> Result<()> {
        self.services
            .control(&service, ServiceAction::Restart)
            .await?;
        effects.push(Effect::ServiceRestarted { service });
        Ok(())
    }
}

/// Status for a state when nothing is failing.
fn steady_status(state: &InstallationState) -> UnitStatus {
    match state.phase() {
        LifecyclePhase::Ready if state.database_connection().is_none() => {
            UnitStatus::Waiting(status::WAITING_FOR_DATABASE.to_string())
        }
        phase => UnitStatus::for_phase(phase),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::BootstrapTask;
    use crate::persistence::MemoryStateStore;
    use crate::precondition::{FsProbe, Precondition};
    use crate::relation::DatabaseRequirements;
    use crate::render::{ConfigTemplate, MemoryFileSink, TemplateSource};
    use crate::runner::{CommandSpec, MockRunner};
    use crate::service::MockServiceManager;
    use crate::state::ConnectionDescriptor;
    use crate::step::ProvisioningStep;

    struct TinyProfile;

    impl StackProfile for TinyProfile {
        fn name(&self) -> &str {
            "tiny"
        }

        fn provisioning_steps(&self) -> Vec<ProvisioningStep> {
            vec![
                ProvisioningStep::new("packages")
                    .unless(Precondition::Never)
                    .run(CommandSpec::new("apt-get").args(["install", "-y", "redis-server"])),
            ]
        }

        fn template_sources(&self) -> Vec<TemplateSource> {
            vec![TemplateSource::new("app.conf", "db={{ db_host }}\n")]
        }

        fn config_templates(&self, state: &InstallationState) -> Vec<ConfigTemplate> {
            let host = state
                .database_connection()
                .and_then(|c| c.host())
                .unwrap_or_default();
            vec![ConfigTemplate::new("app.conf", "/etc/app.conf").with("db_host", host)]
        }

        fn base_services(&self) -> Vec<String> {
            vec!["redis-server".to_string()]
        }

        fn database_services(&self) -> Vec<String> {
            vec!["app".to_string()]
        }

        fn socket_service(&self) -> Option<String> {
            Some("socketd".to_string())
        }

        fn bootstrap_task(&self) -> BootstrapTask {
            BootstrapTask {
                clear_cache: vec![CommandSpec::new("redis-cli").arg("flushall")],
                seed: vec![CommandSpec::new("app-seed")],
            }
        }

        fn database_requirements(&self) -> DatabaseRequirements {
            DatabaseRequirements::new("appdb", ["pg_trgm"])
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        runner: MockRunner,
        services: MockServiceManager,
        sink: MemoryFileSink,
        store: MemoryStateStore,
    }

    fn harness(runner: MockRunner, is_leader: bool) -> Harness {
        harness_with(runner, MemoryFileSink::new(), MemoryStateStore::new(), is_leader)
    }

    fn harness_with(
        runner: MockRunner,
        sink: MemoryFileSink,
        store: MemoryStateStore,
        is_leader: bool,
    ) -> Harness {
        let services = MockServiceManager::new();
        let orchestrator = Orchestrator::new(OrchestratorParts {
            profile: Arc::new(TinyProfile),
            runner: Arc::new(runner.clone()),
            probe: Arc::new(FsProbe),
            services: Arc::new(services.clone()),
            sink: Arc::new(sink.clone()),
            store: Arc::new(store.clone()),
            is_leader,
        })
        .unwrap();

        Harness {
            orchestrator,
            runner,
            services,
            sink,
            store,
        }
    }

    fn labels(outcome: &Outcome) -> Vec<String> {
        outcome
            .effects
            .iter()
            .map(|effect| match effect {
                Effect::RelationUpdated { database } => format!("relation_updated:{}", database),
                Effect::FileRendered { template_id, .. } => format!("rendered:{}", template_id),
                Effect::ServiceRestarted { service } => format!("restarted:{}", service),
                Effect::ServiceStarted { service } => format!("started:{}", service),
                Effect::Bootstrapped => "bootstrapped".to_string(),
                other => format!("{:?}", other),
            })
            .collect()
    }

    fn master(host: &str) -> Event {
        Event::MasterChanged {
            database: "appdb".to_string(),
            master: Some(
                ConnectionDescriptor::from_conn_str(&format!("host={} dbname=appdb", host))
                    .unwrap(),
            ),
        }
    }

    #[tokio::test]
    async fn test_config_changed_before_install_is_noop() {
        let mut h = harness(MockRunner::new(), true);

        let outcome = h.orchestrator.handle(&Event::ConfigChanged).await.unwrap();

        assert_eq!(outcome.disposition, Disposition::Skipped("not installed".to_string()));
        assert!(outcome.effects.is_empty());
        assert_eq!(h.sink.write_count().await, 0);
        assert!(h.services.calls().await.is_empty());
        assert_eq!(h.runner.invocation_count().await, 0);
    }

    #[tokio::test]
    async fn test_install_failure_blocks_and_keeps_flag() {
        let mut h = harness(MockRunner::new().fail_on("apt-get", 100), true);

        let err = h.orchestrator.handle(&Event::Install).await.unwrap_err();

        assert_eq!(err.error_code(), "STEP_FAILED");
        assert!(!h.store.load().await.unwrap().installed());
        assert!(h.orchestrator.status().await.unwrap().is_blocked());
        assert_eq!(h.store.save_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_install_is_skipped() {
        let mut h = harness(MockRunner::new(), true);
        h.orchestrator.handle(&Event::Install).await.unwrap();

        let outcome = h.orchestrator.handle(&Event::Install).await.unwrap();

        assert_eq!(outcome.disposition, Disposition::Skipped("already installed".to_string()));
        assert_eq!(h.runner.invocation_count().await, 1);
    }

    #[tokio::test]
    async fn test_bootstrap_order() {
        let mut h = harness(MockRunner::new(), true);
        h.orchestrator.handle(&Event::Install).await.unwrap();
        h.runner.reset().await;

        let outcome = h.orchestrator.handle(&master("10.0.0.5")).await.unwrap();

        assert_eq!(
            labels(&outcome),
            vec![
                "relation_updated:appdb",
                "rendered:app.conf",
                "restarted:redis-server",
                "started:socketd",
                "bootstrapped",
                "restarted:app",
            ]
        );
        assert_eq!(
            h.runner.command_lines().await,
            vec!["redis-cli flushall", "app-seed"]
        );
        assert_eq!(
            h.sink.get("/etc/app.conf").await.unwrap().contents,
            b"db=10.0.0.5\n"
        );
        assert_eq!(outcome.phase, LifecyclePhase::Ready);
        assert_eq!(outcome.status, UnitStatus::Active("Ready".to_string()));
    }

    #[tokio::test]
    async fn test_bootstrap_failure_leaves_flag_and_retries() {
        let runner = MockRunner::new().fail_on("app-seed", 1);
        let mut h = harness(runner, true);
        h.orchestrator.handle(&Event::Install).await.unwrap();

        let err = h.orchestrator.handle(&master("db")).await.unwrap_err();
        assert_eq!(err.error_code(), "BOOTSTRAP_FAILED");

        let state = h.store.load().await.unwrap();
        assert!(!state.bootstrapped());
        assert!(state.database_connection().is_some());
        assert!(h.orchestrator.status().await.unwrap().is_blocked());
        assert!(h.services.calls_for(ServiceAction::Restart).await.iter().all(|s| s != "app"));

        h.runner.clear_failures();
        let outcome = h.orchestrator.handle(&Event::ConfigChanged).await.unwrap();
        assert_eq!(outcome.count(|e| *e == Effect::Bootstrapped), 1);
        assert!(outcome.state.bootstrapped());
    }

    #[tokio::test]
    async fn test_connection_lost_after_bootstrap() {
        let mut h = harness(MockRunner::new(), true);
        h.orchestrator.handle(&Event::Install).await.unwrap();
        h.orchestrator.handle(&master("db")).await.unwrap();

        let outcome = h
            .orchestrator
            .handle(&Event::MasterChanged {
                database: "appdb".to_string(),
                master: None,
            })
            .await
            .unwrap();

        assert!(outcome.state.bootstrapped());
        assert!(outcome.state.database_connection().is_none());
        assert_eq!(
            outcome.status,
            UnitStatus::Waiting("Waiting for database relation".to_string())
        );
        assert_eq!(
            outcome.count(|e| matches!(e, Effect::ServiceRestarted { service } if service == "app")),
            0
        );
    }

    #[tokio::test]
    async fn test_non_leader_join_is_deferred_and_replayed() {
        let mut h = harness(MockRunner::new(), false);

        let outcome = h
            .orchestrator
            .handle(&Event::DatabaseRelationJoined { database: None })
            .await
            .unwrap();
        assert_eq!(outcome.disposition, Disposition::Deferred);
        assert_eq!(h.store.deferred_count().await, 1);

        h.orchestrator.set_leader(true);
        let report = h.orchestrator.dispatch(Event::ConfigChanged).await.unwrap();

        assert_eq!(report.replayed.len(), 1);
        assert_eq!(
            report.replayed[0].effects,
            vec![Effect::RequirementsDeclared {
                database: "appdb".to_string(),
                extensions: vec!["pg_trgm".to_string()],
            }]
        );
        assert_eq!(h.store.deferred_count().await, 0);
    }

    #[tokio::test]
    async fn test_foreign_database_ignored() {
        let mut h = harness(MockRunner::new(), true);
        h.orchestrator.handle(&Event::Install).await.unwrap();
        let before = h.store.load().await.unwrap();

        let outcome = h
            .orchestrator
            .handle(&Event::StandbyChanged {
                database: "other".to_string(),
                standbys: vec![],
            })
            .await
            .unwrap();

        assert!(matches!(outcome.disposition, Disposition::Ignored(_)));
        assert_eq!(h.store.load().await.unwrap(), before);
        assert_eq!(h.sink.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_render_failure_stops_reconfiguration() {
        let connection = ConnectionDescriptor::from_conn_str("host=db dbname=appdb").unwrap();
        let store = MemoryStateStore::with_state(InstallationState::from_parts(
            true,
            false,
            Some(connection),
            vec![],
        ));
        let sink = MemoryFileSink::new().failing_on("/etc/app.conf");
        let mut h = harness_with(MockRunner::new(), sink, store, true);

        let err = h.orchestrator.handle(&Event::ConfigChanged).await.unwrap_err();

        assert_eq!(err.error_code(), "RENDER_FAILED");
        assert!(h.services.calls().await.is_empty());
        assert_eq!(h.runner.invocation_count().await, 0);
        assert!(!h.store.load().await.unwrap().bootstrapped());
        assert!(h.orchestrator.status().await.unwrap().is_blocked());
    }

    #[tokio::test]
    async fn test_failed_replay_queues_new_event_last() {
        let mut h = harness(MockRunner::new().fail_on("app-seed", 1), true);
        h.orchestrator.handle(&Event::Install).await.unwrap();
        let standby = Event::StandbyChanged {
            database: "appdb".to_string(),
            standbys: vec![],
        };
        h.store.defer_event(&master("db")).await.unwrap();
        h.store.defer_event(&standby).await.unwrap();

        let err = h.orchestrator.dispatch(Event::ConfigChanged).await.unwrap_err();

        assert_eq!(err.error_code(), "BOOTSTRAP_FAILED");
        assert_eq!(
            h.store.take_deferred().await.unwrap(),
            vec![master("db"), standby, Event::ConfigChanged]
        );
    }
}
