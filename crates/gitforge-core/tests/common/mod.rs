// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for gitforge-core integration tests.
//!
//! Provides a five-step fixture stack and a TestContext wiring it to mock
//! collaborators, a marker directory and a SQLite state file.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gitforge_core::bootstrap::BootstrapTask;
use gitforge_core::persistence::SqliteStateStore;
use gitforge_core::precondition::{FsProbe, Precondition};
use gitforge_core::relation::DatabaseRequirements;
use gitforge_core::render::{ConfigTemplate, FilePermissions, MemoryFileSink, TemplateSource};
use gitforge_core::runner::{CommandSpec, MockRunner};
use gitforge_core::service::MockServiceManager;
use gitforge_core::step::ProvisioningStep;
use gitforge_core::{ConnectionDescriptor, Event, InstallationState, Orchestrator, OrchestratorParts, StackProfile};

pub const DATABASE: &str = "gitlab-server";
pub const STEPS: [&str; 5] = ["deps", "ruby", "go", "user", "app"];
pub const SEED: &str = "gitlab:db:configure";

/// Five marker-guarded steps, two config files, three services.
pub struct FixtureProfile {
    markers: PathBuf,
}

impl FixtureProfile {
    pub fn new(markers: impl Into<PathBuf>) -> Self {
        Self {
            markers: markers.into(),
        }
    }
}

impl StackProfile for FixtureProfile {
    fn name(&self) -> &str {
        "fixture"
    }

    fn provisioning_steps(&self) -> Vec<ProvisioningStep> {
        STEPS
            .iter()
            .map(|name| {
                ProvisioningStep::new(*name)
                    .unless(Precondition::path(self.markers.join(name)))
                    .run(CommandSpec::new("install").arg(*name))
            })
            .collect()
    }

    fn template_sources(&self) -> Vec<TemplateSource> {
        vec![
            TemplateSource::new("redis.conf", "port {{ port }}\n"),
            TemplateSource::new(
                "database.yml",
                "production:\n  host: \"{{ db_host }}\"\n  database: \"{{ database }}\"\n{% if replicas %}  replicas: [{{ replicas }}]\n{% endif %}",
            ),
        ]
    }

    fn config_templates(&self, state: &InstallationState) -> Vec<ConfigTemplate> {
        let connection = state.database_connection();
        let replicas = state
            .database_read_replicas()
            .iter()
            .filter_map(ConnectionDescriptor::host)
            .collect::<Vec<_>>()
            .join(", ");

        vec![
            ConfigTemplate::new("redis.conf", "/etc/redis/redis.conf")
                .with("port", "6379")
                .permissions(FilePermissions::owned("redis", "redis", 0o640)),
            ConfigTemplate::new("database.yml", "/home/git/gitlab/config/database.yml")
                .with("db_host", connection.and_then(|c| c.host()).unwrap_or_default())
                .with("database", connection.and_then(|c| c.dbname()).unwrap_or_default())
                .with("replicas", replicas)
                .permissions(FilePermissions::owned("git", "git", 0o755)),
        ]
    }

    fn base_services(&self) -> Vec<String> {
        vec!["redis-server".to_string(), "nginx".to_string()]
    }

    fn database_services(&self) -> Vec<String> {
        vec!["gitlab".to_string()]
    }

    fn socket_service(&self) -> Option<String> {
        Some("gitaly".to_string())
    }

    fn bootstrap_task(&self) -> BootstrapTask {
        BootstrapTask {
            clear_cache: vec![CommandSpec::new("redis-cli").arg("flushall")],
            seed: vec![
                CommandSpec::new("bundle")
                    .args(["exec", "rake", SEED])
                    .run_as("git"),
            ],
        }
    }

    fn database_requirements(&self) -> DatabaseRequirements {
        DatabaseRequirements::new(DATABASE, ["pg_trgm", "btree_gist"])
    }
}

/// Runner that creates each step's marker when its install command succeeds.
pub fn marker_runner(markers: &Path) -> MockRunner {
    STEPS.iter().fold(MockRunner::new(), |runner, name| {
        runner.create_on_success(format!("install {}", name), markers.join(name))
    })
}

/// Orchestrator wired to mocks, a marker directory and a SQLite file.
pub struct TestContext {
    pub orchestrator: Orchestrator,
    pub runner: MockRunner,
    pub services: MockServiceManager,
    pub sink: MemoryFileSink,
    pub store: SqliteStateStore,
    pub markers: PathBuf,
    pub db_path: PathBuf,
    is_leader: bool,
    _temp_dir: tempfile::TempDir,
}

impl TestContext {
    /// Leader unit with a runner that succeeds everywhere.
    pub async fn new() -> Self {
        Self::with_runner(|runner| runner, true).await
    }

    /// Customize the marker runner (e.g. add failures) before wiring.
    pub async fn with_runner(
        configure: impl FnOnce(MockRunner) -> MockRunner,
        is_leader: bool,
    ) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let markers = temp_dir.path().join("markers");
        std::fs::create_dir_all(&markers).expect("Failed to create marker dir");
        let db_path = temp_dir.path().join("state").join("gitforge.db");

        let runner = configure(marker_runner(&markers));
        let services = MockServiceManager::new();
        let sink = MemoryFileSink::new();
        let store = SqliteStateStore::from_path(&db_path)
            .await
            .expect("Failed to open state store");

        let orchestrator =
            build(&markers, &runner, &services, &sink, &store, is_leader);

        Self {
            orchestrator,
            runner,
            services,
            sink,
            store,
            markers,
            db_path,
            is_leader,
            _temp_dir: temp_dir,
        }
    }

    /// Simulate a process restart: reopen the SQLite file and build a fresh
    /// orchestrator. Mocks keep their history.
    pub async fn restart(&mut self) {
        self.store = SqliteStateStore::from_path(&self.db_path)
            .await
            .expect("Failed to reopen state store");
        self.orchestrator = build(
            &self.markers,
            &self.runner,
            &self.services,
            &self.sink,
            &self.store,
            self.is_leader,
        );
    }

    /// Number of seed commands run so far.
    pub async fn seed_count(&self) -> usize {
        self.runner
            .command_lines()
            .await
            .iter()
            .filter(|line| line.contains(SEED))
            .count()
    }
}

fn build(
    markers: &Path,
    runner: &MockRunner,
    services: &MockServiceManager,
    sink: &MemoryFileSink,
    store: &SqliteStateStore,
    is_leader: bool,
) -> Orchestrator {
    Orchestrator::new(OrchestratorParts {
        profile: Arc::new(FixtureProfile::new(markers)),
        runner: Arc::new(runner.clone()),
        probe: Arc::new(FsProbe),
        services: Arc::new(services.clone()),
        sink: Arc::new(sink.clone()),
        store: Arc::new(store.clone()),
        is_leader,
    })
    .expect("Failed to build orchestrator")
}

pub fn descriptor(host: &str) -> ConnectionDescriptor {
    ConnectionDescriptor::from_conn_str(&format!(
        "dbname={} host={} port=5432 user=gitlab password=secret",
        DATABASE, host
    ))
    .expect("valid connection string")
}

pub fn master_changed(host: &str) -> Event {
    Event::MasterChanged {
        database: DATABASE.to_string(),
        master: Some(descriptor(host)),
    }
}
