// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for gitforge-host integration tests.
//!
//! Runs the real GitLab profile against mock collaborators. The marker probe
//! reports every marker as present except a chosen few, so only the steps
//! under test (and the unguarded ones) run.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gitforge_core::persistence::SqliteStateStore;
use gitforge_core::precondition::MarkerProbe;
use gitforge_core::render::MemoryFileSink;
use gitforge_core::runner::MockRunner;
use gitforge_core::service::MockServiceManager;
use gitforge_core::{ConnectionDescriptor, Event, Orchestrator};
use gitforge_host::config::Config;
use gitforge_host::runtime::GitforgeRuntime;

pub const DATABASE: &str = "gitlab-server";
pub const SEED: &str = "rake gitlab:db:configure";

/// Probe treating every path as present except the listed ones.
pub struct PresentExcept {
    missing: HashSet<PathBuf>,
}

impl PresentExcept {
    pub fn new<I, P>(missing: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }
}

impl MarkerProbe for PresentExcept {
    fn exists(&self, marker: &Path) -> bool {
        !self.missing.contains(marker)
    }
}

/// GitLab orchestrator over mocks and a SQLite file in a temp dir.
pub struct HostContext {
    pub orchestrator: Orchestrator,
    pub runner: MockRunner,
    pub services: MockServiceManager,
    pub sink: MemoryFileSink,
    pub config: Config,
    missing: Vec<PathBuf>,
    _temp_dir: tempfile::TempDir,
}

impl HostContext {
    /// Leader unit where the system user and the gitlab checkout are missing.
    pub async fn new() -> Self {
        Self::with_runner(MockRunner::new(), true).await
    }

    pub async fn with_runner(runner: MockRunner, is_leader: bool) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let config = Config {
            state_path: temp_dir.path().join("state").join("gitforge.db"),
            fqdn: "git.example.com".to_string(),
            is_leader,
            ..Config::default()
        };
        let missing = vec![
            PathBuf::from("/home/git"),
            PathBuf::from("/home/git/gitlab"),
        ];
        let services = MockServiceManager::new();
        let sink = MemoryFileSink::new();

        let orchestrator = build(&config, &missing, &runner, &services, &sink, None).await;

        Self {
            orchestrator,
            runner,
            services,
            sink,
            config,
            missing,
            _temp_dir: temp_dir,
        }
    }

    /// Reopen the state file with a fresh orchestrator, optionally changing
    /// leadership. Mocks keep their history.
    pub async fn restart(&mut self, is_leader: bool) {
        self.orchestrator = build(
            &self.config,
            &self.missing,
            &self.runner,
            &self.services,
            &self.sink,
            Some(is_leader),
        )
        .await;
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

    /// Contents of a rendered file as text.
    pub async fn rendered(&self, path: &str) -> String {
        let file = self.sink.get(path).await.expect("file was not rendered");
        String::from_utf8(file.contents).expect("rendered file is not UTF-8")
    }
}

async fn build(
    config: &Config,
    missing: &[PathBuf],
    runner: &MockRunner,
    services: &MockServiceManager,
    sink: &MemoryFileSink,
    is_leader: Option<bool>,
) -> Orchestrator {
    let store = SqliteStateStore::from_path(&config.state_path)
        .await
        .expect("Failed to open state store");

    let mut builder = GitforgeRuntime::builder()
        .config(config.clone())
        .runner(Arc::new(runner.clone()))
        .probe(Arc::new(PresentExcept::new(missing.iter().cloned())))
        .services(Arc::new(services.clone()))
        .sink(Arc::new(sink.clone()))
        .store(Arc::new(store));
    if let Some(is_leader) = is_leader {
        builder = builder.leader(is_leader);
    }

    builder.build().await.expect("Failed to build orchestrator")
}

pub fn primary(host: &str) -> ConnectionDescriptor {
    ConnectionDescriptor::from_conn_str(&format!(
        "dbname={} host={} port=5432 user=gitlab password=secret",
        DATABASE, host
    ))
    .expect("valid connection string")
    .with_uri(format!("postgresql://gitlab:secret@{}:5432/{}", host, DATABASE))
}

pub fn master_changed(host: &str) -> Event {
    Event::MasterChanged {
        database: DATABASE.to_string(),
        master: Some(primary(host)),
    }
}
