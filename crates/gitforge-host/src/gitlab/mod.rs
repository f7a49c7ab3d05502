// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The GitLab source-install stack.
//!
//! [`GitlabProfile`] is a [`StackProfile`] describing a GitLab installation
//! built from source: redis and nginx in front, puma serving the rails app,
//! gitaly exposing the repository socket, and PostgreSQL reached over the
//! database relation.

mod steps;

pub use steps::provisioning_steps;

use gitforge_core::StackProfile;
use gitforge_core::bootstrap::BootstrapTask;
use gitforge_core::relation::DatabaseRequirements;
use gitforge_core::render::{ConfigTemplate, FilePermissions, RenderError, TemplateSource};
use gitforge_core::runner::CommandSpec;
use gitforge_core::state::{ConnectionDescriptor, InstallationState};
use gitforge_core::step::ProvisioningStep;
use tracing::info;

use crate::config::{Config, SecretsConfig};
use steps::GITLAB_HOME;

const REDIS_SOCKET: &str = "/var/run/redis/redis.sock";
const DEFAULT_PG_PORT: &str = "5432";

/// Template ids, matching the file names under `templates/`.
pub mod template_ids {
    /// redis server configuration.
    pub const REDIS: &str = "redis.conf.j2";
    /// Main GitLab configuration.
    pub const GITLAB: &str = "gitlab.yml.j2";
    /// Rails secrets.
    pub const SECRETS: &str = "secrets.yml.j2";
    /// Background job redis connection.
    pub const RESQUE: &str = "resque.yml.j2";
    /// Puma web server.
    pub const PUMA: &str = "puma.rb.j2";
    /// nginx site.
    pub const NGINX: &str = "nginx-gitlab.j2";
    /// PostgreSQL connection.
    pub const DATABASE: &str = "database.yml.j2";
}

fn embedded_sources() -> Vec<TemplateSource> {
    vec![
        TemplateSource::new(template_ids::REDIS, include_str!("../../templates/redis.conf.j2")),
        TemplateSource::new(template_ids::GITLAB, include_str!("../../templates/gitlab.yml.j2")),
        TemplateSource::new(template_ids::SECRETS, include_str!("../../templates/secrets.yml.j2")),
        TemplateSource::new(template_ids::RESQUE, include_str!("../../templates/resque.yml.j2")),
        TemplateSource::new(template_ids::PUMA, include_str!("../../templates/puma.rb.j2")),
        TemplateSource::new(template_ids::NGINX, include_str!("../../templates/nginx-gitlab.j2")),
        TemplateSource::new(template_ids::DATABASE, include_str!("../../templates/database.yml.j2")),
    ]
}

fn gitlab_path(relative: &str) -> String {
    format!("{}/{}", GITLAB_HOME, relative)
}

/// GitLab stack profile.
#[derive(Debug, Clone)]
pub struct GitlabProfile {
    sources: Vec<TemplateSource>,
    release_branch: String,
    fqdn: String,
    email_from: String,
    email_display_name: String,
    email_reply_to: String,
    email_subject_suffix: String,
    puma_workers: u32,
    secrets: SecretsConfig,
    requirements: DatabaseRequirements,
}

impl GitlabProfile {
    /// Build the profile from configuration. When `template_dir` is set, files
    /// there replace the embedded templates of the same name.
    pub fn new(config: &Config) -> Result<Self, RenderError> {
        let sources = match &config.template_dir {
            Some(dir) => {
                info!(dir = %dir.display(), "Loading template overrides");
                TemplateSource::override_from_dir(embedded_sources(), dir)?
            }
            None => embedded_sources(),
        };

        Ok(Self {
            sources,
            release_branch: config.release_branch.clone(),
            fqdn: config.fqdn.clone(),
            email_from: config.email_from.clone(),
            email_display_name: config.email_display_name.clone(),
            email_reply_to: config.email_reply_to.clone(),
            email_subject_suffix: config.email_subject_suffix.clone(),
            puma_workers: config.puma_workers,
            secrets: config.secrets.clone(),
            requirements: DatabaseRequirements::new(
                config.database_name.clone(),
                config.database_extensions.iter().cloned(),
            ),
        })
    }

    fn secrets_template(&self) -> ConfigTemplate {
        let mut tpl = ConfigTemplate::new(template_ids::SECRETS, gitlab_path("config/secrets.yml"));
        let values = [
            ("secret_key_base", &self.secrets.secret_key_base),
            ("db_key_base", &self.secrets.db_key_base),
            ("otp_key_base", &self.secrets.otp_key_base),
            ("openid_connect_signing_key", &self.secrets.openid_connect_signing_key),
        ];
        for (key, value) in values {
            if let Some(value) = value {
                tpl = tpl.with(key, value.as_str());
            }
        }
        tpl.permissions(FilePermissions::owned("git", "git", 0o755))
    }
}

/// database.yml context for the current primary and standbys. Without a
/// primary the connection keys render empty.
/// `value` as a YAML double-quoted scalar.
///
/// JSON string syntax is a subset of YAML's double-quoted style, so quotes,
/// backslashes and control characters come out escaped.
fn yaml_quoted(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Ports are emitted bare when numeric and quoted otherwise.
fn yaml_port(port: &str) -> String {
    if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
        port.to_string()
    } else {
        yaml_quoted(port)
    }
}

fn database_template(state: &InstallationState) -> ConfigTemplate {
    let connection = state.database_connection();
    let attr = |get: fn(&ConnectionDescriptor) -> Option<&str>| {
        yaml_quoted(connection.and_then(get).unwrap_or_default())
    };
    let replica_hosts = state
        .database_read_replicas()
        .iter()
        .filter_map(ConnectionDescriptor::host)
        .map(yaml_quoted)
        .collect::<Vec<_>>()
        .join(", ");

    ConfigTemplate::new(template_ids::DATABASE, gitlab_path("config/database.yml"))
        .with("database", attr(ConnectionDescriptor::dbname))
        .with("username", attr(ConnectionDescriptor::user))
        .with("password", attr(ConnectionDescriptor::password))
        .with("db_host", attr(ConnectionDescriptor::host))
        .with(
            "db_port",
            yaml_port(
                connection
                    .and_then(ConnectionDescriptor::port)
                    .unwrap_or(DEFAULT_PG_PORT),
            ),
        )
        .with("replica_hosts", replica_hosts)
        .permissions(FilePermissions::owned("git", "git", 0o755))
}

impl StackProfile for GitlabProfile {
    fn name(&self) -> &str {
        "gitlab"
    }

    fn provisioning_steps(&self) -> Vec<ProvisioningStep> {
        provisioning_steps(&self.release_branch)
    }

    fn template_sources(&self) -> Vec<TemplateSource> {
        self.sources.clone()
    }

    fn config_templates(&self, state: &InstallationState) -> Vec<ConfigTemplate> {
        vec![
            ConfigTemplate::new(template_ids::REDIS, "/etc/redis/redis.conf")
                .with("redis_socket", REDIS_SOCKET)
                .permissions(FilePermissions::owned("redis", "redis", 0o640)),
            ConfigTemplate::new(template_ids::GITLAB, gitlab_path("config/gitlab.yml"))
                .with("fqdn", self.fqdn.as_str())
                .with("gitlab_home", GITLAB_HOME)
                .with("email_from", self.email_from.as_str())
                .with("email_display_name", self.email_display_name.as_str())
                .with("email_reply_to", self.email_reply_to.as_str())
                .with("email_subject_suffix", self.email_subject_suffix.as_str())
                .permissions(FilePermissions::mode(0o755)),
            self.secrets_template(),
            ConfigTemplate::new(template_ids::RESQUE, gitlab_path("config/resque.yml"))
                .with("redis_socket", REDIS_SOCKET)
                .permissions(FilePermissions::owned("git", "git", 0o755)),
            ConfigTemplate::new(template_ids::PUMA, gitlab_path("config/puma.rb"))
                .with("gitlab_home", GITLAB_HOME)
                .with("puma_workers", self.puma_workers.to_string())
                .permissions(FilePermissions::owned("git", "git", 0o755)),
            ConfigTemplate::new(template_ids::NGINX, "/etc/nginx/sites-available/gitlab")
                .with("fqdn", self.fqdn.as_str())
                .with("gitlab_home", GITLAB_HOME)
                .permissions(FilePermissions::mode(0o755)),
            database_template(state),
        ]
    }

    fn base_services(&self) -> Vec<String> {
        // Debian's redis-server package ships redis-server.service; `redis` is
        // only an alias and cannot be addressed on every release.
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
            clear_cache: vec![CommandSpec::new("redis-cli").args(["-s", REDIS_SOCKET, "flushall"])],
            seed: vec![
                CommandSpec::new("bundle")
                    .args(["exec", "rake", "gitlab:db:configure", "RAILS_ENV=production"])
                    .current_dir(GITLAB_HOME)
                    .run_as("git"),
            ],
        }
    }

    fn database_requirements(&self) -> DatabaseRequirements {
        self.requirements.clone()
    }
}
