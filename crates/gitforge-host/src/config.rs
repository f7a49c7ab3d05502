// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::path::PathBuf;

/// Optional values for `secrets.yml`. GitLab generates any that are unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretsConfig {
    /// `secret_key_base`
    pub secret_key_base: Option<String>,
    /// `db_key_base`
    pub db_key_base: Option<String>,
    /// `otp_key_base`
    pub otp_key_base: Option<String>,
    /// `openid_connect_signing_key`
    pub openid_connect_signing_key: Option<String>,
}

/// Gitforge configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite file holding the installation state
    pub state_path: PathBuf,
    /// Directory whose files override the embedded templates
    pub template_dir: Option<PathBuf>,
    /// Database name expected on the relation
    pub database_name: String,
    /// Extensions the leader declares
    pub database_extensions: Vec<String>,
    /// Whether this unit is the elected leader
    pub is_leader: bool,
    /// External host name
    pub fqdn: String,
    /// Sender address for outgoing mail
    pub email_from: String,
    /// Sender display name
    pub email_display_name: String,
    /// Reply-to address
    pub email_reply_to: String,
    /// Suffix appended to mail subjects
    pub email_subject_suffix: String,
    /// GitLab / Gitaly branch cloned at install
    pub release_branch: String,
    /// Puma worker processes
    pub puma_workers: u32,
    /// secrets.yml values
    pub secrets: SecretsConfig,
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `GITFORGE_STATE_PATH`: state database (default: .data/gitforge.db)
    /// - `GITFORGE_TEMPLATE_DIR`: template override directory (default: unset)
    /// - `GITFORGE_DATABASE_NAME`: expected database (default: gitlab-server)
    /// - `GITFORGE_DATABASE_EXTENSIONS`: comma separated (default: pg_trgm,btree_gist)
    /// - `GITFORGE_LEADER`: true/false (default: false)
    /// - `GITFORGE_FQDN`: external host name (default: localhost)
    /// - `GITFORGE_EMAIL_FROM`, `GITFORGE_EMAIL_DISPLAY_NAME`,
    ///   `GITFORGE_EMAIL_REPLY_TO`, `GITFORGE_EMAIL_SUBJECT_SUFFIX`
    /// - `GITFORGE_RELEASE_BRANCH`: (default: 14-3-stable)
    /// - `GITFORGE_PUMA_WORKERS`: (default: 3)
    /// - `GITFORGE_SECRET_KEY_BASE`, `GITFORGE_DB_KEY_BASE`,
    ///   `GITFORGE_OTP_KEY_BASE`, `GITFORGE_OPENID_CONNECT_SIGNING_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_name = var_or("GITFORGE_DATABASE_NAME", "gitlab-server");
        if database_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "GITFORGE_DATABASE_NAME",
                "must not be empty",
            ));
        }

        let database_extensions = var_or("GITFORGE_DATABASE_EXTENSIONS", "pg_trgm,btree_gist")
            .split(',')
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .map(str::to_string)
            .collect();

        let is_leader = match var_or("GITFORGE_LEADER", "false").to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                return Err(ConfigError::Invalid(
                    "GITFORGE_LEADER",
                    "must be true or false",
                ));
            }
        };

        let puma_workers: u32 = var_or("GITFORGE_PUMA_WORKERS", "3")
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("GITFORGE_PUMA_WORKERS", "must be a non-negative integer")
            })?;

        Ok(Self {
            state_path: PathBuf::from(var_or("GITFORGE_STATE_PATH", ".data/gitforge.db")),
            template_dir: optional("GITFORGE_TEMPLATE_DIR").map(PathBuf::from),
            database_name,
            database_extensions,
            is_leader,
            fqdn: var_or("GITFORGE_FQDN", "localhost"),
            email_from: var_or("GITFORGE_EMAIL_FROM", "example@example.com"),
            email_display_name: var_or("GITFORGE_EMAIL_DISPLAY_NAME", "GitLab"),
            email_reply_to: var_or("GITFORGE_EMAIL_REPLY_TO", "noreply@example.com"),
            email_subject_suffix: var_or("GITFORGE_EMAIL_SUBJECT_SUFFIX", ""),
            release_branch: var_or("GITFORGE_RELEASE_BRANCH", "14-3-stable"),
            puma_workers,
            secrets: SecretsConfig {
                secret_key_base: optional("GITFORGE_SECRET_KEY_BASE"),
                db_key_base: optional("GITFORGE_DB_KEY_BASE"),
                otp_key_base: optional("GITFORGE_OTP_KEY_BASE"),
                openid_connect_signing_key: optional("GITFORGE_OPENID_CONNECT_SIGNING_KEY"),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(".data/gitforge.db"),
            template_dir: None,
            database_name: "gitlab-server".to_string(),
            database_extensions: vec!["pg_trgm".to_string(), "btree_gist".to_string()],
            is_leader: false,
            fqdn: "localhost".to_string(),
            email_from: "example@example.com".to_string(),
            email_display_name: "GitLab".to_string(),
            email_reply_to: "noreply@example.com".to_string(),
            email_subject_suffix: String::new(),
            release_branch: "14-3-stable".to_string(),
            puma_workers: 3,
            secrets: SecretsConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 8] = [
        "GITFORGE_STATE_PATH",
        "GITFORGE_TEMPLATE_DIR",
        "GITFORGE_DATABASE_NAME",
        "GITFORGE_DATABASE_EXTENSIONS",
        "GITFORGE_LEADER",
        "GITFORGE_FQDN",
        "GITFORGE_PUMA_WORKERS",
        "GITFORGE_SECRET_KEY_BASE",
    ];

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn clean() -> Self {
            let mut guard = Self { vars: Vec::new() };
            for key in VARS {
                guard.remove(key);
            }
            guard
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::clean();

        let config = Config::from_env().unwrap();

        assert_eq!(config.state_path, PathBuf::from(".data/gitforge.db"));
        assert_eq!(config.template_dir, None);
        assert_eq!(config.database_name, "gitlab-server");
        assert_eq!(config.database_extensions, vec!["pg_trgm", "btree_gist"]);
        assert!(!config.is_leader);
        assert_eq!(config.fqdn, "localhost");
        assert_eq!(config.puma_workers, 3);
        assert_eq!(config.secrets, SecretsConfig::default());
    }

    #[test]
    fn test_config_from_env_all_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("GITFORGE_STATE_PATH", "/var/lib/gitforge/state.db");
        guard.set("GITFORGE_TEMPLATE_DIR", "/etc/gitforge/templates");
        guard.set("GITFORGE_DATABASE_NAME", "gitlab");
        guard.set("GITFORGE_DATABASE_EXTENSIONS", " pg_trgm , , plpgsql ");
        guard.set("GITFORGE_LEADER", "YES");
        guard.set("GITFORGE_FQDN", "git.example.com");
        guard.set("GITFORGE_PUMA_WORKERS", "8");
        guard.set("GITFORGE_SECRET_KEY_BASE", "abc123");

        let config = Config::from_env().unwrap();

        assert_eq!(config.state_path, PathBuf::from("/var/lib/gitforge/state.db"));
        assert_eq!(
            config.template_dir,
            Some(PathBuf::from("/etc/gitforge/templates"))
        );
        assert_eq!(config.database_name, "gitlab");
        assert_eq!(config.database_extensions, vec!["pg_trgm", "plpgsql"]);
        assert!(config.is_leader);
        assert_eq!(config.fqdn, "git.example.com");
        assert_eq!(config.puma_workers, 8);
        assert_eq!(config.secrets.secret_key_base.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_config_invalid_leader() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("GITFORGE_LEADER", "maybe");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("GITFORGE_LEADER", _)));
    }

    #[test]
    fn test_config_invalid_puma_workers() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("GITFORGE_PUMA_WORKERS", "-1");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("GITFORGE_PUMA_WORKERS"));
    }

    #[test]
    fn test_config_empty_database_name() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("GITFORGE_DATABASE_NAME", "  ");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("GITFORGE_DATABASE_NAME", _)));
    }
}
