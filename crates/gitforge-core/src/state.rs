// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Installation state and database connection descriptors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Malformed connection string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DescriptorError {
    /// A token had no `=`.
    #[error("expected key=value, got '{0}'")]
    MissingEquals(String),

    /// A quoted value was not terminated.
    #[error("unterminated quoted value for '{0}'")]
    UnterminatedQuote(String),

    /// The connection string was empty.
    #[error("empty connection string")]
    Empty,
}

/// Database endpoint as delivered by the relation provider.
///
/// Attributes are kept as strings; two descriptors are equal when every
/// attribute and the URI match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
}

impl ConnectionDescriptor {
    /// Build a descriptor from explicit attributes.
    pub fn new(attributes: BTreeMap<String, String>, uri: Option<String>) -> Self {
        Self { attributes, uri }
    }

    /// Parse a libpq `key=value` connection string.
    ///
    /// Values may be single-quoted; inside quotes `\'` and `\\` are escapes.
    pub fn from_conn_str(conn_str: &str) -> Result<Self, DescriptorError> {
        let mut attributes = BTreeMap::new();
        let mut chars = conn_str.trim().chars().peekable();

        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            if chars.peek().is_none() {
                break;
            }

            let mut key = String::new();
            while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
                key.push(c);
            }
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            if chars.next() != Some('=') {
                return Err(DescriptorError::MissingEquals(key));
            }
            while chars.next_if(|c| c.is_whitespace()).is_some() {}

            let mut value = String::new();
            if chars.next_if_eq(&'\'').is_some() {
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        '\'' => {
                            closed = true;
                            break;
                        }
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err(DescriptorError::UnterminatedQuote(key));
                }
            } else {
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    value.push(c);
                }
            }

            attributes.insert(key, value);
        }

        if attributes.is_empty() {
            return Err(DescriptorError::Empty);
        }

        Ok(Self {
            attributes,
            uri: None,
        })
    }

    /// Attach the URI form of the same endpoint.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Raw attribute lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// All attributes.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// `host` attribute.
    pub fn host(&self) -> Option<&str> {
        self.get("host")
    }

    /// `port` attribute.
    pub fn port(&self) -> Option<&str> {
        self.get("port")
    }

    /// `dbname` attribute.
    pub fn dbname(&self) -> Option<&str> {
        self.get("dbname")
    }

    /// `user` attribute.
    pub fn user(&self) -> Option<&str> {
        self.get("user")
    }

    /// `password` attribute.
    pub fn password(&self) -> Option<&str> {
        self.get("password")
    }

    /// URI form, when the provider supplied one.
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Connection string form, attributes in key order.
    pub fn conn_str(&self) -> String {
        self.attributes
            .iter()
            .map(|(k, v)| {
                if v.is_empty() || v.contains(char::is_whitespace) || v.contains('\'') {
                    format!("{}='{}'", k, v.replace('\\', "\\\\").replace('\'', "\\'"))
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ConnectionDescriptor {
    /// Never prints the password.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.user().unwrap_or("?"),
            self.host().unwrap_or("?"),
            self.port().unwrap_or("5432"),
            self.dbname().unwrap_or("?")
        )
    }
}

/// Lifecycle phase, derived from [`InstallationState`] and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Provisioning has not completed.
    Uninstalled,
    /// Installed, no database connection known yet.
    AwaitingDatabase,
    /// Installed with a database connection, bootstrap not yet successful.
    Bootstrapping,
    /// Bootstrap completed.
    Ready,
}

impl LifecyclePhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninstalled => "uninstalled",
            Self::AwaitingDatabase => "awaiting_database",
            Self::Bootstrapping => "bootstrapping",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide state persisted across events.
///
/// `installed` and `bootstrapped` only ever move from false to true; there is
/// no API to reset them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationState {
    installed: bool,
    bootstrapped: bool,
    database_connection: Option<ConnectionDescriptor>,
    database_read_replicas: Vec<ConnectionDescriptor>,
}

impl InstallationState {
    /// Rebuild a state from persisted fields.
    ///
    /// `bootstrapped` without `installed` cannot have been written by the
    /// orchestrator; it is normalised to installed.
    pub fn from_parts(
        installed: bool,
        bootstrapped: bool,
        database_connection: Option<ConnectionDescriptor>,
        database_read_replicas: Vec<ConnectionDescriptor>,
    ) -> Self {
        Self {
            installed: installed || bootstrapped,
            bootstrapped,
            database_connection,
            database_read_replicas,
        }
    }

    /// Whether the provisioning pipeline completed.
    pub fn installed(&self) -> bool {
        self.installed
    }

    /// Whether the bootstrap task completed.
    pub fn bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    /// Current primary database endpoint.
    pub fn database_connection(&self) -> Option<&ConnectionDescriptor> {
        self.database_connection.as_ref()
    }

    /// Current standby endpoints.
    pub fn database_read_replicas(&self) -> &[ConnectionDescriptor] {
        &self.database_read_replicas
    }

    /// Record a successful provisioning run.
    pub fn mark_installed(&mut self) {
        self.installed = true;
    }

    /// Record a successful bootstrap. Requires an installed unit with a
    /// database connection; returns false (and changes nothing) otherwise.
    pub fn mark_bootstrapped(&mut self) -> bool {
        if !self.installed || self.database_connection.is_none() {
            return false;
        }
        self.bootstrapped = true;
        true
    }

    /// Replace the primary database endpoint (None when no primary is available).
    pub fn set_database_connection(&mut self, connection: Option<ConnectionDescriptor>) {
        self.database_connection = connection;
    }

    /// Replace the standby endpoints wholesale.
    pub fn set_read_replicas(&mut self, replicas: Vec<ConnectionDescriptor>) {
        self.database_read_replicas = replicas;
    }

    /// Derived lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        if !self.installed {
            LifecyclePhase::Uninstalled
        } else if self.bootstrapped {
            LifecyclePhase::Ready
        } else if self.database_connection.is_some() {
            LifecyclePhase::Bootstrapping
        } else {
            LifecyclePhase::AwaitingDatabase
        }
    }
}
