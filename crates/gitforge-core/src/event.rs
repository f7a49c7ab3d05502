// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Events consumed by the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::ConnectionDescriptor;

/// An external trigger.
///
/// Serialized with a `"kind"` tag so that events can be queued, persisted and
/// passed on the command line as JSON:
///
/// ```
/// use gitforge_core::Event;
///
/// let event: Event = serde_json::from_str(
///     r#"{"kind":"master-changed","database":"gitlab-server","master":null}"#,
/// ).unwrap();
/// assert_eq!(event.name(), "master-changed");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Event {
    /// Run provisioning.
    Install,
    /// Re-render configuration and converge services.
    ConfigChanged,
    /// The database relation was established.
    DatabaseRelationJoined {
        /// Database name already declared on the relation, if any.
        #[serde(default)]
        database: Option<String>,
    },
    /// The primary database endpoint changed.
    MasterChanged {
        /// Database the notification refers to.
        database: String,
        /// New primary, `None` when no primary is available.
        #[serde(default)]
        master: Option<ConnectionDescriptor>,
    },
    /// The set of standby endpoints changed.
    StandbyChanged {
        /// Database the notification refers to.
        database: String,
        /// Every standby currently available.
        #[serde(default)]
        standbys: Vec<ConnectionDescriptor>,
    },
}

impl Event {
    /// Kebab-case event name, matching the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::ConfigChanged => "config-changed",
            Self::DatabaseRelationJoined { .. } => "database-relation-joined",
            Self::MasterChanged { .. } => "master-changed",
            Self::StandbyChanged { .. } => "standby-changed",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_roundtrip() {
        let master = ConnectionDescriptor::from_conn_str("host=db dbname=gitlab-server").unwrap();
        let event = Event::MasterChanged {
            database: "gitlab-server".to_string(),
            master: Some(master),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""kind":"master-changed""#));
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_optional_fields_default() {
        let joined: Event = serde_json::from_str(r#"{"kind":"database-relation-joined"}"#).unwrap();
        assert_eq!(joined, Event::DatabaseRelationJoined { database: None });

        let standby: Event =
            serde_json::from_str(r#"{"kind":"standby-changed","database":"x"}"#).unwrap();
        assert_eq!(
            standby,
            Event::StandbyChanged {
                database: "x".to_string(),
                standbys: vec![]
            }
        );
    }
}
