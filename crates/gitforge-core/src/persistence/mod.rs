// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable storage for [`InstallationState`], the last reported status and
//! deferred events.

pub mod memory;
pub mod sqlite;

pub use self::memory::MemoryStateStore;
pub use self::sqlite::SqliteStateStore;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::event::Event;
use crate::state::InstallationState;
use crate::status::UnitStatus;

/// Errors from the state store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StateError {
    /// Database query failed.
    #[error("state database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("state migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be encoded or decoded.
    #[error("invalid stored value for '{key}': {source}")]
    Serialization {
        /// Field or table the value belongs to.
        key: String,
        /// serde_json error.
        #[source]
        source: serde_json::Error,
    },

    /// Preparing the storage location failed.
    #[error("failed to prepare state directory {path}: {source}")]
    Io {
        /// Directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for state store operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// Key-value persistence keyed by field name.
///
/// Implementations must never lower a persisted `installed` or
/// `bootstrapped` flag.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the state; a fresh store yields [`InstallationState::default`].
    async fn load(&self) -> Result<InstallationState>;

    /// Persist every field of `state`.
    async fn save(&self, state: &InstallationState) -> Result<()>;

    /// Last reported status, if any.
    async fn load_status(&self) -> Result<Option<UnitStatus>>;

    /// Record the reported status.
    async fn save_status(&self, status: &UnitStatus) -> Result<()>;

    /// Queue an event for later redelivery.
    async fn defer_event(&self, event: &Event) -> Result<()>;

    /// Remove and return every queued event, oldest first.
    async fn take_deferred(&self) -> Result<Vec<Event>>;
}
