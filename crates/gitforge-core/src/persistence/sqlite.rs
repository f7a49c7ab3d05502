// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed state store.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use super::{Result, StateError, StateStore};
use crate::event::Event;
use crate::state::InstallationState;
use crate::status::UnitStatus;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

const KEY_INSTALLED: &str = "installed";
const KEY_BOOTSTRAPPED: &str = "bootstrapped";
const KEY_CONNECTION: &str = "database_connection";
const KEY_REPLICAS: &str = "database_read_replicas";
const KEY_STATUS: &str = "status";

/// State store persisting to a SQLite database.
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Wrap an existing pool. The schema must already be migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Parent directories are created as needed.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| StateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        MIGRATOR.run(&pool).await?;
        debug!(path = %path.display(), "State store opened");

        Ok(Self { pool })
    }

    /// Open a private in-memory database. Nothing survives the process.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    async fn upsert(tx: &mut Transaction<'_, Sqlite>, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO unit_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Write a flag, refusing to replace a stored `true`.
    async fn write_flag(tx: &mut Transaction<'_, Sqlite>, key: &str, value: bool) -> Result<()> {
        if value {
            return Self::upsert(tx, key, "true").await;
        }

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO unit_state (key, value, updated_at)
            VALUES (?, 'false', ?)
            "#,
        )
        .bind(key)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT key, value FROM unit_state")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|source| StateError::Serialization {
        key: key.to_string(),
        source,
    })
}

fn decode<T: DeserializeOwned + Default>(values: &HashMap<String, String>, key: &str) -> Result<T> {
    match values.get(key) {
        Some(raw) => serde_json::from_str(raw).map_err(|source| StateError::Serialization {
            key: key.to_string(),
            source,
        }),
        None => Ok(T::default()),
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self) -> Result<InstallationState> {
        let values = self.read_all().await?;

        Ok(InstallationState::from_parts(
            decode(&values, KEY_INSTALLED)?,
            decode(&values, KEY_BOOTSTRAPPED)?,
            decode(&values, KEY_CONNECTION)?,
            decode(&values, KEY_REPLICAS)?,
        ))
    }

    async fn save(&self, state: &InstallationState) -> Result<()> {
        let connection = encode(KEY_CONNECTION, &state.database_connection())?;
        let replicas = encode(KEY_REPLICAS, state.database_read_replicas())?;

        let mut tx = self.pool.begin().await?;
        Self::write_flag(&mut tx, KEY_INSTALLED, state.installed()).await?;
        Self::write_flag(&mut tx, KEY_BOOTSTRAPPED, state.bootstrapped()).await?;
        Self::upsert(&mut tx, KEY_CONNECTION, &connection).await?;
        Self::upsert(&mut tx, KEY_REPLICAS, &replicas).await?;
        tx.commit().await?;

        debug!(
            installed = state.installed(),
            bootstrapped = state.bootstrapped(),
            "Installation state saved"
        );
        Ok(())
    }

    async fn load_status(&self) -> Result<Option<UnitStatus>> {
        let raw = sqlx::query_scalar::<_, String>("SELECT value FROM unit_state WHERE key = ?")
            .bind(KEY_STATUS)
            .fetch_optional(&self.pool)
            .await?;

        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|source| StateError::Serialization {
                key: KEY_STATUS.to_string(),
                source,
            })
        })
        .transpose()
    }

    async fn save_status(&self, status: &UnitStatus) -> Result<()> {
        let value = encode(KEY_STATUS, status)?;
        let mut tx = self.pool.begin().await?;
        Self::upsert(&mut tx, KEY_STATUS, &value).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn defer_event(&self, event: &Event) -> Result<()> {
        let payload = encode("deferred_events", event)?;
        sqlx::query(
            r#"
            INSERT INTO deferred_events (kind, payload, deferred_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(event.name())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(event = %event, "Event deferred");
        Ok(())
    }

    async fn take_deferred(&self) -> Result<Vec<Event>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, payload FROM deferred_events ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM deferred_events")
            .execute(&mut *tx)
            .await?;

        let events = rows
            .into_iter()
            .map(|(id, payload)| {
                serde_json::from_str(&payload).map_err(|source| StateError::Serialization {
                    key: format!("deferred_events#{}", id),
                    source,
                })
            })
            .collect::<Result<Vec<Event>>>()?;

        tx.commit().await?;
        Ok(events)
    }
}
