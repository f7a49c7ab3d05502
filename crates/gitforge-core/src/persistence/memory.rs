// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory state store for tests and dry runs.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{Result, StateStore};
use crate::event::Event;
use crate::state::InstallationState;
use crate::status::UnitStatus;

#[derive(Debug, Default)]
struct Inner {
    state: InstallationState,
    status: Option<UnitStatus>,
    deferred: Vec<Event>,
    saves: usize,
}

/// State store held in process memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with `state`.
    pub fn with_state(state: InstallationState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                ..Inner::default()
            })),
        }
    }

    /// Number of successful [`StateStore::save`] calls.
    pub async fn save_count(&self) -> usize {
        self.inner.lock().await.saves
    }

    /// Number of queued events.
    pub async fn deferred_count(&self) -> usize {
        self.inner.lock().await.deferred.len()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<InstallationState> {
        Ok(self.inner.lock().await.state.clone())
    }

    async fn save(&self, state: &InstallationState) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let installed = inner.state.installed() || state.installed();
        let bootstrapped = inner.state.bootstrapped() || state.bootstrapped();
        inner.state = InstallationState::from_parts(
            installed,
            bootstrapped,
            state.database_connection().cloned(),
            state.database_read_replicas().to_vec(),
        );
        inner.saves += 1;
        Ok(())
    }

    async fn load_status(&self) -> Result<Option<UnitStatus>> {
        Ok(self.inner.lock().await.status.clone())
    }

    async fn save_status(&self, status: &UnitStatus) -> Result<()> {
        self.inner.lock().await.status = Some(status.clone());
        Ok(())
    }

    async fn defer_event(&self, event: &Event) -> Result<()> {
        self.inner.lock().await.deferred.push(event.clone());
        Ok(())
    }

    async fn take_deferred(&self) -> Result<Vec<Event>> {
        Ok(std::mem::take(&mut self.inner.lock().await.deferred))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_never_lowers_flags() {
        let store = MemoryStateStore::new();
        let mut state = InstallationState::default();
        state.mark_installed();
        store.save(&state).await.unwrap();

        store.save(&InstallationState::default()).await.unwrap();

        assert!(store.load().await.unwrap().installed());
        assert_eq!(store.save_count().await, 2);
    }

    #[tokio::test]
    async fn test_deferred_queue_drains_in_order() {
        let store = MemoryStateStore::new();
        store.defer_event(&Event::Install).await.unwrap();
        store.defer_event(&Event::ConfigChanged).await.unwrap();

        assert_eq!(
            store.take_deferred().await.unwrap(),
            vec![Event::Install, Event::ConfigChanged]
        );
        assert!(store.take_deferred().await.unwrap().is_empty());
    }
}
