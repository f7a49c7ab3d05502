// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock service manager for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{ServiceAction, ServiceError, ServiceManager};
use crate::runner::RunnerError;

#[derive(Debug, Default)]
struct MockServices {
    running: HashSet<String>,
    calls: Vec<(String, ServiceAction)>,
    failing: HashSet<String>,
}

/// Service manager that tracks running services in memory.
#[derive(Debug, Clone, Default)]
pub struct MockServiceManager {
    inner: Arc<Mutex<MockServices>>,
}

impl MockServiceManager {
    /// Create a manager with no running services.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a service as already running.
    pub async fn set_running(&self, name: &str) {
        self.inner.lock().await.running.insert(name.to_string());
    }

    /// Make every action on `name` fail.
    pub async fn fail_service(&self, name: &str) {
        self.inner.lock().await.failing.insert(name.to_string());
    }

    /// Every control call, in order.
    pub async fn calls(&self) -> Vec<(String, ServiceAction)> {
        self.inner.lock().await.calls.clone()
    }

    /// Names of services that received `action`, in order.
    pub async fn calls_for(&self, action: ServiceAction) -> Vec<String> {
        self.inner
            .lock()
            .await
            .calls
            .iter()
            .filter(|(_, a)| *a == action)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl ServiceManager for MockServiceManager {
    async fn control(&self, name: &str, action: ServiceAction) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push((name.to_string(), action));

        if inner.failing.contains(name) {
            return Err(ServiceError {
                service: name.to_string(),
                action,
                source: RunnerError::Other("mock service failure".to_string()),
            });
        }

        match action {
            ServiceAction::Start | ServiceAction::Restart => {
                inner.running.insert(name.to_string());
            }
            ServiceAction::Stop => {
                inner.running.remove(name);
            }
        }
        Ok(())
    }

    async fn is_running(&self, name: &str) -> bool {
        self.inner.lock().await.running.contains(name)
    }
}
