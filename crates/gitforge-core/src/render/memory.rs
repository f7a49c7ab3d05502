// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory file sink for testing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{FilePermissions, FileSink};

/// A file captured by [`MemoryFileSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFile {
    /// Last written contents.
    pub contents: Vec<u8>,
    /// Permissions requested on the last write.
    pub permissions: FilePermissions,
}

/// Sink that keeps files in memory and logs every write in order.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSink {
    files: Arc<Mutex<BTreeMap<PathBuf, CapturedFile>>>,
    writes: Arc<Mutex<Vec<PathBuf>>>,
    fail_path: Option<PathBuf>,
}

impl MemoryFileSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse writes to `path` with a permission error.
    pub fn failing_on(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_path = Some(path.into());
        self
    }

    /// Current contents of `path`, if it was written.
    pub async fn get(&self, path: impl AsRef<Path>) -> Option<CapturedFile> {
        self.files.lock().await.get(path.as_ref()).cloned()
    }

    /// Every write, in order (paths repeat when rewritten).
    pub async fn writes(&self) -> Vec<PathBuf> {
        self.writes.lock().await.clone()
    }

    /// Total number of writes.
    pub async fn write_count(&self) -> usize {
        self.writes.lock().await.len()
    }
}

#[async_trait]
impl FileSink for MemoryFileSink {
    async fn write_file(
        &self,
        path: &Path,
        contents: &[u8],
        permissions: &FilePermissions,
    ) -> std::io::Result<()> {
        if self.fail_path.as_deref() == Some(path) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "write refused",
            ));
        }

        self.files.lock().await.insert(
            path.to_path_buf(),
            CapturedFile {
                contents: contents.to_vec(),
                permissions: permissions.clone(),
            },
        );
        self.writes.lock().await.push(path.to_path_buf());
        Ok(())
    }
}
