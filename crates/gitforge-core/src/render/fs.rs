// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Filesystem file sink.
//!
//! Writes the file in place, then applies mode and ownership. A process killed
//! mid-write can leave a truncated file; the next reconfiguration rewrites it.

use async_trait::async_trait;
use nix::unistd::{Gid, Group, Uid, User, chown};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::debug;

use super::{FilePermissions, FileSink};

/// Sink writing to the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileSink;

impl FsFileSink {
    /// Create a filesystem sink.
    pub fn new() -> Self {
        Self
    }
}

fn resolve_user(name: &str) -> io::Result<Uid> {
    match User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid),
        Ok(None) => Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("unknown user '{}'", name),
        )),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

fn resolve_group(name: &str) -> io::Result<Gid> {
    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid),
        Ok(None) => Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("unknown group '{}'", name),
        )),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[async_trait]
impl FileSink for FsFileSink {
    async fn write_file(
        &self,
        path: &Path,
        contents: &[u8],
        permissions: &FilePermissions,
    ) -> io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(path, contents).await?;

        if let Some(mode) = permissions.mode {
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
        }

        if permissions.owner.is_some() || permissions.group.is_some() {
            let uid = permissions.owner.as_deref().map(resolve_user).transpose()?;
            let gid = permissions.group.as_deref().map(resolve_group).transpose()?;
            chown(path, uid, gid).map_err(io::Error::from)?;
        }

        debug!(path = %path.display(), bytes = contents.len(), "File written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parents_and_sets_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("puma.rb");

        FsFileSink
            .write_file(&path, b"workers 3\n", &FilePermissions::mode(0o640))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"workers 3\n");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[tokio::test]
    async fn test_overwrite_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resque.yml");

        for _ in 0..2 {
            FsFileSink
                .write_file(&path, b"production: redis://localhost\n", &FilePermissions::default())
                .await
                .unwrap();
        }

        assert_eq!(std::fs::read(&path).unwrap(), b"production: redis://localhost\n");
    }

    #[tokio::test]
    async fn test_unknown_owner_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redis.conf");
        let permissions = FilePermissions {
            owner: Some("gitforge-no-such-user".to_string()),
            ..FilePermissions::default()
        };

        let err = FsFileSink
            .write_file(&path, b"port 6379\n", &permissions)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
