// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Step preconditions.
//!
//! A precondition answers "has this step already been performed?" by probing
//! for markers (files, directories, installed binaries). Probing never fails:
//! an inaccessible marker counts as absent, so the step simply runs again.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Probe for marker existence.
pub trait MarkerProbe: Send + Sync {
    /// Whether `marker` exists. Must not fail and must not have side effects.
    fn exists(&self, marker: &Path) -> bool;
}

/// Filesystem-backed probe.
///
/// A dangling symlink counts as present: the link itself is the marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl MarkerProbe for FsProbe {
    fn exists(&self, marker: &Path) -> bool {
        std::fs::symlink_metadata(marker).is_ok()
    }
}

/// Predicate deciding whether a provisioning step is already done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Precondition {
    /// Never satisfied: the step has no granular marker and always runs.
    Never,
    /// Satisfied when the path exists.
    PathExists(PathBuf),
    /// Satisfied when every inner precondition is satisfied.
    AllOf(Vec<Precondition>),
}

impl Precondition {
    /// Shorthand for [`Precondition::PathExists`].
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::PathExists(path.into())
    }

    /// Shorthand for [`Precondition::AllOf`] over several paths.
    pub fn all_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::AllOf(paths.into_iter().map(|p| Self::PathExists(p.into())).collect())
    }

    /// Evaluate against `probe`.
    ///
    /// An empty `AllOf` is treated as unsatisfied so that a misconfigured step
    /// runs rather than being silently skipped.
    pub fn is_satisfied(&self, probe: &dyn MarkerProbe) -> bool {
        match self {
            Self::Never => false,
            Self::PathExists(path) => probe.exists(path),
            Self::AllOf(inner) => !inner.is_empty() && inner.iter().all(|p| p.is_satisfied(probe)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_is_unsatisfied() {
        assert!(!Precondition::Never.is_satisfied(&FsProbe));
    }

    #[test]
    fn test_path_exists() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ruby");

        let pre = Precondition::path(&marker);
        assert!(!pre.is_satisfied(&FsProbe));

        std::fs::write(&marker, b"").unwrap();
        assert!(pre.is_satisfied(&FsProbe));
    }

    #[test]
    fn test_all_of() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"").unwrap();

        let pre = Precondition::all_paths([&a, &b]);
        assert!(!pre.is_satisfied(&FsProbe));

        std::fs::write(&b, b"").unwrap();
        assert!(pre.is_satisfied(&FsProbe));

        assert!(!Precondition::AllOf(vec![]).is_satisfied(&FsProbe));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_counts_as_present() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("sites-enabled-gitlab");
        std::os::unix::fs::symlink(dir.path().join("missing"), &link).unwrap();

        assert!(FsProbe.exists(&link));
    }

    #[test]
    fn test_inaccessible_marker_is_absent() {
        assert!(!FsProbe.exists(Path::new("/nonexistent/dir/\0bad")));
    }
}
