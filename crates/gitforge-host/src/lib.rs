// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gitforge Host - GitLab Provisioning on a Single Machine
//!
//! This crate binds the generic orchestrator in `gitforge-core` to a GitLab
//! source installation and exposes it through the `gitforge` binary.
//!
//! # Modules
//!
//! - [`config`]: Environment-driven configuration
//! - [`gitlab`]: The GitLab stack profile (steps, templates, services)
//! - [`runtime`]: Orchestrator assembly with swappable collaborators
//! - [`error`]: Host error type

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod gitlab;
pub mod runtime;

pub use config::Config;
pub use error::{Error, Result};
pub use gitlab::GitlabProfile;
pub use runtime::GitforgeRuntime;
