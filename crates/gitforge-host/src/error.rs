// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for gitforge-host.

use thiserror::Error;

/// Host errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The orchestrator failed to handle an event.
    #[error("{0}")]
    Orchestrator(#[from] gitforge_core::OrchestratorError),

    /// Opening or reading the state store failed.
    #[error("State error: {0}")]
    State(#[from] gitforge_core::persistence::StateError),

    /// Loading template overrides failed.
    #[error("Template error: {0}")]
    Template(#[from] gitforge_core::render::RenderError),

    /// A connection string could not be parsed.
    #[error("Invalid connection string: {0}")]
    Descriptor(#[from] gitforge_core::state::DescriptorError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type using host Error.
pub type Result<T> = std::result::Result<T, Error>;
