// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gitforge Core - Idempotent Provisioning & Lifecycle Orchestration
//!
//! This crate decides, for every incoming unit event, which provisioning and
//! reconfiguration actions are safe to (re)run, in what order, and which
//! persisted state transition results.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                Event source (CLI, test harness, agent)               │
//! └──────────────────────────────────────────────────────────────────────┘
//!                                   │ Event
//!                                   ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         Orchestrator (this crate)                    │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌────────────────┐  │
//! │  │  Pipeline  │  │  Renderer  │  │  Relation  │  │   Bootstrap    │  │
//! │  │ (steps)    │  │ (minijinja)│  │  Tracker   │  │   Task         │  │
//! │  └────────────┘  └────────────┘  └────────────┘  └────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//!        │                 │                 │                 │
//!        ▼                 ▼                 ▼                 ▼
//!  CommandRunner       FileSink          StateStore      ServiceManager
//!  (processes)      (config files)        (SQLite)         (systemd)
//! ```
//!
//! # Lifecycle
//!
//! ```text
//!   ┌─────────────┐  install ok   ┌──────────────────┐
//!   │ UNINSTALLED │──────────────►│ AWAITING DATABASE│
//!   └─────────────┘               └────────┬─────────┘
//!                                          │ master-changed (matching db)
//!                                          ▼
//!                                 ┌──────────────────┐
//!                                 │  BOOTSTRAPPING   │──┐ bootstrap failed:
//!                                 └────────┬─────────┘◄─┘ retried on the next
//!                                          │ ok             config-changed
//!                                          ▼
//!                                 ┌──────────────────┐
//!                                 │      READY       │ bootstrap never reruns
//!                                 └──────────────────┘
//! ```
//!
//! The phase is never stored; it is derived from [`state::InstallationState`].
//!
//! # Modules
//!
//! - [`runner`]: Typed external command execution (process and mock runners)
//! - [`precondition`]: Marker probes deciding whether a step already ran
//! - [`step`]: Single provisioning steps and their executor
//! - [`pipeline`]: Ordered, fail-fast execution of provisioning steps
//! - [`render`]: Config template rendering and file materialization
//! - [`service`]: OS service control
//! - [`state`]: Installation state and connection descriptors
//! - [`persistence`]: Durable storage for the installation state
//! - [`relation`]: Database relation notification handling
//! - [`bootstrap`]: The one-shot database seeding task
//! - [`orchestrator`]: The event-driven lifecycle state machine

#![deny(missing_docs)]

/// Error types shared across the orchestrator.
pub mod error;

/// Typed external commands and execution backends.
pub mod runner;

/// Step preconditions and marker probes.
pub mod precondition;

/// Provisioning steps and the step executor.
pub mod step;

/// Ordered provisioning pipeline.
pub mod pipeline;

/// Configuration template rendering.
pub mod render;

/// OS service management.
pub mod service;

/// Installation state and database connection descriptors.
pub mod state;

/// Durable storage for installation state, status, and deferred events.
pub mod persistence;

/// Database relation state tracking.
pub mod relation;

/// One-shot database bootstrap task.
pub mod bootstrap;

/// Unit status reporting.
pub mod status;

/// Events consumed by the orchestrator.
pub mod event;

/// Stack profiles: the data describing what gets provisioned.
pub mod profile;

/// The lifecycle orchestrator.
pub mod orchestrator;

pub use error::OrchestratorError;
pub use event::Event;
pub use orchestrator::{DispatchReport, Disposition, Effect, Orchestrator, OrchestratorParts, Outcome};
pub use profile::StackProfile;
pub use status::UnitStatus;
pub use state::{ConnectionDescriptor, InstallationState};
