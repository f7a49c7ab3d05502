// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! gitforge - GitLab provisioning and lifecycle orchestrator
//!
//! Each invocation delivers one event to the orchestrator (after replaying any
//! deferred events) and prints the result as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use gitforge_core::{ConnectionDescriptor, Event};
use gitforge_host::config::Config;
use gitforge_host::runtime::GitforgeRuntime;

/// GitLab provisioning and lifecycle orchestrator
#[derive(Parser, Debug)]
#[command(name = "gitforge", version)]
#[command(about = "Idempotent provisioning and lifecycle management for a GitLab stack")]
struct Args {
    /// Act as the elected leader (overrides GITFORGE_LEADER)
    #[arg(long, global = true)]
    leader: bool,

    /// SQLite file holding the installation state
    #[arg(long, global = true, env = "GITFORGE_STATE_PATH", value_name = "PATH")]
    state_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the provisioning pipeline
    Install,

    /// Re-render configuration, converge services and bootstrap when possible
    ConfigChanged,

    /// The database relation was established
    RelationJoined {
        /// Database name already declared on the relation
        #[arg(long)]
        database: Option<String>,
    },

    /// The primary database endpoint changed
    ///
    /// Omit --conn-str when no primary is available.
    MasterChanged {
        /// Database the notification refers to
        #[arg(long)]
        database: String,

        /// libpq connection string of the new primary
        #[arg(long, value_name = "CONN_STR")]
        conn_str: Option<String>,

        /// URI form of the new primary
        #[arg(long, requires = "conn_str")]
        uri: Option<String>,
    },

    /// The set of standby endpoints changed
    ///
    /// Pass --standby once per standby; none means no standby is available.
    StandbyChanged {
        /// Database the notification refers to
        #[arg(long)]
        database: String,

        /// libpq connection string of a standby
        #[arg(long = "standby", value_name = "CONN_STR")]
        standbys: Vec<String>,
    },

    /// Deliver an event given as JSON, e.g. '{"kind":"config-changed"}'
    Dispatch {
        /// Event JSON
        #[arg(long)]
        event: String,
    },

    /// Print the last reported status
    Status,

    /// Print the persisted installation state
    State,
}

impl Command {
    /// The event this command delivers, or `None` for read-only commands.
    fn into_event(self) -> anyhow::Result<Option<Event>> {
        let event = match self {
            Command::Install => Event::Install,
            Command::ConfigChanged => Event::ConfigChanged,
            Command::RelationJoined { database } => Event::DatabaseRelationJoined { database },
            Command::MasterChanged {
                database,
                conn_str,
                uri,
            } => {
                let master = conn_str
                    .map(|conn_str| -> anyhow::Result<ConnectionDescriptor> {
                        let descriptor = ConnectionDescriptor::from_conn_str(&conn_str)
                            .context("invalid --conn-str")?;
                        Ok(match uri {
                            Some(uri) => descriptor.with_uri(uri),
                            None => descriptor,
                        })
                    })
                    .transpose()?;
                Event::MasterChanged { database, master }
            }
            Command::StandbyChanged { database, standbys } => {
                let standbys = standbys
                    .iter()
                    .map(|conn_str| {
                        ConnectionDescriptor::from_conn_str(conn_str)
                            .with_context(|| format!("invalid --standby '{}'", conn_str))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Event::StandbyChanged { database, standbys }
            }
            Command::Dispatch { event } => {
                serde_json::from_str(&event).context("invalid --event JSON")?
            }
            Command::Status | Command::State => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let dotenv = dotenvy::dotenv();

    // Initialize logging on stderr; stdout carries JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gitforge_host=info,gitforge_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dotenv {
        warn!("No .env file loaded: {}", e);
    }

    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(state_path) = args.state_path {
        config.state_path = state_path;
    }
    if args.leader {
        config.is_leader = true;
    }

    info!(
        state_path = %config.state_path.display(),
        database = %config.database_name,
        is_leader = config.is_leader,
        "Starting gitforge"
    );

    let mut orchestrator = GitforgeRuntime::builder().config(config).build().await?;

    match args.command {
        Command::Status => print_json(&orchestrator.status().await?),
        Command::State => print_json(&orchestrator.state().await?),
        command => {
            let Some(event) = command.into_event()? else {
                return Ok(());
            };
            let report = orchestrator.dispatch(event).await?;
            info!(
                event = %report.outcome.event,
                status = %report.outcome.status,
                replayed = report.replayed.len(),
                "Dispatch complete"
            );
            print_json(&report)
        }
    }
}
