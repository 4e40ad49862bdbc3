// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management commands

use anyhow::Result;
use clap::{Args, Subcommand};
use kt_daemon::Response;

use crate::client::{daemon_stop, ClientError, DaemonClient};

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon if it is not running
    Start,
    /// Stop the daemon
    Stop,
    /// Show daemon status
    Status,
}

pub async fn handle(args: DaemonArgs) -> Result<()> {
    match args.command {
        DaemonCommand::Start => {
            let client = DaemonClient::connect_or_start()?;
            let version = client.hello().await?;
            println!("Daemon running (protocol {})", version);
        }
        DaemonCommand::Stop => {
            if daemon_stop().await? {
                println!("Daemon stopped");
            } else {
                println!("Daemon not running");
            }
        }
        DaemonCommand::Status => status().await?,
    }
    Ok(())
}

async fn status() -> Result<()> {
    let client = match DaemonClient::connect() {
        Ok(client) => client,
        Err(ClientError::DaemonNotRunning) => {
            println!("Daemon not running");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if let Response::Status {
        uptime_secs,
        kinds,
        active_stores,
        index_entries,
        index_subscribers,
    } = client.status().await?
    {
        println!("Daemon running");
        println!("  Uptime: {}s", uptime_secs);
        println!("  Kinds: {}", kinds.join(", "));
        println!("  Active stores: {}", active_stores);
        println!("  Index entries: {}", index_entries);
        println!("  Index watchers: {}", index_subscribers);
    }
    Ok(())
}
