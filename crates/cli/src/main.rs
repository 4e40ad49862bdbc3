// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! kt - kvtail CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{daemon, index, store, sync};

use crate::client::DaemonClient;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "kt",
    version,
    about = "kvtail - replicated key-value stores with incremental sync"
)]
struct Cli {
    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read keys from a store
    Get(store::GetArgs),
    /// Write KEY=VALUE entries to a store
    Put(store::PutArgs),
    /// Delete keys from a store
    Delete(store::DeleteArgs),
    /// Erase a store and start a new branch
    Erase(store::EraseArgs),
    /// Stream a store's state as JSON lines
    Sync(sync::SyncArgs),
    /// Stream index updates as JSON lines
    Watch,
    /// Index management
    Index(index::IndexArgs),
    /// Daemon management
    Daemon(daemon::DaemonArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    // Daemon commands manage the connection themselves
    let command = match cli.command {
        Commands::Daemon(args) => return daemon::handle(args).await,
        command => command,
    };

    let client = DaemonClient::connect_or_start()?;
    let format = cli.output;

    match command {
        Commands::Get(args) => store::get(&client, args, format).await?,
        Commands::Put(args) => store::put(&client, args, format).await?,
        Commands::Delete(args) => store::delete(&client, args, format).await?,
        Commands::Erase(args) => store::erase(&client, args, format).await?,
        Commands::Sync(args) => sync::sync(&client, args).await?,
        Commands::Watch => sync::watch(&client).await?,
        Commands::Index(args) => index::handle(&client, args, format).await?,
        Commands::Daemon(args) => daemon::handle(args).await?,
    }

    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
