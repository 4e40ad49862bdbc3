// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Index commands

use anyhow::Result;
use clap::{Args, Subcommand};
use kt_core::IndexEntry;
use serde::Serialize;
use std::fmt;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct IndexArgs {
    #[command(subcommand)]
    pub command: IndexCommand,
}

#[derive(Subcommand)]
pub enum IndexCommand {
    /// List every known store and its last reported cursor
    List,
    /// Forget every entry (stores re-register when next activated)
    Reset,
}

#[derive(Serialize)]
#[serde(transparent)]
struct Row(IndexEntry);

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = &self.0.meta;
        let cursor = self
            .0
            .cur_write_id
            .as_ref()
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        write!(
            f,
            "{:<34} {:<12} {:<20} {}",
            meta.store_id.as_str(),
            meta.store_kind,
            meta.logical_name.as_deref().unwrap_or("-"),
            cursor
        )
    }
}

pub async fn handle(client: &DaemonClient, args: IndexArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        IndexCommand::List => {
            let entries = client.list_index().await?;
            if entries.is_empty() && matches!(format, OutputFormat::Text) {
                println!("No stores");
                return Ok(());
            }
            if matches!(format, OutputFormat::Text) {
                println!("{:<34} {:<12} {:<20} CURSOR", "ID", "KIND", "NAME");
            }
            let rows: Vec<Row> = entries.into_iter().map(Row).collect();
            output::print_list(&rows, format);
        }
        IndexCommand::Reset => {
            client.reset_index().await?;
            println!("Index reset");
        }
    }
    Ok(())
}
