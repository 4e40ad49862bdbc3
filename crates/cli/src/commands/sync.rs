// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming commands: `kt sync` and `kt watch`

use anyhow::{bail, Result};
use kt_core::SyncRequest;
use kt_daemon::{Request, Response};

use super::store::StoreArgs;
use crate::client::{ClientError, DaemonClient};
use crate::output;

#[derive(clap::Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Branch of the cursor already held
    #[arg(long, requires = "from_write_id")]
    pub from_log_id: Option<String>,

    /// Last write already applied
    #[arg(long, requires = "from_log_id")]
    pub from_write_id: Option<u64>,
}

/// Print one sync stream as JSON lines, ending at `end`
pub async fn sync(client: &DaemonClient, args: SyncArgs) -> Result<()> {
    let request = Request::ReadAllFrom {
        store: args.store.address(),
        sync: SyncRequest {
            from_log_id: args.from_log_id,
            from_write_id: args.from_write_id,
        },
    };
    let mut stream = client.stream(request).await?;

    while let Some(response) = stream.next().await? {
        match response {
            Response::Sync { message } => {
                output::print_line(&message)?;
                if message.is_end() {
                    // Dropping the stream closes our side and ends the daemon's close grace
                    return Ok(());
                }
            }
            Response::Error { class, message } => {
                return Err(ClientError::Rejected { class, message }.into())
            }
            _ => return Err(ClientError::UnexpectedResponse.into()),
        }
    }
    bail!("sync stream ended before its end message")
}

/// Print index updates as JSON lines until interrupted
pub async fn watch(client: &DaemonClient) -> Result<()> {
    let mut stream = client.stream(Request::WatchIndex).await?;
    loop {
        let response = tokio::select! {
            response = stream.next() => response?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };
        match response {
            Some(Response::Index { message }) => output::print_line(&message)?,
            Some(Response::Error { class, message }) => {
                return Err(ClientError::Rejected { class, message }.into())
            }
            Some(_) => return Err(ClientError::UnexpectedResponse.into()),
            None => return Ok(()),
        }
    }
}
