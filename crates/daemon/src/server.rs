// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use kt_adapters::TracedIndexSink;
use kt_core::{ErrorClass, ReplicationConfig, SyncRequest, SystemClock, TimestampIdGen};
use kt_daemon::protocol::{
    self, ProtocolError, Request, Response, StoreAddress, DEFAULT_TIMEOUT, PROTOCOL_VERSION,
};
use kt_engine::{EngineError, Namespace, NamespaceError, StoreNamespace, StoreObject};
use kt_index::{IndexError, IndexService};
use kt_storage::{WalStore, WalStoreFactory};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, warn};

/// Sync messages buffered between the handler and the socket writer
const SYNC_BUFFER: usize = 4;

/// Index sink wired into every namespace
pub type DaemonSink = TracedIndexSink<IndexService<WalStore>>;

/// Namespace with the daemon's concrete store, sink, id and clock types
pub type DaemonNamespace = Namespace<WalStoreFactory, DaemonSink, TimestampIdGen, SystemClock>;

type DaemonObject = StoreObject<WalStore, TimestampIdGen>;

/// State shared by every connection
pub struct DaemonContext {
    namespaces: BTreeMap<String, DaemonNamespace>,
    index: IndexService<WalStore>,
    token_digest: Vec<u8>,
    replication: ReplicationConfig,
    start_time: Instant,
    shutdown: Notify,
}

impl DaemonContext {
    pub fn new(
        namespaces: BTreeMap<String, DaemonNamespace>,
        index: IndexService<WalStore>,
        auth_token: &str,
        replication: ReplicationConfig,
    ) -> Self {
        Self {
            namespaces,
            index,
            token_digest: Sha256::digest(auth_token.as_bytes()).to_vec(),
            replication,
            start_time: Instant::now(),
            shutdown: Notify::new(),
        }
    }

    /// Compare digests so the check takes the same time for every token
    fn authorized(&self, token: &str) -> bool {
        Sha256::digest(token.as_bytes()).as_slice() == self.token_digest.as_slice()
    }

    fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Resolves once a client has asked the daemon to stop
    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }

    async fn resolve(&self, address: &StoreAddress) -> Result<Arc<DaemonObject>, HandlerError> {
        let namespace = self
            .namespaces
            .get(address.kind())
            .ok_or_else(|| HandlerError::UnknownKind(address.kind().to_string()))?;
        let store = match address {
            StoreAddress::Name { name, .. } => namespace.by_name(name),
            StoreAddress::Id { id, .. } => namespace.by_id(id)?,
        };
        Ok(namespace.get(&store).await?)
    }

    async fn active_stores(&self) -> usize {
        let mut total = 0;
        for namespace in self.namespaces.values() {
            total += namespace.active_count().await;
        }
        total
    }
}

/// Handle a single client connection
pub async fn handle_connection(
    ctx: Arc<DaemonContext>,
    stream: UnixStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let envelope = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(envelope) => envelope,
        Err(ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    if !ctx.authorized(&envelope.token) {
        warn!("Rejected request with invalid token");
        let response = Response::error(ErrorClass::ProtocolViolation, "invalid auth token");
        protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
        return Ok(());
    }

    debug!("Received request: {:?}", envelope.request);

    match envelope.request {
        Request::ReadAllFrom { store, sync } => {
            stream_sync(&ctx, &store, sync, reader, writer).await
        }
        Request::WatchIndex => stream_index(&ctx, reader, writer).await,
        request => {
            let response = handle_request(&ctx, request).await;
            debug!("Sending response: {:?}", response);
            protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
            Ok(())
        }
    }
}

/// Handle a single-response request
async fn handle_request(ctx: &DaemonContext, request: Request) -> Response {
    match dispatch(ctx, request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(class = %e.class(), error = %e, "request failed");
            Response::error(e.class(), e.to_string())
        }
    }
}

async fn dispatch(ctx: &DaemonContext, request: Request) -> Result<Response, HandlerError> {
    let response = match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Status => Response::Status {
            uptime_secs: ctx.start_time.elapsed().as_secs(),
            kinds: ctx.namespaces.keys().cloned().collect(),
            active_stores: ctx.active_stores().await,
            index_entries: ctx.index.list().await.len(),
            index_subscribers: ctx.index.subscriber_count(),
        },

        Request::Get { store, keys } => {
            let object = ctx.resolve(&store).await?;
            Response::Values {
                values: object.get_many(&keys).await?,
            }
        }

        Request::Put { store, entries } => {
            let object = ctx.resolve(&store).await?;
            Response::Written {
                cursor: object.put_many(entries).await?,
            }
        }

        Request::Delete { store, keys } => {
            let object = ctx.resolve(&store).await?;
            Response::Written {
                cursor: object.delete_many(keys).await?,
            }
        }

        Request::EraseAll { store } => {
            let object = ctx.resolve(&store).await?;
            Response::Erased {
                cursor: object.erase_all().await?,
            }
        }

        Request::ListIndex => Response::IndexEntries {
            entries: ctx.index.list().await,
        },

        Request::ResetIndex => {
            ctx.index.reset().await?;
            Response::Ok
        }

        Request::Shutdown => {
            ctx.request_shutdown();
            Response::ShuttingDown
        }

        Request::ReadAllFrom { .. } | Request::WatchIndex => return Err(HandlerError::Streaming),
    };
    Ok(response)
}

/// Serve a sync stream, then hold the connection until the reader closes it
async fn stream_sync(
    ctx: &DaemonContext,
    address: &StoreAddress,
    request: SyncRequest,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
) -> Result<(), ServerError> {
    let object = match ctx.resolve(address).await {
        Ok(object) => object,
        Err(e) => {
            warn!(store = %address, class = %e.class(), error = %e, "sync rejected");
            let response = Response::error(e.class(), e.to_string());
            protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
            return Ok(());
        }
    };

    let (tx, rx) = mpsc::channel(SYNC_BUFFER);
    // tx drops when serving ends, which ends the forwarding loop
    let serve = async move { object.read_all_from(&request, &tx).await };
    let forward = async {
        let mut rx = rx;
        while let Some(message) = rx.recv().await {
            protocol::write_response(&mut writer, &Response::Sync { message }, DEFAULT_TIMEOUT)
                .await?;
        }
        Ok::<(), ProtocolError>(())
    };
    let (served, forwarded) = tokio::join!(serve, forward);

    if let Err(e) = forwarded {
        debug!(store = %address, error = %e, "sync reader went away");
        return Ok(());
    }
    match served {
        Ok(read_type) => debug!(store = %address, ?read_type, "sync served"),
        Err(e) => {
            let response = Response::error(e.class(), e.to_string());
            protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
            return Ok(());
        }
    }

    let grace = ctx.replication.close_grace;
    if tokio::time::timeout(grace, wait_for_close(&mut reader))
        .await
        .is_err()
    {
        debug!(store = %address, "reader held sync stream past close grace");
    }
    Ok(())
}

/// Forward index messages until either side goes away
async fn stream_index(
    ctx: &DaemonContext,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
) -> Result<(), ServerError> {
    let mut subscription = ctx.index.watch().await;
    let mut buf = [0u8; 256];
    loop {
        tokio::select! {
            message = subscription.recv() => {
                let Some(message) = message else { break };
                let response = Response::Index { message };
                if let Err(e) = protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await {
                    debug!(error = %e, "index watcher went away");
                    break;
                }
            }
            read = reader.read(&mut buf) => match read {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            },
        }
    }
    Ok(())
}

/// Discard input until EOF
async fn wait_for_close(reader: &mut OwnedReadHalf) {
    let mut buf = [0u8; 256];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

/// Errors answered to the client as an error response
#[derive(Debug, Error)]
enum HandlerError {
    #[error("unknown store kind: {0}")]
    UnknownKind(String),
    #[error("streaming request on a single-response path")]
    Streaming,
    #[error(transparent)]
    Namespace(#[from] NamespaceError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl HandlerError {
    fn class(&self) -> ErrorClass {
        match self {
            HandlerError::UnknownKind(_) | HandlerError::Streaming => {
                ErrorClass::ProtocolViolation
            }
            HandlerError::Namespace(e) => e.class(),
            HandlerError::Engine(e) => e.class(),
            HandlerError::Index(e) => e.class(),
        }
    }
}

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Request timeout")]
    Timeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
