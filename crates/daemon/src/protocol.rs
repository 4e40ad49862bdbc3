// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between `kt` and `ktd`
//!
//! Every frame is a 4-byte big-endian length followed by that many bytes of
//! JSON. A connection carries one request. Most requests get one response;
//! `read_all_from` and `watch_index` get a stream of responses.

use kt_core::{ErrorClass, IndexEntry, IndexMessage, SyncMessage, SyncRequest, WriteCursor};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bumped whenever a request or response changes shape
pub const PROTOCOL_VERSION: &str = "1";

/// Timeout for reading a request or writing a single response
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest frame either side accepts
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("timed out")]
    Timeout,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("message of {size} bytes exceeds limit of {max}")]
    MessageTooLarge { size: usize, max: usize },
}

/// Which store a request addresses
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum StoreAddress {
    /// Logical name; the id is derived from kind and name
    Name { kind: String, name: String },
    /// Raw id of a store that already exists
    Id { kind: String, id: String },
}

impl StoreAddress {
    pub fn kind(&self) -> &str {
        match self {
            StoreAddress::Name { kind, .. } | StoreAddress::Id { kind, .. } => kind,
        }
    }
}

impl fmt::Display for StoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreAddress::Name { kind, name } => write!(f, "{}/{}", kind, name),
            StoreAddress::Id { kind, id } => write!(f, "{}#{}", kind, id),
        }
    }
}

/// A request with the shared secret that authorizes it
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub token: String,
    pub request: Request,
}

// The token never reaches the logs
impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("token", &"<redacted>")
            .field("request", &self.request)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Hello {
        version: String,
    },
    Ping,
    Status,
    Get {
        store: StoreAddress,
        keys: Vec<String>,
    },
    Put {
        store: StoreAddress,
        entries: BTreeMap<String, Value>,
    },
    Delete {
        store: StoreAddress,
        keys: Vec<String>,
    },
    EraseAll {
        store: StoreAddress,
    },
    /// Stream the store's state relative to the reader's cursor
    ReadAllFrom {
        store: StoreAddress,
        #[serde(flatten)]
        sync: SyncRequest,
    },
    /// Stream the index: one full listing, then partial updates
    WatchIndex,
    ListIndex,
    ResetIndex,
    Shutdown,
}

impl Request {
    /// Requests answered with a stream rather than one response
    pub fn is_streaming(&self) -> bool {
        matches!(self, Request::ReadAllFrom { .. } | Request::WatchIndex)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Pong,
    ShuttingDown,
    Hello {
        version: String,
    },
    Status {
        uptime_secs: u64,
        kinds: Vec<String>,
        active_stores: usize,
        index_entries: usize,
        index_subscribers: usize,
    },
    Values {
        values: BTreeMap<String, Value>,
    },
    /// `cursor` is absent when nothing was written
    Written {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor: Option<WriteCursor>,
    },
    Erased {
        cursor: WriteCursor,
    },
    Sync {
        message: SyncMessage,
    },
    Index {
        message: IndexMessage,
    },
    IndexEntries {
        entries: Vec<IndexEntry>,
    },
    Error {
        class: ErrorClass,
        message: String,
    },
}

impl Response {
    pub fn error(class: ErrorClass, message: impl Into<String>) -> Self {
        Response::Error {
            class,
            message: message.into(),
        }
    }
}

/// Serialize to JSON, without the length prefix
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write one length-prefixed frame and flush it
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame
///
/// A clean EOF before the length prefix is `ConnectionClosed`.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(data)
}

pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Envelope, ProtocolError> {
    let data = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&data)
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
