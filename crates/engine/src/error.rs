// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the replication engine

use kt_adapters::SinkError;
use kt_core::ErrorClass;
use kt_storage::StoreError;
use thiserror::Error;

/// Errors from the write-log recorder
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("write names no keys")]
    EmptyWrite,
    #[error("write mixes reserved key {key} with application keys")]
    MixedBatch { key: String },
    #[error("recorder stopped after an earlier failed write")]
    Poisoned,
    #[error("write failed, log state is in doubt: {0}")]
    Fatal(StoreError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("undecodable {key}: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
    #[error("failed to encode log entry: {0}")]
    Encode(#[source] serde_json::Error),
}

impl RecordError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RecordError::EmptyWrite | RecordError::MixedBatch { .. } => {
                ErrorClass::ProtocolViolation
            }
            RecordError::Decode { .. } => ErrorClass::LogCorruption,
            RecordError::Poisoned
            | RecordError::Fatal(_)
            | RecordError::Store(_)
            | RecordError::Encode(_) => ErrorClass::Storage,
        }
    }
}

/// Errors from activating or operating on a store object
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to announce store start: {0}")]
    Started(#[source] SinkError),
    #[error("key {key} is reserved for the write log")]
    ReservedKey { key: String },
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Record(e) => e.class(),
            EngineError::Store(e) => e.class(),
            EngineError::Started(e) => e.class(),
            EngineError::ReservedKey { .. } => ErrorClass::ProtocolViolation,
        }
    }
}

/// Errors from resolving stores in a namespace
#[derive(Debug, Error)]
pub enum NamespaceError {
    #[error("invalid store id: {0:?}")]
    InvalidId(String),
    #[error("failed to open store {id}: {source}")]
    Open { id: String, source: StoreError },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl NamespaceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            NamespaceError::InvalidId(_) => ErrorClass::ProtocolViolation,
            NamespaceError::Open { source, .. } => source.class(),
            NamespaceError::Engine(e) => e.class(),
        }
    }
}
