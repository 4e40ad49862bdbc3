// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The storage contract every backend implements

use crate::wal::WalError;
use async_trait::async_trait;
use kt_core::ErrorClass;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Storage
    }
}

/// One operation inside an atomic batch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    Put { key: String, value: Value },
    Delete { key: String },
}

impl Mutation {
    pub fn put(key: impl Into<String>, value: Value) -> Self {
        Mutation::Put {
            key: key.into(),
            value,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Mutation::Delete { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            Mutation::Put { key, .. } | Mutation::Delete { key } => key,
        }
    }
}

/// Options for an ordered listing
///
/// Pagination is cursor based: pass the last key of a page as `start_after`
/// to get the next one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub start_after: Option<String>,
    pub limit: Option<usize>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_start_after(mut self, key: impl Into<String>) -> Self {
        self.start_after = Some(key.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A single-writer key-value store
///
/// `apply` is the only atomic unit: every mutation in one batch lands, or
/// none does. Reads never fail for absent keys; they omit them.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Values for the keys that exist; absent keys are omitted
    async fn get_many(&self, keys: &[String]) -> Result<BTreeMap<String, Value>, StoreError>;

    /// Entries in ascending key order
    async fn list(&self, options: &ListOptions) -> Result<BTreeMap<String, Value>, StoreError>;

    /// Apply every mutation in `batch` as one atomic unit
    async fn apply(&self, batch: Vec<Mutation>) -> Result<(), StoreError>;

    /// Remove every key, reserved ones included
    async fn erase_all(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<BTreeMap<String, Value>, StoreError> {
        (**self).get_many(keys).await
    }

    async fn list(&self, options: &ListOptions) -> Result<BTreeMap<String, Value>, StoreError> {
        (**self).list(options).await
    }

    async fn apply(&self, batch: Vec<Mutation>) -> Result<(), StoreError> {
        (**self).apply(batch).await
    }

    async fn erase_all(&self) -> Result<(), StoreError> {
        (**self).erase_all().await
    }
}
