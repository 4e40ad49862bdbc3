// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store namespaces
//!
//! A namespace resolves names and raw ids of one store kind to activated
//! [`StoreObject`]s. Each object is activated at most once per namespace.

use crate::error::NamespaceError;
use crate::object::{Activation, StoreObject};
use async_trait::async_trait;
use kt_adapters::IndexSink;
use kt_core::{Clock, IdGen, ReplicationConfig, StoreId};
use kt_storage::StoreFactory;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Length of ids derived from names, in hex characters
const DERIVED_ID_LEN: usize = 32;

/// Longest raw id accepted by `by_id`
const MAX_ID_LEN: usize = 64;

/// Reference to a store, resolved but not yet activated
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreRef {
    pub id: StoreId,
    /// Set when the reference came from a name
    pub name: Option<String>,
}

/// Name and id resolution for one store kind
#[async_trait]
pub trait StoreNamespace: Send + Sync {
    type Object: Send + Sync;

    fn kind(&self) -> &str;

    /// Stable id for a logical name; the name travels with the reference
    fn by_name(&self, name: &str) -> StoreRef;

    /// Reference an existing store by raw id
    fn by_id(&self, id: &str) -> Result<StoreRef, NamespaceError>;

    /// Activate (once) and return the store
    async fn get(&self, store: &StoreRef) -> Result<Arc<Self::Object>, NamespaceError>;
}

/// Derive the id of a named store
pub fn derive_id(kind: &str, name: &str) -> StoreId {
    let digest = Sha256::digest(format!("{}:{}", kind, name).as_bytes());
    let hex = hex_encode(&digest);
    StoreId::new(&hex[..DERIVED_ID_LEN])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Raw ids must be usable as file names
fn validate_id(id: &str) -> Result<(), NamespaceError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(NamespaceError::InvalidId(id.to_string()))
    }
}

/// Namespace backed by a [`StoreFactory`]
pub struct Namespace<F: StoreFactory, K, I, C> {
    kind: String,
    factory: F,
    sink: K,
    ids: I,
    clock: C,
    config: ReplicationConfig,
    active: Mutex<HashMap<StoreId, Arc<StoreObject<F::Store, I>>>>,
}

impl<F, K, I, C> Namespace<F, K, I, C>
where
    F: StoreFactory,
    K: IndexSink,
    I: IdGen,
    C: Clock,
{
    pub fn new(
        kind: impl Into<String>,
        factory: F,
        sink: K,
        ids: I,
        clock: C,
        config: ReplicationConfig,
    ) -> Self {
        Self {
            kind: kind.into(),
            factory,
            sink,
            ids,
            clock,
            config,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Number of activated stores
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }
}

#[async_trait]
impl<F, K, I, C> StoreNamespace for Namespace<F, K, I, C>
where
    F: StoreFactory,
    K: IndexSink,
    I: IdGen,
    C: Clock,
{
    type Object = StoreObject<F::Store, I>;

    fn kind(&self) -> &str {
        &self.kind
    }

    fn by_name(&self, name: &str) -> StoreRef {
        StoreRef {
            id: derive_id(&self.kind, name),
            name: Some(name.to_string()),
        }
    }

    fn by_id(&self, id: &str) -> Result<StoreRef, NamespaceError> {
        validate_id(id)?;
        Ok(StoreRef {
            id: StoreId::new(id),
            name: None,
        })
    }

    async fn get(&self, store: &StoreRef) -> Result<Arc<Self::Object>, NamespaceError> {
        validate_id(store.id.as_str())?;

        // Held across activation so each store is activated once
        let mut active = self.active.lock().await;
        if let Some(object) = active.get(&store.id) {
            // First reached by raw id, now by name
            if let Some(name) = &store.name {
                object.learn_name(name, &self.sink).await?;
            }
            return Ok(Arc::clone(object));
        }

        let backing = self
            .factory
            .open(&self.kind, &store.id)
            .await
            .map_err(|source| NamespaceError::Open {
                id: store.id.to_string(),
                source,
            })?;
        let object = StoreObject::activate(
            backing,
            Activation {
                id: store.id.clone(),
                kind: self.kind.clone(),
                name: store.name.clone(),
            },
            self.sink.clone(),
            self.ids.clone(),
            &self.config,
            &self.clock,
        )
        .await?;

        let object = Arc::new(object);
        active.insert(store.id.clone(), Arc::clone(&object));
        Ok(object)
    }
}

#[cfg(test)]
#[path = "namespace_tests.rs"]
mod tests;
