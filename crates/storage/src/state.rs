// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized key space built from applied batches

use crate::store::{ListOptions, Mutation};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Ordered key-value map that batches are applied to
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeySpace {
    entries: BTreeMap<String, Value>,
}

impl KeySpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch in order; later mutations of the same key win
    pub fn apply(&mut self, batch: &[Mutation]) {
        for mutation in batch {
            match mutation {
                Mutation::Put { key, value } => {
                    self.entries.insert(key.clone(), value.clone());
                }
                Mutation::Delete { key } => {
                    self.entries.remove(key);
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_many(&self, keys: &[String]) -> BTreeMap<String, Value> {
        keys.iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Ordered listing honouring prefix, start_after and limit
    pub fn list(&self, options: &ListOptions) -> BTreeMap<String, Value> {
        let lower = match (&options.start_after, &options.prefix) {
            (Some(after), _) => Bound::Excluded(after.clone()),
            (None, Some(prefix)) => Bound::Included(prefix.clone()),
            (None, None) => Bound::Unbounded,
        };
        let prefix = options.prefix.as_deref();

        self.entries
            .range::<String, _>((lower, Bound::Unbounded))
            // start_after may sort before the prefix
            .filter(|(k, _)| prefix.map_or(true, |p| k.as_str() >= p))
            .take_while(|(k, _)| prefix.map_or(true, |p| k.starts_with(p)))
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
