// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key-value commands against one store

use anyhow::Result;
use kt_core::WriteCursor;
use kt_daemon::StoreAddress;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

/// Which store a command addresses
#[derive(clap::Args, Debug)]
pub struct StoreArgs {
    /// Store name (or raw id with --by-id)
    pub store: String,

    /// Treat STORE as a raw store id
    #[arg(long)]
    pub by_id: bool,

    /// Store kind
    #[arg(long, default_value = "default")]
    pub kind: String,
}

impl StoreArgs {
    pub fn address(&self) -> StoreAddress {
        if self.by_id {
            StoreAddress::Id {
                kind: self.kind.clone(),
                id: self.store.clone(),
            }
        } else {
            StoreAddress::Name {
                kind: self.kind.clone(),
                name: self.store.clone(),
            }
        }
    }
}

#[derive(clap::Args)]
pub struct GetArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Keys to read
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(clap::Args)]
pub struct PutArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Entries as KEY=VALUE; VALUE is JSON, or a plain string if it is not
    #[arg(required = true, value_parser = parse_entry)]
    pub entries: Vec<(String, Value)>,
}

#[derive(clap::Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Keys to delete
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(clap::Args)]
pub struct EraseArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

fn parse_entry(arg: &str) -> Result<(String, Value), String> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", arg))?;
    if key.is_empty() {
        return Err("key must not be empty".to_string());
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

#[derive(Serialize)]
struct Entry {
    key: String,
    value: Value,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.key, self.value)
    }
}

/// Outcome of a write
#[derive(Serialize)]
struct Written {
    cursor: Option<WriteCursor>,
}

impl fmt::Display for Written {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cursor {
            Some(cursor) => write!(f, "written at {}", cursor),
            None => write!(f, "nothing written"),
        }
    }
}

pub async fn get(client: &DaemonClient, args: GetArgs, format: OutputFormat) -> Result<()> {
    let values = client.get(args.store.address(), args.keys).await?;
    let entries: Vec<Entry> = values
        .into_iter()
        .map(|(key, value)| Entry { key, value })
        .collect();
    output::print_list(&entries, format);
    Ok(())
}

pub async fn put(client: &DaemonClient, args: PutArgs, format: OutputFormat) -> Result<()> {
    let entries: BTreeMap<String, Value> = args.entries.into_iter().collect();
    let cursor = client.put(args.store.address(), entries).await?;
    output::print(&Written { cursor }, format);
    Ok(())
}

pub async fn delete(client: &DaemonClient, args: DeleteArgs, format: OutputFormat) -> Result<()> {
    let cursor = client.delete(args.store.address(), args.keys).await?;
    output::print(&Written { cursor }, format);
    Ok(())
}

pub async fn erase(client: &DaemonClient, args: EraseArgs, format: OutputFormat) -> Result<()> {
    let cursor = client.erase_all(args.store.address()).await?;
    output::print(
        &Written {
            cursor: Some(cursor),
        },
        format,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_values_parse_as_json() {
        assert_eq!(
            parse_entry("n=42").unwrap(),
            ("n".to_string(), json!(42))
        );
        assert_eq!(
            parse_entry(r#"o={"a":[1]}"#).unwrap(),
            ("o".to_string(), json!({"a": [1]}))
        );
    }

    #[test]
    fn non_json_values_are_strings() {
        assert_eq!(
            parse_entry("greeting=hello world").unwrap(),
            ("greeting".to_string(), json!("hello world"))
        );
    }

    #[test]
    fn only_first_equals_splits() {
        assert_eq!(
            parse_entry("k=a=b").unwrap(),
            ("k".to_string(), json!("a=b"))
        );
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(parse_entry("no-equals").is_err());
        assert!(parse_entry("=1").is_err());
    }

    #[test]
    fn address_by_id() {
        let args = StoreArgs {
            store: "abc".to_string(),
            by_id: true,
            kind: "room".to_string(),
        };
        assert_eq!(
            args.address(),
            StoreAddress::Id {
                kind: "room".to_string(),
                id: "abc".to_string()
            }
        );
    }
}
