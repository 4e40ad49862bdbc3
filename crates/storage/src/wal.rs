// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log of mutation batches
//!
//! One JSON line per batch. A batch is durable once its line is synced, so a
//! line cut short by a crash is a batch that never happened: it is dropped
//! on open.

use crate::store::Mutation;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write-ahead log for durable batch storage
pub struct Wal {
    file: File,
    sequence: u64,
}

impl Wal {
    /// Open or create a WAL at the given path, discarding a torn final line
    pub fn open(path: &Path) -> Result<Self, WalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        discard_torn_tail(path)?;

        // Count existing entries to set sequence number
        let reader = BufReader::new(File::open(path)?);
        let sequence = reader.lines().count() as u64;

        Ok(Self { file, sequence })
    }

    /// Append a batch to the log and sync it to disk
    pub fn append(&mut self, batch: &[Mutation]) -> Result<u64, WalError> {
        let entry = WalEntry {
            seq: self.sequence + 1,
            batch: batch.to_vec(),
        };
        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{}", line)?;
        self.file.sync_all()?;
        self.sequence += 1;
        Ok(self.sequence)
    }

    /// Drop every entry
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.sequence = 0;
        Ok(())
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Replay all batches from the log
    pub fn replay(path: &Path) -> Result<Vec<Vec<Mutation>>, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let reader = BufReader::new(file);
        let mut batches = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let entry: WalEntry = serde_json::from_str(&line).map_err(|source| {
                WalError::Corrupt {
                    line: index + 1,
                    source,
                }
            })?;
            batches.push(entry.batch);
        }

        Ok(batches)
    }
}

/// Cut the file back to its last complete line
fn discard_torn_tail(path: &Path) -> Result<(), WalError> {
    let mut contents = Vec::new();
    File::open(path)?.read_to_end(&mut contents)?;

    if contents.is_empty() || contents.ends_with(b"\n") {
        return Ok(());
    }

    let keep = contents
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |pos| pos + 1);
    tracing::warn!(
        path = %path.display(),
        dropped_bytes = contents.len() - keep,
        "discarding incomplete WAL entry"
    );

    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(keep as u64)?;
    file.sync_all()?;
    Ok(())
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct WalEntry {
    seq: u64,
    batch: Vec<Mutation>,
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
