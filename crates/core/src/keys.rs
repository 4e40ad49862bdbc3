// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reserved key namespace
//!
//! The write log lives in the same key space as application data. Every key
//! it owns starts with [`RESERVED_PREFIX`]; application keys must not.

/// Prefix shared by every key the write log owns
pub const RESERVED_PREFIX: &str = "_kt.";

/// Key holding the persisted [`NextWrite`](crate::cursor::NextWrite)
pub const NEXT_WRITE_KEY: &str = "_kt.next_write_id";

/// Key holding the persisted [`ObjectMeta`](crate::meta::ObjectMeta)
pub const META_KEY: &str = "_kt.meta";

const CHANGE_RECORD_PREFIX: &str = "_kt.write_id.";

/// True if the key belongs to the write log rather than the application
pub fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

/// Key under which the change record for `write_id` is stored
pub fn change_record_key(write_id: u64) -> String {
    format!("{}{}", CHANGE_RECORD_PREFIX, write_id)
}
