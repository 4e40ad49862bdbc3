// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands

pub mod daemon;
pub mod index;
pub mod store;
pub mod sync;
