// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kt-daemon: the `ktd` wire protocol and startup log format, shared with
//! the `kt` client

pub mod protocol;
pub mod startup;

pub use protocol::{Envelope, ProtocolError, Request, Response, StoreAddress, PROTOCOL_VERSION};
