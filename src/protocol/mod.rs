// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Wire protocol shared by both hops: client -> relay and relay -> enclave.
//!
//! Each message is a single JSON document terminated by `\n`.

mod codec;
mod messages;

pub use codec::JsonLinesCodec;
pub use messages::{ExecutionRequest, ExecutionResponse};

/// Default ceiling for a single framed message (16 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Extra frame allowance on the enclave hop for the `"id"` field the relay
/// adds, so a client frame accepted at the limit still fits once tagged.
pub const CORRELATION_ID_HEADROOM: usize = 32;
