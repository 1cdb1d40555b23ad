// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;        // YAML config + defaults
pub mod enclave;       // template, compile bridge, execution engine
pub mod errors;        // error handling
pub mod observability;
pub mod protocol;      // JSON-lines wire format
pub mod relay;         // client-facing relay and enclave channel
pub mod server;        // accept loop, per-connection request loops
pub mod traits;        // unified abstractions
pub mod transport;     // TCP and vsock streams
