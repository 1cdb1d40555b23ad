// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging.
//!
//! Log output goes through message structs that implement `Display`, so the
//! wording of every log line lives in one place instead of being scattered
//! through the code as format strings.
//!
//! Messages are organized by subsystem:
//! * `messages::template` - secret injection
//! * `messages::enclave` - compile and execute pipeline
//! * `messages::relay` - connections, the enclave channel and its lifecycle
//!
//! # Usage
//!
//! ```rust
//! use wasm_enclave::observability::messages::enclave::ExecutionFailed;
//!
//! let error = std::io::Error::new(std::io::ErrorKind::Other, "trap");
//! let msg = ExecutionFailed {
//!     function: "square",
//!     error: &error,
//! };
//!
//! tracing::error!("{}", msg);
//! ```
//!
//! Secret values never appear in these messages unmasked.

pub mod messages;

use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber, filtered by `RUST_LOG` (default `info`).
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
