// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! * `template` - placeholder discovery and secret injection
//! * `enclave` - request handling, compilation and execution
//! * `relay` - listeners, client connections and the enclave channel

pub mod enclave;
pub mod relay;
pub mod template;
