// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The untrusted side of the boundary: a client-facing service that forwards
//! every request over one shared channel to the enclave executor.

pub mod channel;
pub mod client;
pub mod link;

pub use channel::EnclaveChannel;
pub use client::RelayClient;
pub use link::{EnclaveLink, LinkStatus};
