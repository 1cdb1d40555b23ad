// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;
use thiserror::Error;

use super::CodecError;

/// Failures on the relay side of the trust boundary.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The enclave channel could not be established.
    #[error("enclave unreachable")]
    EnclaveUnreachable(#[source] std::io::Error),

    /// The channel died while the request was in flight.
    #[error("enclave channel closed")]
    ChannelClosed,

    #[error("no response from enclave within {0:?}")]
    Timeout(Duration),

    #[error("connection closed before a response arrived")]
    ConnectionClosed,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
