// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for listeners, connections and the enclave channel.

use std::fmt::{Display, Formatter};
use std::time::Duration;

/// A listener is accepting connections.
///
/// # Log Level
/// `info!`
///
/// # Example
/// ```
/// use wasm_enclave::observability::messages::relay::ListenerStarted;
///
/// let msg = ListenerStarted {
///     role: "relay",
///     address: "tcp://0.0.0.0:8081",
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ListenerStarted<'a> {
    pub role: &'a str,
    pub address: &'a str,
}

impl Display for ListenerStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} listening on {}", self.role, self.address)
    }
}

/// # Log Level
/// `error!` - the accept loop keeps going
pub struct AcceptFailed<'a> {
    pub role: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for AcceptFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} failed to accept connection: {}", self.role, self.error)
    }
}

/// # Log Level
/// `info!`
pub struct ConnectionAccepted<'a> {
    pub role: &'a str,
    pub peer: &'a str,
}

impl Display for ConnectionAccepted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} accepted connection from {}", self.role, self.peer)
    }
}

/// A connection loop ended. `reason` is `None` on a clean disconnect.
///
/// # Log Level
/// `info!` on clean close, `warn!` otherwise
pub struct ConnectionClosed<'a> {
    pub role: &'a str,
    pub peer: &'a str,
    pub requests: u64,
    pub reason: Option<&'a dyn std::error::Error>,
}

impl Display for ConnectionClosed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} connection from {} closed after {} request(s)",
            self.role, self.peer, self.requests
        )?;
        if let Some(reason) = self.reason {
            write!(f, ": {}", reason)?;
        }
        Ok(())
    }
}

/// # Log Level
/// `info!`
pub struct ChannelConnecting<'a> {
    pub endpoint: &'a str,
}

impl Display for ChannelConnecting<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Connecting to enclave at {}", self.endpoint)
    }
}

/// # Log Level
/// `info!`
pub struct ChannelConnected<'a> {
    pub endpoint: &'a str,
}

impl Display for ChannelConnected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Connected to enclave at {}", self.endpoint)
    }
}

/// # Log Level
/// `warn!` - surfaced to the client as an error response
pub struct ChannelConnectFailed<'a> {
    pub endpoint: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ChannelConnectFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Could not connect to enclave at {}: {}",
            self.endpoint, self.error
        )
    }
}

/// The reader or writer side of the channel stopped.
///
/// # Log Level
/// `warn!`
pub struct ChannelLost<'a> {
    pub side: &'a str,
    pub pending: usize,
    pub reason: &'a str,
}

impl Display for ChannelLost<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Enclave channel {} stopped ({}); failing {} pending request(s)",
            self.side, self.reason, self.pending
        )
    }
}

/// A response arrived for an id nobody is waiting on (late or unknown).
///
/// # Log Level
/// `warn!`
pub struct OrphanResponse {
    pub id: Option<u64>,
}

impl Display for OrphanResponse {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "Discarding enclave response for unknown request id {}", id),
            None => write!(f, "Discarding enclave response without a request id"),
        }
    }
}

/// # Log Level
/// `warn!`
pub struct RequestTimedOut {
    pub id: u64,
    pub timeout: Duration,
}

impl Display for RequestTimedOut {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Enclave request {} got no response within {:?}",
            self.id, self.timeout
        )
    }
}

/// # Log Level
/// `debug!`
pub struct RequestForwarded<'a> {
    pub id: u64,
    pub function: &'a str,
    pub code_len: usize,
}

impl Display for RequestForwarded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Forwarding request {} to enclave: function={}, code={} bytes",
            self.id, self.function, self.code_len
        )
    }
}
