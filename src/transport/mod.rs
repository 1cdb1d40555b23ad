// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Stream transports for both hops.
//!
//! TCP is always available. AF_VSOCK, the channel into a Nitro-style enclave,
//! is compiled in with the `vsock` feature.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use crate::config::Endpoint;
use crate::errors::ConfigError;

#[cfg(feature = "vsock")]
mod vsock;

pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;

/// Dials one endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> io::Result<BoxedStream>;

    fn describe(&self) -> String;
}

/// Accepts inbound connections, yielding the stream and a printable peer.
#[async_trait]
pub trait Acceptor: Send + Sync {
    async fn accept(&self) -> io::Result<(BoxedStream, String)>;

    fn local_description(&self) -> String;
}

pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> io::Result<BoxedStream> {
        let stream = TcpStream::connect(&self.address).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }
}

pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub async fn bind(address: &str) -> io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(address).await?,
        })
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}

#[async_trait]
impl Acceptor for TcpAcceptor {
    async fn accept(&self) -> io::Result<(BoxedStream, String)> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok((Box::new(stream), peer.to_string()))
    }

    fn local_description(&self) -> String {
        match self.listener.local_addr() {
            Ok(addr) => format!("tcp://{}", addr),
            Err(_) => "tcp://<unbound>".to_string(),
        }
    }
}

/// Builds the connector for `endpoint`.
pub fn connector_for(endpoint: &Endpoint) -> Result<Box<dyn Connector>, ConfigError> {
    match endpoint {
        Endpoint::Tcp { address } => Ok(Box::new(TcpConnector::new(address.clone()))),
        Endpoint::Vsock { cid, port } => vsock_connector(*cid, *port),
    }
}

/// Binds a listener for `endpoint`.
pub async fn bind(endpoint: &Endpoint) -> Result<Box<dyn Acceptor>, ConfigError> {
    match endpoint {
        Endpoint::Tcp { address } => Ok(Box::new(TcpAcceptor::bind(address).await?)),
        Endpoint::Vsock { cid, port } => vsock_acceptor(*cid, *port),
    }
}

#[cfg(feature = "vsock")]
fn vsock_connector(cid: Option<u32>, port: u32) -> Result<Box<dyn Connector>, ConfigError> {
    let cid = cid.ok_or_else(|| {
        ConfigError::Invalid("a vsock endpoint to connect to needs a cid".to_string())
    })?;
    Ok(Box::new(vsock::VsockConnector::new(cid, port)))
}

#[cfg(feature = "vsock")]
fn vsock_acceptor(cid: Option<u32>, port: u32) -> Result<Box<dyn Acceptor>, ConfigError> {
    Ok(Box::new(vsock::VsockAcceptor::bind(cid, port)?))
}

#[cfg(not(feature = "vsock"))]
fn vsock_connector(_cid: Option<u32>, _port: u32) -> Result<Box<dyn Connector>, ConfigError> {
    Err(vsock_unavailable())
}

#[cfg(not(feature = "vsock"))]
fn vsock_acceptor(_cid: Option<u32>, _port: u32) -> Result<Box<dyn Acceptor>, ConfigError> {
    Err(vsock_unavailable())
}

#[cfg(not(feature = "vsock"))]
fn vsock_unavailable() -> ConfigError {
    ConfigError::Invalid("vsock transport requires the `vsock` feature".to_string())
}
