// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::io;
use tokio::sync::Mutex;
use tokio_vsock::{VsockAddr, VsockListener, VsockStream};

use super::{Acceptor, BoxedStream, Connector};

/// Listen on every local context id.
const VMADDR_CID_ANY: u32 = u32::MAX;

pub struct VsockConnector {
    cid: u32,
    port: u32,
}

impl VsockConnector {
    pub fn new(cid: u32, port: u32) -> Self {
        Self { cid, port }
    }
}

#[async_trait]
impl Connector for VsockConnector {
    async fn connect(&self) -> io::Result<BoxedStream> {
        let stream = VsockStream::connect(VsockAddr::new(self.cid, self.port)).await?;
        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        format!("vsock://{}:{}", self.cid, self.port)
    }
}

pub struct VsockAcceptor {
    listener: Mutex<VsockListener>,
    description: String,
}

impl VsockAcceptor {
    pub fn bind(cid: Option<u32>, port: u32) -> io::Result<Self> {
        let cid = cid.unwrap_or(VMADDR_CID_ANY);
        let listener = VsockListener::bind(VsockAddr::new(cid, port))?;
        Ok(Self {
            listener: Mutex::new(listener),
            description: format!("vsock://{}:{}", cid, port),
        })
    }
}

#[async_trait]
impl Acceptor for VsockAcceptor {
    async fn accept(&self) -> io::Result<(BoxedStream, String)> {
        let (stream, peer) = self.listener.lock().await.accept().await?;
        Ok((
            Box::new(stream),
            format!("vsock://{}:{}", peer.cid(), peer.port()),
        ))
    }

    fn local_description(&self) -> String {
        self.description.clone()
    }
}
