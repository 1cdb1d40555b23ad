// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use futures::{SinkExt, StreamExt};
use tokio_util::codec::Framed;

use crate::errors::RelayError;
use crate::protocol::{ExecutionRequest, ExecutionResponse, JsonLinesCodec, DEFAULT_MAX_MESSAGE_BYTES};
use crate::transport::{BoxedStream, Connector, TcpConnector};

type ClientCodec = JsonLinesCodec<ExecutionResponse, ExecutionRequest>;

/// A client connection to the relay. One request at a time.
pub struct RelayClient {
    framed: Framed<BoxedStream, ClientCodec>,
}

impl RelayClient {
    pub async fn connect(address: &str) -> Result<Self, RelayError> {
        Self::connect_with(&TcpConnector::new(address)).await
    }

    pub async fn connect_with(connector: &dyn Connector) -> Result<Self, RelayError> {
        let stream = connector.connect().await?;
        Ok(Self::from_stream(stream, DEFAULT_MAX_MESSAGE_BYTES))
    }

    pub fn from_stream(stream: BoxedStream, max_message_bytes: usize) -> Self {
        Self {
            framed: Framed::new(stream, ClientCodec::new(max_message_bytes)),
        }
    }

    /// Sends `req` and waits for the matching response.
    pub async fn execute(&mut self, req: ExecutionRequest) -> Result<ExecutionResponse, RelayError> {
        self.framed.send(req).await?;
        match self.framed.next().await {
            Some(frame) => Ok(frame?),
            None => Err(RelayError::ConnectionClosed),
        }
    }
}
