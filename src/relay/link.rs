// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The relay's side of the enclave connection: connects lazily, shares one
//! multiplexed channel among all client connections and reconnects after the
//! channel is lost.

use async_trait::async_trait;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::RelayConfig;
use crate::errors::RelayError;
use crate::observability::messages::relay::{
    ChannelConnectFailed, ChannelConnected, ChannelConnecting,
};
use crate::protocol::{ExecutionRequest, ExecutionResponse};
use crate::relay::channel::EnclaveChannel;
use crate::traits::RequestHandler;
use crate::transport::Connector;

enum ChannelState {
    Disconnected,
    Connecting,
    Connected(Arc<EnclaveChannel>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Disconnected,
    Connecting,
    Connected,
}

pub struct EnclaveLink {
    connector: Box<dyn Connector>,
    state: Mutex<ChannelState>,
    /// Held for the whole connect attempt so only one caller dials at a time.
    connect_gate: tokio::sync::Mutex<()>,
    connect_timeout: Duration,
    request_timeout: Duration,
    max_message_bytes: usize,
}

impl EnclaveLink {
    pub fn new(
        connector: Box<dyn Connector>,
        connect_timeout: Duration,
        request_timeout: Duration,
        max_message_bytes: usize,
    ) -> Self {
        Self {
            connector,
            state: Mutex::new(ChannelState::Disconnected),
            connect_gate: tokio::sync::Mutex::new(()),
            connect_timeout,
            request_timeout,
            max_message_bytes,
        }
    }

    pub fn from_config(
        connector: Box<dyn Connector>,
        config: &RelayConfig,
        max_message_bytes: usize,
    ) -> Self {
        Self::new(
            connector,
            config.connect_timeout(),
            config.request_timeout(),
            max_message_bytes,
        )
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> LinkStatus {
        match &*self.state() {
            ChannelState::Disconnected => LinkStatus::Disconnected,
            ChannelState::Connecting => LinkStatus::Connecting,
            ChannelState::Connected(channel) if channel.is_open() => LinkStatus::Connected,
            ChannelState::Connected(_) => LinkStatus::Disconnected,
        }
    }

    /// The live channel, if any. A channel found closed is forgotten.
    fn current(&self) -> Option<Arc<EnclaveChannel>> {
        let mut state = self.state();
        match &*state {
            ChannelState::Connected(channel) if channel.is_open() => Some(channel.clone()),
            ChannelState::Connected(_) => {
                *state = ChannelState::Disconnected;
                None
            }
            _ => None,
        }
    }

    /// Returns the shared channel, dialing the enclave if there is none.
    pub async fn acquire(&self) -> Result<Arc<EnclaveChannel>, RelayError> {
        if let Some(channel) = self.current() {
            return Ok(channel);
        }

        let _gate = self.connect_gate.lock().await;
        // Another caller may have connected while we waited at the gate.
        if let Some(channel) = self.current() {
            return Ok(channel);
        }

        *self.state() = ChannelState::Connecting;
        let endpoint = self.connector.describe();
        tracing::info!("{}", ChannelConnecting { endpoint: &endpoint });

        let dialed = match tokio::time::timeout(self.connect_timeout, self.connector.connect()).await
        {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {:?}", self.connect_timeout),
            )),
        };

        match dialed {
            Ok(stream) => {
                let channel = Arc::new(EnclaveChannel::open(stream, self.max_message_bytes));
                *self.state() = ChannelState::Connected(channel.clone());
                tracing::info!("{}", ChannelConnected { endpoint: &endpoint });
                Ok(channel)
            }
            Err(e) => {
                *self.state() = ChannelState::Disconnected;
                tracing::warn!(
                    "{}",
                    ChannelConnectFailed {
                        endpoint: &endpoint,
                        error: &e,
                    }
                );
                Err(RelayError::EnclaveUnreachable(e))
            }
        }
    }

    /// Start-up connection attempt. Failure is logged and otherwise ignored.
    pub async fn warm_up(&self) {
        let _ = self.acquire().await;
    }

    /// Forwards `req` and restores the caller's own `id` on the response.
    pub async fn forward(&self, req: ExecutionRequest) -> Result<ExecutionResponse, RelayError> {
        let client_id = req.id;
        let channel = self.acquire().await?;
        let response = channel.round_trip(req, self.request_timeout).await?;
        Ok(response.with_id(client_id))
    }
}

#[async_trait]
impl RequestHandler for EnclaveLink {
    async fn handle(&self, req: ExecutionRequest) -> ExecutionResponse {
        let client_id = req.id;
        match self.forward(req).await {
            Ok(response) => response,
            Err(e @ RelayError::EnclaveUnreachable(_)) => {
                ExecutionResponse::failure(e.to_string()).with_id(client_id)
            }
            Err(e) => ExecutionResponse::failure(format!("enclave communication error: {}", e))
                .with_id(client_id),
        }
    }

    fn name(&self) -> &'static str {
        "enclave-link"
    }
}
