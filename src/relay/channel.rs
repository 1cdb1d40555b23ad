// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One multiplexed connection to the enclave.
//!
//! Callers never touch the socket. Requests are queued to a single writer
//! task; a reader task routes each response to its caller by correlation id.
//! When either task stops, every waiting caller is failed and the channel
//! reports itself closed.

use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::errors::{CodecError, RelayError};
use crate::observability::messages::relay::{
    ChannelLost, OrphanResponse, RequestForwarded, RequestTimedOut,
};
use crate::protocol::{
    ExecutionRequest, ExecutionResponse, JsonLinesCodec, CORRELATION_ID_HEADROOM,
};
use crate::transport::BoxedStream;

type ChannelCodec = JsonLinesCodec<ExecutionResponse, ExecutionRequest>;
type Reply = oneshot::Sender<Result<ExecutionResponse, RelayError>>;

/// Requests queued ahead of the writer before callers start waiting.
const OUTBOUND_QUEUE: usize = 64;

struct PendingMap {
    open: bool,
    waiters: HashMap<u64, Reply>,
}

#[derive(Clone)]
struct Pending(Arc<Mutex<PendingMap>>);

impl Pending {
    fn lock(&self) -> MutexGuard<'_, PendingMap> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self, id: u64) -> Option<Reply> {
        self.lock().waiters.remove(&id)
    }

    /// Marks the channel closed and drops every waiter, which wakes each
    /// caller with `ChannelClosed`.
    fn fail_all(&self, side: &str, reason: &str) {
        let drained = {
            let mut map = self.lock();
            map.open = false;
            std::mem::take(&mut map.waiters)
        };
        tracing::warn!(
            "{}",
            ChannelLost {
                side,
                pending: drained.len(),
                reason,
            }
        );
    }
}

/// Removes its id from the pending map when the caller stops waiting,
/// whether it got a reply, timed out or was cancelled.
struct PendingSlot<'a> {
    pending: &'a Pending,
    id: u64,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.take(self.id);
    }
}

pub struct EnclaveChannel {
    outbound: mpsc::Sender<ExecutionRequest>,
    pending: Pending,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl EnclaveChannel {
    /// Takes ownership of `stream` and starts the reader and writer tasks.
    pub fn open(stream: BoxedStream, max_message_bytes: usize) -> Self {
        let frame_limit = max_message_bytes + CORRELATION_ID_HEADROOM;
        let (read_half, write_half) = tokio::io::split(stream);
        let pending = Pending(Arc::new(Mutex::new(PendingMap {
            open: true,
            waiters: HashMap::new(),
        })));
        let (outbound, queue) = mpsc::channel(OUTBOUND_QUEUE);

        let reader = tokio::spawn(read_loop(
            FramedRead::new(read_half, ChannelCodec::new(frame_limit)),
            pending.clone(),
        ));
        let writer = tokio::spawn(write_loop(
            FramedWrite::new(write_half, ChannelCodec::new(frame_limit)),
            queue,
            pending.clone(),
        ));

        Self {
            outbound,
            pending,
            next_id: AtomicU64::new(1),
            reader,
            writer,
        }
    }

    pub fn is_open(&self) -> bool {
        self.pending.lock().open && !self.reader.is_finished() && !self.writer.is_finished()
    }

    /// Number of requests currently awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().waiters.len()
    }

    /// Sends `req` under a fresh channel-local id and waits up to `timeout`
    /// for its response. Whatever `id` the request carried is overwritten.
    pub async fn round_trip(
        &self,
        mut req: ExecutionRequest,
        timeout: Duration,
    ) -> Result<ExecutionResponse, RelayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, response) = oneshot::channel();
        {
            let mut map = self.pending.lock();
            if !map.open {
                return Err(RelayError::ChannelClosed);
            }
            map.waiters.insert(id, reply);
        }
        let _slot = PendingSlot {
            pending: &self.pending,
            id,
        };

        tracing::debug!(
            "{}",
            RequestForwarded {
                id,
                function: &req.function,
                code_len: req.code.len(),
            }
        );
        req.id = Some(id);

        let exchange = async {
            self.outbound
                .send(req)
                .await
                .map_err(|_| RelayError::ChannelClosed)?;
            response.await.map_err(|_| RelayError::ChannelClosed)?
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!("{}", RequestTimedOut { id, timeout });
                Err(RelayError::Timeout(timeout))
            }
        }
    }
}

impl Drop for EnclaveChannel {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

async fn read_loop(
    mut responses: FramedRead<ReadHalf<BoxedStream>, ChannelCodec>,
    pending: Pending,
) {
    let reason = loop {
        match responses.next().await {
            Some(Ok(response)) => {
                let waiter = response.id.and_then(|id| pending.take(id));
                match waiter {
                    // The caller may have given up in the meantime.
                    Some(reply) => {
                        let _ = reply.send(Ok(response));
                    }
                    None => tracing::warn!("{}", OrphanResponse { id: response.id }),
                }
            }
            Some(Err(e)) => break e.to_string(),
            None => break "enclave closed the connection".to_string(),
        }
    };
    pending.fail_all("reader", &reason);
}

async fn write_loop(
    mut sink: FramedWrite<WriteHalf<BoxedStream>, ChannelCodec>,
    mut queue: mpsc::Receiver<ExecutionRequest>,
    pending: Pending,
) {
    while let Some(req) = queue.recv().await {
        let id = req.id;
        match sink.send(req).await {
            Ok(()) => {}
            // Rejected before any byte was written; only this request fails.
            Err(e @ CodecError::FrameTooLarge(_)) => {
                if let Some(reply) = id.and_then(|id| pending.take(id)) {
                    let _ = reply.send(Err(RelayError::Codec(e)));
                }
            }
            Err(e) => {
                pending.fail_all("writer", &e.to_string());
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    fn channel() -> (EnclaveChannel, DuplexStream) {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        (EnclaveChannel::open(Box::new(local), 4096), remote)
    }

    type RemoteLines = tokio::io::Lines<BufReader<ReadHalf<DuplexStream>>>;

    async fn read_request(lines: &mut RemoteLines) -> ExecutionRequest {
        let line = lines.next_line().await.unwrap().expect("request line");
        serde_json::from_str(&line).unwrap()
    }

    async fn write_response(out: &mut WriteHalf<DuplexStream>, response: ExecutionResponse) {
        let mut line = serde_json::to_string(&response).unwrap();
        line.push('\n');
        out.write_all(line.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn test_round_trip_rewrites_id() {
        let (channel, remote) = channel();
        let (read_half, mut write_half) = tokio::io::split(remote);
        let mut lines = BufReader::new(read_half).lines();

        let enclave = tokio::spawn(async move {
            let req = read_request(&mut lines).await;
            assert_ne!(req.id, Some(999));
            write_response(&mut write_half, ExecutionResponse::success(7).with_id(req.id)).await;
            (lines, write_half)
        });

        let req = ExecutionRequest::new("(module)", "f", vec![]).with_id(999);
        let response = channel.round_trip(req, Duration::from_secs(5)).await.unwrap();
        assert_eq!(response.result, 7);
        assert_eq!(channel.in_flight(), 0);
        let _ = enclave.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_releases_slot_and_late_reply_is_dropped() {
        let (channel, remote) = channel();
        let (read_half, mut write_half) = tokio::io::split(remote);
        let mut lines = BufReader::new(read_half).lines();

        let req = ExecutionRequest::new("(module)", "f", vec![]);
        let error = channel
            .round_trip(req, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(error, RelayError::Timeout(_)));
        assert_eq!(channel.in_flight(), 0);

        // Answer the abandoned request; the channel must stay usable.
        let stale = read_request(&mut lines).await;
        write_response(&mut write_half, ExecutionResponse::success(1).with_id(stale.id)).await;

        let enclave = tokio::spawn(async move {
            let req = read_request(&mut lines).await;
            write_response(&mut write_half, ExecutionResponse::success(2).with_id(req.id)).await;
            (lines, write_half)
        });
        let req = ExecutionRequest::new("(module)", "f", vec![]);
        let response = channel.round_trip(req, Duration::from_secs(5)).await.unwrap();
        assert_eq!(response.result, 2);
        assert!(channel.is_open());
        let _ = enclave.await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_fails_waiters_and_closes_channel() {
        let (channel, remote) = channel();
        let (read_half, write_half) = tokio::io::split(remote);
        let mut lines = BufReader::new(read_half).lines();

        let enclave = tokio::spawn(async move {
            let _ = read_request(&mut lines).await;
            drop(write_half);
            drop(lines);
        });

        let req = ExecutionRequest::new("(module)", "f", vec![]);
        let error = channel
            .round_trip(req, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(error, RelayError::ChannelClosed));
        enclave.await.unwrap();

        assert!(!channel.is_open());
        let req = ExecutionRequest::new("(module)", "f", vec![]);
        assert!(matches!(
            channel.round_trip(req, Duration::from_secs(1)).await,
            Err(RelayError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_request_at_limit_fits_after_id_is_added() {
        let (channel, remote) = channel();
        let (read_half, mut write_half) = tokio::io::split(remote);
        let mut lines = BufReader::new(read_half).lines();

        let mut req = ExecutionRequest::new("", "f", vec![]);
        let base = serde_json::to_string(&req).unwrap().len();
        req.code = "x".repeat(4096 - base);
        assert_eq!(serde_json::to_string(&req).unwrap().len(), 4096);

        let enclave = tokio::spawn(async move {
            let forwarded = read_request(&mut lines).await;
            assert_eq!(forwarded.code.len(), 4096 - base);
            write_response(&mut write_half, ExecutionResponse::success(9).with_id(forwarded.id))
                .await;
            (lines, write_half)
        });

        let response = channel.round_trip(req, Duration::from_secs(5)).await.unwrap();
        assert_eq!(response.result, 9);
        let _ = enclave.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_request_fails_alone() {
        let (channel, remote) = channel();
        let (read_half, mut write_half) = tokio::io::split(remote);
        let mut lines = BufReader::new(read_half).lines();

        let huge = ExecutionRequest::new("x".repeat(8192), "f", vec![]);
        let error = channel
            .round_trip(huge, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(error, RelayError::Codec(_)));

        let enclave = tokio::spawn(async move {
            let req = read_request(&mut lines).await;
            write_response(&mut write_half, ExecutionResponse::success(3).with_id(req.id)).await;
            (lines, write_half)
        });
        let req = ExecutionRequest::new("(module)", "f", vec![]);
        let response = channel.round_trip(req, Duration::from_secs(5)).await.unwrap();
        assert_eq!(response.result, 3);
        let _ = enclave.await.unwrap();
    }
}
