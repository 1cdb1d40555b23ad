// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Accept loop and per-connection request loops shared by the relay and the
//! enclave executor.
//!
//! Each accepted connection gets its own task; a transport or framing error
//! ends that connection only.

use futures::{SinkExt, StreamExt};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::codec::{Framed, FramedRead, FramedWrite};

use crate::errors::CodecError;
use crate::observability::messages::relay::{
    AcceptFailed, ConnectionAccepted, ConnectionClosed, ListenerStarted,
};
use crate::protocol::{
    ExecutionRequest, ExecutionResponse, JsonLinesCodec, CORRELATION_ID_HEADROOM,
};
use crate::traits::RequestHandler;
use crate::transport::{Acceptor, BoxedStream};

type ServerCodec = JsonLinesCodec<ExecutionRequest, ExecutionResponse>;

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// One request at a time, answered in order.
    Sequential,
    /// Requests carrying an `id` run concurrently, at most `max_in_flight` at
    /// once; requests without one are answered inline, in order.
    Concurrent { max_in_flight: usize },
}

/// Serves `handler` on every connection `acceptor` yields. Runs until the
/// task is dropped.
pub async fn serve(
    role: &'static str,
    acceptor: Box<dyn Acceptor>,
    handler: Arc<dyn RequestHandler>,
    mode: ConnectionMode,
    max_message_bytes: usize,
) {
    tracing::info!(
        "{}",
        ListenerStarted {
            role,
            address: &acceptor.local_description(),
        }
    );

    loop {
        let (stream, peer) = match acceptor.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!("{}", AcceptFailed { role, error: &e });
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        tracing::info!("{}", ConnectionAccepted { role, peer: &peer });
        let handler = handler.clone();
        tokio::spawn(async move {
            let mut served = 0u64;
            let outcome = match mode {
                ConnectionMode::Sequential => {
                    serve_sequential(stream, handler.as_ref(), max_message_bytes, &mut served)
                        .await
                }
                ConnectionMode::Concurrent { max_in_flight } => {
                    serve_concurrent(stream, handler, max_in_flight, max_message_bytes, &mut served)
                        .await
                }
            };

            match outcome {
                Ok(()) => tracing::info!(
                    "{}",
                    ConnectionClosed {
                        role,
                        peer: &peer,
                        requests: served,
                        reason: None,
                    }
                ),
                Err(e) => tracing::warn!(
                    "{}",
                    ConnectionClosed {
                        role,
                        peer: &peer,
                        requests: served,
                        reason: Some(&e),
                    }
                ),
            }
        });
    }
}

/// Decode one request, handle it, encode the response, repeat.
pub async fn serve_sequential(
    stream: BoxedStream,
    handler: &dyn RequestHandler,
    max_message_bytes: usize,
    served: &mut u64,
) -> Result<(), CodecError> {
    let mut framed = Framed::new(stream, ServerCodec::new(max_message_bytes));

    while let Some(frame) = framed.next().await {
        let req = frame?;
        let response = handler.handle(req).await;
        framed.send(response).await?;
        *served += 1;
    }

    Ok(())
}

/// Reads requests as they arrive and answers them through a single writer
/// task, so responses may leave in a different order than requests came in.
pub async fn serve_concurrent(
    stream: BoxedStream,
    handler: Arc<dyn RequestHandler>,
    max_in_flight: usize,
    max_message_bytes: usize,
    served: &mut u64,
) -> Result<(), CodecError> {
    let max_in_flight = max_in_flight.max(1);
    // Multiplexed peers tag every frame with an id on top of the payload.
    let frame_limit = max_message_bytes + CORRELATION_ID_HEADROOM;
    let (reader, writer) = tokio::io::split(stream);
    let mut requests = FramedRead::new(reader, ServerCodec::new(frame_limit));
    let mut responses = FramedWrite::new(writer, ServerCodec::new(frame_limit));

    let (tx, mut rx) = mpsc::channel::<ExecutionResponse>(max_in_flight);
    let writer_task = tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            responses.send(response).await?;
        }
        Ok::<(), CodecError>(())
    });

    let permits = Arc::new(Semaphore::new(max_in_flight));
    let read_outcome = async {
        while let Some(frame) = requests.next().await {
            let req = frame?;
            *served += 1;

            if req.id.is_none() {
                let response = handler.handle(req).await;
                if tx.send(response).await.is_err() {
                    break;
                }
                continue;
            }

            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let handler = handler.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let response = handler.handle(req).await;
                // The writer is gone only if the connection already failed.
                let _ = tx.send(response).await;
                drop(permit);
            });
        }
        Ok::<(), CodecError>(())
    }
    .await;

    // The writer drains once every in-flight task has sent its response.
    drop(tx);
    let write_outcome = match writer_task.await {
        Ok(outcome) => outcome,
        Err(e) => Err(CodecError::Io(io::Error::other(e))),
    };

    read_outcome.and(write_outcome)
}
