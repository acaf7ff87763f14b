//! Async request/response exchanges over any tokio byte stream.
//!
//! Same policy as [`Exchanger`](crate::Exchanger): one exchange at a time,
//! stale input dropped before every send, bounded retries. Concurrent callers
//! queue on an internal mutex instead of `&mut self`.

use std::collections::VecDeque;
use std::pin::Pin;

use brickpi_frame::{
    command, encode_request, FrameError, FrameEvent, LinkCodec, Request, Response,
    BROADCAST_ADDRESS,
};
use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::FramedRead;

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::exchanger::{read_error, record_unsolicited};
use crate::pending::PendingExchange;

struct Inner<R, W> {
    reader: FramedRead<R, LinkCodec>,
    writer: W,
    unsolicited: VecDeque<LinkError>,
}

/// Async counterpart of [`Exchanger`](crate::Exchanger).
pub struct AsyncExchanger<R, W> {
    inner: Mutex<Inner<R, W>>,
    config: LinkConfig,
}

impl<R, W> AsyncExchanger<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, config: LinkConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                reader: FramedRead::new(reader, LinkCodec::new(config.frame_timeout)),
                writer,
                unsolicited: VecDeque::new(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Send `command` with `data` to `address` and await the reply.
    pub async fn send(&self, address: u8, command: u8, data: &[u8]) -> Result<Response> {
        let mut inner = self.inner.lock().await;
        let mut pending = PendingExchange::new(
            Request::new(address, command, Bytes::copy_from_slice(data)),
            self.config.max_attempts,
        );

        while let Some(attempt) = pending.begin_attempt() {
            tracing::debug!(
                address,
                command,
                name = command::command_name(command),
                attempt,
                "sending request"
            );
            match inner.attempt(pending.request(), &self.config).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() => {
                    tracing::warn!(address, command, attempt, error = %err, "attempt failed");
                    pending.record_failure(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(pending.into_exhausted())
    }

    /// Send `command` to every controller without waiting for a reply.
    pub async fn broadcast(&self, command: u8, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let mut pending = PendingExchange::new(
            Request::new(BROADCAST_ADDRESS, command, Bytes::copy_from_slice(data)),
            self.config.max_attempts,
        );

        while let Some(attempt) = pending.begin_attempt() {
            match inner.write(pending.request()).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() => {
                    tracing::warn!(command, attempt, error = %err, "broadcast write failed");
                    pending.record_failure(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(pending.into_exhausted())
    }

    /// Drain the reports of frames that no exchange was waiting for.
    pub async fn take_unsolicited(&self) -> Vec<LinkError> {
        self.inner.lock().await.unsolicited.drain(..).collect()
    }
}

impl<R, W> Inner<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn attempt(&mut self, request: &Request, config: &LinkConfig) -> Result<Response> {
        self.reader.read_buffer_mut().clear();
        self.reader.decoder_mut().reset();
        self.write(request).await?;

        let deadline = tokio::time::Instant::now() + config.response_timeout;
        loop {
            let event = match tokio::time::timeout_at(deadline, self.next_event()).await {
                Err(_) => {
                    self.reader.decoder_mut().reset();
                    return Err(LinkError::ReadTimeout(config.response_timeout));
                }
                Ok(None) => return Err(read_error(FrameError::ConnectionClosed)),
                Ok(Some(Err(err))) => return Err(read_error(err)),
                Ok(Some(Ok(event))) => event,
            };

            if event.command() == Some(request.command) {
                return match event {
                    FrameEvent::Response(response) => Ok(response),
                    FrameEvent::Rejected { command, fault } => {
                        Err(LinkError::from_fault(command, fault))
                    }
                };
            }

            match event {
                FrameEvent::Rejected {
                    command: None,
                    fault,
                } => return Err(LinkError::from_fault(Some(request.command), fault)),
                other => record_unsolicited(&mut self.unsolicited, other),
            }
        }
    }

    async fn write(&mut self, request: &Request) -> Result<()> {
        let mut buf = BytesMut::with_capacity(request.wire_size());
        encode_request(request.address, request.command, &request.data, &mut buf)?;
        self.writer
            .write_all(&buf)
            .await
            .map_err(LinkError::TransportWrite)?;
        self.writer.flush().await.map_err(LinkError::TransportWrite)
    }

    async fn next_event(&mut self) -> Option<std::result::Result<FrameEvent, FrameError>> {
        std::future::poll_fn(|cx| Pin::new(&mut self.reader).poll_next(cx)).await
    }
}
