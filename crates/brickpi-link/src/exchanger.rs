//! Blocking request/response exchanges with bounded retries.

use std::collections::VecDeque;
use std::time::Instant;

use brickpi_frame::{
    command, FrameConfig, FrameError, FrameEvent, FrameReader, FrameWriter, Request, Response,
    BROADCAST_ADDRESS,
};
use brickpi_transport::SerialLink;
use bytes::Bytes;

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::pending::{ExchangeKey, PendingExchange, PendingTable};

/// Unsolicited reports kept before the oldest are dropped.
const MAX_UNSOLICITED: usize = 64;

/// Sends addressed commands and waits for the matching reply.
///
/// The link is half-duplex and replies are keyed only by the echoed command
/// byte, so one exchange runs at a time (`&mut self`). Every attempt clears
/// stale input and any partial frame before writing, so a late reply to an
/// abandoned attempt is never mistaken for the next one.
pub struct Exchanger<L> {
    reader: FrameReader<L>,
    writer: FrameWriter<L>,
    pending: PendingTable,
    unsolicited: VecDeque<LinkError>,
    config: LinkConfig,
}

impl<L: SerialLink> Exchanger<L> {
    /// Wrap a link with the default policy.
    pub fn new(link: L) -> Result<Self> {
        Self::with_config(link, LinkConfig::default())
    }

    /// Wrap a link with an explicit policy.
    pub fn with_config(link: L, config: LinkConfig) -> Result<Self> {
        let mut reader_link = link.try_clone_link()?;
        reader_link.set_read_timeout(config.poll_interval)?;

        let frame_config = FrameConfig {
            frame_timeout: config.frame_timeout,
            ..FrameConfig::default()
        };

        Ok(Self {
            reader: FrameReader::with_config(reader_link, frame_config.clone()),
            writer: FrameWriter::with_config(link, frame_config),
            pending: PendingTable::new(),
            unsolicited: VecDeque::new(),
            config,
        })
    }

    /// Send `command` with `data` to `address` and return the reply.
    ///
    /// Checksum faults, timeouts and link I/O failures are retried up to
    /// [`LinkConfig::max_attempts`] sends; after that the last cause is
    /// returned inside [`LinkError::RetriesExhausted`].
    pub fn send(&mut self, address: u8, command: u8, data: &[u8]) -> Result<Response> {
        let request = Request::new(address, command, Bytes::copy_from_slice(data));
        let key = self
            .pending
            .insert(PendingExchange::new(request, self.config.max_attempts))?;

        let result = self.drive(key);
        self.pending.remove(key);
        result
    }

    /// Send `command` to every controller without waiting for a reply.
    pub fn broadcast(&mut self, command: u8, data: &[u8]) -> Result<()> {
        let mut pending = PendingExchange::new(
            Request::new(BROADCAST_ADDRESS, command, Bytes::copy_from_slice(data)),
            self.config.max_attempts,
        );

        while let Some(attempt) = pending.begin_attempt() {
            tracing::debug!(command, attempt, "broadcasting");
            match self.write(pending.request()) {
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
    pub fn take_unsolicited(&mut self) -> Vec<LinkError> {
        self.unsolicited.drain(..).collect()
    }

    /// Current policy.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Borrow the write side of the link.
    pub fn link(&self) -> &L {
        self.writer.get_ref()
    }

    fn drive(&mut self, key: ExchangeKey) -> Result<Response> {
        loop {
            let next = self.pending.get_mut(key).map(|exchange| {
                exchange
                    .begin_attempt()
                    .map(|attempt| (exchange.request().clone(), attempt))
            });
            let (request, attempt) = match next {
                Some(Some(next)) => next,
                Some(None) | None => {
                    return Err(self
                        .pending
                        .remove(key)
                        .map(PendingExchange::into_exhausted)
                        .unwrap_or_else(|| {
                            LinkError::Precondition(format!(
                                "exchange for command {:#04x} to address {} is not registered",
                                key.1, key.0
                            ))
                        }))
                }
            };

            tracing::debug!(
                address = request.address,
                command = request.command,
                name = command::command_name(request.command),
                attempt,
                "sending request"
            );

            match self.attempt(key, &request) {
                Ok(response) => {
                    tracing::debug!(
                        address = request.address,
                        command = request.command,
                        attempt,
                        len = response.payload().len(),
                        "exchange complete"
                    );
                    return Ok(response);
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        address = request.address,
                        command = request.command,
                        attempt,
                        error = %err,
                        "attempt failed"
                    );
                    if let Some(exchange) = self.pending.get_mut(key) {
                        exchange.record_failure(err);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn attempt(&mut self, key: ExchangeKey, request: &Request) -> Result<Response> {
        self.reader.reset();
        self.write(request)?;

        let deadline = Instant::now() + self.config.response_timeout;
        loop {
            let event = match self.reader.read_event(deadline) {
                Ok(event) => event,
                Err(FrameError::ReadTimeout) => {
                    self.reader.reset();
                    return Err(LinkError::ReadTimeout(self.config.response_timeout));
                }
                Err(err) => return Err(read_error(err)),
            };

            if self.pending.route(&event) == Some(key) {
                return match event {
                    FrameEvent::Response(response) => Ok(response),
                    FrameEvent::Rejected { command, fault } => {
                        Err(LinkError::from_fault(command, fault))
                    }
                };
            }

            match event {
                // A keyless fault is most likely the reply we are waiting for.
                FrameEvent::Rejected {
                    command: None,
                    fault,
                } => return Err(LinkError::from_fault(Some(request.command), fault)),
                other => self.record_unsolicited(other),
            }
        }
    }

    fn write(&mut self, request: &Request) -> Result<()> {
        self.writer.clear_input().map_err(write_error)?;
        self.writer.write_request(request).map_err(write_error)
    }

    fn record_unsolicited(&mut self, event: FrameEvent) {
        record_unsolicited(&mut self.unsolicited, event);
    }
}

#[cfg(feature = "serial")]
impl Exchanger<brickpi_transport::SerialPortLink> {
    /// Open a serial port and wrap it.
    pub fn open(path: &str, baud_rate: u32, config: LinkConfig) -> Result<Self> {
        let link = brickpi_transport::SerialPortLink::open(path, baud_rate)?;
        Self::with_config(link, config)
    }
}

/// Queue a report for a frame no exchange was waiting for.
pub(crate) fn record_unsolicited(queue: &mut VecDeque<LinkError>, event: FrameEvent) {
    let report = match event {
        FrameEvent::Response(response) if !command::is_known(response.command()) => {
            LinkError::UnknownResponseCode(response.command())
        }
        FrameEvent::Response(response) => LinkError::UnexpectedResponse(response.command()),
        FrameEvent::Rejected { command, fault } => LinkError::StrayFault { command, fault },
    };
    tracing::warn!(error = %report, "unsolicited frame");

    if queue.len() == MAX_UNSOLICITED {
        queue.pop_front();
    }
    queue.push_back(report);
}

fn write_error(err: FrameError) -> LinkError {
    match err {
        FrameError::Io(io) => LinkError::TransportWrite(io),
        FrameError::Transport(brickpi_transport::TransportError::Io(io)) => {
            LinkError::TransportWrite(io)
        }
        FrameError::ConnectionClosed => LinkError::TransportWrite(std::io::Error::from(
            std::io::ErrorKind::WriteZero,
        )),
        other => LinkError::Frame(other),
    }
}

/// Link I/O failures while waiting for a reply are worth a resend.
pub(crate) fn read_error(err: FrameError) -> LinkError {
    match err {
        FrameError::Io(io) => LinkError::TransportRead(io),
        FrameError::Transport(brickpi_transport::TransportError::Io(io)) => {
            LinkError::TransportRead(io)
        }
        FrameError::ConnectionClosed => LinkError::TransportRead(std::io::Error::from(
            std::io::ErrorKind::UnexpectedEof,
        )),
        other => LinkError::Frame(other),
    }
}
