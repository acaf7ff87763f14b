//! In-flight exchanges keyed by (address, command).
//!
//! Replies carry no address and no request id, only the echoed command
//! byte, so at most one exchange per key may be outstanding.

use brickpi_frame::{FrameEvent, Request};

use crate::error::{LinkError, Result};

/// Identifies an exchange: destination address and command code.
pub type ExchangeKey = (u8, u8);

/// One request awaiting its reply, with its retry budget.
#[derive(Debug)]
pub struct PendingExchange {
    request: Request,
    attempts: u32,
    max_attempts: u32,
    last_error: Option<LinkError>,
}

impl PendingExchange {
    /// Track `request` with room for `max_attempts` sends (at least one).
    pub fn new(request: Request, max_attempts: u32) -> Self {
        Self {
            request,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            last_error: None,
        }
    }

    pub fn key(&self) -> ExchangeKey {
        (self.request.address, self.request.command)
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Sends made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Sends left before the exchange is exhausted.
    pub fn attempts_left(&self) -> u32 {
        self.max_attempts - self.attempts
    }

    /// Count another send. Returns its 1-based number, or `None` once the
    /// budget is spent.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.attempts)
    }

    /// Remember why the current attempt failed.
    pub fn record_failure(&mut self, error: LinkError) {
        self.last_error = Some(error);
    }

    /// True when `event` answers this exchange.
    pub fn matches(&self, event: &FrameEvent) -> bool {
        event.command() == Some(self.request.command)
    }

    /// The terminal error once every attempt has failed.
    pub fn into_exhausted(self) -> LinkError {
        let (address, command) = self.key();
        let last = self.last_error.unwrap_or_else(|| {
            LinkError::Precondition("exchange exhausted without a recorded failure".to_string())
        });
        LinkError::RetriesExhausted {
            address,
            command,
            attempts: self.attempts,
            last: Box::new(last),
        }
    }
}

/// Outstanding exchanges on one link.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: Vec<PendingExchange>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an exchange. Fails if its key is already outstanding.
    pub fn insert(&mut self, exchange: PendingExchange) -> Result<ExchangeKey> {
        let key = exchange.key();
        if self.get(key).is_some() {
            return Err(LinkError::Busy {
                address: key.0,
                command: key.1,
            });
        }
        self.entries.push(exchange);
        Ok(key)
    }

    pub fn get(&self, key: ExchangeKey) -> Option<&PendingExchange> {
        self.entries.iter().find(|entry| entry.key() == key)
    }

    pub fn get_mut(&mut self, key: ExchangeKey) -> Option<&mut PendingExchange> {
        self.entries.iter_mut().find(|entry| entry.key() == key)
    }

    pub fn remove(&mut self, key: ExchangeKey) -> Option<PendingExchange> {
        let index = self.entries.iter().position(|entry| entry.key() == key)?;
        Some(self.entries.remove(index))
    }

    /// The exchange an incoming event resolves, if any.
    pub fn route(&self, event: &FrameEvent) -> Option<ExchangeKey> {
        self.entries
            .iter()
            .find(|entry| entry.matches(event))
            .map(PendingExchange::key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
