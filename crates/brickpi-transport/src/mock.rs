//! Scripted in-memory link.
//!
//! Every write is handed to a responder which decides what the "board"
//! sends back. Clones share state, so a test can keep one handle for
//! inspection after moving another into the driver.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::Result;
use crate::traits::SerialLink;

/// What the mock board does in response to one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Queue these chunks for the reader; each chunk is one `read`.
    Chunks(Vec<Vec<u8>>),
    /// Accept the write and send nothing back.
    Silence,
    /// Fail the write with this error kind.
    WriteFailure(io::ErrorKind),
    /// Accept the write, then fail the next read with this error kind.
    ReadFailure(io::ErrorKind),
}

impl Reply {
    /// Reply with a single chunk.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Chunks(vec![bytes.into()])
    }

    /// Reply with the bytes delivered one per read.
    pub fn trickle(bytes: &[u8]) -> Self {
        Self::Chunks(bytes.iter().map(|b| vec![*b]).collect())
    }
}

type Responder = Box<dyn FnMut(&[u8]) -> Reply + Send>;

struct State {
    responder: Responder,
    inbound: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    clears: usize,
    read_failure: Option<io::ErrorKind>,
    read_timeout: Duration,
}

/// In-memory [`SerialLink`] driven by a responder closure.
#[derive(Clone)]
pub struct MockLink {
    state: Arc<Mutex<State>>,
}

impl MockLink {
    /// Create a link whose replies are computed from each written frame.
    pub fn new(responder: impl FnMut(&[u8]) -> Reply + Send + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                responder: Box::new(responder),
                inbound: VecDeque::new(),
                written: Vec::new(),
                clears: 0,
                read_failure: None,
                read_timeout: Duration::from_millis(1),
            })),
        }
    }

    /// Create a link that answers writes with `replies` in order, then goes quiet.
    pub fn scripted(replies: impl IntoIterator<Item = Reply>) -> Self {
        let mut replies: VecDeque<Reply> = replies.into_iter().collect();
        Self::new(move |_| replies.pop_front().unwrap_or(Reply::Silence))
    }

    /// Create a link that never answers.
    pub fn silent() -> Self {
        Self::new(|_| Reply::Silence)
    }

    /// Queue bytes for the reader without a preceding write.
    pub fn inject(&self, chunk: impl Into<Vec<u8>>) {
        let chunk = chunk.into();
        if !chunk.is_empty() {
            self.lock().inbound.push_back(chunk);
        }
    }

    /// Every write attempt so far, including failed ones.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.clone()
    }

    /// Number of times the receive buffer was cleared.
    pub fn clear_count(&self) -> usize {
        self.lock().clears
    }

    /// Bytes queued for the reader and not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.lock().inbound.iter().map(Vec::len).sum()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for MockLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MockLink")
            .field("written", &state.written.len())
            .field("inbound", &state.inbound.len())
            .field("clears", &state.clears)
            .finish()
    }
}

impl Read for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let wait = {
            let mut state = self.lock();
            if let Some(kind) = state.read_failure.take() {
                return Err(io::Error::from(kind));
            }
            if let Some(mut chunk) = state.inbound.pop_front() {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    let rest = chunk.split_off(n);
                    state.inbound.push_front(rest);
                }
                return Ok(n);
            }
            state.read_timeout
        };

        std::thread::sleep(wait.min(Duration::from_millis(1)));
        Err(io::Error::from(io::ErrorKind::TimedOut))
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        state.written.push(buf.to_vec());

        let reply = (state.responder)(buf);
        match reply {
            Reply::Chunks(chunks) => {
                state
                    .inbound
                    .extend(chunks.into_iter().filter(|chunk| !chunk.is_empty()));
                Ok(buf.len())
            }
            Reply::Silence => Ok(buf.len()),
            Reply::WriteFailure(kind) => Err(io::Error::from(kind)),
            Reply::ReadFailure(kind) => {
                state.read_failure = Some(kind);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialLink for MockLink {
    fn clear_input(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.inbound.clear();
        state.clears += 1;
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.lock().read_timeout = timeout;
        Ok(())
    }

    fn try_clone_link(&self) -> Result<Self> {
        Ok(self.clone())
    }
}
