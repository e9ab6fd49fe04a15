//! Scripted in-memory transport for tests.
//!
//! The sync analogue of a mock I/O builder: queue up the bytes the "server"
//! will produce, run the session against it, then assert on what the client
//! wrote. Reads drain the script in order; an exhausted script reads as EOF
//! unless a [`MockStream::timeout`] step makes it read as a timed-out poll.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

use super::ImapTransport;

enum Step {
    /// Bytes the server sends.
    Data(Vec<u8>),
    /// One read fails with `WouldBlock`, as a timed-out socket read would.
    Timeout,
}

/// Scripted bidirectional stream.
#[derive(Default)]
pub struct MockStream {
    script: VecDeque<Step>,
    written: Vec<u8>,
    read_timeout: Option<Duration>,
}

impl MockStream {
    /// Creates an empty mock; reads hit EOF immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes for the client to read.
    #[must_use]
    pub fn read(mut self, bytes: &[u8]) -> Self {
        self.script.push_back(Step::Data(bytes.to_vec()));
        self
    }

    /// Queues one timed-out read.
    #[must_use]
    pub fn timeout(mut self) -> Self {
        self.script.push_back(Step::Timeout);
        self
    }

    /// Everything the client has written so far.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// The read timeout most recently configured by the session.
    #[must_use]
    pub const fn configured_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.script.front_mut() {
            None => Ok(0),
            Some(Step::Timeout) => {
                self.script.pop_front();
                Err(io::Error::new(io::ErrorKind::WouldBlock, "mock timeout"))
            }
            Some(Step::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                data.drain(..n);
                if data.is_empty() {
                    self.script.pop_front();
                }
                Ok(n)
            }
        }
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ImapTransport for MockStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }
}
