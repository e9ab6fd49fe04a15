//! Buffered wire I/O.
//!
//! [`BufStream`] presents a buffered, timeout-aware, binary-safe interface
//! over the injected transport. The read side is a single growable byte
//! buffer: reads append, extractions splice off the front. Literal payloads
//! are extracted by exact count and never scanned for line endings, so a
//! payload containing CRLFs or NULs cannot desynchronize the line framing.

use std::io::Write;
use std::time::Duration;

use bytes::{Buf, BytesMut};

use super::ImapTransport;
use crate::trace::{mask_login, NullTrace, TraceDirection, TraceSink};
use crate::{Error, Result};

/// Read chunk size.
const READ_CHUNK: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Buffered reader/writer over an [`ImapTransport`].
pub struct BufStream<S: ImapTransport> {
    stream: S,
    buf: BytesMut,
    timeout: Option<Duration>,
    trace: Box<dyn TraceSink>,
}

impl<S: ImapTransport> BufStream<S> {
    /// Creates a buffered stream with no timeout and no trace sink.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(READ_CHUNK),
            timeout: None,
            trace: Box::new(NullTrace),
        }
    }

    /// Configures the read timeout. `None` blocks indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    /// Installs a trace sink receiving the raw wire text.
    pub fn set_trace(&mut self, trace: Box<dyn TraceSink>) {
        self.trace = trace;
    }

    /// Reads one line, returning its bytes up to and excluding the CRLF.
    ///
    /// The CRLF is consumed; bytes past it stay buffered for the next call.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if no data arrives within the configured timeout,
    /// [`Error::Disconnected`] if the peer closes the stream, and a parse
    /// error if the line exceeds the sanity limit.
    pub fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = find_crlf(&self.buf[scanned..]) {
                let mut line = self.buf.split_to(scanned + pos + 2);
                line.truncate(scanned + pos);
                let line = line.to_vec();
                self.trace.trace(TraceDirection::Received, &line);
                return Ok(line);
            }

            if self.buf.len() > MAX_LINE_LENGTH {
                return Err(Error::parse(self.buf.len(), "line too long"));
            }

            // The CR of a split CRLF may sit at the buffer edge
            scanned = self.buf.len().saturating_sub(1);
            self.fill()?;
        }
    }

    /// Reads exactly `n` bytes, assembling from the buffer and additional
    /// stream reads.
    ///
    /// # Errors
    ///
    /// Same timeout and disconnect semantics as [`BufStream::read_line`].
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        while self.buf.len() < n {
            self.fill()?;
        }
        Ok(self.buf.split_to(n).to_vec())
    }

    /// Streams exactly `n` bytes from the buffer+stream into `sink` without
    /// accumulating them in memory.
    ///
    /// # Errors
    ///
    /// Read errors as in [`BufStream::read_exact`]; sink write errors are
    /// surfaced as I/O errors.
    pub fn copy_exact(&mut self, n: u64, sink: &mut dyn Write) -> Result<()> {
        let mut remaining = n;

        // Drain whatever is already buffered first
        let buffered = usize::try_from(remaining.min(self.buf.len() as u64))
            .unwrap_or(self.buf.len());
        if buffered > 0 {
            sink.write_all(&self.buf[..buffered])?;
            self.buf.advance(buffered);
            remaining -= buffered as u64;
        }

        let mut chunk = [0u8; READ_CHUNK];
        while remaining > 0 {
            let want = usize::try_from(remaining.min(READ_CHUNK as u64)).unwrap_or(READ_CHUNK);
            let got = self.read_stream(&mut chunk[..want])?;
            sink.write_all(&chunk[..got])?;
            remaining -= got as u64;
        }

        Ok(())
    }

    /// Writes all bytes, flushing immediately.
    ///
    /// The bytes are forwarded to the trace sink with the LOGIN password
    /// masked before emission.
    ///
    /// # Errors
    ///
    /// Returns an I/O error on write failure.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let masked = mask_login(bytes);
        self.trace.trace(TraceDirection::Sent, &masked);

        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Writes a literal payload, tracing a size marker instead of the bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error on write failure.
    pub fn write_literal(&mut self, bytes: &[u8]) -> Result<()> {
        let marker = format!("<{} bytes of literal data>", bytes.len());
        self.trace.trace(TraceDirection::Sent, marker.as_bytes());

        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Copies exactly `n` bytes from `source` to the stream, flushing at the
    /// end. Used for streamed literal arguments.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the source ends early or a write fails.
    pub fn copy_from<R: std::io::Read>(&mut self, source: &mut R, n: u64) -> Result<()> {
        let marker = format!("<{n} bytes of literal data>");
        self.trace.trace(TraceDirection::Sent, marker.as_bytes());

        let mut limited = std::io::Read::take(&mut *source, n);
        let copied = std::io::copy(&mut limited, &mut self.stream)?;
        if copied != n {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("literal source ended after {copied} of {n} bytes"),
            )));
        }
        self.stream.flush()?;
        Ok(())
    }

    /// Returns whether any bytes are available within `timeout`.
    ///
    /// A zero timeout polls without blocking. Data that arrives is buffered
    /// for the next read; it is never lost.
    ///
    /// # Errors
    ///
    /// [`Error::Disconnected`] if the peer has closed; other I/O errors are
    /// passed through.
    pub fn poll_readable(&mut self, timeout: Duration) -> Result<bool> {
        if !self.buf.is_empty() {
            return Ok(true);
        }

        self.stream.set_read_timeout(Some(timeout))?;
        let outcome = self.fill();
        // Restore the configured timeout before surfacing any error
        self.stream.set_read_timeout(self.timeout)?;

        match outcome {
            Ok(()) => Ok(true),
            Err(Error::Timeout) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Consumes the buffered stream and returns the inner transport.
    ///
    /// Any buffered unread data is discarded.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Appends one chunk from the stream to the buffer.
    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.read_stream(&mut chunk)?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(())
    }

    /// One raw read with timeout/disconnect mapping. Never returns zero.
    fn read_stream(&mut self, out: &mut [u8]) -> Result<usize> {
        match self.stream.read(out) {
            Ok(0) => Err(Error::Disconnected("peer closed the stream".into())),
            Ok(n) => Ok(n),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Err(Error::Timeout)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}
