//! Protocol trace sinks.
//!
//! A session owns one [`TraceSink`] and feeds it the raw wire text: every
//! client line (after password masking) and every server line. Adapters are
//! provided for the common destinations; anything else can implement the
//! trait directly.
//!
//! Masking happens at the sink's input: [`mask_login`] rewrites the password
//! argument of a LOGIN line before the bytes reach any concrete sink, so no
//! adapter can leak it.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Direction of a traced chunk of wire text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceDirection {
    /// Bytes written by the client.
    Sent,
    /// Bytes read from the server.
    Received,
}

impl TraceDirection {
    /// Conventional transcript prefix for this direction.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Sent => "C: ",
            Self::Received => "S: ",
        }
    }
}

/// Destination for protocol traces.
pub trait TraceSink: Send {
    /// Receives one chunk of wire text. Client-bound chunks arrive with the
    /// LOGIN password already masked.
    fn trace(&mut self, direction: TraceDirection, bytes: &[u8]);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn trace(&mut self, _direction: TraceDirection, _bytes: &[u8]) {}
}

/// Sink that writes transcript lines to any [`Write`] destination.
pub struct WriterTrace<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterTrace<W> {
    /// Creates a sink around the given writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> TraceSink for WriterTrace<W> {
    fn trace(&mut self, direction: TraceDirection, bytes: &[u8]) {
        let _ = self.writer.write_all(direction.prefix().as_bytes());
        let _ = self.writer.write_all(bytes);
        if !bytes.ends_with(b"\n") {
            let _ = self.writer.write_all(b"\r\n");
        }
    }
}

/// Sink that invokes a callback per traced chunk.
pub struct CallbackTrace<F: FnMut(TraceDirection, &[u8]) + Send> {
    callback: F,
}

impl<F: FnMut(TraceDirection, &[u8]) + Send> CallbackTrace<F> {
    /// Creates a sink around the given callback.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: FnMut(TraceDirection, &[u8]) + Send> TraceSink for CallbackTrace<F> {
    fn trace(&mut self, direction: TraceDirection, bytes: &[u8]) {
        (self.callback)(direction, bytes);
    }
}

/// Sink that appends transcript lines to a shared in-memory buffer.
///
/// Clone the handle before installing the sink to read the transcript later.
#[derive(Debug, Default, Clone)]
pub struct BufferTrace {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl BufferTrace {
    /// Creates an empty buffer sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the shared transcript buffer.
    #[must_use]
    pub fn handle(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.buffer)
    }

    /// Returns the transcript accumulated so far.
    ///
    /// # Panics
    ///
    /// Panics if the buffer lock is poisoned.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().unwrap().clone()
    }
}

impl TraceSink for BufferTrace {
    fn trace(&mut self, direction: TraceDirection, bytes: &[u8]) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.extend_from_slice(direction.prefix().as_bytes());
            buf.extend_from_slice(bytes);
            if !bytes.ends_with(b"\n") {
                buf.extend_from_slice(b"\r\n");
            }
        }
    }
}

/// Sink that writes transcript lines to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrTrace;

impl TraceSink for StderrTrace {
    fn trace(&mut self, direction: TraceDirection, bytes: &[u8]) {
        let stderr = std::io::stderr();
        let mut lock = stderr.lock();
        let _ = lock.write_all(direction.prefix().as_bytes());
        let _ = lock.write_all(bytes);
        if !bytes.ends_with(b"\n") {
            let _ = lock.write_all(b"\r\n");
        }
    }
}

/// Replaces the password argument of a `<tag> LOGIN <user> <password>` line
/// with `"********"`. Non-LOGIN lines are returned unchanged.
#[must_use]
pub fn mask_login(line: &[u8]) -> Vec<u8> {
    let Some(login_end) = find_login_keyword(line) else {
        return line.to_vec();
    };

    // Skip the user argument: a quoted string, a literal announcement, or a
    // bare atom. Everything after it is secret.
    let rest = &line[login_end..];
    let Some(user_len) = skip_argument(rest) else {
        return line.to_vec();
    };

    let secret_start = login_end + user_len;
    if secret_start >= line.len() {
        return line.to_vec();
    }

    let mut masked = line[..secret_start].to_vec();
    if !masked.ends_with(b" ") {
        masked.push(b' ');
    }
    masked.extend_from_slice(b"\"********\"");
    if line.ends_with(b"\r\n") {
        masked.extend_from_slice(b"\r\n");
    }
    masked
}

/// Returns the offset just past `<tag> LOGIN ` when the line is a LOGIN
/// command, or None.
fn find_login_keyword(line: &[u8]) -> Option<usize> {
    let first_space = line.iter().position(|&b| b == b' ')?;
    let after_tag = &line[first_space + 1..];
    let keyword_len = "LOGIN ".len();
    if after_tag.len() >= keyword_len
        && after_tag[..keyword_len].eq_ignore_ascii_case(b"LOGIN ")
    {
        Some(first_space + 1 + keyword_len)
    } else {
        None
    }
}

/// Returns the byte length of the leading argument plus one trailing space,
/// or None if the argument runs to end of line.
fn skip_argument(bytes: &[u8]) -> Option<usize> {
    if bytes.first() == Some(&b'"') {
        let mut i = 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => {
                    let end = i + 1;
                    return Some(if bytes.get(end) == Some(&b' ') {
                        end + 1
                    } else {
                        end
                    });
                }
                _ => i += 1,
            }
        }
        None
    } else {
        bytes.iter().position(|&b| b == b' ').map(|p| p + 1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_login_bare_args() {
        let masked = mask_login(b"7 LOGIN alice secret\r\n");
        assert_eq!(masked, b"7 LOGIN alice \"********\"\r\n");
    }

    #[test]
    fn test_mask_login_quoted_password() {
        let masked = mask_login(b"12 LOGIN alice \"p a\\\"ss\"\r\n");
        assert_eq!(masked, b"12 LOGIN alice \"********\"\r\n");
    }

    #[test]
    fn test_mask_login_quoted_user() {
        let masked = mask_login(b"3 LOGIN \"al ice\" hunter2\r\n");
        assert_eq!(masked, b"3 LOGIN \"al ice\" \"********\"\r\n");
    }

    #[test]
    fn test_mask_non_login_untouched() {
        let line = b"4 SELECT \"INBOX\"\r\n";
        assert_eq!(mask_login(line), line);
    }

    #[test]
    fn test_mask_login_case_insensitive() {
        let masked = mask_login(b"5 login bob pw\r\n");
        assert_eq!(masked, b"5 login bob \"********\"\r\n");
    }

    #[test]
    fn test_buffer_trace_collects() {
        let mut sink = BufferTrace::new();
        sink.trace(TraceDirection::Sent, b"1 NOOP\r\n");
        sink.trace(TraceDirection::Received, b"1 OK done\r\n");
        let text = String::from_utf8(sink.contents()).unwrap();
        assert_eq!(text, "C: 1 NOOP\r\nS: 1 OK done\r\n");
    }
}
