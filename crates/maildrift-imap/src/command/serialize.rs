//! Command serialization and the continuation handshake.
//!
//! Emits `<tag> <verb> <arg> …` CRLF, interleaving `{N}` announcements and
//! `+` continuation waits for literal arguments. Auto arguments are
//! classified here: NUL/CR/LF force a literal; metacharacters, whitespace,
//! or emptiness force quoting — except pre-formed parenthesized lists,
//! which pass verbatim.

use std::io::{Seek, SeekFrom};

use super::{Argument, Command};
use crate::connection::{BufStream, ImapTransport};
use crate::{Error, Result};

/// Sends one complete command, handshaking literals as needed.
///
/// On a missing `+` continuation the command is aborted with a parse error;
/// the connection is left mid-command and the caller should discard the
/// session.
pub(crate) fn send_command<S: ImapTransport>(
    stream: &mut BufStream<S>,
    tag: &str,
    command: &mut Command,
) -> Result<()> {
    let mut line: Vec<u8> = Vec::with_capacity(128);
    line.extend_from_slice(tag.as_bytes());
    line.push(b' ');
    line.extend_from_slice(command.verb().as_bytes());

    for arg in command.args_mut() {
        line.push(b' ');
        match arg {
            Argument::Auto(value) => {
                let bytes = value.as_bytes();
                if needs_literal(bytes) {
                    send_literal_header(stream, &mut line, bytes.len() as u64)?;
                    stream.write_literal(bytes)?;
                } else if needs_quoting(bytes) {
                    push_quoted(&mut line, bytes);
                } else {
                    line.extend_from_slice(bytes);
                }
            }
            Argument::Quoted(value) => push_quoted(&mut line, value.as_bytes()),
            Argument::Unquoted(value) => line.extend_from_slice(value.as_bytes()),
            Argument::Literal(bytes) => {
                send_literal_header(stream, &mut line, bytes.len() as u64)?;
                stream.write_literal(bytes)?;
            }
            Argument::Stream(source) => {
                let size = source.seek(SeekFrom::End(0))?;
                source.seek(SeekFrom::Start(0))?;
                send_literal_header(stream, &mut line, size)?;
                stream.copy_from(source, size)?;
            }
        }
    }

    line.extend_from_slice(b"\r\n");
    stream.write_all(&line)
}

/// Flushes the pending line with a `{N}` announcement and waits for the
/// server's go-ahead.
fn send_literal_header<S: ImapTransport>(
    stream: &mut BufStream<S>,
    line: &mut Vec<u8>,
    size: u64,
) -> Result<()> {
    line.extend_from_slice(format!("{{{size}}}\r\n").as_bytes());
    stream.write_all(line)?;
    line.clear();

    let reply = stream.read_line()?;
    if reply.first() != Some(&b'+') {
        return Err(Error::parse(
            0,
            format!(
                "expected continuation, got: {}",
                String::from_utf8_lossy(&reply)
            ),
        ));
    }
    Ok(())
}

/// True when the bytes can only travel as a literal.
fn needs_literal(bytes: &[u8]) -> bool {
    bytes.iter().any(|&b| matches!(b, 0 | b'\r' | b'\n'))
}

/// True when the bytes need the protection of a quoted string. Pre-formed
/// parenthesized lists are exempt.
fn needs_quoting(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return true;
    }
    if bytes[0] == b'(' {
        return false;
    }
    bytes.iter().any(|&b| {
        matches!(b, b' ' | b'\t' | b'{' | b'}' | b'%' | b'*' | b'"' | b'(' | b')')
            || b < 0x20
            || b == 0x7f
    })
}

/// Appends the quoted form, escaping `\` and `"`.
fn push_quoted(line: &mut Vec<u8>, bytes: &[u8]) {
    line.push(b'"');
    for &b in bytes {
        if b == b'"' || b == b'\\' {
            line.push(b'\\');
        }
        line.push(b);
    }
    line.push(b'"');
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::mock::MockStream;

    fn send(mock: MockStream, mut command: Command) -> Result<Vec<u8>> {
        let mut stream = BufStream::new(mock);
        send_command(&mut stream, "7", &mut command)?;
        Ok(stream.into_inner().written().to_vec())
    }

    #[test]
    fn test_plain_atoms_verbatim() {
        let wire = send(MockStream::new(), Command::new("SELECT").arg("Sent")).unwrap();
        assert_eq!(wire, b"7 SELECT Sent\r\n");
    }

    #[test]
    fn test_spaces_force_quoting() {
        let wire = send(MockStream::new(), Command::new("SELECT").arg("My Mail")).unwrap();
        assert_eq!(wire, b"7 SELECT \"My Mail\"\r\n");
    }

    #[test]
    fn test_empty_arg_quoted() {
        let wire = send(MockStream::new(), Command::new("LIST").arg("").arg("*")).unwrap();
        assert_eq!(wire, b"7 LIST \"\" *\r\n");
    }

    #[test]
    fn test_quote_escaping() {
        let wire = send(
            MockStream::new(),
            Command::new("CREATE").arg("a\"b\\c d"),
        )
        .unwrap();
        assert_eq!(wire, b"7 CREATE \"a\\\"b\\\\c d\"\r\n");
    }

    #[test]
    fn test_preformed_list_not_quoted() {
        let wire = send(
            MockStream::new(),
            Command::new("FETCH").raw("1:*").arg("(FLAGS UID)"),
        )
        .unwrap();
        assert_eq!(wire, b"7 FETCH 1:* (FLAGS UID)\r\n");
    }

    #[test]
    fn test_wildcard_range_never_quoted() {
        let wire = send(MockStream::new(), Command::new("FETCH").raw("1:*").arg("FLAGS")).unwrap();
        assert_eq!(wire, b"7 FETCH 1:* FLAGS\r\n");
    }

    #[test]
    fn test_forced_quote() {
        let wire = send(
            MockStream::new(),
            Command::new("LOGIN").arg("alice").quoted("hunter2"),
        )
        .unwrap();
        assert_eq!(wire, b"7 LOGIN alice \"hunter2\"\r\n");
    }

    #[test]
    fn test_crlf_forces_literal() {
        let mock = MockStream::new().read(b"+ go ahead\r\n");
        let wire = send(mock, Command::new("APPEND").arg("INBOX").arg("line1\r\nline2")).unwrap();
        assert_eq!(wire, b"7 APPEND INBOX {12}\r\nline1\r\nline2\r\n");
    }

    #[test]
    fn test_append_literal_handshake() {
        // Scenario: APPEND with a 17-byte message
        let mock = MockStream::new().read(b"+ Ready\r\n");
        let wire = send(
            mock,
            Command::new("APPEND")
                .quoted("INBOX")
                .literal(b"From: x\r\n\r\nhello!".to_vec()),
        )
        .unwrap();

        let mut expected = b"7 APPEND \"INBOX\" {17}\r\n".to_vec();
        expected.extend_from_slice(b"From: x\r\n\r\nhello!");
        expected.extend_from_slice(b"\r\n");
        assert_eq!(wire, expected);
    }

    #[test]
    fn test_missing_continuation_is_parse_error() {
        let mock = MockStream::new().read(b"7 NO try later\r\n");
        let result = send(
            mock,
            Command::new("APPEND").quoted("INBOX").literal(b"x".to_vec()),
        );
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[test]
    fn test_literal_mid_command_resumes_line() {
        // LOGIN with a literal user: the password continues after the payload
        let mock = MockStream::new().read(b"+ ok\r\n");
        let wire = send(
            mock,
            Command::new("LOGIN").literal(b"alice".to_vec()).quoted("pw"),
        )
        .unwrap();
        assert_eq!(wire, b"7 LOGIN {5}\r\nalice \"pw\"\r\n");
    }

    #[test]
    fn test_streamed_literal_sized_by_seek() {
        let mock = MockStream::new().read(b"+ ok\r\n");
        let source = std::io::Cursor::new(b"0123456789".to_vec());
        let wire = send(
            mock,
            Command::new("APPEND").quoted("INBOX").stream(Box::new(source)),
        )
        .unwrap();

        let mut expected = b"7 APPEND \"INBOX\" {10}\r\n".to_vec();
        expected.extend_from_slice(b"0123456789");
        expected.extend_from_slice(b"\r\n");
        assert_eq!(wire, expected);
    }
}
