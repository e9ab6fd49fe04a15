//! Streaming tokenizer over the buffered wire.
//!
//! Produces [`Atom`]s from the current response line, fetching additional
//! lines from the stream when a literal continuation requires it. The
//! current line is held as a position-indexed cursor; literal payloads are
//! consumed by exact byte count through the buffer layer and never scanned
//! for line endings.

use std::io::Write;

use super::atom::Atom;
use crate::connection::{BufStream, ImapTransport};
use crate::{Error, Result};

/// Nesting bound for parenthesized lists. Real BODYSTRUCTUREs stay in the
/// single digits; anything near this is hostile input.
const MAX_LIST_DEPTH: usize = 128;

/// Maximum literal size accepted in a response.
const MAX_LITERAL_SIZE: u64 = 100 * 1024 * 1024; // 100 MB

/// Characters that terminate a bare atom run.
const fn is_atom_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'"' | b'{' | b'}' | b' ' | b'\t')
}

/// One lexical step of the line cursor.
enum Tok {
    /// `(` — begin list.
    Open,
    /// `)` — end list.
    Close,
    /// A complete non-list value.
    Value(Atom),
    /// Cursor exhausted.
    End,
}

/// Tokenizer over one session's read stream.
///
/// Borrows the buffered stream and, when registered, the literal sink that
/// response literals are streamed to instead of being held in memory.
pub struct Tokenizer<'s, 'w, S: ImapTransport> {
    stream: &'s mut BufStream<S>,
    sink: Option<&'w mut (dyn Write + Send)>,
    line: Vec<u8>,
    pos: usize,
}

impl<'s, 'w, S: ImapTransport> Tokenizer<'s, 'w, S> {
    /// Creates a tokenizer with no current line.
    pub fn new(
        stream: &'s mut BufStream<S>,
        sink: Option<&'w mut (dyn Write + Send)>,
    ) -> Self {
        Self {
            stream,
            sink,
            line: Vec::new(),
            pos: 0,
        }
    }

    /// Discards the current line and reads the next one from the stream.
    pub fn next_line(&mut self) -> Result<()> {
        self.line = self.stream.read_line()?;
        self.pos = 0;
        Ok(())
    }

    /// Returns true when the current line is exhausted.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.pos >= self.line.len()
    }

    /// Current cursor position within the line.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Peeks at the byte under the cursor.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.line.get(self.pos).copied()
    }

    /// Takes the rest of the line as text, exhausting the cursor.
    pub fn take_remainder(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.line[self.pos..]).into_owned();
        self.pos = self.line.len();
        rest
    }

    /// Reads the next complete atom, recursing into lists with an explicit
    /// stack so hostile nesting cannot exhaust the call stack.
    ///
    /// # Errors
    ///
    /// Fails on unbalanced parentheses, an unterminated quoted string, a
    /// malformed literal announcement, or cursor exhaustion mid-list.
    pub fn next_atom(&mut self) -> Result<Atom> {
        let mut stack: Vec<Vec<Atom>> = Vec::new();

        loop {
            let tok = self.next_tok()?;
            let value = match tok {
                Tok::Open => {
                    if stack.len() >= MAX_LIST_DEPTH {
                        return Err(Error::parse(self.pos, "list nesting too deep"));
                    }
                    stack.push(Vec::new());
                    continue;
                }
                Tok::Close => {
                    let Some(done) = stack.pop() else {
                        return Err(Error::parse(self.pos, "unbalanced ')'"));
                    };
                    Atom::List(done)
                }
                Tok::Value(atom) => atom,
                Tok::End => {
                    let message = if stack.is_empty() {
                        "expected a value, found end of line"
                    } else {
                        "unterminated list"
                    };
                    return Err(Error::parse(self.pos, message));
                }
            };

            match stack.last_mut() {
                Some(top) => top.push(value),
                None => return Ok(value),
            }
        }
    }

    /// Reads the next atom, or `None` at end of line (outside any list).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Tokenizer::next_atom`].
    pub fn try_next_atom(&mut self) -> Result<Option<Atom>> {
        self.skip_spaces();
        if self.at_end() {
            return Ok(None);
        }
        self.next_atom().map(Some)
    }

    /// Reads a bare word (tag, verb, keyword).
    ///
    /// # Errors
    ///
    /// Fails if the next atom is not text.
    pub fn read_word(&mut self) -> Result<String> {
        match self.next_atom()? {
            Atom::Text(s) => Ok(s),
            other => Err(Error::parse(
                self.pos,
                format!("expected a word, got {other}"),
            )),
        }
    }

    /// Reads a decimal number.
    ///
    /// # Errors
    ///
    /// Fails if the next atom is not a number.
    pub fn read_number(&mut self) -> Result<u32> {
        let word = self.read_word()?;
        word.parse()
            .map_err(|_| Error::parse(self.pos, format!("expected a number, got {word}")))
    }

    /// Bulk-parses the rest of the line as space-separated message ids.
    ///
    /// SEARCH and SORT results are a single long line of integers; splitting
    /// the remainder wholesale is much cheaper than atom-at-a-time.
    ///
    /// # Errors
    ///
    /// Fails on a non-numeric token.
    pub fn read_ids(&mut self) -> Result<Vec<u32>> {
        let rest = &self.line[self.pos..];
        let mut ids = Vec::new();
        for token in rest
            .split(|&b| b == b' ' || b == b'\t')
            .filter(|t| !t.is_empty())
        {
            let text = std::str::from_utf8(token)
                .map_err(|_| Error::parse(self.pos, "non-ASCII in id list"))?;
            let id = text
                .parse()
                .map_err(|_| Error::parse(self.pos, format!("bad id: {text}")))?;
            ids.push(id);
        }
        self.pos = self.line.len();
        Ok(ids)
    }

    /// Skips any spaces under the cursor.
    pub fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn next_tok(&mut self) -> Result<Tok> {
        self.skip_spaces();

        let Some(byte) = self.peek() else {
            return Ok(Tok::End);
        };

        match byte {
            b'(' => {
                self.pos += 1;
                Ok(Tok::Open)
            }
            b')' => {
                self.pos += 1;
                self.skip_one_space();
                Ok(Tok::Close)
            }
            b'"' => self.read_quoted().map(Tok::Value),
            b'{' => self.read_literal().map(Tok::Value),
            _ => self.read_bare().map(Tok::Value),
        }
    }

    /// Quoted string: escapes resolve as backslash-any-char → that char.
    fn read_quoted(&mut self) -> Result<Atom> {
        self.pos += 1; // opening quote
        let mut out = Vec::new();

        loop {
            match self.line.get(self.pos) {
                Some(b'"') => {
                    self.pos += 1;
                    self.skip_one_space();
                    return Ok(Atom::Text(String::from_utf8_lossy(&out).into_owned()));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.line.get(self.pos) {
                        Some(&c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                        None => {
                            return Err(Error::parse(self.pos, "dangling escape in quoted string"));
                        }
                    }
                }
                Some(&c) => {
                    out.push(c);
                    self.pos += 1;
                }
                None => {
                    return Err(Error::parse(self.pos, "unterminated quoted string"));
                }
            }
        }
    }

    /// Literal: `{N}` at end of line, then N raw bytes, then a fresh line.
    fn read_literal(&mut self) -> Result<Atom> {
        self.pos += 1; // opening brace

        let digits_start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.peek() != Some(b'}') {
            return Err(Error::parse(self.pos, "malformed literal announcement"));
        }

        let digits = std::str::from_utf8(&self.line[digits_start..self.pos])
            .map_err(|_| Error::parse(self.pos, "malformed literal size"))?;
        let size: u64 = digits
            .parse()
            .map_err(|_| Error::parse(self.pos, "literal size out of range"))?;
        self.pos += 1; // closing brace

        // The announcement must close the line; the payload starts after it
        if !self.at_end() {
            return Err(Error::parse(self.pos, "bytes after literal announcement"));
        }
        if size > MAX_LITERAL_SIZE {
            return Err(Error::parse(self.pos, format!("literal too large: {size}")));
        }

        let atom = if let Some(sink) = self.sink.as_deref_mut() {
            self.stream.copy_exact(size, sink)?;
            Atom::Streamed(size)
        } else {
            let size = usize::try_from(size)
                .map_err(|_| Error::parse(self.pos, "literal size out of range"))?;
            Atom::Bytes(self.stream.read_exact(size)?)
        };

        // The response text resumes on a new line after the payload
        self.next_line()?;
        self.skip_one_space();

        Ok(atom)
    }

    /// Bare atom run; NIL maps to the null value.
    fn read_bare(&mut self) -> Result<Atom> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_atom_delimiter(b) {
                break;
            }
            self.pos += 1;
        }

        let word = String::from_utf8_lossy(&self.line[start..self.pos]).into_owned();
        self.skip_one_space();

        if word.eq_ignore_ascii_case("NIL") {
            Ok(Atom::Nil)
        } else {
            Ok(Atom::Text(word))
        }
    }

    fn skip_one_space(&mut self) {
        if self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }
}
