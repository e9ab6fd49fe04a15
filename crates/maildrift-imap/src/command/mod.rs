//! Command construction.
//!
//! A [`Command`] is a verb plus a list of [`Argument`]s. Most callers build
//! arguments with [`Command::arg`] and let the serializer classify them;
//! the explicit constructors cover the cases where the caller knows better
//! (always-quote a password, never-quote a `1:*` range, force a literal).

mod serialize;

pub(crate) use serialize::send_command;

use std::io::{Read, Seek};

/// A seekable byte source streamed as a literal argument.
///
/// The serializer determines the size by seeking to the end and back.
pub trait LiteralSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> LiteralSource for T {}

/// One command argument.
pub enum Argument {
    /// Sent verbatim, quoted, or as a literal — whichever the bytes demand.
    Auto(String),
    /// Always quoted (LOGIN passwords must not be sent as bare atoms).
    Quoted(String),
    /// Always verbatim (id ranges ending in `*`, which some servers refuse
    /// quoted).
    Unquoted(String),
    /// Always a literal.
    Literal(Vec<u8>),
    /// A literal streamed from a seekable source.
    Stream(Box<dyn LiteralSource>),
}

impl std::fmt::Debug for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto(s) => f.debug_tuple("Auto").field(s).finish(),
            Self::Quoted(s) => f.debug_tuple("Quoted").field(s).finish(),
            Self::Unquoted(s) => f.debug_tuple("Unquoted").field(s).finish(),
            Self::Literal(b) => f.debug_tuple("Literal").field(&b.len()).finish(),
            Self::Stream(_) => f.debug_tuple("Stream").finish(),
        }
    }
}

/// A command under construction.
#[derive(Debug, Default)]
pub struct Command {
    verb: String,
    args: Vec<Argument>,
}

impl Command {
    /// Starts a command with the given verb.
    #[must_use]
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            args: Vec::new(),
        }
    }

    /// The command verb.
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// The arguments so far.
    #[must_use]
    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// Appends an auto-classified argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Argument::Auto(value.into()));
        self
    }

    /// Appends an always-quoted argument.
    #[must_use]
    pub fn quoted(mut self, value: impl Into<String>) -> Self {
        self.args.push(Argument::Quoted(value.into()));
        self
    }

    /// Appends a verbatim argument.
    #[must_use]
    pub fn raw(mut self, value: impl Into<String>) -> Self {
        self.args.push(Argument::Unquoted(value.into()));
        self
    }

    /// Appends a forced-literal argument.
    #[must_use]
    pub fn literal(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.args.push(Argument::Literal(bytes.into()));
        self
    }

    /// Appends a streamed-literal argument.
    #[must_use]
    pub fn stream(mut self, source: Box<dyn LiteralSource>) -> Self {
        self.args.push(Argument::Stream(source));
        self
    }

    pub(crate) fn args_mut(&mut self) -> &mut [Argument] {
        &mut self.args
    }
}
