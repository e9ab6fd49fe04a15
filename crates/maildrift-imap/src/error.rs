//! Error types for the IMAP library.
//!
//! Errors fall into three families: I/O errors and parse errors are fatal to
//! the session; NO/BAD completions are transient and leave the session
//! usable; state and argument errors are raised locally before any bytes hit
//! the wire.

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// A read exceeded the configured deadline. The session is in an
    /// indeterminate state and should be discarded.
    #[error("Read timed out")]
    Timeout,

    /// The peer closed the stream.
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// Malformed response from the server.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position in the current line where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Server returned NO for the current command.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server returned BAD for the current command.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server sent BYE outside of LOGOUT.
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Operation not permitted in the current connection state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Operation requires a capability the server does not advertise.
    #[error("Server lacks capability: {0}")]
    MissingCapability(String),

    /// Caller-side misuse at construction.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Creates a parse error at the given position.
    #[must_use]
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Returns true if this error leaves the session unusable.
    ///
    /// NO/BAD completions and local state/argument errors are transient;
    /// everything touching the wire or the grammar is fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::Timeout
                | Self::Disconnected(_)
                | Self::Parse { .. }
                | Self::Bye(_)
        )
    }

    /// Returns true if the server rejected the command (NO or BAD).
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        matches!(self, Self::No(_) | Self::Bad(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Timeout.is_fatal());
        assert!(Error::Disconnected("gone".into()).is_fatal());
        assert!(Error::parse(0, "bad").is_fatal());
        assert!(Error::Bye("bye".into()).is_fatal());

        assert!(!Error::No("denied".into()).is_fatal());
        assert!(!Error::Bad("syntax".into()).is_fatal());
        assert!(!Error::InvalidState("not selected".into()).is_fatal());
    }

    #[test]
    fn test_negative_classification() {
        assert!(Error::No("denied".into()).is_negative());
        assert!(Error::Bad("syntax".into()).is_negative());
        assert!(!Error::Timeout.is_negative());
    }
}
