//! Stream types for IMAP connections.
//!
//! The session core is transport-agnostic: anything implementing
//! [`ImapTransport`] can be injected. [`MailStream`] covers the two common
//! cases (plain TCP and rustls-wrapped TCP) for callers that want the
//! library to establish the socket itself.

#![allow(clippy::missing_errors_doc)]

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};

use crate::{Error, Result};

/// Synchronous rustls stream over TCP.
pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// A bidirectional byte stream a session can drive.
///
/// Streams must deliver written bytes immediately (no write-side buffering
/// between the library's write call and the wire) and support a read
/// timeout. A timeout of `Duration::ZERO` means "poll, do not block";
/// transports that cannot express that exactly substitute their smallest
/// representable interval.
pub trait ImapTransport: Read + Write + Send {
    /// Configures the read timeout. `None` blocks indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

/// Smallest poll interval for transports that reject a true zero timeout.
const MIN_POLL: Duration = Duration::from_millis(1);

impl ImapTransport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let timeout = timeout.map(|t| if t.is_zero() { MIN_POLL } else { t });
        TcpStream::set_read_timeout(self, timeout)
    }
}

/// A stream that is either plaintext or TLS.
pub enum MailStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream>),
}

impl MailStream {
    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl Read for MailStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for MailStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}

impl ImapTransport for MailStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Self::Plain(stream) => ImapTransport::set_read_timeout(stream, timeout),
            Self::Tls(stream) => ImapTransport::set_read_timeout(&mut stream.sock, timeout),
        }
    }
}

/// Creates a TLS client config with the bundled webpki roots.
fn tls_config() -> Arc<ClientConfig> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    )
}

/// Connects to a server without TLS.
///
/// Nagle's algorithm is disabled so command writes hit the wire immediately.
pub fn connect_plain(host: &str, port: u16) -> Result<MailStream> {
    let tcp = TcpStream::connect((host, port)).map_err(Error::Io)?;
    tcp.set_nodelay(true).map_err(Error::Io)?;
    Ok(MailStream::Plain(tcp))
}

/// Connects to a server with TLS from the start.
pub fn connect_tls(host: &str, port: u16) -> Result<MailStream> {
    let tcp = TcpStream::connect((host, port)).map_err(Error::Io)?;
    tcp.set_nodelay(true).map_err(Error::Io)?;

    let server_name = ServerName::try_from(host.to_string())?;
    let conn = ClientConnection::new(tls_config(), server_name)?;

    Ok(MailStream::Tls(Box::new(StreamOwned::new(conn, tcp))))
}
