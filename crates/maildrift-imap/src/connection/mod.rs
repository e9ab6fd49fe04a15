//! Connection management: transport abstraction, TLS/plain connect helpers,
//! and the buffered wire I/O layer.

mod buffer;
pub mod mock;
mod stream;

pub use buffer::BufStream;
pub use stream::{connect_plain, connect_tls, ImapTransport, MailStream, TlsStream};
