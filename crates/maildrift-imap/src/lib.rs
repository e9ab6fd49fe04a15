//! # maildrift-imap
//!
//! A synchronous IMAP4rev1 client library (RFC 3501, plus the ACL, QUOTA,
//! NAMESPACE, SORT/THREAD, UIDPLUS, and ANNOTATEMORE extensions in
//! responses).
//!
//! The core is a protocol engine over an injected byte stream: commands are
//! framed and tagged, the server's typed response grammar (atoms, quoted
//! strings, synchronizing literals, nested lists) is parsed into structured
//! values, and high-level operations are exposed per IMAP verb. Socket
//! establishment is the caller's business — anything `Read + Write` with a
//! read timeout can be driven — though plain-TCP and rustls helpers are
//! included for convenience.
//!
//! ## Quick Start
//!
//! ```no_run
//! use maildrift_imap::{Session, SessionConfig};
//!
//! fn main() -> maildrift_imap::Result<()> {
//!     let config = SessionConfig::new()
//!         .credentials("user@example.com", "password")
//!         .root_folder("INBOX", '.');
//!     let mut session = Session::connect_secure("imap.example.com", 993, config)?;
//!
//!     let folders = session.list("", "*")?;
//!     for folder in &folders {
//!         println!("folder: {}", folder.name);
//!     }
//!
//!     let summary = session.select("INBOX")?;
//!     println!("{} messages", summary.exists);
//!
//!     // UID mode is on by default: the set names UIDs and results are
//!     // keyed by UID
//!     let messages = session.fetch("1:*", "(FLAGS UID ENVELOPE)")?;
//!     for (uid, record) in &messages {
//!         let subject = record
//!             .envelope
//!             .as_ref()
//!             .and_then(|e| e.subject.clone())
//!             .unwrap_or_default();
//!         println!("{uid}: {subject}");
//!     }
//!
//!     session.logout()
//! }
//! ```
//!
//! ## Modules
//!
//! - [`session`]: the session, its state machine, and one method per verb
//! - [`command`]: command construction and argument classification
//! - [`parser`]: response grammar parsing and FETCH reshaping
//! - [`connection`]: transport abstraction, buffered wire I/O, connect
//!   helpers, and a scripted mock for tests
//! - [`folder`]: root-folder prefix rewriting
//! - [`mime`]: BODYSTRUCTURE traversal helpers
//! - [`trace`]: wire trace sinks with password masking

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod folder;
pub mod mime;
pub mod parser;
pub mod session;
pub mod trace;
mod types;

pub use command::{Argument, Command, LiteralSource};
pub use connection::{connect_plain, connect_tls, BufStream, ImapTransport, MailStream};
pub use error::{Error, Result};
pub use folder::FolderRewriter;
pub use mime::{build_cid_map, find_text_part, get_body_part};
pub use parser::{
    Atom, BodyPart, Disposition, Envelope, FetchRecord, MessageBody, RawAddress,
    ResponseCodeCache,
};
pub use session::{Session, SessionConfig};
pub use trace::{BufferTrace, CallbackTrace, NullTrace, StderrTrace, TraceSink, WriterTrace};
pub use types::{
    CompletionStatus, FolderSummary, HeaderDecoder, HeaderMap, ListEntry, MimeWordDecoder,
    ParseFlags, SessionState, StatusEntry,
};

/// IMAP protocol version supported.
pub const IMAP_VERSION: &str = "IMAP4rev1";
