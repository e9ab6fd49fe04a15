//! Connects to an IMAP server, lists folders, and prints the newest
//! subjects from INBOX.
//!
//! ```sh
//! IMAP_HOST=imap.example.com IMAP_USER=me IMAP_PASS=secret \
//!     cargo run --example fetch_inbox
//! ```

use maildrift_imap::{Session, SessionConfig, StderrTrace};

fn main() -> maildrift_imap::Result<()> {
    let host = std::env::var("IMAP_HOST").unwrap_or_else(|_| "localhost".into());
    let user = std::env::var("IMAP_USER").unwrap_or_default();
    let pass = std::env::var("IMAP_PASS").unwrap_or_default();

    let config = SessionConfig::new().credentials(user, pass);
    let mut session = Session::connect_secure(&host, 993, config)?;
    if std::env::var_os("IMAP_TRACE").is_some() {
        session.set_trace_sink(Box::new(StderrTrace));
    }

    for folder in session.list("", "*")? {
        println!("folder: {}", folder.name);
    }

    let summary = session.select("INBOX")?;
    println!("INBOX: {} messages, {} recent", summary.exists, summary.recent);

    let records = session.fetch("1:*", "(UID FLAGS ENVELOPE)")?;
    for (uid, record) in records.iter().rev().take(10) {
        let subject = record
            .envelope
            .as_ref()
            .and_then(|e| e.subject.clone())
            .unwrap_or_else(|| "(no subject)".into());
        let unseen = record
            .flags
            .as_ref()
            .is_some_and(|f| !f.iter().any(|flag| flag == "\\Seen"));
        println!("{}{uid:>6}  {subject}", if unseen { "N" } else { " " });
    }

    session.logout()
}
