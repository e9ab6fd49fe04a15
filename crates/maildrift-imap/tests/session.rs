//! End-to-end session tests against a scripted transport.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use maildrift_imap::connection::mock::MockStream;
use maildrift_imap::{
    Atom, BufferTrace, Error, Session, SessionConfig, SessionState,
};

const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1 NAMESPACE UIDPLUS] server ready\r\n";

fn session_for(mock: MockStream, config: SessionConfig) -> Session<MockStream> {
    Session::new(mock, config).unwrap()
}

fn authenticated(mock: MockStream) -> Session<MockStream> {
    // Adopt the stream as already authenticated: no greeting, no LOGIN
    session_for(mock, SessionConfig::new().expect_greeting(false))
}

#[test]
fn greeting_then_login_transitions_state() {
    let mock = MockStream::new()
        .read(GREETING)
        .read(b"1 OK [CAPABILITY IMAP4rev1 UIDPLUS] logged in\r\n");

    let mut session = session_for(mock, SessionConfig::new());
    assert_eq!(session.state(), SessionState::Connected);

    session.login("alice", "secret").unwrap();
    assert_eq!(session.state(), SessionState::Authenticated);

    let wire = session.release().unwrap();
    assert_eq!(wire.written(), b"1 LOGIN alice \"secret\"\r\n");
}

#[test]
fn auto_login_from_config() {
    let mock = MockStream::new().read(GREETING).read(b"1 OK welcome\r\n");
    let session = session_for(
        mock,
        SessionConfig::new().credentials("alice", "pw"),
    );
    assert_eq!(session.state(), SessionState::Authenticated);
}

#[test]
fn preauth_greeting_skips_login() {
    let mock = MockStream::new().read(b"* PREAUTH ready to roll\r\n");
    let session = session_for(mock, SessionConfig::new());
    assert_eq!(session.state(), SessionState::Authenticated);
}

#[test]
fn bye_greeting_fails_construction() {
    let mock = MockStream::new().read(b"* BYE maintenance\r\n");
    assert!(matches!(
        Session::new(mock, SessionConfig::new()),
        Err(Error::Bye(_))
    ));
}

#[test]
fn login_password_masked_in_trace() {
    let mock = MockStream::new().read(GREETING).read(b"1 OK in\r\n");
    let mut session = session_for(mock, SessionConfig::new());

    let trace = BufferTrace::new();
    let transcript = trace.clone();
    session.set_trace_sink(Box::new(trace));

    session.login("alice", "hunter2").unwrap();

    let text = String::from_utf8(transcript.contents()).unwrap();
    assert!(text.contains("\"********\""));
    assert!(!text.contains("hunter2"));

    // But the wire carried the real password
    let wire = session.release().unwrap();
    assert!(String::from_utf8_lossy(wire.written()).contains("hunter2"));
}

#[test]
fn tags_increase_by_one_regardless_of_outcome() {
    let mock = MockStream::new()
        .read(b"1 OK done\r\n")
        .read(b"2 NO not today\r\n")
        .read(b"3 OK done\r\n");
    let mut session = authenticated(mock);

    assert!(session.noop().is_ok());
    assert!(matches!(session.noop(), Err(Error::No(_))));
    assert!(session.noop().is_ok());

    let wire = session.release().unwrap();
    assert_eq!(wire.written(), b"1 NOOP\r\n2 NOOP\r\n3 NOOP\r\n");
}

#[test]
fn list_strips_root_prefix() {
    // Scenario: LIST with R=INBOX, S=.
    let mock = MockStream::new()
        .read(b"* LIST (\\HasNoChildren) \".\" \"INBOX.Sent\"\r\n1 OK List completed\r\n");
    let mut session = session_for(
        mock,
        SessionConfig::new()
            .expect_greeting(false)
            .root_folder("INBOX", '.'),
    );

    let folders = session.list("", "*").unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].attributes, vec!["\\HasNoChildren".to_string()]);
    assert_eq!(folders[0].delimiter, Some('.'));
    assert_eq!(folders[0].name, "Sent");
}

#[test]
fn list_adopts_reported_separator() {
    let mock = MockStream::new()
        .read(b"* LIST () \"/\" \"INBOX/Sent\"\r\n1 OK done\r\n");
    let mut session = session_for(
        mock,
        SessionConfig::new()
            .expect_greeting(false)
            .root_folder("INBOX", '.'),
    );

    let folders = session.list("", "*").unwrap();
    assert_eq!(folders[0].name, "Sent");
    assert_eq!(session.rewriter().separator(), '/');
}

#[test]
fn select_returns_side_channel_summary() {
    let mock = MockStream::new()
        .read(b"* 23 EXISTS\r\n")
        .read(b"* 2 RECENT\r\n")
        .read(b"* FLAGS (\\Seen \\Deleted)\r\n")
        .read(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
        .read(b"* OK [UIDNEXT 4392] Predicted next UID\r\n")
        .read(b"1 OK [READ-WRITE] SELECT completed\r\n");
    let mut session = authenticated(mock);

    let summary = session.select("INBOX").unwrap();
    assert_eq!(session.state(), SessionState::Selected);
    assert_eq!(summary.exists, 23);
    assert_eq!(summary.recent, 2);
    assert_eq!(summary.uidvalidity, Some(3_857_529_045));
    assert_eq!(summary.uidnext, Some(4392));
    assert!(!summary.read_only);
    assert_eq!(summary.flags, vec!["\\Seen".to_string(), "\\Deleted".to_string()]);

    // The cache still holds SELECT's side-channel data afterwards
    assert_eq!(
        session.response_code("uidvalidity").unwrap().as_u32(),
        Some(3_857_529_045)
    );
}

#[test]
fn uid_fetch_keys_by_uid_and_drops_inner_uid() {
    // Scenario: FETCH with UID mode
    let mock = MockStream::new()
        .read(b"* 1 EXISTS\r\n1 OK selected\r\n")
        .read(b"* 1 FETCH (UID 1952 FLAGS (\\Recent \\Seen))\r\n")
        .read(b"* 2 FETCH (UID 1958 FLAGS (\\Recent))\r\n")
        .read(b"2 OK Completed\r\n");
    let mut session = authenticated(mock);
    session.select("INBOX").unwrap();

    let records = session.fetch("1:*", "(FLAGS UID)").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[&1952].flags,
        Some(vec!["\\Recent".to_string(), "\\Seen".to_string()])
    );
    assert_eq!(records[&1952].uid, None);
    assert_eq!(
        records[&1958].flags,
        Some(vec!["\\Recent".to_string()])
    );

    let wire = session.release().unwrap();
    assert!(String::from_utf8_lossy(wire.written()).contains("2 UID FETCH 1:* (FLAGS UID)"));
}

#[test]
fn fetch_literal_consumed_exactly() {
    // Scenario: literal in response, next protocol byte follows the payload
    let mock = MockStream::new()
        .read(b"* 1 EXISTS\r\n1 OK selected\r\n")
        .read(b"* 1 FETCH (RFC822.SIZE 11 BODY[TEXT] {5}\r\nHello)\r\n2 OK\r\n")
        .read(b"3 OK noop\r\n");
    let mut session = session_for(mock, SessionConfig::new().expect_greeting(false).uid_mode(false));
    session.select("INBOX").unwrap();

    let records = session.fetch("1", "BODY[TEXT]").unwrap();
    assert_eq!(records[&1].size, Some(11));
    assert_eq!(records[&1].body_text().as_deref(), Some("Hello"));

    // The stream is still in sync: the next command parses cleanly
    assert!(session.noop().is_ok());
}

#[test]
fn append_handshake_and_wire_shape() {
    // Scenario: literal in request with continuation
    let mock = MockStream::new()
        .read(b"+ Ready for literal data\r\n")
        .read(b"1 OK [APPENDUID 38505 3955] APPEND completed\r\n");
    let mut session = authenticated(mock);

    let message = b"From: a\r\n\r\nhello!!";
    assert_eq!(message.len(), 18);
    session.append("INBOX", message.to_vec(), None, None).unwrap();

    assert_eq!(
        session.response_code("appenduid").unwrap(),
        Atom::Text("38505 3955".into())
    );

    let wire = session.release().unwrap();
    let mut expected = b"1 APPEND INBOX {18}\r\n".to_vec();
    expected.extend_from_slice(message);
    expected.extend_from_slice(b"\r\n");
    assert_eq!(wire.written(), expected);
}

#[test]
fn append_without_continuation_is_parse_error() {
    let mock = MockStream::new().read(b"1 NO try later\r\n");
    let mut session = authenticated(mock);

    let result = session.append("INBOX", b"hi".to_vec(), None, None);
    assert!(matches!(result, Err(Error::Parse { .. })));
    // A parse error is fatal: the session is to be discarded
    assert_eq!(session.state(), SessionState::Unconnected);
    assert!(session.last_error().is_some());
}

#[test]
fn folder_change_callback_fires_before_send() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);

    let mock = MockStream::new().read(b"1 OK created\r\n");
    let mut session = authenticated(mock);
    session.on_folder_change(Box::new(move |folder| {
        record.lock().unwrap().push(folder.to_string());
    }));

    session.create("Archive").unwrap();
    assert_eq!(seen.lock().unwrap().as_slice(), ["Archive".to_string()]);
}

#[test]
fn rename_notifies_both_names() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);

    let mock = MockStream::new().read(b"1 OK renamed\r\n");
    let mut session = authenticated(mock);
    session.on_folder_change(Box::new(move |folder| {
        record.lock().unwrap().push(folder.to_string());
    }));

    session.rename("Old", "New").unwrap();
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["Old".to_string(), "New".to_string()]
    );
}

#[test]
fn expunge_invalidates_exists_and_recent() {
    let mock = MockStream::new()
        .read(b"* 9 EXISTS\r\n* 1 RECENT\r\n1 OK selected\r\n")
        .read(b"* 3 EXPUNGE\r\n2 OK expunged\r\n");
    let mut session = authenticated(mock);
    session.select("INBOX").unwrap();
    assert!(session.response_code("exists").is_some());

    session.expunge().unwrap();
    assert!(session.response_code("exists").is_none());
    assert!(session.response_code("recent").is_none());
}

#[test]
fn search_returns_ids() {
    let mock = MockStream::new()
        .read(b"* 1 EXISTS\r\n1 OK selected\r\n")
        .read(b"* SEARCH 2 84 882\r\n2 OK done\r\n");
    let mut session = authenticated(mock);
    session.select("INBOX").unwrap();

    assert_eq!(session.search("UNSEEN").unwrap(), vec![2, 84, 882]);
}

#[test]
fn sort_requires_capability() {
    let mock = MockStream::new()
        .read(b"* 1 EXISTS\r\n1 OK selected\r\n")
        .read(b"* CAPABILITY IMAP4rev1\r\n2 OK done\r\n");
    let mut session = authenticated(mock);
    session.select("INBOX").unwrap();

    let result = session.sort("(DATE)", "UTF-8", "ALL");
    assert!(matches!(result, Err(Error::MissingCapability(_))));
    // Local rejection: the SORT itself never hit the wire
    let wire = session.release().unwrap();
    assert!(!String::from_utf8_lossy(wire.written()).contains("SORT"));
}

#[test]
fn capability_is_memoized() {
    let mock = MockStream::new()
        .read(b"* CAPABILITY IMAP4rev1 SORT THREAD=REFERENCES AUTH=PLAIN\r\n1 OK done\r\n");
    let mut session = authenticated(mock);

    let caps = session.capability().unwrap();
    assert!(caps.contains_key("imap4rev1"));
    assert!(caps.contains_key("sort"));
    assert_eq!(caps["thread"], vec!["references".to_string()]);

    // Second call answers from the cache: only one CAPABILITY on the wire
    let _ = session.capability().unwrap();
    assert!(session.has_capability("thread=references").unwrap());
    let wire = session.release().unwrap();
    assert_eq!(
        String::from_utf8_lossy(wire.written()).matches("CAPABILITY").count(),
        1
    );
}

#[test]
fn batched_status_attributes_in_issue_order() {
    let mock = MockStream::new()
        .read(b"* STATUS \"INBOX.A\" (MESSAGES 3)\r\n1 OK done\r\n")
        .read(b"* STATUS \"INBOX.B\" (MESSAGES 7)\r\n2 OK done\r\n");
    let mut session = session_for(
        mock,
        SessionConfig::new()
            .expect_greeting(false)
            .root_folder("INBOX", '.'),
    );

    let entries = session.status_many(&["A", "B"], &["MESSAGES"]).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "A");
    assert_eq!(entries[0].items["messages"], 3);
    assert_eq!(entries[1].name, "B");
    assert_eq!(entries[1].items["messages"], 7);

    // Both commands were written back-to-back before any reply was read
    let wire = session.release().unwrap();
    let text = String::from_utf8_lossy(wire.written()).into_owned();
    assert!(text.contains("1 STATUS INBOX.A (MESSAGES)"));
    assert!(text.contains("2 STATUS INBOX.B (MESSAGES)"));
}

#[test]
fn batched_status_skips_refused_folder() {
    let mock = MockStream::new()
        .read(b"1 NO no such folder\r\n")
        .read(b"* STATUS Good (MESSAGES 1)\r\n2 OK done\r\n");
    let mut session = authenticated(mock);

    let entries = session.status_many(&["Bad", "Good"], &["MESSAGES"]).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "Good");
    assert!(session.last_error().is_some());
}

#[test]
fn is_open_quiet_means_live() {
    let mock = MockStream::new().timeout();
    let mut session = authenticated(mock);
    assert!(session.is_open());
    assert_eq!(session.state(), SessionState::Authenticated);
}

#[test]
fn is_open_consumes_noise_then_reports_live() {
    let mock = MockStream::new()
        .read(b"* OK still here\r\n")
        .timeout();
    let mut session = authenticated(mock);
    assert!(session.is_open());
}

#[test]
fn is_open_detects_pending_bye() {
    let mock = MockStream::new().read(b"* BYE idle too long\r\n");
    let mut session = authenticated(mock);
    assert!(!session.is_open());
    assert_eq!(session.state(), SessionState::Unconnected);
}

#[test]
fn fetch_before_select_rejected_locally() {
    let mock = MockStream::new();
    let mut session = authenticated(mock);

    let result = session.fetch("1:*", "FLAGS");
    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert!(session.last_error().unwrap().contains("Selected"));

    let wire = session.release().unwrap();
    assert!(wire.written().is_empty());
}

#[test]
fn release_surrenders_stream_and_skips_logout() {
    let mock = MockStream::new();
    let session = authenticated(mock);
    let wire = session.release().unwrap();
    // No LOGOUT was attempted on release
    assert!(wire.written().is_empty());
}

#[test]
fn logout_tolerates_bye() {
    let mock = MockStream::new().read(b"* BYE so long\r\n1 OK logged out\r\n");
    let mut session = authenticated(mock);
    session.logout().unwrap();
    assert_eq!(session.state(), SessionState::Unconnected);
}

#[test]
fn bye_mid_command_is_fatal() {
    let mock = MockStream::new().read(b"* BYE shutting down now\r\n");
    let mut session = authenticated(mock);

    assert!(matches!(session.noop(), Err(Error::Bye(_))));
    assert_eq!(session.state(), SessionState::Unconnected);
}

#[test]
fn literal_sink_receives_body_payloads() {
    let mock = MockStream::new()
        .read(b"* 1 EXISTS\r\n1 OK selected\r\n")
        .read(b"* 1 FETCH (BODY[TEXT] {5}\r\nHello)\r\n2 OK\r\n");
    let mut session = session_for(mock, SessionConfig::new().expect_greeting(false).uid_mode(false));
    session.select("INBOX").unwrap();

    let sink: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let target = Arc::clone(&sink);
    session.set_literal_sink(Box::new(SharedSink(target)));

    let records = session.fetch("1", "BODY[TEXT]").unwrap();
    assert_eq!(sink.lock().unwrap().as_slice(), b"Hello");
    // The record notes the streamed size instead of holding the bytes
    assert_eq!(records[&1].body, Some(Atom::Streamed(5)));
}

struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
