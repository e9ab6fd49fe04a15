//! Response parsing.
//!
//! [`read_reply`] drives the tokenizer line by line: untagged responses are
//! dispatched by keyword — updating the response-code cache and accumulating
//! the data the current command collects — until the tagged completion
//! matching the command's tag arrives. FETCH reshaping (see [`fetch`])
//! happens inline in the FETCH arm.

mod atom;
pub(crate) mod fetch;
pub(crate) mod tokenizer;

pub use atom::Atom;
pub use fetch::{BodyPart, Disposition, Envelope, FetchRecord, MessageBody, RawAddress};

use std::collections::BTreeMap;
use std::io::Write;

use fetch::ReshapeContext;
use tokenizer::Tokenizer;

use crate::connection::{BufStream, ImapTransport};
use crate::types::{CompletionStatus, HeaderDecoder, ParseFlags};
use crate::{Error, Result};

/// The most recent untagged status codes, keyed by lowercase name.
///
/// Written only by the parser, read by the façade. Not cleared between
/// commands unless explicitly requested — SELECT's side-channel data
/// (uidvalidity, exists, permanentflags, …) is retrieved from here after
/// the completion.
#[derive(Debug, Default, Clone)]
pub struct ResponseCodeCache {
    map: BTreeMap<String, Atom>,
}

impl ResponseCodeCache {
    /// Stores a code, replacing any previous value.
    pub fn set(&mut self, name: &str, value: Atom) {
        self.map.insert(name.to_lowercase(), value);
    }

    /// Looks up a code by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Atom> {
        self.map.get(&name.to_lowercase())
    }

    /// Looks up a numeric code.
    #[must_use]
    pub fn get_u32(&self, name: &str) -> Option<u32> {
        self.get(name).and_then(Atom::as_u32)
    }

    /// Removes a code.
    pub fn remove(&mut self, name: &str) {
        self.map.remove(&name.to_lowercase());
    }

    /// Drops every cached code.
    pub fn clear(&mut self) {
        self.map.clear();
    }
}

/// Options threaded into one reply parse.
pub(crate) struct ParseOptions<'a> {
    pub flags: ParseFlags,
    pub uid_mode: bool,
    pub pedantic: bool,
    /// BYE is a legal farewell during LOGOUT; anywhere else it is fatal.
    pub in_logout: bool,
    pub decoder: Option<&'a dyn HeaderDecoder>,
}

/// Data accumulated from untagged responses for one command.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Collected {
    /// Nothing is collected.
    None,
    /// FETCH records keyed by sequence number or UID.
    Fetch(BTreeMap<u32, FetchRecord>),
    /// SEARCH/SORT id list.
    Ids(Vec<u32>),
    /// LIST/LSUB triples (attributes, delimiter, raw name).
    List(Vec<(Vec<String>, Option<char>, String)>),
    /// STATUS lines (raw folder name, lowercased item map).
    Status(Vec<(String, BTreeMap<String, u32>)>),
    /// Generic collection: one `Atom::List` of the line's atoms per line.
    Atoms(Vec<Atom>),
}

impl Collected {
    fn for_verb(collect: Option<&str>) -> Self {
        match collect {
            None => Self::None,
            Some("fetch") => Self::Fetch(BTreeMap::new()),
            Some("search" | "sort") => Self::Ids(Vec::new()),
            Some("list" | "lsub") => Self::List(Vec::new()),
            Some("status") => Self::Status(Vec::new()),
            Some(_) => Self::Atoms(Vec::new()),
        }
    }
}

/// One command's complete reply.
#[derive(Debug)]
pub(crate) struct CommandReply {
    /// Completion status from the tagged line.
    pub status: CompletionStatus,
    /// Remainder of the tagged line, response code included.
    pub text: String,
    /// Untagged data collected for the command.
    pub data: Collected,
}

/// The server greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Greeting {
    /// `* OK`: proceed to LOGIN.
    Ok(String),
    /// `* PREAUTH`: the stream is already authenticated.
    PreAuth(String),
}

/// Reads and classifies the server greeting.
pub(crate) fn read_greeting<S: ImapTransport>(
    stream: &mut BufStream<S>,
    codes: &mut ResponseCodeCache,
) -> Result<Greeting> {
    let mut tok = Tokenizer::new(stream, None);
    tok.next_line()?;

    let star = tok.read_word()?;
    if star != "*" {
        return Err(Error::parse(tok.position(), "greeting is not untagged"));
    }

    let word = tok.read_word()?;
    let text = resp_text(&mut tok, codes);
    if word.eq_ignore_ascii_case("OK") {
        Ok(Greeting::Ok(text))
    } else if word.eq_ignore_ascii_case("PREAUTH") {
        Ok(Greeting::PreAuth(text))
    } else if word.eq_ignore_ascii_case("BYE") {
        Err(Error::Bye(text))
    } else {
        Err(Error::parse(
            tok.position(),
            format!("unexpected greeting keyword {word}"),
        ))
    }
}

/// Reads untagged responses until the completion line for `tag`.
///
/// `collect` names the lowercase untagged verb whose data the command wants
/// (e.g. `fetch`, `list`); everything else still updates the cache but is
/// otherwise dropped.
pub(crate) fn read_reply<S: ImapTransport>(
    stream: &mut BufStream<S>,
    sink: Option<&mut (dyn Write + Send)>,
    codes: &mut ResponseCodeCache,
    tag: &str,
    collect: Option<&str>,
    opts: &ParseOptions<'_>,
) -> Result<CommandReply> {
    let mut tok = Tokenizer::new(stream, sink);
    let mut data = Collected::for_verb(collect);

    loop {
        tok.next_line()?;
        let first = tok.read_word()?;

        if first == "*" {
            handle_untagged(&mut tok, codes, &mut data, collect, opts)?;
            finish_line(&mut tok, opts)?;
            continue;
        }

        if first == "+" {
            // A continuation outside a literal handshake is the server
            // talking past us
            if opts.pedantic {
                return Err(Error::parse(tok.position(), "unexpected continuation"));
            }
            tracing::warn!("ignoring unexpected continuation request");
            let _ = tok.take_remainder();
            continue;
        }

        if first == tag {
            let word = tok.read_word()?;
            let status = CompletionStatus::from_keyword(&word).ok_or_else(|| {
                Error::parse(tok.position(), format!("bad completion keyword {word}"))
            })?;
            let text = resp_text(&mut tok, codes);

            if status == CompletionStatus::Bye && !opts.in_logout {
                return Err(Error::Bye(text));
            }

            return Ok(CommandReply { status, text, data });
        }

        // A tag we never issued
        if opts.pedantic {
            return Err(Error::parse(
                tok.position(),
                format!("unexpected tag {first}"),
            ));
        }
        tracing::warn!(tag = %first, "ignoring response with unexpected tag");
        let _ = tok.take_remainder();
    }
}

/// Enforces the cursor-exhausted invariant after an untagged line.
fn finish_line<S: ImapTransport>(
    tok: &mut Tokenizer<'_, '_, S>,
    opts: &ParseOptions<'_>,
) -> Result<()> {
    tok.skip_spaces();
    if tok.at_end() {
        return Ok(());
    }
    if opts.pedantic {
        return Err(Error::parse(tok.position(), "trailing bytes on response line"));
    }
    let rest = tok.take_remainder();
    tracing::warn!(rest = %rest, "discarding trailing response bytes");
    Ok(())
}

fn handle_untagged<S: ImapTransport>(
    tok: &mut Tokenizer<'_, '_, S>,
    codes: &mut ResponseCodeCache,
    data: &mut Collected,
    collect: Option<&str>,
    opts: &ParseOptions<'_>,
) -> Result<()> {
    let word = tok.read_word()?;

    // `* <n> <verb>` — numbered responses
    if let Ok(number) = word.parse::<u32>() {
        return handle_numbered(tok, codes, data, number, opts);
    }

    let keyword = word.to_uppercase();
    match keyword.as_str() {
        "OK" | "PREAUTH" => {
            let _ = resp_text(tok, codes);
        }
        "NO" | "BAD" => {
            // Untagged warnings: keep the text retrievable but do not fail
            // the command, which its own completion will judge
            let text = resp_text(tok, codes);
            codes.set(&keyword, Atom::Text(text));
        }
        "BYE" => {
            let text = resp_text(tok, codes);
            if !opts.in_logout {
                return Err(Error::Bye(text));
            }
        }
        "CAPABILITY" => {
            let caps = remainder_words(tok);
            codes.set("capability", Atom::List(caps.clone()));
            push_line_atoms(data, collect, "capability", caps);
        }
        "FLAGS" => {
            let flags = tok.next_atom()?;
            codes.set("flags", flags.clone());
            push_line_atoms(data, collect, "flags", vec![flags]);
        }
        "SEARCH" | "SORT" => {
            let ids = tok.read_ids()?;
            if let Collected::Ids(out) = data {
                if collect == Some(keyword.to_lowercase().as_str()) {
                    out.extend(ids);
                }
            }
        }
        "LIST" | "LSUB" => {
            let entry = parse_list_line(tok)?;
            if let Collected::List(out) = data {
                if collect == Some(keyword.to_lowercase().as_str()) {
                    out.push(entry);
                }
            }
        }
        "STATUS" => {
            let entry = parse_status_line(tok)?;
            if let Collected::Status(out) = data {
                out.push(entry);
            }
        }
        "NAMESPACE" => {
            let atoms = remainder_atoms(tok)?;
            codes.set("namespace", Atom::List(atoms.clone()));
            push_line_atoms(data, collect, "namespace", atoms);
        }
        _ => {
            // THREAD, QUOTA, QUOTAROOT, ACL, MYRIGHTS, LISTRIGHTS,
            // ANNOTATION, and anything future: collect the line's atoms when
            // the command asked for this verb, otherwise drop it
            let atoms = remainder_atoms(tok)?;
            push_line_atoms(data, collect, &keyword.to_lowercase(), atoms);
        }
    }

    Ok(())
}

fn handle_numbered<S: ImapTransport>(
    tok: &mut Tokenizer<'_, '_, S>,
    codes: &mut ResponseCodeCache,
    data: &mut Collected,
    number: u32,
    opts: &ParseOptions<'_>,
) -> Result<()> {
    let keyword = tok.read_word()?.to_uppercase();
    match keyword.as_str() {
        "EXISTS" => codes.set("exists", Atom::Text(number.to_string())),
        "RECENT" => codes.set("recent", Atom::Text(number.to_string())),
        "EXPUNGE" => codes.set("expunge", Atom::Text(number.to_string())),
        "FETCH" => {
            let items = tok
                .next_atom()?
                .into_list()
                .ok_or_else(|| Error::parse(tok.position(), "FETCH data is not a list"))?;

            let ctx = ReshapeContext {
                flags: opts.flags,
                decoder: opts.decoder,
            };
            let mut record = fetch::reshape_fetch(items, &ctx)?;

            // UID mode rekeys the outer map and drops the inner entry
            let key = match (opts.uid_mode, record.uid) {
                (true, Some(uid)) => {
                    record.uid = None;
                    uid
                }
                _ => number,
            };

            if let Collected::Fetch(out) = data {
                out.insert(key, record);
            } else {
                tracing::debug!(seq = number, "dropping unsolicited FETCH");
            }
        }
        other => {
            tracing::debug!(number, keyword = other, "unrecognized numbered response");
            let _ = tok.take_remainder();
        }
    }
    Ok(())
}

/// `(flags) sep name` — the LIST/LSUB triple.
fn parse_list_line<S: ImapTransport>(
    tok: &mut Tokenizer<'_, '_, S>,
) -> Result<(Vec<String>, Option<char>, String)> {
    let attributes = tok
        .next_atom()?
        .into_list()
        .ok_or_else(|| Error::parse(tok.position(), "LIST attributes are not a list"))?
        .into_iter()
        .filter_map(Atom::into_text)
        .collect();

    let delimiter = match tok.next_atom()? {
        Atom::Nil => None,
        atom => atom.into_text().and_then(|s| s.chars().next()),
    };

    let name = tok
        .next_atom()?
        .into_text()
        .ok_or_else(|| Error::parse(tok.position(), "LIST name missing"))?;

    Ok((attributes, delimiter, name))
}

/// `name (item n item n …)` — the STATUS shape.
fn parse_status_line<S: ImapTransport>(
    tok: &mut Tokenizer<'_, '_, S>,
) -> Result<(String, BTreeMap<String, u32>)> {
    let name = tok
        .next_atom()?
        .into_text()
        .ok_or_else(|| Error::parse(tok.position(), "STATUS name missing"))?;

    let list = tok
        .next_atom()?
        .into_list()
        .ok_or_else(|| Error::parse(tok.position(), "STATUS items are not a list"))?;

    let mut items = BTreeMap::new();
    let mut iter = list.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        if let (Some(key), Some(value)) = (key.into_text(), value.as_u32()) {
            items.insert(key.to_lowercase(), value);
        }
    }

    Ok((name, items))
}

/// Collects the rest of the line as whitespace-separated words.
fn remainder_words<S: ImapTransport>(tok: &mut Tokenizer<'_, '_, S>) -> Vec<Atom> {
    tok.take_remainder()
        .split_ascii_whitespace()
        .map(|w| Atom::Text(w.to_string()))
        .collect()
}

/// Collects the rest of the line as parsed atoms.
fn remainder_atoms<S: ImapTransport>(tok: &mut Tokenizer<'_, '_, S>) -> Result<Vec<Atom>> {
    let mut atoms = Vec::new();
    while let Some(atom) = tok.try_next_atom()? {
        atoms.push(atom);
    }
    Ok(atoms)
}

/// Appends one line's atoms to a generic collection when the verb matches.
///
/// Matching is by prefix so that one collection can span a response family
/// (`quota` catches both QUOTA and QUOTAROOT lines). Each collected line is
/// wrapped as a list led by its verb so callers can tell them apart.
fn push_line_atoms(data: &mut Collected, collect: Option<&str>, verb: &str, mut atoms: Vec<Atom>) {
    if let Collected::Atoms(out) = data {
        if collect.is_some_and(|wanted| verb.starts_with(wanted)) {
            atoms.insert(0, Atom::Text(verb.to_string()));
            out.push(Atom::List(atoms));
        }
    }
}

/// Consumes the resp-text tail of a status line, caching any `[CODE …]`.
fn resp_text<S: ImapTransport>(
    tok: &mut Tokenizer<'_, '_, S>,
    codes: &mut ResponseCodeCache,
) -> String {
    tok.skip_spaces();
    let rest = tok.take_remainder();

    if let Some(inner) = rest.strip_prefix('[') {
        if let Some(end) = inner.find(']') {
            let trailing = inner[end + 1..].trim_start();
            cache_code(&inner[..end], trailing, codes);
        }
    }

    rest
}

/// Dispatches one bracketed response code into the cache, shaping the value
/// the way the matching untagged response would be shaped.
fn cache_code(inner: &str, trailing: &str, codes: &mut ResponseCodeCache) {
    let mut parts = inner.splitn(2, ' ');
    let Some(name) = parts.next() else {
        return;
    };
    let name = name.to_lowercase();
    let args = parts.next().unwrap_or("");

    match name.as_str() {
        // The human-readable text is the payload for these
        "alert" | "parse" | "trycreate" | "newname" => {
            codes.set(&name, Atom::Text(trailing.to_string()));
        }
        "read-only" => codes.set("foldermode", Atom::Text("read-only".to_string())),
        "read-write" => codes.set("foldermode", Atom::Text("read-write".to_string())),
        "permanentflags" | "badcharset" => {
            let list = args
                .trim_start_matches('(')
                .trim_end_matches(')')
                .split_ascii_whitespace()
                .map(|w| Atom::Text(w.to_string()))
                .collect();
            codes.set(&name, Atom::List(list));
        }
        "capability" => {
            let list = args
                .split_ascii_whitespace()
                .map(|w| Atom::Text(w.to_string()))
                .collect();
            codes.set(&name, Atom::List(list));
        }
        // uidvalidity, uidnext, unseen, appenduid, copyuid, highestmodseq, …
        _ => codes.set(&name, Atom::Text(args.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::mock::MockStream;

    fn opts() -> ParseOptions<'static> {
        ParseOptions {
            flags: ParseFlags::default(),
            uid_mode: true,
            pedantic: false,
            in_logout: false,
            decoder: None,
        }
    }

    fn reply_for(
        wire: &[u8],
        tag: &str,
        collect: Option<&str>,
        opts: &ParseOptions<'_>,
    ) -> (Result<CommandReply>, ResponseCodeCache) {
        let mut stream = BufStream::new(MockStream::new().read(wire));
        let mut codes = ResponseCodeCache::default();
        let reply = read_reply(&mut stream, None, &mut codes, tag, collect, opts);
        (reply, codes)
    }

    #[test]
    fn test_list_triple() {
        let wire = b"* LIST (\\HasNoChildren) \".\" \"INBOX.Sent\"\r\n1 OK List completed\r\n";
        let (reply, _) = reply_for(wire, "1", Some("list"), &opts());
        let reply = reply.unwrap();

        assert_eq!(reply.status, CompletionStatus::Ok);
        let Collected::List(entries) = reply.data else {
            panic!("expected list data");
        };
        assert_eq!(
            entries,
            vec![(
                vec!["\\HasNoChildren".to_string()],
                Some('.'),
                "INBOX.Sent".to_string()
            )]
        );
    }

    #[test]
    fn test_uid_fetch_rekeys_by_uid() {
        let wire = b"* 1 FETCH (UID 1952 FLAGS (\\Recent \\Seen))\r\n\
                     * 2 FETCH (UID 1958 FLAGS (\\Recent))\r\n\
                     1 OK Completed\r\n";
        let (reply, _) = reply_for(wire, "1", Some("fetch"), &opts());
        let Collected::Fetch(map) = reply.unwrap().data else {
            panic!("expected fetch data");
        };

        assert_eq!(map.len(), 2);
        let record = &map[&1952];
        assert_eq!(
            record.flags,
            Some(vec!["\\Recent".to_string(), "\\Seen".to_string()])
        );
        // The inner uid entry is removed once it becomes the key
        assert_eq!(record.uid, None);
        assert!(map.contains_key(&1958));
    }

    #[test]
    fn test_seq_keys_without_uid_mode() {
        let wire = b"* 1 FETCH (UID 1952 FLAGS ())\r\n1 OK Completed\r\n";
        let mut options = opts();
        options.uid_mode = false;
        let (reply, _) = reply_for(wire, "1", Some("fetch"), &options);
        let Collected::Fetch(map) = reply.unwrap().data else {
            panic!("expected fetch data");
        };
        assert!(map.contains_key(&1));
        assert_eq!(map[&1].uid, Some(1952));
    }

    #[test]
    fn test_fetch_literal_consumes_exact_bytes() {
        let wire = b"* 1 FETCH (RFC822.SIZE 11 BODY[TEXT] {5}\r\nHello)\r\n1 OK\r\n";
        let mut options = opts();
        options.uid_mode = false;
        let (reply, _) = reply_for(wire, "1", Some("fetch"), &options);
        let Collected::Fetch(map) = reply.unwrap().data else {
            panic!("expected fetch data");
        };
        assert_eq!(map[&1].size, Some(11));
        assert_eq!(map[&1].body_text().as_deref(), Some("Hello"));
    }

    #[test]
    fn test_exists_recent_cached() {
        let wire = b"* 23 EXISTS\r\n* 2 RECENT\r\n1 OK done\r\n";
        let (reply, codes) = reply_for(wire, "1", None, &opts());
        reply.unwrap();
        assert_eq!(codes.get_u32("exists"), Some(23));
        assert_eq!(codes.get_u32("recent"), Some(2));
    }

    #[test]
    fn test_response_codes_cached() {
        let wire = b"* OK [UIDVALIDITY 1234567890] UIDs valid\r\n\
                     * OK [PERMANENTFLAGS (\\Seen \\*)] limited\r\n\
                     * OK [READ-WRITE] open\r\n\
                     1 OK [UIDNEXT 4392] selected\r\n";
        let (reply, codes) = reply_for(wire, "1", None, &opts());
        reply.unwrap();

        assert_eq!(codes.get_u32("uidvalidity"), Some(1_234_567_890));
        assert_eq!(codes.get_u32("uidnext"), Some(4392));
        assert_eq!(
            codes.get("foldermode").and_then(Atom::as_text),
            Some("read-write")
        );
        let flags = codes.get("permanentflags").unwrap().as_list().unwrap();
        assert_eq!(flags.len(), 2);
    }

    #[test]
    fn test_alert_keeps_human_text() {
        let wire = b"* OK [ALERT] Disk is nearly full\r\n1 OK done\r\n";
        let (reply, codes) = reply_for(wire, "1", None, &opts());
        reply.unwrap();
        assert_eq!(
            codes.get("alert").and_then(Atom::as_text),
            Some("Disk is nearly full")
        );
    }

    #[test]
    fn test_search_ids() {
        let wire = b"* SEARCH 1 2 3 5 8 13\r\n1 OK done\r\n";
        let (reply, _) = reply_for(wire, "1", Some("search"), &opts());
        let Collected::Ids(ids) = reply.unwrap().data else {
            panic!("expected ids");
        };
        assert_eq!(ids, vec![1, 2, 3, 5, 8, 13]);
    }

    #[test]
    fn test_status_line() {
        let wire = b"* STATUS \"INBOX.Sent\" (MESSAGES 42 UNSEEN 3)\r\n1 OK done\r\n";
        let (reply, _) = reply_for(wire, "1", Some("status"), &opts());
        let Collected::Status(entries) = reply.unwrap().data else {
            panic!("expected status");
        };
        assert_eq!(entries[0].0, "INBOX.Sent");
        assert_eq!(entries[0].1["messages"], 42);
        assert_eq!(entries[0].1["unseen"], 3);
    }

    #[test]
    fn test_capability_cached() {
        let wire = b"* CAPABILITY IMAP4rev1 NAMESPACE QUOTA\r\n1 OK done\r\n";
        let (reply, codes) = reply_for(wire, "1", None, &opts());
        reply.unwrap();
        let caps = codes.get("capability").unwrap().as_list().unwrap();
        assert_eq!(caps.len(), 3);
    }

    #[test]
    fn test_bye_outside_logout_is_fatal() {
        let wire = b"* BYE shutting down\r\n";
        let (reply, _) = reply_for(wire, "1", None, &opts());
        assert!(matches!(reply, Err(Error::Bye(_))));
    }

    #[test]
    fn test_bye_during_logout_tolerated() {
        let wire = b"* BYE see you\r\n1 OK logged out\r\n";
        let mut options = opts();
        options.in_logout = true;
        let (reply, _) = reply_for(wire, "1", None, &options);
        assert_eq!(reply.unwrap().status, CompletionStatus::Ok);
    }

    #[test]
    fn test_no_completion() {
        let wire = b"1 NO [TRYCREATE] no such folder\r\n";
        let (reply, codes) = reply_for(wire, "1", None, &opts());
        let reply = reply.unwrap();
        assert_eq!(reply.status, CompletionStatus::No);
        assert!(reply.text.contains("no such folder"));
        assert!(codes.get("trycreate").is_some());
    }

    #[test]
    fn test_unexpected_tag_tolerated_then_pedantic() {
        let wire = b"99 OK stray\r\n1 OK done\r\n";
        let (reply, _) = reply_for(wire, "1", None, &opts());
        assert_eq!(reply.unwrap().status, CompletionStatus::Ok);

        let mut options = opts();
        options.pedantic = true;
        let (reply, _) = reply_for(b"99 OK stray\r\n1 OK done\r\n", "1", None, &options);
        assert!(matches!(reply, Err(Error::Parse { .. })));
    }

    #[test]
    fn test_pedantic_trailing_bytes() {
        let wire = b"* 3 EXISTS junk\r\n1 OK done\r\n";
        let mut options = opts();
        options.pedantic = true;
        let (reply, _) = reply_for(wire, "1", None, &options);
        assert!(matches!(reply, Err(Error::Parse { .. })));
    }

    #[test]
    fn test_greeting_ok_and_preauth() {
        let mut stream =
            BufStream::new(MockStream::new().read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n"));
        let mut codes = ResponseCodeCache::default();
        let greeting = read_greeting(&mut stream, &mut codes).unwrap();
        assert!(matches!(greeting, Greeting::Ok(_)));
        assert!(codes.get("capability").is_some());

        let mut stream = BufStream::new(MockStream::new().read(b"* PREAUTH welcome back\r\n"));
        let greeting = read_greeting(&mut stream, &mut codes).unwrap();
        assert!(matches!(greeting, Greeting::PreAuth(_)));
    }

    #[test]
    fn test_greeting_bye_refused() {
        let mut stream = BufStream::new(MockStream::new().read(b"* BYE overloaded\r\n"));
        let mut codes = ResponseCodeCache::default();
        assert!(matches!(
            read_greeting(&mut stream, &mut codes),
            Err(Error::Bye(_))
        ));
    }

    #[test]
    fn test_thread_collected_generically() {
        let wire = b"* THREAD (2)(3 6 (4 23)(44 7 96))\r\n1 OK done\r\n";
        let (reply, _) = reply_for(wire, "1", Some("thread"), &opts());
        let Collected::Atoms(lines) = reply.unwrap().data else {
            panic!("expected atoms");
        };
        assert_eq!(lines.len(), 1);
        let line = lines[0].as_list().unwrap();
        assert_eq!(line[0], Atom::Text("thread".into()));
    }

    #[test]
    fn test_quota_family_collected_together() {
        let wire = b"* QUOTAROOT INBOX \"\"\r\n* QUOTA \"\" (STORAGE 10 512)\r\n1 OK done\r\n";
        let (reply, _) = reply_for(wire, "1", Some("quota"), &opts());
        let Collected::Atoms(lines) = reply.unwrap().data else {
            panic!("expected atoms");
        };
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].as_list().unwrap()[0], Atom::Text("quotaroot".into()));
        assert_eq!(lines[1].as_list().unwrap()[0], Atom::Text("quota".into()));
    }
}
