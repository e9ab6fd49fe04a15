//! FETCH result reshaping.
//!
//! Converts the raw atom list inside `* <n> FETCH (…)` into a
//! [`FetchRecord`]: flags and scalars extracted, ENVELOPE decoded into an
//! [`Envelope`] record, BODYSTRUCTURE decoded into a [`BodyPart`] tree with
//! part numbers assigned, and `BODY[HEADER…]` payloads additionally parsed
//! into a header map.

use std::collections::BTreeMap;

use super::atom::Atom;
use crate::types::{HeaderDecoder, HeaderMap, ParseFlags};
use crate::{Error, Result};

/// Reshaping options, threaded down from the session.
pub(crate) struct ReshapeContext<'a> {
    pub flags: ParseFlags,
    pub decoder: Option<&'a dyn HeaderDecoder>,
}

impl ReshapeContext<'_> {
    /// Applies the header decoder when the parse mode asks for it and the
    /// field actually contains an encoded word.
    fn decode_field(&self, field: String) -> String {
        if self.flags.decode_header_words && field.contains("=?") {
            if let Some(decoder) = self.decoder {
                return decoder.decode(&field);
            }
        }
        field
    }
}

/// One message's FETCH results, keyed in the outer map by sequence number
/// or UID.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchRecord {
    /// Message flags.
    pub flags: Option<Vec<String>>,
    /// UID, when the server reported one and UID-mode rekeying has not
    /// consumed it.
    pub uid: Option<u32>,
    /// INTERNALDATE string as sent by the server.
    pub internaldate: Option<String>,
    /// RFC822.SIZE value.
    pub size: Option<u32>,
    /// Reshaped envelope (when envelope parsing is on).
    pub envelope: Option<Envelope>,
    /// Reshaped body structure (when bodystructure parsing is on).
    pub bodystructure: Option<BodyPart>,
    /// Payload of a `BODY[<section>]` fetch.
    pub body: Option<Atom>,
    /// The `<section>` of the `BODY[<section>]` fetch, brackets stripped.
    pub body_section: Option<String>,
    /// Parsed headers, when the fetched section was `HEADER` or
    /// `HEADER.FIELDS (…)`.
    pub headers: Option<HeaderMap>,
    /// Any other item, keyed by its lowercased name.
    pub extra: BTreeMap<String, Atom>,
}

impl FetchRecord {
    /// The `BODY[…]` payload as text, if one was fetched in memory.
    #[must_use]
    pub fn body_text(&self) -> Option<String> {
        self.body.clone().and_then(Atom::into_text)
    }
}

/// A reshaped ENVELOPE.
///
/// Address fields hold display strings (`"Name" <box@host>` joined with
/// `, `); the `*_raw` fields keep the original 4-tuples when raw addresses
/// are requested.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Date header string.
    pub date: Option<String>,
    /// Subject, header-word-decoded when that parse mode is on.
    pub subject: Option<String>,
    /// From addresses, formatted. Empty string when absent.
    pub from: String,
    /// Sender addresses, formatted.
    pub sender: String,
    /// Reply-To addresses, formatted.
    pub reply_to: String,
    /// To addresses, formatted.
    pub to: String,
    /// Cc addresses, formatted.
    pub cc: String,
    /// Bcc addresses, formatted.
    pub bcc: String,
    /// In-Reply-To message id.
    pub in_reply_to: Option<String>,
    /// Message-ID.
    pub message_id: Option<String>,
    /// Raw From 4-tuples, when requested.
    pub from_raw: Option<Vec<RawAddress>>,
    /// Raw Sender 4-tuples, when requested.
    pub sender_raw: Option<Vec<RawAddress>>,
    /// Raw Reply-To 4-tuples, when requested.
    pub reply_to_raw: Option<Vec<RawAddress>>,
    /// Raw To 4-tuples, when requested.
    pub to_raw: Option<Vec<RawAddress>>,
    /// Raw Cc 4-tuples, when requested.
    pub cc_raw: Option<Vec<RawAddress>>,
    /// Raw Bcc 4-tuples, when requested.
    pub bcc_raw: Option<Vec<RawAddress>>,
}

/// One unformatted address 4-tuple.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawAddress {
    /// Display name.
    pub name: Option<String>,
    /// Source route (rarely used).
    pub route: Option<String>,
    /// Mailbox (local part).
    pub mailbox: Option<String>,
    /// Host.
    pub host: Option<String>,
}

/// Content-Disposition of a body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    /// Disposition token, lowercased (`inline`, `attachment`, …).
    pub kind: String,
    /// Disposition parameters, keys lowercased.
    pub params: BTreeMap<String, String>,
}

/// The embedded message of a `message/rfc822` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody {
    /// Envelope of the embedded message.
    pub envelope: Envelope,
    /// Body structure of the embedded message.
    pub body: BodyPart,
    /// Line count of the embedded message, when reported.
    pub lines: Option<u32>,
}

/// One node of a reshaped BODYSTRUCTURE.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// Dotted part address usable with `BODY[<n>]` (empty for a top-level
    /// multipart).
    pub part_number: String,
    /// `type/subtype`, lowercased.
    pub mime_type: String,
    /// Major type (`multipart` for multiparts).
    pub kind: String,
    /// Subtype, lowercased.
    pub subtype: String,
    /// Content-Type parameters, keys lowercased.
    pub params: BTreeMap<String, String>,
    /// Content-ID, as sent (angle brackets kept).
    pub content_id: Option<String>,
    /// Content-Description.
    pub description: Option<String>,
    /// Content-Transfer-Encoding.
    pub encoding: Option<String>,
    /// Size in bytes (leaves only).
    pub size: Option<u32>,
    /// Line count (text leaves only).
    pub lines: Option<u32>,
    /// Content-MD5.
    pub md5: Option<String>,
    /// Content-Disposition, one recursion level deep.
    pub disposition: Option<Disposition>,
    /// Content-Language (atom or list, preserved).
    pub language: Option<Atom>,
    /// Sub-parts of a multipart.
    pub subparts: Vec<BodyPart>,
    /// Embedded message of a `message/rfc822` part.
    pub message: Option<Box<MessageBody>>,
    /// Unconsumed trailing extension data.
    pub extra: Vec<Atom>,
}

impl BodyPart {
    /// Returns true for multipart containers.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.kind == "multipart"
    }

    /// Returns true when the disposition marks this part as an attachment,
    /// or as inline with a filename.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        match &self.disposition {
            Some(d) if d.kind == "attachment" => true,
            Some(d) if d.kind == "inline" => d.params.contains_key("filename"),
            _ => false,
        }
    }
}

/// Reshapes the atoms inside `FETCH (…)` into a record.
///
/// Pairs are read as (lowercased key, value). `BODY[…]` keys that the
/// tokenizer split across atoms (a `HEADER.FIELDS` list breaks the bracket
/// run) are reassembled before the value is read.
pub(crate) fn reshape_fetch(items: Vec<Atom>, ctx: &ReshapeContext<'_>) -> Result<FetchRecord> {
    let mut record = FetchRecord::default();
    let mut iter = items.into_iter();

    while let Some(key_atom) = iter.next() {
        let Some(key_text) = key_atom.into_text() else {
            return Err(Error::parse(0, "FETCH item name is not text"));
        };
        let key = key_text.to_lowercase();

        if key.starts_with("body[") {
            // Slice the original text so the section keeps the server's
            // case; the trailing partial-fetch origin (`<0>`) is dropped
            let (section, _origin) = reassemble_section(&key_text["body[".len()..], &mut iter)?;
            let value = iter
                .next()
                .ok_or_else(|| Error::parse(0, "BODY section without a value"))?;

            let upper = section.to_uppercase();
            if upper == "HEADER" || upper.starts_with("HEADER.FIELDS") {
                if let Atom::Bytes(ref bytes) = value {
                    record.headers = Some(parse_headers(bytes));
                } else if let Atom::Text(ref text) = value {
                    record.headers = Some(parse_headers(text.as_bytes()));
                }
            }

            record.body_section = Some(section);
            record.body = Some(value);
            continue;
        }

        let value = iter
            .next()
            .ok_or_else(|| Error::parse(0, format!("FETCH item {key} without a value")))?;

        match key.as_str() {
            "flags" => {
                let list = value.into_list().unwrap_or_default();
                record.flags = Some(list.into_iter().filter_map(Atom::into_text).collect());
            }
            "uid" => record.uid = value.as_u32(),
            "internaldate" => record.internaldate = value.into_text(),
            "rfc822.size" => record.size = value.as_u32(),
            "envelope" => {
                if ctx.flags.parse_envelope {
                    let list = value
                        .into_list()
                        .ok_or_else(|| Error::parse(0, "ENVELOPE is not a list"))?;
                    record.envelope = Some(reshape_envelope(list, ctx));
                } else {
                    record.extra.insert(key, value);
                }
            }
            "bodystructure" | "body" => {
                if ctx.flags.parse_bodystructure {
                    let list = value
                        .into_list()
                        .ok_or_else(|| Error::parse(0, "BODYSTRUCTURE is not a list"))?;
                    record.bodystructure = Some(reshape_structure(list, "1", "", ctx)?);
                } else {
                    record.extra.insert(key, value);
                }
            }
            _ => {
                record.extra.insert(key, value);
            }
        }
    }

    Ok(record)
}

/// Rebuilds a `BODY[…]` section name the tokenizer split at a nested list.
///
/// Returns the section text (brackets stripped) and any trailing key text
/// after the closing bracket (a partial-fetch origin like `<0>`).
fn reassemble_section(
    opening: &str,
    iter: &mut std::vec::IntoIter<Atom>,
) -> Result<(String, String)> {
    if let Some(end) = opening.find(']') {
        return Ok((opening[..end].to_string(), opening[end + 1..].to_string()));
    }

    let mut section = opening.to_string();
    loop {
        match iter.next() {
            Some(Atom::List(items)) => {
                section.push(' ');
                section.push_str(&Atom::List(items).to_string());
            }
            Some(Atom::Text(text)) => {
                if let Some(end) = text.find(']') {
                    section.push_str(&text[..end]);
                    return Ok((section, text[end + 1..].to_string()));
                }
                section.push_str(&text);
            }
            Some(_) | None => {
                return Err(Error::parse(0, "unterminated BODY section name"));
            }
        }
    }
}

/// Parses a raw header block into a map from lowercase header name to the
/// ordered list of its field bodies. Continuation lines (leading WSP)
/// append to the previous value with the CRLF preserved.
pub(crate) fn parse_headers(raw: &[u8]) -> HeaderMap {
    let text = String::from_utf8_lossy(raw);
    let mut headers = HeaderMap::new();
    let mut current: Option<(String, String)> = None;

    for line in text.split("\r\n") {
        if line.is_empty() {
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = current.as_mut() {
                value.push_str("\r\n");
                value.push_str(line);
            }
            continue;
        }

        if let Some((name, value)) = current.take() {
            headers.entry(name).or_default().push(value);
        }

        if let Some((name, value)) = line.split_once(':') {
            current = Some((
                name.trim().to_lowercase(),
                value.strip_prefix(' ').unwrap_or(value).to_string(),
            ));
        }
    }

    if let Some((name, value)) = current {
        headers.entry(name).or_default().push(value);
    }

    headers
}

/// Reshapes the 10-tuple ENVELOPE list.
pub(crate) fn reshape_envelope(items: Vec<Atom>, ctx: &ReshapeContext<'_>) -> Envelope {
    let mut fields = items.into_iter();
    let mut next = || fields.next().unwrap_or(Atom::Nil);

    let date = next().into_text();
    let subject = next().into_text().map(|s| ctx.decode_field(s));

    let (from, from_raw) = reshape_addresses(next(), ctx);
    let (sender, sender_raw) = reshape_addresses(next(), ctx);
    let (reply_to, reply_to_raw) = reshape_addresses(next(), ctx);
    let (to, to_raw) = reshape_addresses(next(), ctx);
    let (cc, cc_raw) = reshape_addresses(next(), ctx);
    let (bcc, bcc_raw) = reshape_addresses(next(), ctx);

    let in_reply_to = next().into_text();
    let message_id = next().into_text();

    Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
        from_raw,
        sender_raw,
        reply_to_raw,
        to_raw,
        cc_raw,
        bcc_raw,
    }
}

/// Formats an address list atom; returns the display string and, when raw
/// addresses are requested, the original 4-tuples.
fn reshape_addresses(
    atom: Atom,
    ctx: &ReshapeContext<'_>,
) -> (String, Option<Vec<RawAddress>>) {
    let Some(groups) = atom.into_list() else {
        // NIL: absent field formats as the empty string
        let raw = ctx.flags.include_raw_addresses.then(Vec::new);
        return (String::new(), raw);
    };

    let mut formatted = Vec::new();
    let mut raw = Vec::new();

    for entry in groups {
        let Some(tuple) = entry.into_list() else {
            continue;
        };
        let mut fields = tuple.into_iter();
        let address = RawAddress {
            name: fields.next().and_then(Atom::into_text),
            route: fields.next().and_then(Atom::into_text),
            mailbox: fields.next().and_then(Atom::into_text),
            host: fields.next().and_then(Atom::into_text),
        };

        formatted.push(format_address(&address, ctx));
        raw.push(address);
    }

    (
        formatted.join(", "),
        ctx.flags.include_raw_addresses.then_some(raw),
    )
}

/// `"Display" <mailbox@host>`; display and angle brackets are omitted when
/// the display name is null.
fn format_address(address: &RawAddress, ctx: &ReshapeContext<'_>) -> String {
    let mailbox = address.mailbox.as_deref().unwrap_or("");
    let spec = match address.host.as_deref() {
        Some(host) => format!("{mailbox}@{host}"),
        None => mailbox.to_string(),
    };

    match address.name.as_deref() {
        Some(name) => {
            let name = ctx.decode_field(name.to_string());
            format!("\"{name}\" <{spec}>")
        }
        None => spec,
    }
}

/// Reshapes a BODYSTRUCTURE list into a part tree.
///
/// `leaf_number` is the part address this node takes if it turns out to be
/// a leaf; `multi_number` the address if it is a multipart (the top level
/// uses `"1"` / `""`, an embedded message `P.1` / `P`).
pub(crate) fn reshape_structure(
    items: Vec<Atom>,
    leaf_number: &str,
    multi_number: &str,
    ctx: &ReshapeContext<'_>,
) -> Result<BodyPart> {
    if matches!(items.first(), Some(Atom::List(_))) {
        reshape_multipart(items, multi_number, ctx)
    } else {
        reshape_leaf(items, leaf_number, ctx)
    }
}

fn reshape_multipart(
    items: Vec<Atom>,
    number: &str,
    ctx: &ReshapeContext<'_>,
) -> Result<BodyPart> {
    let mut part = BodyPart {
        part_number: number.to_string(),
        kind: "multipart".to_string(),
        ..BodyPart::default()
    };

    let mut iter = items.into_iter().peekable();

    // Leading lists are the sub-parts, numbered 1, 2, … under this node
    let mut index = 0;
    while matches!(iter.peek(), Some(Atom::List(_))) {
        index += 1;
        let child_number = if number.is_empty() {
            index.to_string()
        } else {
            format!("{number}.{index}")
        };
        let Some(Atom::List(child)) = iter.next() else {
            unreachable!("peeked a list");
        };
        part.subparts
            .push(reshape_structure(child, &child_number, &child_number, ctx)?);
    }

    part.subtype = iter
        .next()
        .and_then(Atom::into_text)
        .unwrap_or_default()
        .to_lowercase();
    part.mime_type = format!("multipart/{}", part.subtype);

    part.params = pair_map(iter.next());
    part.disposition = disposition(iter.next());
    part.language = iter.next().filter(|a| !a.is_nil());
    part.extra = iter.collect();

    Ok(part)
}

fn reshape_leaf(items: Vec<Atom>, number: &str, ctx: &ReshapeContext<'_>) -> Result<BodyPart> {
    let mut iter = items.into_iter();

    let kind = iter
        .next()
        .and_then(Atom::into_text)
        .unwrap_or_default()
        .to_lowercase();
    let subtype = iter
        .next()
        .and_then(Atom::into_text)
        .unwrap_or_default()
        .to_lowercase();

    let mut part = BodyPart {
        part_number: number.to_string(),
        mime_type: format!("{kind}/{subtype}"),
        kind,
        subtype,
        params: pair_map(iter.next()),
        content_id: iter.next().and_then(Atom::into_text),
        description: iter.next().and_then(Atom::into_text),
        encoding: iter.next().and_then(Atom::into_text),
        size: iter.next().and_then(|a| a.as_u32()),
        ..BodyPart::default()
    };

    if part.kind == "text" {
        part.lines = iter.next().and_then(|a| a.as_u32());
    } else if part.mime_type == "message/rfc822" {
        // (envelope bodystructure lines): the embedded message's body hangs
        // off this part's number, gaining ".1" unless it is a multipart
        let envelope = iter
            .next()
            .and_then(Atom::into_list)
            .map(|list| reshape_envelope(list, ctx));
        let body = iter.next().and_then(Atom::into_list);
        let lines = iter.next().and_then(|a| a.as_u32());

        if let (Some(envelope), Some(body)) = (envelope, body) {
            let embedded_leaf = format!("{number}.1");
            let body = reshape_structure(body, &embedded_leaf, number, ctx)?;
            part.message = Some(Box::new(MessageBody {
                envelope,
                body,
                lines,
            }));
        }
    }

    part.md5 = iter.next().and_then(Atom::into_text);
    part.disposition = disposition(iter.next());
    part.language = iter.next().filter(|a| !a.is_nil());
    part.extra = iter.collect();

    Ok(part)
}

/// Alternating key/value list → map with lowercased keys.
fn pair_map(atom: Option<Atom>) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    let Some(items) = atom.and_then(Atom::into_list) else {
        return map;
    };

    let mut iter = items.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        if let (Some(key), Some(value)) = (key.into_text(), value.into_text()) {
            map.insert(key.to_lowercase(), value);
        }
    }
    map
}

/// `(TOKEN (pairs))` → a [`Disposition`], one recursion level deep.
fn disposition(atom: Option<Atom>) -> Option<Disposition> {
    let items = atom.and_then(Atom::into_list)?;
    let mut iter = items.into_iter();

    let kind = iter.next().and_then(Atom::into_text)?.to_lowercase();
    let params = pair_map(iter.next());

    Some(Disposition { kind, params })
}
