//! Core shared types: connection states, completion statuses, parse-mode
//! flags, and the structured results of folder-level commands.

use std::collections::BTreeMap;

/// Connection state of a session.
///
/// Transitions follow the IMAP state diagram: Unconnected → Connected (via
/// greeting) → Authenticated (LOGIN) → Selected (SELECT/EXAMINE) →
/// Authenticated (CLOSE/UNSELECT) → Unconnected (LOGOUT or fatal I/O).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable stream, or the peer is gone.
    Unconnected,
    /// Greeting consumed, not yet authenticated.
    Connected,
    /// Logged in, no folder selected.
    Authenticated,
    /// A folder is selected.
    Selected,
}

impl SessionState {
    /// Returns true if the state permits commands that need authentication.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected)
    }
}

/// Completion status of a tagged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Command succeeded.
    Ok,
    /// Command failed for an operational reason.
    No,
    /// Command was malformed or inappropriate.
    Bad,
    /// Server is closing the connection (only legal during LOGOUT).
    Bye,
}

impl CompletionStatus {
    /// Parses a completion keyword, case-insensitively.
    #[must_use]
    pub fn from_keyword(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("OK") {
            Some(Self::Ok)
        } else if word.eq_ignore_ascii_case("NO") {
            Some(Self::No)
        } else if word.eq_ignore_ascii_case("BAD") {
            Some(Self::Bad)
        } else if word.eq_ignore_ascii_case("BYE") {
            Some(Self::Bye)
        } else {
            None
        }
    }
}

/// Parse-mode flags controlling how FETCH results are reshaped.
#[derive(Debug, Clone, Copy)]
pub struct ParseFlags {
    /// Reshape ENVELOPE lists into [`crate::parser::Envelope`] records.
    pub parse_envelope: bool,
    /// Reshape BODYSTRUCTURE lists into [`crate::parser::BodyPart`] trees.
    pub parse_bodystructure: bool,
    /// Keep the raw 4-tuple address lists alongside the formatted strings.
    pub include_raw_addresses: bool,
    /// Decode RFC 2047 encoded words in envelope fields via the injected
    /// header decoder.
    pub decode_header_words: bool,
}

impl Default for ParseFlags {
    fn default() -> Self {
        Self {
            parse_envelope: true,
            parse_bodystructure: true,
            include_raw_addresses: false,
            decode_header_words: false,
        }
    }
}

/// One `* LIST`/`* LSUB` result with the root-folder prefix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Name attributes, e.g. `\HasNoChildren`.
    pub attributes: Vec<String>,
    /// Hierarchy delimiter, if the server reported one.
    pub delimiter: Option<char>,
    /// Folder name, prefix-stripped.
    pub name: String,
}

/// One `* STATUS` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Folder name as reported by the server, prefix-stripped.
    pub name: String,
    /// Lowercased item name → value, e.g. `messages`, `uidnext`.
    pub items: BTreeMap<String, u32>,
}

/// Side-channel data accumulated while a folder was selected.
///
/// Assembled from the response-code cache after SELECT/EXAMINE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderSummary {
    /// Message count.
    pub exists: u32,
    /// Recent count.
    pub recent: u32,
    /// UIDVALIDITY value, if reported.
    pub uidvalidity: Option<u32>,
    /// Predicted next UID, if reported.
    pub uidnext: Option<u32>,
    /// First unseen sequence number, if reported.
    pub unseen: Option<u32>,
    /// Applicable flags.
    pub flags: Vec<String>,
    /// Permanently settable flags.
    pub permanent_flags: Vec<String>,
    /// True when the folder was opened read-only (EXAMINE, or the server
    /// reported READ-ONLY).
    pub read_only: bool,
}

/// Map from lowercase header name to the ordered list of its field bodies.
pub type HeaderMap = BTreeMap<String, Vec<String>>;

/// Decodes RFC 2047 encoded words in a header field.
///
/// The session never decodes header words itself; when
/// [`ParseFlags::decode_header_words`] is on, envelope fields are passed
/// through the injected decoder. [`MimeWordDecoder`] adapts the
/// `maildrift-mime` implementation; callers with charset needs beyond it can
/// implement the trait themselves.
pub trait HeaderDecoder: Send {
    /// Returns the field with every encoded word decoded.
    fn decode(&self, field: &str) -> String;
}

/// [`HeaderDecoder`] backed by `maildrift-mime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MimeWordDecoder;

impl HeaderDecoder for MimeWordDecoder {
    fn decode(&self, field: &str) -> String {
        maildrift_mime::decode_header_words(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_keyword() {
        assert_eq!(
            CompletionStatus::from_keyword("ok"),
            Some(CompletionStatus::Ok)
        );
        assert_eq!(
            CompletionStatus::from_keyword("BYE"),
            Some(CompletionStatus::Bye)
        );
        assert_eq!(CompletionStatus::from_keyword("MAYBE"), None);
    }

    #[test]
    fn test_state_predicates() {
        assert!(SessionState::Selected.is_authenticated());
        assert!(SessionState::Authenticated.is_authenticated());
        assert!(!SessionState::Connected.is_authenticated());
    }

    #[test]
    fn test_parse_flag_defaults() {
        let flags = ParseFlags::default();
        assert!(flags.parse_envelope);
        assert!(flags.parse_bodystructure);
        assert!(!flags.include_raw_addresses);
        assert!(!flags.decode_header_words);
    }
}
