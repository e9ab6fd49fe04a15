//! Decoding of MIME transfer encodings and RFC 2047 encoded words.
//!
//! Header fields may interleave plain text with any number of
//! `=?charset?enc?text?=` words; [`decode_header_words`] scans a whole
//! field and decodes every word in place. Base64 and Quoted-Printable
//! decoding back the `B` and `Q` word encodings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, Result};

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045) to raw bytes.
///
/// # Errors
///
/// Returns an error if the input contains an invalid escape sequence.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '=' {
            // Soft line break: =\r\n or =\n
            if chars.peek() == Some(&'\r') {
                chars.next();
                if chars.peek() == Some(&'\n') {
                    chars.next();
                    continue;
                }
            } else if chars.peek() == Some(&'\n') {
                chars.next();
                continue;
            }

            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                result.push(byte);
            } else {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        } else {
            let mut buf = [0u8; 4];
            result.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
    }

    Ok(result)
}

/// Decodes a header field containing RFC 2047 encoded words.
///
/// Plain text between words is preserved. Whitespace between two adjacent
/// encoded words is dropped per RFC 2047 §6.2. A malformed word is left in
/// the output verbatim rather than failing the whole field.
#[must_use]
pub fn decode_header_words(field: &str) -> String {
    let mut out = String::new();
    let mut rest = field;
    let mut last_was_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, from_word) = rest.split_at(start);

        match split_encoded_word(from_word) {
            Some((word, tail)) => {
                // Whitespace between adjacent encoded words is transparent
                if !(last_was_word && before.chars().all(char::is_whitespace)) {
                    out.push_str(before);
                }

                match decode_encoded_word(word) {
                    Ok(decoded) => out.push_str(&decoded),
                    Err(_) => out.push_str(word),
                }
                last_was_word = true;
                rest = tail;
            }
            None => {
                // "=?" without a closing "?=": not a word, emit as-is
                out.push_str(before);
                out.push_str("=?");
                last_was_word = false;
                rest = &from_word[2..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Splits the leading `=?charset?enc?text?=` word off `input`.
///
/// `input` must start with `=?`. Returns the word and the remainder.
fn split_encoded_word(input: &str) -> Option<(&str, &str)> {
    debug_assert!(input.starts_with("=?"));

    // =? charset ? enc ? text ?=
    let body = &input[2..];
    let q1 = body.find('?')?;
    let q2 = body[q1 + 1..].find('?')? + q1 + 1;
    let end = body[q2 + 1..].find("?=")? + q2 + 1;

    let word_len = 2 + end + 2;
    Some(input.split_at(word_len))
}

/// Decodes a single `=?charset?enc?text?=` word.
///
/// # Errors
///
/// Returns an error if the word is structurally invalid, uses an unknown
/// transfer encoding, or the payload fails to decode.
pub fn decode_encoded_word(word: &str) -> Result<String> {
    let inner = word
        .strip_prefix("=?")
        .and_then(|w| w.strip_suffix("?="))
        .ok_or_else(|| Error::InvalidEncoding("Not an encoded word".to_string()))?;

    let mut parts = inner.splitn(3, '?');
    let charset = parts
        .next()
        .ok_or_else(|| Error::InvalidEncoding("Missing charset".to_string()))?;
    let encoding = parts
        .next()
        .ok_or_else(|| Error::InvalidEncoding("Missing encoding".to_string()))?;
    let payload = parts
        .next()
        .ok_or_else(|| Error::InvalidEncoding("Missing payload".to_string()))?;

    let bytes = match encoding {
        "B" | "b" => decode_base64(payload)?,
        "Q" | "q" => {
            // Q encoding writes spaces as underscores
            let unescaped = payload.replace('_', " ");
            decode_quoted_printable(&unescaped)?
        }
        other => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoding: {other}"
            )));
        }
    };

    decode_charset(charset, &bytes)
}

/// Converts decoded bytes to a string according to `charset`.
///
/// Language tags (`charset*lang`, RFC 2231) are stripped before matching.
fn decode_charset(charset: &str, bytes: &[u8]) -> Result<String> {
    let name = charset.split('*').next().unwrap_or(charset);

    if name.eq_ignore_ascii_case("utf-8") || name.eq_ignore_ascii_case("us-ascii") {
        String::from_utf8(bytes.to_vec()).map_err(Into::into)
    } else if name.eq_ignore_ascii_case("iso-8859-1") || name.eq_ignore_ascii_case("latin1") {
        Ok(bytes.iter().map(|&b| char::from(b)).collect())
    } else {
        // Unknown charset: degrade to lossy UTF-8 rather than dropping the
        // field; callers that need exact conversion inject their own decoder.
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_decode() {
        let decoded = decode_base64("SGVsbG8sIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_invalid() {
        assert!(decode_base64("not*base64").is_err());
    }

    #[test]
    fn test_quoted_printable_decode() {
        let decoded = decode_quoted_printable("H=C3=A9llo").unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "Héllo");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        let decoded = decode_quoted_printable("Hello=\r\nWorld").unwrap();
        assert_eq!(decoded, b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_invalid_escape() {
        assert!(decode_quoted_printable("bad=Z9").is_err());
        assert!(decode_quoted_printable("truncated=A").is_err());
    }

    #[test]
    fn test_decode_single_word_base64() {
        let decoded = decode_encoded_word("=?utf-8?B?SMOpbGxv?=").unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_decode_single_word_q() {
        let decoded = decode_encoded_word("=?utf-8?Q?Caf=C3=A9_au_lait?=").unwrap();
        assert_eq!(decoded, "Café au lait");
    }

    #[test]
    fn test_decode_latin1() {
        let decoded = decode_encoded_word("=?iso-8859-1?Q?caf=E9?=").unwrap();
        assert_eq!(decoded, "café");
    }

    #[test]
    fn test_decode_unknown_transfer_encoding() {
        assert!(decode_encoded_word("=?utf-8?X?abc?=").is_err());
    }

    #[test]
    fn test_decode_header_words_mixed() {
        let field = "Re: =?utf-8?Q?caf=C3=A9?= meeting";
        assert_eq!(decode_header_words(field), "Re: café meeting");
    }

    #[test]
    fn test_decode_header_words_adjacent_fold() {
        // Whitespace between two encoded words is dropped
        let field = "=?utf-8?Q?Hello?= =?utf-8?Q?_World?=";
        assert_eq!(decode_header_words(field), "Hello World");
    }

    #[test]
    fn test_decode_header_words_plain_passthrough() {
        assert_eq!(decode_header_words("plain subject"), "plain subject");
    }

    #[test]
    fn test_decode_header_words_malformed_left_verbatim() {
        assert_eq!(decode_header_words("=?broken"), "=?broken");
        assert_eq!(
            decode_header_words("=?utf-8?X?abc?="),
            "=?utf-8?X?abc?="
        );
    }

    #[test]
    fn test_decode_header_words_unknown_charset_lossy() {
        let field = "=?koi8-r?Q?abc?=";
        assert_eq!(decode_header_words(field), "abc");
    }
}
