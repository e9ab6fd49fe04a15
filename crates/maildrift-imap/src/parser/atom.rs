//! The parsed value type of the response grammar.

use std::fmt;

/// One parsed IMAP value.
///
/// A closed sum over the shapes the response grammar can produce: the NIL
/// atom, text (bare atoms and quoted strings with escapes resolved),
/// in-memory literal payloads, parenthesized lists, and literals that were
/// streamed to the registered literal sink instead of being accumulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// The `NIL` atom.
    Nil,
    /// A bare atom or quoted string.
    Text(String),
    /// An in-memory literal payload.
    Bytes(Vec<u8>),
    /// An ordered, possibly nested list.
    List(Vec<Atom>),
    /// A literal of this many bytes, already delivered to the literal sink.
    Streamed(u64),
}

impl Atom {
    /// Returns true for the NIL atom.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Borrows the text of a `Text` atom.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows the elements of a `List` atom.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Atom]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Parses a `Text` atom as a decimal number.
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        self.as_text().and_then(|s| s.parse().ok())
    }

    /// Converts text or literal payloads into a string, lossily for
    /// non-UTF-8 literal bytes. `Nil`, lists, and streamed literals yield
    /// `None`.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bytes(b) => Some(String::from_utf8_lossy(&b).into_owned()),
            _ => None,
        }
    }

    /// Converts a `List` atom into its elements.
    #[must_use]
    pub fn into_list(self) -> Option<Vec<Atom>> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "NIL"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Self::Streamed(n) => write!(f, "<{n} bytes>"),
            Self::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert!(Atom::Nil.is_nil());
        assert_eq!(Atom::Text("42".into()).as_u32(), Some(42));
        assert_eq!(Atom::Text("abc".into()).as_u32(), None);
        assert_eq!(Atom::Bytes(b"hi".to_vec()).into_text().unwrap(), "hi");
        assert!(Atom::List(vec![]).into_text().is_none());
    }

    #[test]
    fn test_display_nested() {
        let atom = Atom::List(vec![
            Atom::Text("a".into()),
            Atom::List(vec![Atom::Nil, Atom::Text("b".into())]),
        ]);
        assert_eq!(atom.to_string(), "(a (NIL b))");
    }
}
