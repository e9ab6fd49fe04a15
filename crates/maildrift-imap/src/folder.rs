//! Root-folder prefix rewriting.
//!
//! Servers that expose mail under a namespace prefix (commonly `INBOX.`)
//! expect client-supplied folder names inside it. The rewriter prepends the
//! configured root to names outside the namespace and strips it from names
//! the server reports, so callers only ever see unprefixed names.

use regex::{Regex, RegexBuilder};

use crate::{Error, Result};

/// Applies the root-folder prefix rules to folder names.
///
/// Two matchers are compiled per configuration change: one recognizing names
/// already inside the root (or alt-root) namespace, one recognizing the
/// strippable `root+sep` prefix on server-reported names.
#[derive(Debug, Clone)]
pub struct FolderRewriter {
    root: String,
    separator: char,
    alt_root: Option<String>,
    case_insensitive: bool,
    inside_root: Option<Regex>,
    strippable: Option<Regex>,
}

impl Default for FolderRewriter {
    fn default() -> Self {
        Self {
            root: String::new(),
            separator: '/',
            alt_root: None,
            case_insensitive: false,
            inside_root: None,
            strippable: None,
        }
    }
}

impl FolderRewriter {
    /// Creates a rewriter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the derived matchers fail to
    /// compile.
    pub fn new(
        root: impl Into<String>,
        separator: char,
        alt_root: Option<String>,
        case_insensitive: bool,
    ) -> Result<Self> {
        let mut rewriter = Self {
            root: root.into(),
            separator,
            alt_root,
            case_insensitive,
            inside_root: None,
            strippable: None,
        };
        rewriter.rebuild()?;
        Ok(rewriter)
    }

    /// The configured hierarchy separator.
    #[must_use]
    pub const fn separator(&self) -> char {
        self.separator
    }

    /// The configured root prefix.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Adopts the separator a LIST response reported, regenerating the
    /// matchers when it differs.
    ///
    /// # Errors
    ///
    /// Matcher compilation errors, as in [`FolderRewriter::new`].
    pub fn adopt_separator(&mut self, separator: char) -> Result<()> {
        if separator != self.separator {
            self.separator = separator;
            self.rebuild()?;
        }
        Ok(())
    }

    /// Prefixes `name` with the root unless it is already inside the
    /// namespace. Names containing wildcards pass through untouched.
    #[must_use]
    pub fn rewrite(&self, name: &str) -> String {
        if self.root.is_empty() {
            return name.to_string();
        }
        if name.contains('%') || name.contains('*') {
            return name.to_string();
        }
        if let Some(matcher) = &self.inside_root {
            if matcher.is_match(name) {
                return name.to_string();
            }
        }
        format!("{}{}{}", self.root, self.separator, name)
    }

    /// Strips a leading `root+sep` from a server-reported name.
    #[must_use]
    pub fn strip(&self, name: &str) -> String {
        if let Some(matcher) = &self.strippable {
            if let Some(found) = matcher.find(name) {
                return name[found.end()..].to_string();
            }
        }
        name.to_string()
    }

    fn rebuild(&mut self) -> Result<()> {
        if self.root.is_empty() {
            self.inside_root = None;
            self.strippable = None;
            return Ok(());
        }

        let root = regex::escape(&self.root);
        let sep = regex::escape(&self.separator.to_string());

        let mut inside = format!("^{root}(?:{sep}.*)?$");
        if let Some(alt) = &self.alt_root {
            let alt = regex::escape(alt);
            inside = format!("^(?:{root}|{alt})(?:{sep}.*)?$");
        }

        self.inside_root = Some(compile(&inside, self.case_insensitive)?);
        self.strippable = Some(compile(&format!("^{root}{sep}"), self.case_insensitive)?);
        Ok(())
    }
}

fn compile(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| Error::InvalidArgument(format!("bad folder matcher: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rewriter() -> FolderRewriter {
        FolderRewriter::new("INBOX", '.', Some("user".to_string()), true).unwrap()
    }

    #[test]
    fn test_root_itself_unchanged() {
        assert_eq!(rewriter().rewrite("INBOX"), "INBOX");
    }

    #[test]
    fn test_plain_name_prefixed() {
        assert_eq!(rewriter().rewrite("Sent"), "INBOX.Sent");
    }

    #[test]
    fn test_case_insensitive_match() {
        assert_eq!(rewriter().rewrite("inbox.Drafts"), "inbox.Drafts");
    }

    #[test]
    fn test_alt_root_unchanged() {
        assert_eq!(rewriter().rewrite("user.alice"), "user.alice");
        assert_eq!(rewriter().rewrite("user"), "user");
    }

    #[test]
    fn test_wildcards_pass_through() {
        assert_eq!(rewriter().rewrite("*"), "*");
        assert_eq!(rewriter().rewrite("Archive.%"), "Archive.%");
    }

    #[test]
    fn test_idempotent() {
        let rewriter = rewriter();
        for name in ["INBOX", "Sent", "user.bob", "a.b.c"] {
            let once = rewriter.rewrite(name);
            assert_eq!(rewriter.rewrite(&once), once);
        }
    }

    #[test]
    fn test_empty_root_is_identity() {
        let rewriter = FolderRewriter::default();
        assert_eq!(rewriter.rewrite("Sent"), "Sent");
        assert_eq!(rewriter.strip("INBOX.Sent"), "INBOX.Sent");
    }

    #[test]
    fn test_strip_reported_names() {
        let rewriter = rewriter();
        assert_eq!(rewriter.strip("INBOX.Sent"), "Sent");
        assert_eq!(rewriter.strip("Other"), "Other");
    }

    #[test]
    fn test_separator_adoption_rebuilds() {
        let mut rewriter = rewriter();
        rewriter.adopt_separator('/').unwrap();
        assert_eq!(rewriter.rewrite("Sent"), "INBOX/Sent");
        assert_eq!(rewriter.strip("INBOX/Sent"), "Sent");
        // Old separator no longer matches
        assert_eq!(rewriter.strip("INBOX.Sent"), "INBOX.Sent");
    }

    #[test]
    fn test_partial_prefix_not_confused() {
        let rewriter = rewriter();
        // "INBOXES" is outside the namespace even though it shares a prefix
        assert_eq!(rewriter.rewrite("INBOXES"), "INBOX.INBOXES");
    }
}
