//! Literal and regular-expression search over extracted text.

use crate::error::Result;
use crate::extract::Extractor;
use regex::{Regex, RegexBuilder};
use std::path::Path;
use std::sync::LazyLock;

/// Number of characters returned from the match position.
pub const EXCERPT_LENGTH: usize = 50;

static SLASH_DELIMITED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(.*)/([^/]*)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Case-insensitive substring search.
    Literal,
    /// Multiline regular expression.
    Regex { case_sensitive: bool },
}

/// How a query is matched, and whether markup is stripped first.
///
/// Parsed from the mode names `phrase`, `regexp` and `regexpCS`, each
/// optionally suffixed with `Binary` to search the raw file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMode {
    pub kind: MatchKind,
    pub binary: bool,
}

impl SearchMode {
    pub const LITERAL: Self = Self {
        kind: MatchKind::Literal,
        binary: false,
    };
}

impl Default for SearchMode {
    fn default() -> Self {
        Self::LITERAL
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (base, binary) = match s.strip_suffix("Binary") {
            Some(base) => (base, true),
            None => (s, false),
        };
        let kind = match base {
            "" | "phrase" => MatchKind::Literal,
            "regexp" => MatchKind::Regex {
                case_sensitive: false,
            },
            "regexpCS" => MatchKind::Regex {
                case_sensitive: true,
            },
            _ => {
                return Err(format!(
                    "unknown search mode '{}' (expected phrase, regexp or regexpCS, optionally followed by Binary)",
                    s
                ));
            }
        };
        Ok(Self { kind, binary })
    }
}

/// Removes `/.../flags` delimiters from a pattern. Flags are discarded.
pub fn strip_slashes(pattern: &str) -> &str {
    match SLASH_DELIMITED.captures(pattern) {
        Some(caps) => {
            if let Some(flags) = caps.get(2)
                && !flags.is_empty()
            {
                tracing::debug!(flags = flags.as_str(), "Ignoring regular expression flags");
            }
            caps.get(1).map_or(pattern, |m| m.as_str())
        }
        None => pattern,
    }
}

fn build_matcher(query: &str, kind: MatchKind) -> Result<Regex> {
    let regex = match kind {
        MatchKind::Literal => RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()?,
        MatchKind::Regex { case_sensitive } => RegexBuilder::new(strip_slashes(query))
            .multi_line(true)
            .case_insensitive(!case_sensitive)
            .build()?,
    };
    Ok(regex)
}

fn excerpt(text: &str, start: usize) -> String {
    text[start..].chars().take(EXCERPT_LENGTH).collect()
}

/// Searches `text`, returning an excerpt starting at the first match.
///
/// An invalid regular expression is an error; no match is `Ok(None)`.
pub fn find_text(text: &str, query: &str, kind: MatchKind) -> Result<Option<String>> {
    let matcher = build_matcher(query, kind)?;
    let found = matcher.find(text).map(|m| excerpt(text, m.start()));
    if found.is_some() {
        tracing::debug!("Text found");
    }
    Ok(found)
}

/// Reads a file and searches it. Markup is converted to text unless the mode is binary.
pub fn find_text_in_file(
    extractor: &Extractor,
    path: &Path,
    charset: &str,
    query: &str,
    mode: SearchMode,
) -> Result<Option<String>> {
    tracing::debug!(path = %path.display(), query, "Searching file");
    let limit = extractor.text_limit();
    let text = if mode.binary {
        extractor.raw_text_file(path, charset, limit)?
    } else {
        extractor.text_file(path, charset, limit)?
    };
    find_text(&text, query, mode.kind)
}
