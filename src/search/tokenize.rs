//! Text tokenization for the presence-only word index.
//!
//! Text is split on UAX#29 word boundaries, lower-cased, and deduplicated.
//! ASCII apostrophes are escaped to a reserved private-use codepoint before
//! segmentation so that contractions and possessives stay in one token, and
//! restored afterwards.

use ahash::AHashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Reserved placeholder standing in for apostrophes during segmentation.
///
/// Any occurrence in the input is replaced by a space before escaping, so the
/// placeholder never appears in real text when the segmenter sees it.
pub const APOSTROPHE_PLACEHOLDER: char = '\u{E000}';

/// The character escaped to [`APOSTROPHE_PLACEHOLDER`]. U+2019 needs no
/// escaping: UAX#29 already keeps it inside words.
const APOSTROPHE: char = '\'';

/// Yields successive token boundaries for a piece of text.
pub trait Segmenter {
    /// Byte ranges `(start, end)` of candidate tokens, in order.
    ///
    /// `charset` is the source charset of the text, when known. Segmenters that
    /// only work on decoded Unicode text may ignore it.
    fn boundaries(&self, text: &str, charset: Option<&str>) -> Vec<(usize, usize)>;
}

/// UAX#29 word segmentation that treats [`APOSTROPHE_PLACEHOLDER`] as word-internal.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnicodeSegmenter;

impl Segmenter for UnicodeSegmenter {
    fn boundaries(&self, text: &str, _charset: Option<&str>) -> Vec<(usize, usize)> {
        let mut spans: Vec<(usize, usize)> = Vec::new();
        // Whether the last span contains a word, and whether it ends in a placeholder
        let mut last_is_word = false;
        let mut joining = false;

        for (start, segment) in text.split_word_bound_indices() {
            let end = start + segment.len();
            let is_placeholder = segment.chars().all(|c| c == APOSTROPHE_PLACEHOLDER);
            let is_word = segment.chars().any(char::is_alphanumeric);

            if let Some(last) = spans.last_mut()
                && last.1 == start
                && ((is_placeholder && last_is_word) || (is_word && joining))
            {
                last.1 = end;
                last_is_word = true;
                joining = is_placeholder;
                continue;
            }

            spans.push((start, end));
            last_is_word = is_word;
            joining = false;
        }

        spans
    }
}

/// Replace fragile punctuation with the reserved placeholder.
pub fn escape_apostrophes(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c == APOSTROPHE_PLACEHOLDER {
                ' '
            } else if c == APOSTROPHE {
                APOSTROPHE_PLACEHOLDER
            } else {
                c
            }
        })
        .collect()
}

/// Inverse of [`escape_apostrophes`] for text that did not contain the placeholder.
pub fn unescape_apostrophes(text: &str) -> String {
    text.replace(APOSTROPHE_PLACEHOLDER, &APOSTROPHE.to_string())
}

/// Whether a token may be stored in the dictionary.
///
/// Rejects tokens with C0 control characters other than tab, line feed and
/// carriage return, and the non-characters U+FFFE and U+FFFF. Unpaired
/// surrogates cannot occur in a Rust `str`; decoders substitute U+FFFD for them.
pub fn is_indexable(token: &str) -> bool {
    !token.chars().any(|c| {
        matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
    })
}

/// Whether a raw segment is skipped outright (empty, a plain space, or a non-breaking space).
fn is_blank(segment: &str) -> bool {
    segment.is_empty() || segment.starts_with(' ') || segment.starts_with('\u{a0}')
}

/// Splits text into unique, lower-cased tokens in order of first occurrence.
pub fn tokenize(text: &str, charset: Option<&str>) -> Vec<String> {
    tokenize_with(&UnicodeSegmenter, text, charset)
}

/// [`tokenize`] with an explicit segmenter.
pub fn tokenize_with<S: Segmenter + ?Sized>(
    segmenter: &S,
    text: &str,
    charset: Option<&str>,
) -> Vec<String> {
    if text.is_empty() {
        tracing::debug!("No text to index");
        return Vec::new();
    }

    let escaped = escape_apostrophes(text);
    let mut seen: AHashSet<String> = AHashSet::new();
    let mut tokens = Vec::new();

    for (start, end) in segmenter.boundaries(&escaped, charset) {
        let segment = &escaped[start..end];
        if is_blank(segment) || !segment.chars().any(char::is_alphanumeric) {
            continue;
        }

        let token = unescape_apostrophes(&segment.to_lowercase());
        if !is_indexable(&token) {
            tracing::debug!(token = ?token, "Skipping token containing invalid characters");
            continue;
        }

        if seen.insert(token.clone()) {
            tokens.push(token);
        }
    }

    tokens
}

/// Normalizes caller-supplied tokens the same way [`tokenize`] does:
/// lower-cased, deduplicated, invalid and blank tokens dropped.
pub fn normalize_tokens<I, S>(tokens: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: AHashSet<String> = AHashSet::new();
    let mut normalized = Vec::new();

    for token in tokens {
        let token = token.as_ref();
        if is_blank(token) {
            continue;
        }
        if !is_indexable(token) {
            tracing::debug!(token = ?token, "Skipping token containing invalid characters");
            continue;
        }
        let lower = token.to_lowercase();
        if seen.insert(lower.clone()) {
            normalized.push(lower);
        }
    }

    normalized
}
