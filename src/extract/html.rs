//! Markup to plain text.

use crate::config::TextLimit;
use html2text::render::TrivialDecorator;

/// Line width handed to the renderer; wide enough that it never wraps prose.
const RENDER_WIDTH: usize = 10_000;

/// Inserts a space after every `>` so adjacent elements don't fuse into one token.
pub fn space_after_tags(text: &str) -> String {
    text.replace('>', "> ")
}

/// Renders markup as plain text. Returns the input unchanged if rendering fails.
///
/// The trivial decorator emits only document text: no link footnotes, list
/// bullets or heading markers.
pub fn html_to_text(text: &str) -> String {
    let rendered = html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(text.as_bytes(), RENDER_WIDTH);
    match rendered {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::debug!(error = %e, "HTML conversion failed, using raw text");
            text.to_string()
        }
    }
}

/// Truncates to at most `limit` characters.
pub fn truncate_chars(text: &mut String, limit: TextLimit) {
    if let Some(max) = limit.chars()
        && let Some((byte_index, _)) = text.char_indices().nth(max)
    {
        text.truncate(byte_index);
    }
}

/// The defensive markup pass shared by every text path: tag spacing,
/// conversion to plain text, then truncation.
pub fn markup_to_indexable(text: &str, limit: TextLimit) -> String {
    let mut plain = html_to_text(&space_after_tags(text));
    truncate_chars(&mut plain, limit);
    plain
}
