//! Text search handler.

use crate::fulltext::Fulltext;
use crate::search::SearchMode;
use rmcp::schemars;
use serde::Deserialize;
use std::fmt::Write as _;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FindTextRequest {
    /// Attachments to scan, in the order results should be returned
    pub item_ids: Vec<i64>,
    /// Text or pattern to look for. Patterns may be written as /pattern/
    pub query: String,
    /// One of "phrase" (default), "regexp", "regexpCS"; append "Binary" to scan
    /// raw content and non-text files
    pub mode: Option<String>,
}

pub fn handle_find_text(fulltext: &Fulltext, request: FindTextRequest) -> Result<String, String> {
    let ids = super::parse_item_ids(&request.item_ids)?;
    let mode: SearchMode = match request.mode.as_deref() {
        Some(mode) => mode.parse()?,
        None => SearchMode::default(),
    };

    let matches = fulltext
        .find_text_in_items(&ids, &request.query, mode)
        .map_err(|e| e.to_string())?;

    if matches.is_empty() {
        return Ok(format!("No matches for '{}'", request.query));
    }

    let mut out = format!("{} match(es) for '{}':", matches.len(), request.query);
    for hit in &matches {
        let _ = write!(out, "\n  {}: {}", hit.item_id, hit.excerpt.replace('\n', " "));
    }
    Ok(out)
}
