//! Index maintenance handlers.

use super::index::format_report;
use crate::fulltext::Fulltext;
use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RebuildIndexRequest {
    /// Only rebuild attachments that have no indexed content yet
    #[serde(default)]
    pub unindexed_only: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ClearIndexRequest {
    /// Keep the index entries of linked-URL attachments
    #[serde(default)]
    pub skip_linked_urls: bool,
}

pub fn handle_rebuild_index(fulltext: &Fulltext, request: RebuildIndexRequest) -> Result<String, String> {
    let report = fulltext
        .rebuild_index(request.unindexed_only)
        .map_err(|e| format!("Rebuild failed: {}", e))?;
    Ok(format_report(&report))
}

pub fn handle_clear_index(fulltext: &Fulltext, request: ClearIndexRequest) -> Result<String, String> {
    let cleared = fulltext
        .clear_index(request.skip_linked_urls)
        .map_err(|e| format!("Clearing the index failed: {}", e))?;
    Ok(format!(
        "Cleared {} index record(s) and {} cache file(s)",
        cleared.records, cleared.cache_files
    ))
}

pub fn handle_purge_unused_words(fulltext: &Fulltext) -> Result<String, String> {
    match fulltext.purge_unused_words().map_err(|e| e.to_string())? {
        Some(deleted) => Ok(format!("Purged {} unused word(s)", deleted)),
        None => Ok("No purge needed".to_string()),
    }
}
