//! Indexing and index-state handlers.

use crate::extract::Extent;
use crate::fulltext::{BatchMode, BatchReport, Fulltext};
use rmcp::schemars;
use serde::Deserialize;
use std::fmt::Write as _;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IndexItemsRequest {
    /// Ids of the attachments to index
    pub item_ids: Vec<i64>,
    /// Index whole documents instead of stopping at the configured length and page limits
    #[serde(default)]
    pub complete: bool,
    /// Stop and roll back the whole batch at the first failing item
    #[serde(default)]
    pub abort_on_error: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IndexStateRequest {
    /// Id of the attachment
    pub item_id: i64,
}

pub(crate) fn format_report(report: &BatchReport) -> String {
    let mut out = format!(
        "Indexed {} item(s), skipped {}, failed {}",
        report.indexed.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for (id, reason) in &report.skipped {
        let _ = write!(out, "\n  skipped {}: {}", id, reason);
    }
    for (id, error) in &report.failed {
        let _ = write!(out, "\n  failed {}: {}", id, error);
    }
    out
}

pub fn handle_index_items(fulltext: &Fulltext, request: IndexItemsRequest) -> Result<String, String> {
    let ids = super::parse_item_ids(&request.item_ids)?;
    let extent = if request.complete {
        Extent::Complete
    } else {
        Extent::Configured
    };
    let mode = if request.abort_on_error {
        BatchMode::AbortOnError
    } else {
        BatchMode::Continue
    };

    let report = fulltext
        .index_items(&ids, extent, mode)
        .map_err(|e| format!("Indexing failed: {}", e))?;
    Ok(format_report(&report))
}

pub fn handle_index_state(fulltext: &Fulltext, request: IndexStateRequest) -> Result<String, String> {
    let id = super::parse_item_id(request.item_id)?;
    let state = fulltext.get_indexed_state(id).map_err(|e| e.to_string())?;
    let can_reindex = fulltext.can_reindex(id).map_err(|e| e.to_string())?;

    let mut out = format!("Item {}: {}", id, state);
    let pages = fulltext.get_pages(id).map_err(|e| e.to_string())?;
    let chars = fulltext.get_chars(id).map_err(|e| e.to_string())?;
    for (unit, counters) in [("pages", pages), ("chars", chars)] {
        if let Some(counters) = counters
            && (counters.indexed.is_some() || counters.total.is_some())
        {
            let show = |n: Option<u64>| n.map_or_else(|| "?".to_string(), |n| n.to_string());
            let _ = write!(out, "\n  {}: {}/{}", unit, show(counters.indexed), show(counters.total));
        }
    }
    let _ = write!(out, "\n  can reindex: {}", can_reindex);
    Ok(out)
}

pub fn handle_index_stats(fulltext: &Fulltext) -> Result<String, String> {
    let stats = fulltext.index_stats().map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&stats).map_err(|e| e.to_string())
}
