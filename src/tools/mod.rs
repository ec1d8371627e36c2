pub mod attachments;
pub mod find_text;
pub mod index;
pub mod maintenance;

pub use attachments::*;
pub use find_text::*;
pub use index::*;
pub use maintenance::*;

use crate::attachment::ItemId;

/// Validate raw ids coming from a tool call.
pub(crate) fn parse_item_ids(raw: &[i64]) -> Result<Vec<ItemId>, String> {
    raw.iter()
        .map(|&id| parse_item_id(id))
        .collect()
}

pub(crate) fn parse_item_id(raw: i64) -> Result<ItemId, String> {
    ItemId::new(raw).ok_or_else(|| format!("Invalid item id {}: ids must be positive", raw))
}
