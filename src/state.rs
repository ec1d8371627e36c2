//! Per-item indexing completeness, derived from stored counters.

use crate::attachment::{Attachment, LinkMode};
use crate::extract::MimeKind;
use serde::Serialize;
use std::fmt;

/// An indexed/total pair for one unit (pages or characters).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexCounters {
    pub indexed: Option<u64>,
    pub total: Option<u64>,
}

impl IndexCounters {
    pub const fn new(indexed: Option<u64>, total: Option<u64>) -> Self {
        Self { indexed, total }
    }

    /// Counters with zero values folded to unknown, the form they are stored in.
    pub fn normalized(self) -> Self {
        Self {
            indexed: self.indexed.filter(|&n| n > 0),
            total: self.total.filter(|&n| n > 0),
        }
    }
}

/// Which counter pair describes an item's completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Pages,
    Chars,
}

impl CounterKind {
    /// Paged formats are tracked by page, everything else by character.
    pub fn for_mime(mime_type: Option<&str>) -> Self {
        match mime_type.map(MimeKind::from_mime) {
            Some(MimeKind::Pdf) => Self::Pages,
            _ => Self::Chars,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// Nothing is known about the document's size.
    Unavailable,
    Unindexed,
    Partial,
    Indexed,
}

impl IndexState {
    /// Derive the state from an item's counters. `None` means the item has no
    /// index record at all.
    pub fn derive(counters: Option<IndexCounters>) -> Self {
        let Some(counters) = counters else {
            return Self::Unindexed;
        };

        match counters.normalized() {
            IndexCounters {
                indexed: None,
                total: None,
            } => Self::Unavailable,
            IndexCounters { indexed: None, .. } => Self::Unindexed,
            IndexCounters {
                indexed: Some(indexed),
                total: Some(total),
            } if indexed < total => Self::Partial,
            _ => Self::Indexed,
        }
    }
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unavailable => "unavailable",
            Self::Unindexed => "unindexed",
            Self::Partial => "partial",
            Self::Indexed => "indexed",
        })
    }
}

/// Any attachment other than a bare URL reference can be reindexed,
/// including ones that are already fully indexed.
pub fn can_reindex(attachment: Option<&Attachment>) -> bool {
    attachment.is_some_and(|a| a.link_mode != LinkMode::LinkedUrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::ItemId;
    use assert2::check;
    use rstest::rstest;

    #[rstest]
    #[case(Some(10), Some(10), IndexState::Indexed)]
    #[case(Some(4), Some(10), IndexState::Partial)]
    #[case(None, Some(10), IndexState::Unindexed)]
    #[case(Some(0), Some(10), IndexState::Unindexed)]
    #[case(None, None, IndexState::Unavailable)]
    #[case(Some(0), Some(0), IndexState::Unavailable)]
    #[case(Some(12), Some(10), IndexState::Indexed)]
    #[case(Some(5), None, IndexState::Indexed)]
    fn test_derive(
        #[case] indexed: Option<u64>,
        #[case] total: Option<u64>,
        #[case] expected: IndexState,
    ) {
        check!(IndexState::derive(Some(IndexCounters::new(indexed, total))) == expected);
    }

    #[test]
    fn test_missing_record_is_unindexed() {
        check!(IndexState::derive(None) == IndexState::Unindexed);
    }

    #[rstest]
    #[case(Some("application/pdf"), CounterKind::Pages)]
    #[case(Some("text/html"), CounterKind::Chars)]
    #[case(Some("text/plain"), CounterKind::Chars)]
    #[case(None, CounterKind::Chars)]
    fn test_counter_kind(#[case] mime: Option<&str>, #[case] expected: CounterKind) {
        check!(CounterKind::for_mime(mime) == expected);
    }

    #[rstest]
    #[case(LinkMode::ImportedFile, true)]
    #[case(LinkMode::ImportedUrl, true)]
    #[case(LinkMode::LinkedFile, true)]
    #[case(LinkMode::LinkedUrl, false)]
    fn test_can_reindex(#[case] link_mode: LinkMode, #[case] expected: bool) {
        let attachment = Attachment {
            id: ItemId::new(1).unwrap(),
            link_mode,
            mime_type: None,
            charset: None,
            path: None,
        };
        check!(can_reindex(Some(&attachment)) == expected);
        check!(!can_reindex(None));
    }
}
