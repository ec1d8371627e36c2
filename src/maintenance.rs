//! Bulk index maintenance: rebuild, clear, and dictionary garbage collection.

use crate::attachment::{ItemId, LinkMode};
use crate::error::Result;
use crate::extract::Extent;
use crate::fulltext::{BatchMode, BatchReport, Fulltext};
use ahash::AHashSet;
use serde::Serialize;

/// What [`Fulltext::clear_index`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearedIndex {
    pub records: usize,
    pub cache_files: usize,
}

impl Fulltext {
    /// Attachments with a file, optionally limited to those with no indexed content.
    fn rebuild_candidates(&self, unindexed_only: bool) -> Result<Vec<ItemId>> {
        let mut candidates = self.attachments().attachment_ids_except(LinkMode::LinkedUrl)?;
        if unindexed_only {
            let indexed: AHashSet<ItemId> = self
                .store()
                .items_with_indexed_content()?
                .into_iter()
                .collect();
            candidates.retain(|id| !indexed.contains(id));
        }
        Ok(candidates)
    }

    /// Drop and re-extract the index of every attachment that has a file.
    ///
    /// Per-item failures are collected in the report without stopping the pass.
    pub fn rebuild_index(&self, unindexed_only: bool) -> Result<BatchReport> {
        self.store().in_transaction(|store| {
            let candidates = self.rebuild_candidates(unindexed_only)?;
            tracing::info!(items = candidates.len(), unindexed_only, "Rebuilding full-text index");
            if candidates.is_empty() {
                return Ok(BatchReport::default());
            }

            store.delete_items(&candidates)?;
            self.index_items(&candidates, Extent::Configured, BatchMode::Continue)
        })
    }

    /// Remove index records, associations and every cache file.
    ///
    /// With `skip_linked_urls`, records of linked-URL attachments survive and
    /// orphaned words are purged instead of dropping the whole dictionary.
    pub fn clear_index(&self, skip_linked_urls: bool) -> Result<ClearedIndex> {
        self.store().in_transaction(|store| {
            let records = if skip_linked_urls {
                let mut cleared = Vec::new();
                for id in store.record_ids()? {
                    let linked_url = self
                        .attachments()
                        .attachment(id)?
                        .is_some_and(|a| a.link_mode == LinkMode::LinkedUrl);
                    if !linked_url {
                        cleared.push(id);
                    }
                }
                let records = store.delete_items(&cleared)?;
                store.purge_unused_words()?;
                records
            } else {
                store.delete_all()?
            };

            let cache_files = self.clear_cache_files(false)?;
            tracing::info!(records, cache_files, skip_linked_urls, "Cleared full-text index");
            Ok(ClearedIndex {
                records,
                cache_files,
            })
        })
    }

    /// Delete dictionary words no longer associated with any item.
    ///
    /// Does nothing unless an association was removed since the last purge.
    pub fn purge_unused_words(&self) -> Result<Option<usize>> {
        self.store().purge_unused_words()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{Attachment, SqliteAttachments, StorageLayout};
    use crate::config::FulltextConfig;
    use crate::extract::Extractor;
    use crate::extract::pdf::PdfTools;
    use crate::search::IndexStore;
    use crate::state::IndexState;
    use assert2::check;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (Fulltext, Vec<ItemId>) {
        crate::tracing::init();
        let fulltext = Fulltext::new(
            IndexStore::open_in_memory().unwrap(),
            Box::new(SqliteAttachments::open_in_memory().unwrap()),
            Extractor::new(&FulltextConfig::default(), PdfTools::default()),
            StorageLayout::new(dir.path().join("storage")),
            "utf-8",
        );

        let bodies = [
            (LinkMode::ImportedFile, "apple shared"),
            (LinkMode::LinkedFile, "banana shared"),
            (LinkMode::LinkedUrl, ""),
        ];
        let mut ids = Vec::new();
        for (raw, (link_mode, body)) in (1..).zip(bodies) {
            let id = ItemId::new(raw).unwrap();
            let path = dir.path().join(format!("{raw}.txt"));
            std::fs::write(&path, body).unwrap();
            fulltext
                .attachments()
                .register(&Attachment {
                    id,
                    link_mode,
                    mime_type: Some("text/plain".to_string()),
                    charset: Some("utf-8".to_string()),
                    path: Some(path),
                })
                .unwrap();
            ids.push(id);
        }
        (fulltext, ids)
    }

    #[test]
    fn test_rebuild_index_reindexes_candidates() {
        let dir = TempDir::new().unwrap();
        let (ft, ids) = setup(&dir);

        let report = ft.rebuild_index(false).unwrap();
        check!(report.indexed == ids[..2].to_vec());
        check!(ft.get_indexed_state(ids[0]).unwrap() == IndexState::Indexed);

        // Already indexed items are not candidates
        check!(ft.rebuild_index(true).unwrap() == BatchReport::default());
    }

    #[test]
    fn test_clear_index_drops_everything() {
        let dir = TempDir::new().unwrap();
        let (ft, ids) = setup(&dir);
        ft.rebuild_index(false).unwrap();

        let cleared = ft.clear_index(false).unwrap();
        check!(cleared.records == 2);
        check!(ft.store().word_count().unwrap() == 0);
        check!(ft.get_indexed_state(ids[1]).unwrap() == IndexState::Unindexed);
    }

    #[test]
    fn test_clear_index_keeps_linked_url_records() {
        let dir = TempDir::new().unwrap();
        let (ft, ids) = setup(&dir);
        ft.rebuild_index(false).unwrap();
        ft.index_string("bookmark shared", None, ids[2]).unwrap();

        let cleared = ft.clear_index(true).unwrap();
        check!(cleared.records == 2);
        check!(ft.store().record_ids().unwrap() == vec![ids[2]]);
        check!(ft.store().dictionary().unwrap() == vec!["bookmark", "shared"]);
        check!(ft.purge_unused_words().unwrap().is_none());
    }
}
