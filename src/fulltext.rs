//! Indexing entry points tying extraction, tokenization and the index store together.

use crate::attachment::{AttachmentSource, ItemId, LinkMode, StorageLayout};
use crate::config::{FulltextConfig, TextLimit};
use crate::error::{FulltextError, Result};
use crate::extract::pdf::{self, PdfTools};
use crate::extract::{Extent, Extractor, MimeKind, Provenance, html};
use crate::search::query::{self, SearchMode};
use crate::search::{IndexStore, tokenize};
use crate::state::{self, CounterKind, IndexCounters, IndexState};
use ahash::AHashSet;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Charset of every PDF cache file.
const CACHE_CHARSET: &str = "utf-8";

/// Why an item was left unindexed without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Extraction yielded no indexable words.
    NoText,
    NotAttachment,
    /// The attachment has no file (e.g. a linked URL).
    NoFile,
    FileNotFound,
    MissingMimeType,
    MissingCharset,
    /// The MIME type is neither text nor PDF.
    NotText,
    /// No converter is registered, or PDF indexing is configured off.
    PdfDisabled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoText => "no indexable text",
            Self::NotAttachment => "not an attachment",
            Self::NoFile => "attachment has no file",
            Self::FileNotFound => "file not found",
            Self::MissingMimeType => "MIME type not provided",
            Self::MissingCharset => "text file has no charset",
            Self::NotText => "file is not text",
            Self::PdfDisabled => "PDF indexing is disabled",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed,
    Skipped(SkipReason),
}

impl IndexOutcome {
    pub const fn is_indexed(self) -> bool {
        matches!(self, Self::Indexed)
    }
}

/// What [`Fulltext::index_items`] does when an item fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchMode {
    /// Roll back the whole batch and return the first error.
    AbortOnError,
    /// Record the failure and move on to the next item.
    #[default]
    Continue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub indexed: Vec<ItemId>,
    pub skipped: Vec<(ItemId, SkipReason)>,
    pub failed: Vec<(ItemId, String)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub indexed: u64,
    pub partial: u64,
    pub unindexed: u64,
    pub words: u64,
}

/// A search hit in one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMatch {
    pub item_id: ItemId,
    pub excerpt: String,
}

/// Full-text indexing over an attachment store.
pub struct Fulltext {
    store: IndexStore,
    attachments: Box<dyn AttachmentSource>,
    extractor: Extractor,
    layout: StorageLayout,
    default_charset: String,
}

impl fmt::Debug for Fulltext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fulltext")
            .field("store", &self.store)
            .field("extractor", &self.extractor)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

/// Whether extracted text for this MIME type is kept in a cache file.
pub fn is_cached_mime_type(mime_type: &str) -> bool {
    MimeKind::from_mime(mime_type).is_cached()
}

impl Fulltext {
    pub fn new(
        store: IndexStore,
        attachments: Box<dyn AttachmentSource>,
        extractor: Extractor,
        layout: StorageLayout,
        default_charset: impl Into<String>,
    ) -> Self {
        Self {
            store,
            attachments,
            extractor,
            layout,
            default_charset: default_charset.into(),
        }
    }

    /// Open the index database under the configured data directory and probe
    /// for PDF tools.
    pub fn open(config: &FulltextConfig, attachments: Box<dyn AttachmentSource>) -> Result<Self> {
        let store = IndexStore::open(&config.database_path())?;
        let tools = PdfTools::discover(config.tools_dir());
        tracing::info!(
            database = %config.database_path().display(),
            pdf = tools.converter_is_registered(),
            "Opened full-text index"
        );
        Ok(Self::new(
            store,
            attachments,
            Extractor::new(config, tools),
            StorageLayout::new(config.storage_dir()),
            config.default_charset.clone(),
        ))
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn attachments(&self) -> &dyn AttachmentSource {
        self.attachments.as_ref()
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Replace an item's words with those of `text`. The cache file is kept.
    pub fn index_string(
        &self,
        text: &str,
        charset: Option<&str>,
        item_id: ItemId,
    ) -> Result<IndexOutcome> {
        let tokens = tokenize(text, charset);
        self.store.in_transaction(|store| {
            store.clear_item_words(item_id)?;
            Ok(match store.index_words(item_id, &tokens)? {
                Some(_) => IndexOutcome::Indexed,
                None => IndexOutcome::Skipped(SkipReason::NoText),
            })
        })
    }

    /// Index a rendered HTML body, recording character counters.
    pub fn index_document(
        &self,
        html_body: &str,
        charset: Option<&str>,
        item_id: ItemId,
    ) -> Result<IndexOutcome> {
        let Some(charset) = charset else {
            tracing::debug!(item_id = %item_id, "Document has no charset");
            return Ok(IndexOutcome::Skipped(SkipReason::MissingCharset));
        };

        tracing::debug!(item_id = %item_id, "Indexing document");
        let full = html::markup_to_indexable(html_body, TextLimit::Disabled);
        let total = full.chars().count() as u64;
        let limit = self.extractor.text_limit();
        let mut text = full;
        html::truncate_chars(&mut text, limit);
        let indexed = limit.chars().map_or(total, |max| (max as u64).min(total));

        self.store.in_transaction(|store| {
            let outcome = self.index_string(&text, Some(charset), item_id)?;
            store.set_chars(item_id, IndexCounters::new(Some(indexed), Some(total)))?;
            Ok(outcome)
        })
    }

    /// Index a file on disk.
    ///
    /// PDFs are converted and their cache indexed instead. Character counters
    /// are recorded only for [`Provenance::FreshExtraction`].
    pub fn index_file(
        &self,
        path: &Path,
        mime_type: Option<&str>,
        charset: Option<&str>,
        item_id: ItemId,
        extent: Extent,
        provenance: Provenance,
    ) -> Result<IndexOutcome> {
        if !path.exists() {
            tracing::debug!(item_id = %item_id, path = %path.display(), "File not found");
            return Ok(IndexOutcome::Skipped(SkipReason::FileNotFound));
        }
        let Some(mime_type) = mime_type else {
            tracing::debug!(item_id = %item_id, "MIME type not provided");
            return Ok(IndexOutcome::Skipped(SkipReason::MissingMimeType));
        };

        match MimeKind::from_mime(mime_type) {
            MimeKind::Pdf => return self.index_pdf(path, item_id, extent),
            MimeKind::Other => {
                tracing::debug!(item_id = %item_id, mime_type, "File is not text");
                return Ok(IndexOutcome::Skipped(SkipReason::NotText));
            }
            MimeKind::PlainText | MimeKind::Html => {}
        }

        let Some(charset) = charset else {
            tracing::debug!(item_id = %item_id, "Text file has no charset");
            return Ok(IndexOutcome::Skipped(SkipReason::MissingCharset));
        };

        tracing::debug!(item_id = %item_id, path = %path.display(), "Indexing file");
        let limit = self.extractor.limit_for(extent);
        let text = self.extractor.text_file(path, charset, limit)?;

        self.store.in_transaction(|store| {
            let outcome = self.index_string(&text, Some(charset), item_id)?;
            if provenance == Provenance::FreshExtraction && outcome.is_indexed() {
                let total = match self.extractor.count_chars(path, charset) {
                    Ok(n) => n as u64,
                    Err(e) => {
                        tracing::warn!(item_id = %item_id, error = %e, "Failed to count characters");
                        0
                    }
                };
                let indexed = limit.chars().map_or(total, |max| (max as u64).min(total));
                store.set_chars(item_id, IndexCounters::new(Some(indexed), Some(total)))?;
            }
            Ok(outcome)
        })
    }

    /// Convert a PDF with the external tools and index the resulting cache file.
    pub fn index_pdf(&self, path: &Path, item_id: ItemId, extent: Extent) -> Result<IndexOutcome> {
        if !self.extractor.pdf_enabled() {
            tracing::debug!(item_id = %item_id, "PDF indexing is disabled");
            return Ok(IndexOutcome::Skipped(SkipReason::PdfDisabled));
        }

        let attachment = self
            .attachments
            .attachment(item_id)?
            .ok_or(FulltextError::UnknownItem(item_id))?;
        let (cache_file, conversion) =
            self.extractor
                .convert_pdf(&attachment, path, &self.layout, extent)?;

        self.store.in_transaction(|store| {
            let outcome = self.index_file(
                &cache_file,
                Some("text/plain"),
                Some(CACHE_CHARSET),
                item_id,
                Extent::Complete,
                Provenance::FromCache,
            )?;
            store.set_pages(
                item_id,
                IndexCounters::new(
                    conversion.indexed_pages.map(u64::from),
                    conversion.total_pages.map(u64::from),
                ),
            )?;
            tracing::info!(
                item_id = %item_id,
                indexed_pages = ?conversion.indexed_pages,
                total_pages = ?conversion.total_pages,
                "Indexed PDF"
            );
            Ok(outcome)
        })
    }

    /// Index the files of several attachments in one pass.
    ///
    /// Each item runs in its own savepoint, so in [`BatchMode::Continue`] a
    /// failure leaves the other items' work intact.
    pub fn index_items(&self, item_ids: &[ItemId], extent: Extent, mode: BatchMode) -> Result<BatchReport> {
        self.store.in_transaction(|store| {
            let mut report = BatchReport::default();

            for &item_id in item_ids {
                let Some(attachment) = self.attachments.attachment(item_id)? else {
                    tracing::debug!(item_id = %item_id, "Not an attachment");
                    report.skipped.push((item_id, SkipReason::NotAttachment));
                    continue;
                };
                let Some(file) = attachment.file() else {
                    tracing::debug!(item_id = %item_id, "No file to index");
                    report.skipped.push((item_id, SkipReason::NoFile));
                    continue;
                };

                let result = store.in_transaction(|_| {
                    self.index_file(
                        file,
                        attachment.mime_type.as_deref(),
                        attachment.charset.as_deref(),
                        item_id,
                        extent,
                        Provenance::FreshExtraction,
                    )
                });

                match result {
                    Ok(IndexOutcome::Indexed) => report.indexed.push(item_id),
                    Ok(IndexOutcome::Skipped(reason)) => report.skipped.push((item_id, reason)),
                    Err(e) => match mode {
                        BatchMode::AbortOnError => return Err(e),
                        BatchMode::Continue => {
                            tracing::warn!(item_id = %item_id, path = %file.display(), error = %e, "Error indexing item");
                            report.failed.push((item_id, e.to_string()));
                        }
                    },
                }
            }

            tracing::info!(
                indexed = report.indexed.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "Indexed items"
            );
            Ok(report)
        })
    }

    /// Remove an item's words, and its cache file unless `keep_cache` is set.
    pub fn clear_item_words(&self, item_id: ItemId, keep_cache: bool) -> Result<bool> {
        let existed = self.store.clear_item_words(item_id)?;
        if !keep_cache {
            self.clear_cache_file(item_id)?;
        }
        Ok(existed)
    }

    pub fn get_indexed_state(&self, item_id: ItemId) -> Result<IndexState> {
        let attachment = self
            .attachments
            .attachment(item_id)?
            .ok_or(FulltextError::UnknownItem(item_id))?;
        let kind = CounterKind::for_mime(attachment.mime_type.as_deref());
        Ok(IndexState::derive(self.store.counters(item_id, kind)?))
    }

    pub fn is_fully_indexed(&self, item_id: ItemId) -> Result<bool> {
        Ok(self.get_indexed_state(item_id)? == IndexState::Indexed)
    }

    pub fn can_reindex(&self, item_id: ItemId) -> Result<bool> {
        Ok(state::can_reindex(
            self.attachments.attachment(item_id)?.as_ref(),
        ))
    }

    pub fn get_pages(&self, item_id: ItemId) -> Result<Option<IndexCounters>> {
        self.store.get_pages(item_id)
    }

    pub fn get_chars(&self, item_id: ItemId) -> Result<Option<IndexCounters>> {
        self.store.get_chars(item_id)
    }

    pub fn set_pages(&self, item_id: ItemId, counters: IndexCounters) -> Result<()> {
        self.store.set_pages(item_id, counters)
    }

    pub fn set_chars(&self, item_id: ItemId, counters: IndexCounters) -> Result<()> {
        self.store.set_chars(item_id, counters)
    }

    /// Page count recorded in the item's info sidecar.
    pub fn get_total_pages_from_file(&self, item_id: ItemId) -> Option<u32> {
        pdf::total_pages_from_file(&self.layout.info_file(item_id))
    }

    /// Character count of the item's text source: the cache file for cached
    /// formats, the attachment file otherwise.
    pub fn get_total_chars_from_file(&self, item_id: ItemId) -> Result<Option<usize>> {
        let Some(attachment) = self.attachments.attachment(item_id)? else {
            return Ok(None);
        };

        let cached = attachment
            .mime_type
            .as_deref()
            .is_some_and(is_cached_mime_type);
        let (file, charset) = if cached {
            (self.layout.cache_file(item_id), CACHE_CHARSET)
        } else {
            let Some(file) = attachment.file() else {
                return Ok(None);
            };
            let charset = attachment
                .charset
                .as_deref()
                .unwrap_or(&self.default_charset);
            (file.to_path_buf(), charset)
        };

        if !file.exists() {
            return Ok(None);
        }
        Ok(Some(self.extractor.count_chars(&file, charset)?))
    }

    pub fn index_stats(&self) -> Result<IndexStats> {
        let counts = self.store.record_counts()?;
        let with_content: AHashSet<ItemId> = self
            .store
            .items_with_indexed_content()?
            .into_iter()
            .collect();
        let unindexed = self
            .attachments
            .attachment_ids()?
            .into_iter()
            .filter(|id| !with_content.contains(id))
            .count();

        Ok(IndexStats {
            indexed: counts.indexed,
            partial: counts.partial,
            unindexed: unindexed as u64,
            words: self.store.word_count()?,
        })
    }

    /// Search the text of several attachments, returning hits in input order.
    ///
    /// An invalid pattern is an error. Items whose file cannot be read are
    /// skipped with a warning.
    pub fn find_text_in_items(
        &self,
        item_ids: &[ItemId],
        query: &str,
        mode: SearchMode,
    ) -> Result<Vec<TextMatch>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for &item_id in item_ids {
            let Some(attachment) = self.attachments.attachment(item_id)? else {
                continue;
            };
            let Some(file) = attachment.file() else {
                continue;
            };

            let kind = attachment
                .mime_type
                .as_deref()
                .map_or(MimeKind::Other, MimeKind::from_mime);

            let (path, charset) = if kind.is_cached() {
                let cache_file = self.layout.cache_file(item_id);
                if !cache_file.exists() {
                    continue;
                }
                (cache_file, CACHE_CHARSET)
            } else {
                if !mode.binary && !kind.is_text() {
                    tracing::debug!(item_id = %item_id, mime_type = ?attachment.mime_type, "Not scanning MIME type");
                    continue;
                }
                let charset = attachment
                    .charset
                    .as_deref()
                    .unwrap_or(&self.default_charset);
                (file.to_path_buf(), charset)
            };

            match query::find_text_in_file(&self.extractor, &path, charset, query, mode) {
                Ok(Some(excerpt)) => found.push(TextMatch { item_id, excerpt }),
                Ok(None) => {}
                Err(e @ FulltextError::Pattern(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(item_id = %item_id, path = %path.display(), error = %e, "Failed to search item");
                }
            }
        }

        Ok(found)
    }

    /// Delete an attachment's cache file, if its format has one.
    pub fn clear_cache_file(&self, item_id: ItemId) -> Result<bool> {
        let Some(attachment) = self.attachments.attachment(item_id)? else {
            return Ok(false);
        };
        if !attachment
            .mime_type
            .as_deref()
            .is_some_and(is_cached_mime_type)
        {
            return Ok(false);
        }

        let cache_file = self.layout.cache_file(item_id);
        if !cache_file.exists() {
            return Ok(false);
        }
        tracing::debug!(item_id = %item_id, "Clearing full-text cache file");
        std::fs::remove_file(&cache_file)?;
        Ok(true)
    }

    /// Delete the cache files of every attachment. Returns how many were removed.
    pub fn clear_cache_files(&self, skip_linked_urls: bool) -> Result<usize> {
        let ids = if skip_linked_urls {
            self.attachments.attachment_ids_except(LinkMode::LinkedUrl)?
        } else {
            self.attachments.attachment_ids()?
        };

        let mut removed = 0;
        for id in ids {
            if self.clear_cache_file(id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
