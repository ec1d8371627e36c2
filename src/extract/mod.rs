//! Turning attachment content into indexable plain text.
//!
//! Markup goes through [`html`], text files through [`text`] and then the same
//! markup pass, and PDFs through the external converters in [`pdf`], whose
//! output cache is then read as a plain-text file.

pub mod html;
pub mod pdf;
pub mod text;

use crate::attachment::{Attachment, StorageLayout};
use crate::config::{FulltextConfig, TextLimit};
use crate::error::Result;
use pdf::{Conversion, ConversionRequest, PdfTools};
use std::path::{Path, PathBuf};

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Non-`text/*` MIME types that still carry readable text.
const TEXTUAL_APPLICATION_TYPES: &[&str] = &[
    "application/xhtml+xml",
    "application/xml",
    "application/json",
    "application/javascript",
    "application/x-javascript",
];

/// Coarse classification of a MIME type, resolved once at each entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeKind {
    PlainText,
    Html,
    Pdf,
    Other,
}

impl MimeKind {
    pub fn from_mime(mime_type: &str) -> Self {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            PDF_MIME_TYPE => Self::Pdf,
            "text/html" | "application/xhtml+xml" => Self::Html,
            other if other.starts_with("text/") => Self::PlainText,
            other if TEXTUAL_APPLICATION_TYPES.contains(&other) => Self::PlainText,
            _ => Self::Other,
        }
    }

    /// Formats whose extracted text is persisted to a cache file.
    pub const fn is_cached(self) -> bool {
        matches!(self, Self::Pdf)
    }

    /// Formats that can be read directly as text.
    pub const fn is_text(self) -> bool {
        matches!(self, Self::PlainText | Self::Html)
    }
}

/// Whether text extraction came from the source document or from its cache.
///
/// Character counters are only recorded for fresh extractions; cache reads
/// are bookkept by page instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    FreshExtraction,
    FromCache,
}

/// How much of a document to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    /// Bounded by the configured text length and page count.
    Configured,
    /// The whole document.
    Complete,
}

/// Extraction settings plus the converter executables, owned per process.
#[derive(Debug, Clone)]
pub struct Extractor {
    text_limit: TextLimit,
    pdf_max_pages: u32,
    detect_charset: bool,
    tools: PdfTools,
}

impl Extractor {
    pub fn new(config: &FulltextConfig, tools: PdfTools) -> Self {
        Self {
            text_limit: config.text_max_length,
            pdf_max_pages: config.pdf_max_pages,
            detect_charset: config.detect_charset,
            tools,
        }
    }

    pub const fn text_limit(&self) -> TextLimit {
        self.text_limit
    }

    /// The character limit in force for an extent.
    pub const fn limit_for(&self, extent: Extent) -> TextLimit {
        match extent {
            Extent::Configured => self.text_limit,
            Extent::Complete => TextLimit::Disabled,
        }
    }

    /// Whether PDFs can be indexed at all.
    pub fn pdf_enabled(&self) -> bool {
        self.pdf_max_pages > 0 && self.tools.converter_is_registered()
    }

    /// Reads a text file as-is, bounded by `limit`.
    pub fn raw_text_file(&self, path: &Path, charset: &str, limit: TextLimit) -> Result<String> {
        let mut raw = text::read_text(path, charset, self.detect_charset)?;
        html::truncate_chars(&mut raw, limit);
        Ok(raw)
    }

    /// Reads a text file and runs it through the markup pass.
    pub fn text_file(&self, path: &Path, charset: &str, limit: TextLimit) -> Result<String> {
        let raw = self.raw_text_file(path, charset, limit)?;
        Ok(html::markup_to_indexable(&raw, limit))
    }

    /// Number of characters in a whole text file.
    pub fn count_chars(&self, path: &Path, charset: &str) -> Result<usize> {
        Ok(text::read_text(path, charset, self.detect_charset)?
            .chars()
            .count())
    }

    /// Converts a PDF attachment, writing the cache and info files into the
    /// item's storage directory, which is created if missing.
    pub fn convert_pdf(
        &self,
        attachment: &Attachment,
        file: &Path,
        layout: &StorageLayout,
        extent: Extent,
    ) -> Result<(PathBuf, Conversion)> {
        let dir = layout.create_item_dir(attachment.id)?;
        let cache_file = dir.join(crate::attachment::CACHE_FILE_NAME);
        let info_file = dir.join(crate::attachment::INFO_FILE_NAME);

        let max_pages = match extent {
            Extent::Configured => Some(self.pdf_max_pages),
            Extent::Complete => None,
        };

        tracing::info!(item_id = %attachment.id, path = %file.display(), ?max_pages, "Converting PDF");
        let conversion = pdf::convert(
            &self.tools,
            &ConversionRequest {
                input: file,
                cache_file: &cache_file,
                info_file: &info_file,
                max_pages,
            },
        )?;
        Ok((cache_file, conversion))
    }
}
