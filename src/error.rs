//! Error handling types and utilities.

use crate::attachment::ItemId;
use std::path::PathBuf;

/// A specialized Result type for full-text operations.
pub type Result<T> = std::result::Result<T, FulltextError>;

/// Errors raised while extracting, indexing or searching attachment text.
///
/// Input problems that the caller is expected to tolerate (missing MIME type,
/// missing charset, non-text file) are not errors; they surface as
/// [`SkipReason`](crate::fulltext::SkipReason) values instead.
#[derive(Debug, thiserror::Error)]
pub enum FulltextError {
    /// A required input was missing or malformed.
    #[error("invalid input: {0}")]
    Input(String),

    /// An external converter could not be run or exited unsuccessfully.
    #[error("{tool} failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    /// The converter ran but the expected cache file was not produced.
    #[error("{file_name} was not indexed{}", non_ascii_caveat(.non_ascii))]
    ExtractionOutputMissing { file_name: String, non_ascii: bool },

    /// The item is not a known attachment.
    #[error("unknown attachment {0}")]
    UnknownItem(ItemId),

    /// File could not be read with the requested charset.
    #[error("unsupported charset '{charset}' for {}", .path.display())]
    Charset { charset: String, path: PathBuf },

    #[error(transparent)]
    Persistence(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn non_ascii_caveat(non_ascii: &bool) -> &'static str {
    if *non_ascii {
        " -- files with names containing non-ASCII characters may not be convertible on this platform"
    } else {
        ""
    }
}

impl FulltextError {
    pub(crate) fn tool(tool: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use rstest::rstest;

    #[rstest]
    #[case("report.pdf", false, "report.pdf was not indexed")]
    #[case(
        "résumé.pdf",
        true,
        "résumé.pdf was not indexed -- files with names containing non-ASCII characters may not be convertible on this platform"
    )]
    fn test_missing_output_message(
        #[case] file_name: &str,
        #[case] non_ascii: bool,
        #[case] expected: &str,
    ) {
        let err = FulltextError::ExtractionOutputMissing {
            file_name: file_name.to_string(),
            non_ascii,
        };
        check!(err.to_string() == expected);
    }
}
