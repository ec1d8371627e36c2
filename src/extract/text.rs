//! Charset-aware reading of text files.

use crate::error::{FulltextError, Result};
use encoding_rs::Encoding;
use std::path::Path;

/// Reads a whole file and decodes it with `charset`.
///
/// With `sniff_bom`, a byte-order mark at the start of the file overrides the
/// declared charset. Malformed sequences decode to U+FFFD.
pub fn read_text(path: &Path, charset: &str, sniff_bom: bool) -> Result<String> {
    let encoding =
        Encoding::for_label(charset.trim().as_bytes()).ok_or_else(|| FulltextError::Charset {
            charset: charset.to_string(),
            path: path.to_path_buf(),
        })?;

    let bytes = std::fs::read(path)?;
    let text = if sniff_bom {
        let (text, used, had_errors) = encoding.decode(&bytes);
        if used != encoding {
            tracing::debug!(
                path = %path.display(),
                declared = encoding.name(),
                detected = used.name(),
                "Byte-order mark overrides declared charset"
            );
        }
        if had_errors {
            tracing::debug!(path = %path.display(), "Replaced malformed sequences while decoding");
        }
        text
    } else {
        encoding.decode_without_bom_handling(&bytes).0
    };

    Ok(text.into_owned())
}
