//! Word index and text search.
//!
//! [`tokenize`] turns text into the unique lower-cased words stored by the
//! [`index`]; [`query`] scans extracted text directly and never consults the index.

pub mod index;
pub mod query;
pub mod tokenize;

pub use index::{FULLTEXT_VERSION, IndexStore, RecordCounts, WORD_CHUNK_SIZE, WordsIndexed};
pub use query::{MatchKind, SearchMode, find_text, find_text_in_file};
pub use tokenize::{Segmenter, UnicodeSegmenter, tokenize};
