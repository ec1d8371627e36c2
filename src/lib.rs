pub mod attachment;
pub mod config;
pub mod error;
pub mod extract;
pub mod fulltext;
pub mod maintenance;
pub mod search;
pub mod server;
pub mod state;
pub mod tools;
pub mod tracing;

pub use attachment::{Attachment, AttachmentSource, ItemId, LinkMode, SqliteAttachments, StorageLayout};
pub use config::{FulltextConfig, TextLimit};
pub use error::{FulltextError, Result};
pub use extract::{Extent, Extractor, MimeKind, Provenance};
pub use fulltext::{
    BatchMode, BatchReport, Fulltext, IndexOutcome, IndexStats, SkipReason, TextMatch,
    is_cached_mime_type,
};
pub use maintenance::ClearedIndex;
pub use search::{IndexStore, MatchKind, SearchMode};
pub use server::FulltextServer;
pub use state::{CounterKind, IndexCounters, IndexState};
