//! Attachment metadata consumed by the indexer, and the on-disk storage layout.
//!
//! Attachment records are owned by an external store; this crate only reads the
//! few attributes it needs through [`AttachmentSource`]. [`SqliteAttachments`]
//! is the store used by the server binary.

use crate::error::Result;
use rusqlite::types::{ToSql, ToSqlOutput};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the plain-text extraction cache written next to a converted document.
pub const CACHE_FILE_NAME: &str = ".fulltext-cache";
/// Name of the page-count sidecar written by the info tool.
pub const INFO_FILE_NAME: &str = ".fulltext-info";

/// Identifier of an attachment item. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ItemId(i64);

impl ItemId {
    /// Returns `None` for ids that cannot name a stored row (zero or negative).
    pub const fn new(raw: i64) -> Option<Self> {
        if raw > 0 { Some(Self(raw)) } else { None }
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Rows read back from SQLite carry ids that were validated on the way in.
    pub(crate) const fn from_row(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for ItemId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

/// How an attachment's content is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// File copied into managed storage.
    ImportedFile,
    /// Web snapshot saved into managed storage.
    ImportedUrl,
    /// File left in place outside managed storage.
    LinkedFile,
    /// Bare URL reference; there is no file to index.
    LinkedUrl,
}

impl LinkMode {
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::ImportedFile => 0,
            Self::ImportedUrl => 1,
            Self::LinkedFile => 2,
            Self::LinkedUrl => 3,
        }
    }

    pub const fn from_i64(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Self::ImportedFile),
            1 => Some(Self::ImportedUrl),
            2 => Some(Self::LinkedFile),
            3 => Some(Self::LinkedUrl),
            _ => None,
        }
    }

    /// Whether the attachment's file lives inside managed storage.
    pub const fn is_managed(self) -> bool {
        matches!(self, Self::ImportedFile | Self::ImportedUrl)
    }
}

/// The attributes of an attachment the full-text core reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: ItemId,
    pub link_mode: LinkMode,
    pub mime_type: Option<String>,
    pub charset: Option<String>,
    pub path: Option<PathBuf>,
}

impl Attachment {
    /// The attachment's file, if it has one.
    pub fn file(&self) -> Option<&Path> {
        match self.link_mode {
            LinkMode::LinkedUrl => None,
            _ => self.path.as_deref(),
        }
    }
}

/// Access to attachment metadata.
pub trait AttachmentSource: Send {
    /// Insert or replace an attachment record.
    fn register(&self, attachment: &Attachment) -> Result<()>;

    /// Look up a single attachment. `Ok(None)` if the id is not an attachment.
    fn attachment(&self, id: ItemId) -> Result<Option<Attachment>>;

    /// Ids of every attachment, in ascending order.
    fn attachment_ids(&self) -> Result<Vec<ItemId>>;

    /// Ids of every attachment whose link mode differs from `excluded`.
    fn attachment_ids_except(&self, excluded: LinkMode) -> Result<Vec<ItemId>> {
        let mut ids = Vec::new();
        for id in self.attachment_ids()? {
            if let Some(attachment) = self.attachment(id)?
                && attachment.link_mode != excluded
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

/// Attachment store backed by an `itemAttachments` SQLite table.
pub struct SqliteAttachments {
    conn: Connection,
}

impl fmt::Debug for SqliteAttachments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteAttachments").finish_non_exhaustive()
    }
}

impl SqliteAttachments {
    pub fn open(path: &Path) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS itemAttachments (
                itemID INTEGER PRIMARY KEY,
                linkMode INTEGER NOT NULL,
                mimeType TEXT,
                charset TEXT,
                path TEXT
            );",
        )?;
        Ok(Self { conn })
    }
}

impl AttachmentSource for SqliteAttachments {
    fn register(&self, attachment: &Attachment) -> Result<()> {
        self.conn.execute(
            "REPLACE INTO itemAttachments (itemID, linkMode, mimeType, charset, path)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                attachment.id,
                attachment.link_mode.as_i64(),
                attachment.mime_type,
                attachment.charset,
                attachment
                    .path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            ],
        )?;
        tracing::debug!(item_id = %attachment.id, "Registered attachment");
        Ok(())
    }

    fn attachment(&self, id: ItemId) -> Result<Option<Attachment>> {
        let row = self
            .conn
            .prepare_cached(
                "SELECT linkMode, mimeType, charset, path FROM itemAttachments WHERE itemID = ?1",
            )?
            .query_row([id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .optional()?;

        Ok(row.and_then(|(link_mode, mime_type, charset, path)| {
            let Some(link_mode) = LinkMode::from_i64(link_mode) else {
                tracing::warn!(item_id = %id, link_mode, "Ignoring attachment with unknown link mode");
                return None;
            };
            Some(Attachment {
                id,
                link_mode,
                mime_type,
                charset,
                path: path.map(PathBuf::from),
            })
        }))
    }

    fn attachment_ids(&self) -> Result<Vec<ItemId>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT itemID FROM itemAttachments ORDER BY itemID")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(ItemId::from_row))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn attachment_ids_except(&self, excluded: LinkMode) -> Result<Vec<ItemId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT itemID FROM itemAttachments WHERE linkMode != ?1 ORDER BY itemID",
        )?;
        let ids = stmt
            .query_map([excluded.as_i64()], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(ItemId::from_row))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }
}

/// Deterministic per-item directories under the managed storage root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage directory of an item. Not created.
    pub fn item_dir(&self, id: ItemId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Create the storage directory of an item if it is missing.
    pub fn create_item_dir(&self, id: ItemId) -> Result<PathBuf> {
        let dir = self.item_dir(id);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn cache_file(&self, id: ItemId) -> PathBuf {
        self.item_dir(id).join(CACHE_FILE_NAME)
    }

    pub fn info_file(&self, id: ItemId) -> PathBuf {
        self.item_dir(id).join(INFO_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    fn pdf(id: i64, link_mode: LinkMode) -> Attachment {
        Attachment {
            id: ItemId::new(id).unwrap(),
            link_mode,
            mime_type: Some("application/pdf".to_string()),
            charset: None,
            path: Some(PathBuf::from(format!("/tmp/{id}.pdf"))),
        }
    }

    #[rstest]
    #[case(1, true)]
    #[case(0, false)]
    #[case(-7, false)]
    fn test_item_id_validation(#[case] raw: i64, #[case] valid: bool) {
        check!(ItemId::new(raw).is_some() == valid);
    }

    #[rstest]
    #[case(LinkMode::ImportedFile)]
    #[case(LinkMode::ImportedUrl)]
    #[case(LinkMode::LinkedFile)]
    #[case(LinkMode::LinkedUrl)]
    fn test_link_mode_codes(#[case] mode: LinkMode) {
        check!(LinkMode::from_i64(mode.as_i64()) == Some(mode));
    }

    #[test]
    fn test_linked_url_has_no_file() {
        check!(pdf(1, LinkMode::LinkedUrl).file().is_none());
        check!(pdf(1, LinkMode::LinkedFile).file().is_some());
    }

    #[test]
    fn test_register_and_lookup() {
        let store = SqliteAttachments::open_in_memory().unwrap();
        store.register(&pdf(3, LinkMode::ImportedFile)).unwrap();
        store.register(&pdf(1, LinkMode::LinkedUrl)).unwrap();
        store.register(&pdf(2, LinkMode::LinkedFile)).unwrap();

        let_assert!(Ok(Some(found)) = store.attachment(ItemId::new(2).unwrap()));
        check!(found == pdf(2, LinkMode::LinkedFile));
        check!(store.attachment(ItemId::new(9).unwrap()).unwrap().is_none());

        let ids: Vec<i64> = store
            .attachment_ids()
            .unwrap()
            .into_iter()
            .map(ItemId::get)
            .collect();
        check!(ids == vec![1, 2, 3]);

        let files: Vec<i64> = store
            .attachment_ids_except(LinkMode::LinkedUrl)
            .unwrap()
            .into_iter()
            .map(ItemId::get)
            .collect();
        check!(files == vec![2, 3]);
    }

    #[test]
    fn test_storage_layout_paths() {
        let layout = StorageLayout::new("/data/storage");
        let id = ItemId::new(42).unwrap();
        check!(layout.cache_file(id) == PathBuf::from("/data/storage/42/.fulltext-cache"));
        check!(layout.info_file(id) == PathBuf::from("/data/storage/42/.fulltext-info"));
    }
}
