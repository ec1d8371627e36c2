//! Presence-only inverted index persisted in SQLite.
//!
//! Three tables make up the index: a dictionary of unique words, one record
//! per indexed item carrying its counters, and the (word, item) associations.
//! Every mutating operation runs inside a savepoint so it is atomic on its own
//! and also nests inside a caller's larger scope.

use super::tokenize::normalize_tokens;
use crate::attachment::ItemId;
use crate::error::Result;
use crate::state::{CounterKind, IndexCounters};
use ahash::AHashMap;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::fmt;
use std::path::Path;

/// Format version stamped on every item record.
pub const FULLTEXT_VERSION: i64 = 1;

/// Maximum number of bound parameters per dictionary lookup.
pub const WORD_CHUNK_SIZE: usize = 999;

const PURGE_FLAG: &str = "purge.fulltext";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS fulltextWords (
        wordID INTEGER PRIMARY KEY,
        word TEXT UNIQUE
    );
    CREATE TABLE IF NOT EXISTS fulltextItems (
        itemID INTEGER PRIMARY KEY,
        version INT,
        indexedPages INT,
        totalPages INT,
        indexedChars INT,
        totalChars INT
    );
    CREATE TABLE IF NOT EXISTS fulltextItemWords (
        wordID INT,
        itemID INT,
        PRIMARY KEY (wordID, itemID),
        FOREIGN KEY (wordID) REFERENCES fulltextWords(wordID),
        FOREIGN KEY (itemID) REFERENCES fulltextItems(itemID)
    );
    CREATE INDEX IF NOT EXISTS fulltextItemWords_itemID ON fulltextItemWords(itemID);
    CREATE TABLE IF NOT EXISTS fulltextSettings (
        key TEXT PRIMARY KEY,
        value INT
    );
";

/// Bookkeeping returned by [`IndexStore::index_words`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordsIndexed {
    /// Number of dictionary lookup queries issued.
    pub lookup_batches: usize,
    /// Words added to the dictionary by this call.
    pub new_words: usize,
    /// Distinct tokens associated with the item.
    pub tokens: usize,
}

/// Record counts by completeness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub indexed: u64,
    pub partial: u64,
}

pub struct IndexStore {
    conn: Connection,
}

impl fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexStore").finish_non_exhaustive()
    }
}

const fn counter_columns(kind: CounterKind) -> (&'static str, &'static str) {
    match kind {
        CounterKind::Pages => ("indexedPages", "totalPages"),
        CounterKind::Chars => ("indexedChars", "totalChars"),
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

fn to_column(value: Option<u64>) -> Option<i64> {
    value.map(|n| n as i64)
}

impl IndexStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Run `f` inside a savepoint, rolling back everything it did on error.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("SAVEPOINT fulltext")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("RELEASE fulltext")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch("ROLLBACK TO fulltext; RELEASE fulltext")
                {
                    tracing::error!(error = %rollback, "Failed to roll back savepoint");
                }
                Err(e)
            }
        }
    }

    /// Associate `tokens` with an item, adding unseen words to the dictionary.
    ///
    /// Tokens are normalized first. Returns `None` without touching the
    /// database when nothing is left to index. The item's record is replaced,
    /// which resets its counters.
    pub fn index_words<S: AsRef<str>>(
        &self,
        item_id: ItemId,
        tokens: &[S],
    ) -> Result<Option<WordsIndexed>> {
        let tokens = normalize_tokens(tokens);
        if tokens.is_empty() {
            tracing::debug!(item_id = %item_id, "No words to index");
            return Ok(None);
        }

        self.in_transaction(|store| {
            let mut known: AHashMap<String, i64> = AHashMap::with_capacity(tokens.len());
            let mut lookup_batches = 0;

            for chunk in tokens.chunks(WORD_CHUNK_SIZE) {
                let sql = format!(
                    "SELECT word, wordID FROM fulltextWords WHERE word IN ({})",
                    placeholders(chunk.len())
                );
                let mut stmt = store.conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?;
                for row in rows {
                    let (word, id) = row?;
                    known.insert(word, id);
                }
                lookup_batches += 1;
            }

            store.conn.execute(
                "INSERT INTO fulltextItems (itemID, version) VALUES (?1, ?2)
                 ON CONFLICT(itemID) DO UPDATE SET version = excluded.version,
                     indexedPages = NULL, totalPages = NULL,
                     indexedChars = NULL, totalChars = NULL",
                params![item_id, FULLTEXT_VERSION],
            )?;

            let mut insert_word = store
                .conn
                .prepare_cached("INSERT INTO fulltextWords (word) VALUES (?1)")?;
            let mut insert_association = store.conn.prepare_cached(
                "INSERT OR IGNORE INTO fulltextItemWords (wordID, itemID) VALUES (?1, ?2)",
            )?;

            let mut new_words = 0;
            for token in &tokens {
                let word_id = match known.get(token) {
                    Some(&id) => id,
                    None => {
                        insert_word.execute([token])?;
                        new_words += 1;
                        store.conn.last_insert_rowid()
                    }
                };
                insert_association.execute(params![word_id, item_id])?;
            }

            tracing::debug!(
                item_id = %item_id,
                tokens = tokens.len(),
                new_words,
                lookup_batches,
                "Indexed words"
            );

            Ok(Some(WordsIndexed {
                lookup_batches,
                new_words,
                tokens: tokens.len(),
            }))
        })
    }

    /// Remove an item's record and associations. Returns whether a record existed.
    pub fn clear_item_words(&self, item_id: ItemId) -> Result<bool> {
        self.in_transaction(|store| {
            if !store.record_exists(item_id)? {
                return Ok(false);
            }
            store
                .conn
                .execute("DELETE FROM fulltextItemWords WHERE itemID = ?1", [item_id])?;
            store
                .conn
                .execute("DELETE FROM fulltextItems WHERE itemID = ?1", [item_id])?;
            store.set_purge_needed(true)?;
            Ok(true)
        })
    }

    /// Delete the records and associations of every listed item.
    pub fn delete_items(&self, item_ids: &[ItemId]) -> Result<usize> {
        if item_ids.is_empty() {
            return Ok(0);
        }

        self.in_transaction(|store| {
            let mut records = 0;
            let mut associations = 0;
            for chunk in item_ids.chunks(WORD_CHUNK_SIZE) {
                let list = placeholders(chunk.len());
                associations += store.conn.execute(
                    &format!("DELETE FROM fulltextItemWords WHERE itemID IN ({list})"),
                    params_from_iter(chunk.iter()),
                )?;
                records += store.conn.execute(
                    &format!("DELETE FROM fulltextItems WHERE itemID IN ({list})"),
                    params_from_iter(chunk.iter()),
                )?;
            }
            if associations > 0 {
                store.set_purge_needed(true)?;
            }
            tracing::debug!(records, associations, "Deleted index records");
            Ok(records)
        })
    }

    /// Drop every record, association and dictionary word. Returns the number of records.
    pub fn delete_all(&self) -> Result<usize> {
        self.in_transaction(|store| {
            store.conn.execute("DELETE FROM fulltextItemWords", [])?;
            let records = store.conn.execute("DELETE FROM fulltextItems", [])?;
            store.conn.execute("DELETE FROM fulltextWords", [])?;
            store.set_purge_needed(false)?;
            Ok(records)
        })
    }

    pub fn record_exists(&self, item_id: ItemId) -> Result<bool> {
        Ok(self
            .conn
            .prepare_cached("SELECT 1 FROM fulltextItems WHERE itemID = ?1")?
            .exists([item_id])?)
    }

    /// Counters of an item, or `None` if it has no record.
    pub fn counters(&self, item_id: ItemId, kind: CounterKind) -> Result<Option<IndexCounters>> {
        let (indexed, total) = counter_columns(kind);
        let sql = format!("SELECT {indexed}, {total} FROM fulltextItems WHERE itemID = ?1");
        let counters = self
            .conn
            .prepare_cached(&sql)?
            .query_row([item_id], |row| {
                Ok(IndexCounters::new(
                    row.get::<_, Option<i64>>(0)?.map(|n| n as u64),
                    row.get::<_, Option<i64>>(1)?.map(|n| n as u64),
                ))
            })
            .optional()?;
        Ok(counters)
    }

    /// Overwrite an item's counters. Zeros are stored as NULL.
    /// Items without a record are left untouched.
    pub fn set_counters(
        &self,
        item_id: ItemId,
        kind: CounterKind,
        counters: IndexCounters,
    ) -> Result<()> {
        let (indexed, total) = counter_columns(kind);
        let counters = counters.normalized();
        let sql = format!("UPDATE fulltextItems SET {indexed} = ?1, {total} = ?2 WHERE itemID = ?3");
        self.conn.prepare_cached(&sql)?.execute(params![
            to_column(counters.indexed),
            to_column(counters.total),
            item_id
        ])?;
        Ok(())
    }

    pub fn get_pages(&self, item_id: ItemId) -> Result<Option<IndexCounters>> {
        self.counters(item_id, CounterKind::Pages)
    }

    pub fn get_chars(&self, item_id: ItemId) -> Result<Option<IndexCounters>> {
        self.counters(item_id, CounterKind::Chars)
    }

    pub fn set_pages(&self, item_id: ItemId, counters: IndexCounters) -> Result<()> {
        self.set_counters(item_id, CounterKind::Pages, counters)
    }

    pub fn set_chars(&self, item_id: ItemId, counters: IndexCounters) -> Result<()> {
        self.set_counters(item_id, CounterKind::Chars, counters)
    }

    /// Ids of every item with a record.
    pub fn record_ids(&self) -> Result<Vec<ItemId>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT itemID FROM fulltextItems ORDER BY itemID")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(ItemId::from_row))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Ids of items that have a record with at least one indexed counter.
    pub fn items_with_indexed_content(&self) -> Result<Vec<ItemId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT itemID FROM fulltextItems
             WHERE indexedChars IS NOT NULL OR indexedPages IS NOT NULL
             ORDER BY itemID",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(ItemId::from_row))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Number of fully and partially indexed records.
    pub fn record_counts(&self) -> Result<RecordCounts> {
        let indexed: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fulltextItems WHERE
                (indexedPages IS NOT NULL AND (totalPages IS NULL OR indexedPages >= totalPages))
             OR (indexedChars IS NOT NULL AND (totalChars IS NULL OR indexedChars >= totalChars))",
            [],
            |row| row.get(0),
        )?;
        let partial: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fulltextItems WHERE
                (indexedPages IS NOT NULL AND indexedPages < totalPages)
             OR (indexedChars IS NOT NULL AND indexedChars < totalChars)",
            [],
            |row| row.get(0),
        )?;
        Ok(RecordCounts {
            indexed: indexed as u64,
            partial: partial as u64,
        })
    }

    pub fn word_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM fulltextWords", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Words associated with an item, sorted.
    pub fn item_words(&self, item_id: ItemId) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT word FROM fulltextItemWords JOIN fulltextWords USING (wordID)
             WHERE itemID = ?1 ORDER BY word",
        )?;
        let words = stmt
            .query_map([item_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(words)
    }

    /// Every dictionary word, sorted.
    pub fn dictionary(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT word FROM fulltextWords ORDER BY word")?;
        let words = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(words)
    }

    pub fn purge_needed(&self) -> Result<bool> {
        let value: Option<i64> = self
            .conn
            .query_row(
                "SELECT value FROM fulltextSettings WHERE key = ?1",
                [PURGE_FLAG],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.is_some_and(|v| v != 0))
    }

    pub fn set_purge_needed(&self, needed: bool) -> Result<()> {
        self.conn.execute(
            "INSERT INTO fulltextSettings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![PURGE_FLAG, i64::from(needed)],
        )?;
        Ok(())
    }

    /// Delete dictionary words with no associations, if the purge flag is set.
    ///
    /// Returns the number of words deleted, or `None` when no purge was needed.
    pub fn purge_unused_words(&self) -> Result<Option<usize>> {
        if !self.purge_needed()? {
            tracing::debug!("Word purge not needed");
            return Ok(None);
        }

        self.in_transaction(|store| {
            let deleted = store.conn.execute(
                "DELETE FROM fulltextWords WHERE wordID NOT IN
                 (SELECT wordID FROM fulltextItemWords)",
                [],
            )?;
            store.set_purge_needed(false)?;
            tracing::info!(deleted, "Purged unused words");
            Ok(Some(deleted))
        })
    }
}
