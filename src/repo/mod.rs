//! SQLite-backed repository for structured documents.
//!
//! Three tables mirror the tree: `documents`, `sections` (self-referencing
//! via `parent_id`), `content_blocks` (referencing sections, nullable for
//! root-level content). Sibling order lives in an explicit `ord` column,
//! never in physical row order. Persist and delete are single transactions;
//! structural writes scoped to one document are serialized through an
//! in-flight lock set and rejected with `ConcurrentConflict` on overlap.

mod search;

pub use search::BlockHit;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    BlockBody, BlockKind, ContentBlock, Document, DocumentMeta, DocumentSummary, PageRange,
    Section,
};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    source_filename TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_title ON documents(title);
CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at);

CREATE TABLE IF NOT EXISTS sections (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    parent_id TEXT REFERENCES sections(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    level INTEGER NOT NULL,
    ord INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sections_document_id ON sections(document_id);
CREATE INDEX IF NOT EXISTS idx_sections_parent_id ON sections(parent_id);

CREATE TABLE IF NOT EXISTS content_blocks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    section_id TEXT REFERENCES sections(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    text TEXT,
    source TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    ord INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_blocks_document_id ON content_blocks(document_id);
CREATE INDEX IF NOT EXISTS idx_blocks_section_id ON content_blocks(section_id);
CREATE INDEX IF NOT EXISTS idx_blocks_kind ON content_blocks(kind);
";

/// Repository over relational storage.
pub struct Repository {
    conn: Mutex<Connection>,
    in_flight: Mutex<HashSet<String>>,
}

impl Repository {
    /// Open or create a database file with the full schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(read_err)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (mainly for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(read_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(write_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(write_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark a document as having a structural operation in flight. A second
    /// operation on the same identifier is rejected instead of interleaved.
    fn lock_document(&self, document_id: &str) -> Result<DocGuard<'_>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(document_id.to_string()) {
            return Err(Error::ConcurrentConflict(document_id.to_string()));
        }
        Ok(DocGuard {
            set: &self.in_flight,
            id: document_id.to_string(),
        })
    }

    // ── Persist ──────────────────────────────────────────────────────

    /// Write a fully built document tree in one transaction: the document,
    /// then sections parent-before-child, then content blocks. Either the
    /// whole tree is stored or none of it is.
    pub fn persist(&self, doc: &Document) -> Result<()> {
        let _guard = self.lock_document(&doc.id)?;
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(write_err)?;

        let metadata = serde_json::to_string(&doc.metadata)
            .map_err(|e| Error::StorageWrite(e.to_string()))?;
        tx.execute(
            "INSERT INTO documents (id, title, source_filename, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                doc.id,
                doc.title,
                doc.source_filename,
                metadata,
                format_timestamp(&doc.created_at),
                format_timestamp(&doc.updated_at),
            ],
        )
        .map_err(write_err)?;

        insert_blocks(&tx, &doc.id, None, &doc.blocks)?;
        for section in &doc.sections {
            insert_section(&tx, &doc.id, None, section)?;
        }

        tx.commit().map_err(write_err)?;
        log::info!(
            "persisted document {} ({} sections, {} blocks)",
            doc.id,
            doc.section_count(),
            doc.block_count()
        );
        Ok(())
    }

    // ── Fetch ────────────────────────────────────────────────────────

    /// Reconstruct the full tree for a document identifier.
    ///
    /// Returns `NotFound` for unknown identifiers and never a partially
    /// populated tree.
    pub fn fetch(&self, document_id: &str) -> Result<Document> {
        let conn = self.conn();

        let header = conn
            .query_row(
                "SELECT title, source_filename, metadata, created_at, updated_at
                 FROM documents WHERE id = ?1",
                params![document_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(read_err)?;
        let Some((title, source_filename, metadata, created_at, updated_at)) = header else {
            return Err(Error::NotFound(document_id.to_string()));
        };

        // Load flat rows, group children by parent id, sort by ord.
        let mut section_rows: HashMap<Option<String>, Vec<SectionRow>> = HashMap::new();
        {
            let mut stmt = conn
                .prepare(
                    "SELECT id, parent_id, title, level, ord
                     FROM sections WHERE document_id = ?1",
                )
                .map_err(read_err)?;
            let rows = stmt
                .query_map(params![document_id], |row| {
                    Ok(SectionRow {
                        id: row.get(0)?,
                        parent_id: row.get(1)?,
                        title: row.get(2)?,
                        level: row.get::<_, i64>(3)? as u8,
                        ord: row.get::<_, i64>(4)? as u32,
                    })
                })
                .map_err(read_err)?;
            for row in rows {
                let row = row.map_err(read_err)?;
                section_rows.entry(row.parent_id.clone()).or_default().push(row);
            }
        }

        let mut block_rows: HashMap<Option<String>, Vec<ContentBlock>> = HashMap::new();
        {
            let mut stmt = conn
                .prepare(
                    "SELECT id, section_id, kind, text, source, metadata, ord
                     FROM content_blocks WHERE document_id = ?1",
                )
                .map_err(read_err)?;
            let rows = stmt
                .query_map(params![document_id], |row| {
                    Ok((row.get::<_, Option<String>>(1)?, row_to_block(row)?))
                })
                .map_err(read_err)?;
            for row in rows {
                let (section_id, block) = row.map_err(read_err)?;
                block_rows.entry(section_id).or_default().push(block);
            }
        }
        for blocks in block_rows.values_mut() {
            blocks.sort_by_key(|b| b.order);
        }

        let sections = assemble_sections(&mut section_rows, &mut block_rows, None);
        let blocks = block_rows.remove(&None).unwrap_or_default();

        Ok(Document {
            id: document_id.to_string(),
            title,
            source_filename,
            metadata: serde_json::from_str::<DocumentMeta>(&metadata)
                .map_err(|e| Error::StorageRead(e.to_string()))?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
            blocks,
            sections,
        })
    }

    // ── List ─────────────────────────────────────────────────────────

    /// List document summaries, newest first, ties broken by identifier.
    pub fn list(&self, skip: u32, limit: u32) -> Result<Vec<DocumentSummary>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, title, source_filename, created_at, updated_at
                 FROM documents
                 ORDER BY created_at DESC, id ASC
                 LIMIT ?1 OFFSET ?2",
            )
            .map_err(read_err)?;
        let rows = stmt
            .query_map(params![limit, skip], row_to_summary)
            .map_err(read_err)?;
        collect_summaries(rows)
    }

    /// Total number of stored documents.
    pub fn count(&self) -> Result<u64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM documents", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
            .map_err(read_err)
    }

    // ── Delete ───────────────────────────────────────────────────────

    /// Remove a document and the full transitive closure of its sections
    /// and content blocks. Deleting an unknown identifier is `NotFound`.
    pub fn delete(&self, document_id: &str) -> Result<()> {
        let _guard = self.lock_document(document_id)?;
        let conn = self.conn();
        let deleted = conn
            .execute("DELETE FROM documents WHERE id = ?1", params![document_id])
            .map_err(write_err)?;
        if deleted == 0 {
            return Err(Error::NotFound(document_id.to_string()));
        }
        log::info!("deleted document {document_id}");
        Ok(())
    }

    // ── Enrichment ───────────────────────────────────────────────────

    /// Attach an externally generated summary to a single content block.
    ///
    /// This is the narrow out-of-band mutation used by asynchronous
    /// enrichment: it touches one block's metadata and the document's
    /// `updated_at`, nothing structural. Idempotent.
    pub fn set_block_summary(
        &self,
        document_id: &str,
        block_id: &str,
        summary: &str,
    ) -> Result<()> {
        let _guard = self.lock_document(document_id)?;
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(write_err)?;

        let metadata: Option<String> = tx
            .query_row(
                "SELECT metadata FROM content_blocks WHERE id = ?1 AND document_id = ?2",
                params![block_id, document_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(read_err)?;
        let Some(metadata) = metadata else {
            return Err(Error::NotFound(format!("{document_id}/{block_id}")));
        };

        let mut meta: BlockMetaColumn =
            serde_json::from_str(&metadata).map_err(|e| Error::StorageRead(e.to_string()))?;
        meta.summary = Some(summary.to_string());
        let meta_json =
            serde_json::to_string(&meta).map_err(|e| Error::StorageWrite(e.to_string()))?;

        tx.execute(
            "UPDATE content_blocks SET metadata = ?1 WHERE id = ?2",
            params![meta_json, block_id],
        )
        .map_err(write_err)?;
        tx.execute(
            "UPDATE documents SET updated_at = ?1 WHERE id = ?2",
            params![format_timestamp(&Utc::now()), document_id],
        )
        .map_err(write_err)?;

        tx.commit().map_err(write_err)
    }
}

/// RAII guard releasing a document's in-flight slot.
#[derive(Debug)]
struct DocGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for DocGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.id);
        }
    }
}

// ── Row mapping ──────────────────────────────────────────────────────

struct SectionRow {
    id: String,
    parent_id: Option<String>,
    title: String,
    level: u8,
    ord: u32,
}

/// JSON shape of the `metadata` column on content blocks.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BlockMetaColumn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    caption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    row_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_end: Option<u32>,
}

impl BlockMetaColumn {
    fn from_block(block: &ContentBlock) -> Self {
        let (caption, columns, row_count, summary) = match &block.body {
            BlockBody::Text { .. } => (None, Vec::new(), None, None),
            BlockBody::Image {
                caption, summary, ..
            } => (caption.clone(), Vec::new(), None, summary.clone()),
            BlockBody::Table {
                columns,
                row_count,
                caption,
                summary,
                ..
            } => (
                caption.clone(),
                columns.clone(),
                Some(*row_count),
                summary.clone(),
            ),
        };
        Self {
            caption,
            columns,
            row_count,
            summary,
            page_start: block.pages.map(|p| p.start),
            page_end: block.pages.map(|p| p.end),
        }
    }

    fn pages(&self) -> Option<PageRange> {
        match (self.page_start, self.page_end) {
            (Some(start), Some(end)) => Some(PageRange { start, end }),
            _ => None,
        }
    }
}

fn insert_section(
    tx: &Transaction<'_>,
    document_id: &str,
    parent_id: Option<&str>,
    section: &Section,
) -> Result<()> {
    tx.execute(
        "INSERT INTO sections (id, document_id, parent_id, title, level, ord)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            section.id,
            document_id,
            parent_id,
            section.title,
            section.level as i64,
            section.order as i64,
        ],
    )
    .map_err(write_err)?;

    insert_blocks(tx, document_id, Some(&section.id), &section.blocks)?;
    for child in &section.sections {
        insert_section(tx, document_id, Some(&section.id), child)?;
    }
    Ok(())
}

fn insert_blocks(
    tx: &Transaction<'_>,
    document_id: &str,
    section_id: Option<&str>,
    blocks: &[ContentBlock],
) -> Result<()> {
    for block in blocks {
        let meta = BlockMetaColumn::from_block(block);
        let meta_json =
            serde_json::to_string(&meta).map_err(|e| Error::StorageWrite(e.to_string()))?;
        tx.execute(
            "INSERT INTO content_blocks (id, document_id, section_id, kind, text, source, metadata, ord)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                block.id,
                document_id,
                section_id,
                block.kind().as_str(),
                block.text(),
                block.source(),
                meta_json,
                block.order as i64,
            ],
        )
        .map_err(write_err)?;
    }
    Ok(())
}

/// Rebuild a block from its row. Columns: id, section_id, kind, text,
/// source, metadata, ord.
fn row_to_block(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContentBlock> {
    let id: String = row.get(0)?;
    let kind: String = row.get(2)?;
    let text: Option<String> = row.get(3)?;
    let source: Option<String> = row.get(4)?;
    let metadata: String = row.get(5)?;
    let ord: i64 = row.get(6)?;

    let meta: BlockMetaColumn = serde_json::from_str(&metadata).unwrap_or_default();
    let body = match BlockKind::parse(&kind) {
        Some(BlockKind::Text) => BlockBody::Text {
            text: text.unwrap_or_default(),
        },
        Some(BlockKind::Image) => BlockBody::Image {
            payload: None,
            source,
            caption: meta.caption.clone(),
            summary: meta.summary.clone(),
        },
        Some(BlockKind::Table) => BlockBody::Table {
            columns: meta.columns.clone(),
            rows: Vec::new(),
            row_count: meta.row_count.unwrap_or(0),
            source,
            caption: meta.caption.clone(),
            summary: meta.summary.clone(),
        },
        None => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown block kind: {kind}").into(),
            ))
        }
    };

    Ok(ContentBlock {
        id,
        order: ord as u32,
        pages: meta.pages(),
        body,
    })
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentSummary> {
    Ok(DocumentSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        source_filename: row.get(2)?,
        created_at: parse_timestamp_sql(row, 3)?,
        updated_at: parse_timestamp_sql(row, 4)?,
    })
}

fn parse_timestamp_sql(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                e.to_string().into(),
            )
        })
}

/// Fixed-width RFC 3339 so lexicographic column order is chronological.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::StorageRead(format!("bad timestamp {raw:?}: {e}")))
}

fn collect_summaries(
    rows: impl Iterator<Item = rusqlite::Result<DocumentSummary>>,
) -> Result<Vec<DocumentSummary>> {
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(read_err)
}

/// Recursively assemble nested sections for `parent` from grouped rows.
fn assemble_sections(
    section_rows: &mut HashMap<Option<String>, Vec<SectionRow>>,
    block_rows: &mut HashMap<Option<String>, Vec<ContentBlock>>,
    parent: Option<&str>,
) -> Vec<Section> {
    let mut rows = section_rows
        .remove(&parent.map(str::to_string))
        .unwrap_or_default();
    rows.sort_by_key(|row| row.ord);

    rows.into_iter()
        .map(|row| {
            let sections = assemble_sections(section_rows, block_rows, Some(&row.id));
            let blocks = block_rows.remove(&Some(row.id.clone())).unwrap_or_default();
            Section {
                id: row.id,
                title: row.title,
                level: row.level,
                order: row.ord,
                sections,
                blocks,
            }
        })
        .collect()
}

fn write_err(err: rusqlite::Error) -> Error {
    Error::StorageWrite(err.to_string())
}

fn read_err(err: rusqlite::Error) -> Error {
    Error::StorageRead(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::model::Element;

    #[test]
    fn test_in_flight_lock_rejects_overlap() {
        let repo = Repository::open_in_memory().unwrap();
        let guard = repo.lock_document("doc-1").unwrap();

        let err = repo.lock_document("doc-1").unwrap_err();
        assert!(matches!(err, Error::ConcurrentConflict(_)));

        // Unrelated documents are not serialized against each other.
        assert!(repo.lock_document("doc-2").is_ok());

        drop(guard);
        assert!(repo.lock_document("doc-1").is_ok());
    }

    #[test]
    fn test_persist_conflicts_while_locked() {
        let repo = Repository::open_in_memory().unwrap();
        let doc = TreeBuilder::new()
            .build("Doc", "doc.pdf", &[Element::paragraph("hi")])
            .unwrap();

        let _guard = repo.lock_document(&doc.id).unwrap();
        assert!(matches!(
            repo.persist(&doc),
            Err(Error::ConcurrentConflict(_))
        ));
    }

    #[test]
    fn test_double_persist_is_write_error() {
        let repo = Repository::open_in_memory().unwrap();
        let doc = TreeBuilder::new()
            .build("Doc", "doc.pdf", &[Element::paragraph("hi")])
            .unwrap();

        repo.persist(&doc).unwrap();
        assert!(matches!(repo.persist(&doc), Err(Error::StorageWrite(_))));
    }

    #[test]
    fn test_block_meta_column_round_trip() {
        let meta = BlockMetaColumn {
            caption: Some("Quarterly sales".into()),
            columns: vec!["Q1".into(), "Q2".into()],
            row_count: Some(5),
            summary: None,
            page_start: Some(2),
            page_end: Some(3),
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: BlockMetaColumn = serde_json::from_str(&json).unwrap();
        assert_eq!(back.columns.len(), 2);
        assert_eq!(back.pages(), Some(PageRange { start: 2, end: 3 }));
    }
}
