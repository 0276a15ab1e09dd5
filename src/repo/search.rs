//! Hierarchy-aware search over the repository's storage layout.

use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::{collect_summaries, read_err, row_to_summary, BlockMetaColumn, Repository};
use crate::error::Result;
use crate::model::{BlockKind, DocumentSummary};

/// A content-block search result: a flat locator row, not a tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHit {
    /// Block identifier
    pub id: String,

    /// Owning document identifier
    pub document_id: String,

    /// Owning section identifier, absent for root-level blocks
    pub section_id: Option<String>,

    /// Block kind
    pub kind: BlockKind,

    /// Text payload, for text blocks
    pub text: Option<String>,

    /// Side-storage reference, for image and table blocks
    pub source: Option<String>,

    /// Caption, for image and table blocks
    pub caption: Option<String>,

    /// Position among sibling blocks
    pub order: u32,
}

impl Repository {
    /// Search documents by title or source filename, case-insensitive
    /// contains semantics. An empty result set is a normal outcome.
    pub fn search_documents(
        &self,
        query: &str,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<DocumentSummary>> {
        let pattern = like_pattern(query);
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, title, source_filename, created_at, updated_at
                 FROM documents
                 WHERE title LIKE ?1 ESCAPE '\\' OR source_filename LIKE ?1 ESCAPE '\\'
                 ORDER BY created_at DESC, id ASC
                 LIMIT ?2 OFFSET ?3",
            )
            .map_err(read_err)?;
        let rows = stmt
            .query_map(params![pattern, limit, skip], row_to_summary)
            .map_err(read_err)?;
        collect_summaries(rows)
    }

    /// Search content blocks by text payload, case-insensitive contains
    /// semantics, across all documents.
    pub fn search_blocks(&self, query: &str, skip: u32, limit: u32) -> Result<Vec<BlockHit>> {
        let pattern = like_pattern(query);
        self.block_query(
            "SELECT id, document_id, section_id, kind, text, source, metadata, ord
             FROM content_blocks
             WHERE text LIKE ?1 ESCAPE '\\'
             ORDER BY document_id ASC, id ASC
             LIMIT ?2 OFFSET ?3",
            params![pattern, limit, skip],
        )
    }

    /// Retrieve all content blocks of one kind across all documents.
    pub fn blocks_by_kind(&self, kind: BlockKind, skip: u32, limit: u32) -> Result<Vec<BlockHit>> {
        self.block_query(
            "SELECT id, document_id, section_id, kind, text, source, metadata, ord
             FROM content_blocks
             WHERE kind = ?1
             ORDER BY document_id ASC, id ASC
             LIMIT ?2 OFFSET ?3",
            params![kind.as_str(), limit, skip],
        )
    }

    fn block_query(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<BlockHit>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql).map_err(read_err)?;
        let rows = stmt
            .query_map(args, |row| {
                let kind: String = row.get(3)?;
                let metadata: String = row.get(6)?;
                let meta: BlockMetaColumn = serde_json::from_str(&metadata).unwrap_or_default();
                Ok(BlockHit {
                    id: row.get(0)?,
                    document_id: row.get(1)?,
                    section_id: row.get(2)?,
                    kind: BlockKind::parse(&kind).unwrap_or(BlockKind::Text),
                    text: row.get(4)?,
                    source: row.get(5)?,
                    caption: meta.caption,
                    order: row.get::<_, i64>(7)? as u32,
                })
            })
            .map_err(read_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(read_err)
    }
}

/// Build a `%query%` LIKE pattern, escaping the wildcard characters in the
/// user's query so they match literally.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
