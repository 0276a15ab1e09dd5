//! Side storage for non-text payloads (images, tabular data).

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::{BlockBody, ContentBlock, Document, Section};

/// Kind of side-stored content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Image bytes
    Image,
    /// Tabular data as CSV
    Table,
}

impl AssetKind {
    /// Subdirectory name under the document folder.
    pub fn dir(&self) -> &'static str {
        match self {
            AssetKind::Image => "images",
            AssetKind::Table => "tables",
        }
    }

    /// Filename prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Table => "table",
        }
    }
}

/// Addressable storage for extracted side content.
///
/// References returned by `put` are stable strings resolvable by `get` on
/// the same store; content blocks persist the reference, never the bytes.
pub trait AssetStore {
    /// Write `bytes` for the given document, returning a stable reference.
    fn put(
        &self,
        document_id: &str,
        kind: AssetKind,
        seq: u32,
        ext: &str,
        bytes: &[u8],
    ) -> Result<String>;

    /// Read content back by a reference previously returned from `put`.
    fn get(&self, reference: &str) -> Result<Vec<u8>>;
}

/// Filesystem-backed asset store rooted at a directory.
///
/// Layout: `<root>/<document_id>/images/image_001.png`,
/// `<root>/<document_id>/tables/table_001.csv`.
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetStore for DirAssetStore {
    fn put(
        &self,
        document_id: &str,
        kind: AssetKind,
        seq: u32,
        ext: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let reference = format!(
            "{document_id}/{}/{}_{seq:03}.{ext}",
            kind.dir(),
            kind.prefix()
        );
        let path = self.root.join(&reference);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::StorageWrite(format!("{}: {e}", parent.display())))?;
        }
        fs::write(&path, bytes)
            .map_err(|e| Error::StorageWrite(format!("{}: {e}", path.display())))?;
        log::debug!("stored {} bytes at {reference}", bytes.len());
        Ok(reference)
    }

    fn get(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.root.join(reference);
        fs::read(&path).map_err(|e| Error::StorageRead(format!("{}: {e}", path.display())))
    }
}

/// Per-kind sequence counters for stable, collision-free asset names.
#[derive(Default)]
struct Sequencer {
    image: u32,
    table: u32,
}

impl Sequencer {
    fn next(&mut self, kind: AssetKind) -> u32 {
        let counter = match kind {
            AssetKind::Image => &mut self.image,
            AssetKind::Table => &mut self.table,
        };
        *counter += 1;
        *counter
    }
}

/// Move every pending in-memory payload in the tree to the store, rewriting
/// blocks to carry references instead.
///
/// Blocks that already carry a reference are left untouched, so the pass is
/// idempotent per build. Any storage failure aborts the whole transform —
/// a block is never left holding a partial reference.
pub fn extract_side_content(doc: &mut Document, store: &dyn AssetStore) -> Result<()> {
    let document_id = doc.id.clone();
    let mut seq = Sequencer::default();
    extract_blocks(&mut doc.blocks, &document_id, store, &mut seq)?;
    for section in &mut doc.sections {
        extract_section(section, &document_id, store, &mut seq)?;
    }
    Ok(())
}

fn extract_section(
    section: &mut Section,
    document_id: &str,
    store: &dyn AssetStore,
    seq: &mut Sequencer,
) -> Result<()> {
    extract_blocks(&mut section.blocks, document_id, store, seq)?;
    for child in &mut section.sections {
        extract_section(child, document_id, store, seq)?;
    }
    Ok(())
}

fn extract_blocks(
    blocks: &mut [ContentBlock],
    document_id: &str,
    store: &dyn AssetStore,
    seq: &mut Sequencer,
) -> Result<()> {
    for block in blocks {
        match &mut block.body {
            BlockBody::Text { .. } => {}

            BlockBody::Image {
                payload, source, ..
            } => {
                if source.is_some() {
                    continue;
                }
                let Some(image) = payload.take() else {
                    continue;
                };
                let reference = store.put(
                    document_id,
                    AssetKind::Image,
                    seq.next(AssetKind::Image),
                    image.extension(),
                    &image.data,
                )?;
                *source = Some(reference);
            }

            BlockBody::Table {
                columns,
                rows,
                row_count,
                source,
                ..
            } => {
                if source.is_some() || (columns.is_empty() && rows.is_empty()) {
                    continue;
                }
                let bytes = table_csv(columns, rows)?;
                let reference = store.put(
                    document_id,
                    AssetKind::Table,
                    seq.next(AssetKind::Table),
                    "csv",
                    &bytes,
                )?;
                *row_count = rows.len();
                rows.clear();
                *source = Some(reference);
            }
        }
    }
    Ok(())
}

/// Serialize a table as CSV: header row first, then data rows.
fn table_csv(columns: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::StorageWrite(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::model::Element;

    fn sample_document() -> Document {
        let elements = vec![
            Element::heading(1, "Intro"),
            Element::picture(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            Element::table(
                ["name", "age"],
                vec![vec!["Alice".into(), "30".into()], vec!["Bob".into(), "25".into()]],
            ),
        ];
        TreeBuilder::new().build("Doc", "doc.pdf", &elements).unwrap()
    }

    #[test]
    fn test_extraction_rewrites_references() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirAssetStore::new(dir.path());
        let mut doc = sample_document();

        extract_side_content(&mut doc, &store).unwrap();

        let section = &doc.sections[0];
        let image_ref = section.blocks[0].source().unwrap();
        let table_ref = section.blocks[1].source().unwrap();
        assert!(image_ref.ends_with("images/image_001.png"));
        assert!(table_ref.ends_with("tables/table_001.csv"));
        assert!(!section.blocks[0].has_pending_payload());
        assert!(!section.blocks[1].has_pending_payload());

        let csv_bytes = store.get(table_ref).unwrap();
        let csv_text = String::from_utf8(csv_bytes).unwrap();
        assert!(csv_text.starts_with("name,age\n"));
        assert!(csv_text.contains("Alice,30"));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirAssetStore::new(dir.path());
        let mut doc = sample_document();

        extract_side_content(&mut doc, &store).unwrap();
        let first = doc.sections[0].blocks[1].source().unwrap().to_string();

        extract_side_content(&mut doc, &store).unwrap();
        assert_eq!(doc.sections[0].blocks[1].source().unwrap(), first);
    }

    #[test]
    fn test_table_row_count_survives_drain() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirAssetStore::new(dir.path());
        let mut doc = sample_document();

        extract_side_content(&mut doc, &store).unwrap();

        match &doc.sections[0].blocks[1].body {
            BlockBody::Table {
                rows, row_count, ..
            } => {
                assert!(rows.is_empty());
                assert_eq!(*row_count, 2);
            }
            _ => panic!("expected table"),
        }
    }

    #[test]
    fn test_get_unknown_reference_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirAssetStore::new(dir.path());
        let result = store.get("missing/images/image_001.png");
        assert!(matches!(result, Err(Error::StorageRead(_))));
    }
}
