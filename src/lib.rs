//! # doctree
//!
//! Structures the flat output of a document-extraction pass into a
//! persisted, queryable hierarchical document.
//!
//! The input is an ordered stream of typed elements (headings with nesting
//! levels, paragraphs, table and image captures, page markers). The tree
//! builder folds that stream into a tree of sections and content blocks,
//! merging tables that were split across page boundaries; the side-content
//! extractor moves binary payloads to addressable storage; the repository
//! persists the tree to SQLite with stable ordering and answers
//! hierarchy-aware search queries.
//!
//! ## Quick Start
//!
//! ```no_run
//! use doctree::{DirAssetStore, Element, Repository};
//!
//! fn main() -> doctree::Result<()> {
//!     let elements = vec![
//!         Element::heading(1, "Introduction"),
//!         Element::paragraph("Hello, world."),
//!     ];
//!
//!     let store = DirAssetStore::new("./output");
//!     let doc = doctree::digitize("My Document", "document.pdf", &elements, &store)?;
//!
//!     let repo = Repository::open("doctree.db")?;
//!     repo.persist(&doc)?;
//!
//!     let fetched = repo.fetch(&doc.id)?;
//!     println!("{} sections", fetched.section_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Robust structuring**: heading-level gaps are clamped, never fatal
//! - **Table merging**: fragments split by pagination become one block
//! - **Stable ordering**: explicit per-sibling order indices survive the
//!   persist→fetch round trip
//! - **Cascading lifecycle**: deleting a document removes its whole tree
//! - **Search**: by title/filename, by block text, by block kind

pub mod assets;
pub mod builder;
pub mod error;
pub mod model;
pub mod repo;

// Re-export commonly used types
pub use assets::{extract_side_content, AssetKind, AssetStore, DirAssetStore};
pub use builder::{BuildOptions, HeadingMode, TreeBuilder};
pub use error::{Error, Result};
pub use model::{
    BlockBody, BlockKind, ContentBlock, Document, DocumentMeta, DocumentSummary, Element,
    ImagePayload, PageRange, Section,
};
pub use repo::{BlockHit, Repository};

/// Parse an element stream from its JSON wire format.
pub fn elements_from_json(json: &str) -> Result<Vec<Element>> {
    serde_json::from_str(json).map_err(|e| Error::InvalidInput(e.to_string()))
}

/// Build a document tree from a flat element stream with default options.
pub fn structure(
    title: impl Into<String>,
    source_filename: impl Into<String>,
    elements: &[Element],
) -> Result<Document> {
    TreeBuilder::new().build(title, source_filename, elements)
}

/// Run the full transform: build the tree, then move side content into the
/// store. The returned document holds references only, ready to persist.
pub fn digitize(
    title: impl Into<String>,
    source_filename: impl Into<String>,
    elements: &[Element],
    store: &dyn AssetStore,
) -> Result<Document> {
    let mut doc = TreeBuilder::new().build(title, source_filename, elements)?;
    extract_side_content(&mut doc, store)?;
    Ok(doc)
}

/// Builder-style entry point for the transform pipeline.
///
/// # Example
///
/// ```no_run
/// use doctree::{Digitizer, DirAssetStore, Element};
///
/// let store = DirAssetStore::new("./output");
/// let doc = Digitizer::new()
///     .strict_headings()
///     .with_store(&store)
///     .run("Report", "report.pdf", &[Element::heading(1, "Intro")])?;
/// # Ok::<(), doctree::Error>(())
/// ```
pub struct Digitizer<'a> {
    options: BuildOptions,
    store: Option<&'a dyn AssetStore>,
}

impl<'a> Digitizer<'a> {
    /// Create a digitizer with default options and no asset store.
    pub fn new() -> Self {
        Self {
            options: BuildOptions::default(),
            store: None,
        }
    }

    /// Reject heading-level gaps instead of clamping them.
    pub fn strict_headings(mut self) -> Self {
        self.options = self.options.strict_headings();
        self
    }

    /// Set the heading mode.
    pub fn with_heading_mode(mut self, mode: HeadingMode) -> Self {
        self.options = self.options.with_heading_mode(mode);
        self
    }

    /// Set the asset store side content is extracted into. Without a store,
    /// payloads stay in memory.
    pub fn with_store(mut self, store: &'a dyn AssetStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Run the pipeline over one element stream.
    pub fn run(
        &self,
        title: impl Into<String>,
        source_filename: impl Into<String>,
        elements: &[Element],
    ) -> Result<Document> {
        let builder = TreeBuilder::with_options(self.options.clone());
        let mut doc = builder.build(title, source_filename, elements)?;
        if let Some(store) = self.store {
            extract_side_content(&mut doc, store)?;
        }
        Ok(doc)
    }
}

impl Default for Digitizer<'_> {
    fn default() -> Self {
        Self::new()
    }
}
