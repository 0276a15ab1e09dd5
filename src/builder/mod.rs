//! Tree builder — folds the flat element stream into a document hierarchy.

mod merge;

use crate::error::{Error, Result};
use crate::model::{
    BlockBody, ContentBlock, Document, Element, ImagePayload, PageRange, Section,
};

/// How to treat heading levels that skip intermediate levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeadingMode {
    /// Clamp a gapping level to parent level + 1. Extraction output
    /// routinely skips levels; a gap is an artifact, not an error.
    #[default]
    Clamp,

    /// Reject a gapping level with `Error::InvalidInput`.
    Strict,
}

/// Options for building a document tree.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Heading gap handling
    pub heading_mode: HeadingMode,
}

impl BuildOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heading mode.
    pub fn with_heading_mode(mut self, mode: HeadingMode) -> Self {
        self.heading_mode = mode;
        self
    }

    /// Reject heading-level gaps instead of clamping them.
    pub fn strict_headings(mut self) -> Self {
        self.heading_mode = HeadingMode::Strict;
        self
    }
}

/// Builds a [`Document`] tree from a flat element stream.
///
/// The builder maintains a stack of open sections keyed by hierarchy level.
/// Headings push and pop the stack; all other content attaches to the
/// current insertion point. An empty stream produces an empty document,
/// never an error.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    options: BuildOptions,
}

/// An open section on the builder stack, addressed by its index path from
/// the document root.
struct OpenSection {
    path: Vec<usize>,
    level: u8,
}

impl TreeBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with custom options.
    pub fn with_options(options: BuildOptions) -> Self {
        Self { options }
    }

    /// Consume the element stream and produce a document tree.
    pub fn build(
        &self,
        title: impl Into<String>,
        source_filename: impl Into<String>,
        elements: &[Element],
    ) -> Result<Document> {
        let mut doc = Document::new(title, source_filename);
        let mut stack: Vec<OpenSection> = Vec::new();
        let mut current_page: u32 = 1;
        let mut max_page: u32 = 0;

        for element in elements {
            if let Some(page) = element.page() {
                current_page = page;
            }

            match element {
                Element::PageBreak => {
                    current_page += 1;
                }

                Element::PageHeader { text } => {
                    push_unique(&mut doc.metadata.page_headers, text);
                }

                Element::PageFooter { text } => {
                    push_unique(&mut doc.metadata.page_footers, text);
                }

                Element::SectionHeader { level, text, .. } => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    max_page = max_page.max(current_page);
                    self.open_section(&mut doc, &mut stack, *level, text)?;
                }

                Element::Paragraph { text, .. } => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    max_page = max_page.max(current_page);
                    append_block(
                        &mut doc,
                        &stack,
                        BlockBody::text(text.clone()),
                        current_page,
                    );
                }

                Element::Picture {
                    data,
                    mime,
                    caption,
                    ..
                } => {
                    max_page = max_page.max(current_page);
                    if data.is_empty() {
                        log::warn!("image element without payload on page {current_page}");
                    }
                    let payload = (!data.is_empty())
                        .then(|| ImagePayload::new(data.clone(), mime.clone()));
                    append_block(
                        &mut doc,
                        &stack,
                        BlockBody::Image {
                            payload,
                            source: None,
                            caption: caption.clone(),
                            summary: None,
                        },
                        current_page,
                    );
                }

                Element::Table {
                    columns,
                    rows,
                    caption,
                    ..
                } => {
                    max_page = max_page.max(current_page);
                    let blocks = blocks_at(&mut doc, current_path(&stack));
                    if merge::try_merge(blocks, columns, rows, current_page) {
                        log::debug!(
                            "merged table fragment ({} rows) into previous block",
                            rows.len()
                        );
                        continue;
                    }
                    append_block(
                        &mut doc,
                        &stack,
                        BlockBody::table(columns.clone(), rows.clone(), caption.clone()),
                        current_page,
                    );
                }
            }
        }

        doc.metadata.page_count = max_page;
        Ok(doc)
    }

    /// Pop the stack to the incoming heading's parent, resolve level gaps,
    /// and open a new section at the insertion point.
    fn open_section(
        &self,
        doc: &mut Document,
        stack: &mut Vec<OpenSection>,
        level: u8,
        title: &str,
    ) -> Result<()> {
        let level = level.max(1);
        while stack.last().is_some_and(|open| open.level >= level) {
            stack.pop();
        }

        let parent_level = stack.last().map_or(0, |open| open.level);
        let level = if level > parent_level + 1 {
            match self.options.heading_mode {
                HeadingMode::Clamp => {
                    log::debug!(
                        "clamping heading level {} to {} for {:?}",
                        level,
                        parent_level + 1,
                        title
                    );
                    parent_level + 1
                }
                HeadingMode::Strict => {
                    return Err(Error::InvalidInput(format!(
                        "heading level {} skips level {}",
                        level,
                        parent_level + 1
                    )));
                }
            }
        } else {
            level
        };

        let mut path = stack.last().map(|open| open.path.clone()).unwrap_or_default();
        let siblings = sections_at(doc, &path);
        let order = siblings.len() as u32;
        siblings.push(Section::new(title, level, order));
        path.push(order as usize);
        stack.push(OpenSection { path, level });
        Ok(())
    }
}

fn current_path(stack: &[OpenSection]) -> &[usize] {
    stack.last().map(|open| open.path.as_slice()).unwrap_or(&[])
}

/// Resolve the child-section list of the node at `path` (empty = root).
fn sections_at<'a>(doc: &'a mut Document, path: &[usize]) -> &'a mut Vec<Section> {
    let Some((&first, rest)) = path.split_first() else {
        return &mut doc.sections;
    };
    let mut section = &mut doc.sections[first];
    for &index in rest {
        section = &mut section.sections[index];
    }
    &mut section.sections
}

/// Resolve the block list of the node at `path` (empty = root).
fn blocks_at<'a>(doc: &'a mut Document, path: &[usize]) -> &'a mut Vec<ContentBlock> {
    let Some((&first, rest)) = path.split_first() else {
        return &mut doc.blocks;
    };
    let mut section = &mut doc.sections[first];
    for &index in rest {
        section = &mut section.sections[index];
    }
    &mut section.blocks
}

fn append_block(doc: &mut Document, stack: &[OpenSection], body: BlockBody, page: u32) {
    let blocks = blocks_at(doc, current_path(stack));
    let order = blocks.len() as u32;
    blocks.push(ContentBlock::new(body, order, Some(PageRange::single(page))));
}

fn push_unique(list: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() && !list.iter().any(|existing| existing == text) {
        list.push(text.to_string());
    }
}
