//! Section nodes of the document tree.

use super::ContentBlock;
use serde::{Deserialize, Serialize};

/// A hierarchical grouping node (chapter, section, subsection).
///
/// Sections own their children exclusively; the tree is built once per
/// document and subtrees are never shared. A section's level is always its
/// parent's level plus one, with top-level sections at level 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Identifier
    pub id: String,

    /// Section title, from the heading element
    pub title: String,

    /// Hierarchy level, 1 for top-level sections
    pub level: u8,

    /// Position among sibling sections, zero-based and dense
    pub order: u32,

    /// Child sections
    #[serde(default)]
    pub sections: Vec<Section>,

    /// Content blocks directly inside this section
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
}

impl Section {
    /// Create a section with a fresh identifier.
    pub fn new(title: impl Into<String>, level: u8, order: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            level,
            order,
            sections: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Count sections in this subtree, including this one.
    pub fn section_count(&self) -> usize {
        1 + self
            .sections
            .iter()
            .map(Section::section_count)
            .sum::<usize>()
    }

    /// Count content blocks in this subtree.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
            + self
                .sections
                .iter()
                .map(Section::block_count)
                .sum::<usize>()
    }

    /// Get plain text of the subtree: title, own text blocks, then children.
    pub fn plain_text(&self) -> String {
        let mut parts = vec![self.title.clone()];
        parts.extend(self.blocks.iter().filter_map(|b| b.text().map(str::to_string)));
        parts.extend(self.sections.iter().map(Section::plain_text));
        parts.join("\n\n")
    }
}
