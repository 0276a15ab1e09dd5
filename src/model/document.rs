//! Document-level types.

use super::{ContentBlock, Section};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A structured, hierarchical document — the root aggregate.
///
/// Content preceding the first heading is owned directly by the document in
/// `blocks`; there is no synthetic wrapper section for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Globally unique identifier, assigned at creation
    pub id: String,

    /// Document title
    pub title: String,

    /// Original filename of the source document
    pub source_filename: String,

    /// Document-level metadata
    pub metadata: DocumentMeta,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last-update timestamp
    pub updated_at: DateTime<Utc>,

    /// Root-level content blocks (before the first heading)
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,

    /// Top-level sections
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Document {
    /// Create an empty document with a fresh identifier.
    pub fn new(title: impl Into<String>, source_filename: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            source_filename: source_filename.into(),
            metadata: DocumentMeta::default(),
            created_at: now,
            updated_at: now,
            blocks: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// Check if the document has any sections or content blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.sections.is_empty()
    }

    /// Count all sections in the tree.
    pub fn section_count(&self) -> usize {
        self.sections
            .iter()
            .map(Section::section_count)
            .sum::<usize>()
    }

    /// Count all content blocks in the tree, root-level included.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
            + self
                .sections
                .iter()
                .map(Section::block_count)
                .sum::<usize>()
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        let mut parts: Vec<String> = self
            .blocks
            .iter()
            .filter_map(|b| b.text().map(str::to_string))
            .collect();
        parts.extend(self.sections.iter().map(Section::plain_text));
        parts.join("\n\n")
    }

    /// Get a lightweight summary row for listings.
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            source_filename: self.source_filename.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Document-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Total number of pages in the source document
    pub page_count: u32,

    /// Recurring page headers, deduplicated in first-seen order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_headers: Vec<String>,

    /// Recurring page footers, deduplicated in first-seen order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_footers: Vec<String>,

    /// Free-form extra metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Lightweight document row for listings and search results — no tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Identifier
    pub id: String,

    /// Document title
    pub title: String,

    /// Original filename
    pub source_filename: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last-update timestamp
    pub updated_at: DateTime<Utc>,
}
