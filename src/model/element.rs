//! Flat element stream — the input boundary from the extraction pass.

use serde::{Deserialize, Serialize};

/// A single element of the flat extraction stream.
///
/// Elements arrive in reading order. The optional `page` field carries the
/// 1-indexed page an element was extracted from; when it is absent, the
/// running page marker maintained by the builder (advanced by `page_break`
/// elements) applies instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    /// A heading with an explicit nesting level (1 = top-level).
    #[serde(alias = "heading")]
    SectionHeader {
        /// Raw heading level reported by the extractor
        level: u8,
        /// Heading text
        text: String,
        /// Page the heading appeared on
        page: Option<u32>,
    },

    /// A run of body text. Code blocks, captions and list items from the
    /// extractor are plain text at this stage.
    #[serde(alias = "text", alias = "code", alias = "caption", alias = "list_item")]
    Paragraph {
        /// Text content
        text: String,
        /// Page the text appeared on
        page: Option<u32>,
    },

    /// A captured table, possibly a fragment of a larger table split by a
    /// page boundary.
    Table {
        /// Column headers (first grid row)
        #[serde(default)]
        columns: Vec<String>,
        /// Data rows
        #[serde(default)]
        rows: Vec<Vec<String>>,
        /// Table caption
        caption: Option<String>,
        /// Page the fragment appeared on
        page: Option<u32>,
    },

    /// A captured image with its raw bytes.
    #[serde(alias = "image")]
    Picture {
        /// Raw image bytes, base64 in the JSON wire format
        #[serde(default, with = "base64_bytes")]
        data: Vec<u8>,
        /// MIME type if the extractor reported one
        mime: Option<String>,
        /// Image caption
        caption: Option<String>,
        /// Page the image appeared on
        page: Option<u32>,
    },

    /// Marks a page boundary; produces no node.
    PageBreak,

    /// A recurring page header line; collected into document metadata.
    PageHeader {
        /// Header text
        text: String,
    },

    /// A recurring page footer line; collected into document metadata.
    PageFooter {
        /// Footer text
        text: String,
    },
}

impl Element {
    /// Create a heading element.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Element::SectionHeader {
            level,
            text: text.into(),
            page: None,
        }
    }

    /// Create a paragraph element.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Element::Paragraph {
            text: text.into(),
            page: None,
        }
    }

    /// Create a table element from column headers and rows.
    pub fn table<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Element::Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
            caption: None,
            page: None,
        }
    }

    /// Create an image element from raw bytes.
    pub fn picture(data: Vec<u8>) -> Self {
        Element::Picture {
            data,
            mime: None,
            caption: None,
            page: None,
        }
    }

    /// Get the explicit page index, if the element carries one.
    pub fn page(&self) -> Option<u32> {
        match self {
            Element::SectionHeader { page, .. }
            | Element::Paragraph { page, .. }
            | Element::Table { page, .. }
            | Element::Picture { page, .. } => *page,
            _ => None,
        }
    }
}

/// Serde adapter encoding binary payloads as base64 strings.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
