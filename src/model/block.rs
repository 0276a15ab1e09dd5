//! Leaf content blocks and their payloads.

use serde::{Deserialize, Serialize};

/// The page span a block originated from (1-indexed, inclusive).
///
/// A merged table keeps the full span of its fragments rather than a single
/// guessed page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    /// First page
    pub start: u32,

    /// Last page
    pub end: u32,
}

impl PageRange {
    /// Create a range covering a single page.
    pub fn single(page: u32) -> Self {
        Self {
            start: page,
            end: page,
        }
    }

    /// Grow the range to include `page`.
    pub fn extend_to(&mut self, page: u32) {
        if page < self.start {
            self.start = page;
        }
        if page > self.end {
            self.end = page;
        }
    }

    /// Whether the range covers more than one page.
    pub fn spans_pages(&self) -> bool {
        self.end > self.start
    }
}

/// A leaf node holding actual content, attached to a section or directly to
/// the document root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Identifier
    pub id: String,

    /// Position among sibling blocks, zero-based and dense
    pub order: u32,

    /// Originating page span, when known
    pub pages: Option<PageRange>,

    /// The content payload
    #[serde(flatten)]
    pub body: BlockBody,
}

impl ContentBlock {
    /// Create a block with a fresh identifier.
    pub fn new(body: BlockBody, order: u32, pages: Option<PageRange>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            order,
            pages,
            body,
        }
    }

    /// Get the block kind discriminant.
    pub fn kind(&self) -> BlockKind {
        match self.body {
            BlockBody::Text { .. } => BlockKind::Text,
            BlockBody::Image { .. } => BlockKind::Image,
            BlockBody::Table { .. } => BlockKind::Table,
        }
    }

    /// Get the text payload for text blocks.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            BlockBody::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Get the side-storage reference for image and table blocks.
    pub fn source(&self) -> Option<&str> {
        match &self.body {
            BlockBody::Image { source, .. } | BlockBody::Table { source, .. } => source.as_deref(),
            BlockBody::Text { .. } => None,
        }
    }

    /// Get the caption for image and table blocks.
    pub fn caption(&self) -> Option<&str> {
        match &self.body {
            BlockBody::Image { caption, .. } | BlockBody::Table { caption, .. } => {
                caption.as_deref()
            }
            BlockBody::Text { .. } => None,
        }
    }

    /// Get the externally supplied summary, if one has been attached.
    pub fn summary(&self) -> Option<&str> {
        match &self.body {
            BlockBody::Image { summary, .. } | BlockBody::Table { summary, .. } => {
                summary.as_deref()
            }
            BlockBody::Text { .. } => None,
        }
    }

    /// Whether the block still holds an in-memory payload that side-content
    /// extraction has not yet moved to external storage.
    pub fn has_pending_payload(&self) -> bool {
        match &self.body {
            BlockBody::Text { .. } => false,
            BlockBody::Image {
                payload, source, ..
            } => payload.is_some() && source.is_none(),
            BlockBody::Table { rows, source, .. } => !rows.is_empty() && source.is_none(),
        }
    }
}

/// Content payload of a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockBody {
    /// A run of text
    Text {
        /// Text content
        text: String,
    },

    /// An image, held in memory until side-content extraction
    Image {
        /// Raw bytes prior to extraction; never serialized
        #[serde(skip)]
        payload: Option<ImagePayload>,
        /// Side-storage reference after extraction
        source: Option<String>,
        /// Image caption
        caption: Option<String>,
        /// Externally generated description
        summary: Option<String>,
    },

    /// A table; rows are drained to side storage on extraction
    Table {
        /// Column headers
        columns: Vec<String>,
        /// Data rows, present only before extraction
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        rows: Vec<Vec<String>>,
        /// Number of data rows, kept after rows are drained
        row_count: usize,
        /// Side-storage reference after extraction
        source: Option<String>,
        /// Table caption
        caption: Option<String>,
        /// Externally generated summary
        summary: Option<String>,
    },
}

impl BlockBody {
    /// Create a text body.
    pub fn text(text: impl Into<String>) -> Self {
        BlockBody::Text { text: text.into() }
    }

    /// Create an image body holding an in-memory payload.
    pub fn image(payload: ImagePayload, caption: Option<String>) -> Self {
        BlockBody::Image {
            payload: Some(payload),
            source: None,
            caption,
            summary: None,
        }
    }

    /// Create a table body holding in-memory rows.
    pub fn table(columns: Vec<String>, rows: Vec<Vec<String>>, caption: Option<String>) -> Self {
        let row_count = rows.len();
        BlockBody::Table {
            columns,
            rows,
            row_count,
            source: None,
            caption,
            summary: None,
        }
    }
}

/// Discriminant for block bodies, used for storage and type-filtered search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Text content
    Text,
    /// Image reference
    Image,
    /// Table reference
    Table,
}

impl BlockKind {
    /// Storage column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Image => "image",
            BlockKind::Table => "table",
        }
    }

    /// Parse a storage column value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(BlockKind::Text),
            "image" => Some(BlockKind::Image),
            "table" => Some(BlockKind::Table),
            _ => None,
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BlockKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown block kind: {s}"))
    }
}

/// In-memory image bytes prior to side-content extraction.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    /// Raw image bytes
    pub data: Vec<u8>,

    /// MIME type, if known
    pub mime: Option<String>,
}

impl ImagePayload {
    /// Create a payload, sniffing the MIME type from magic bytes when the
    /// extractor did not report one.
    pub fn new(data: Vec<u8>, mime: Option<String>) -> Self {
        let mime = mime.or_else(|| Self::detect_mime(&data).map(str::to_string));
        Self { data, mime }
    }

    /// Get the payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Get the file extension matching the MIME type.
    pub fn extension(&self) -> &str {
        match self.mime.as_deref() {
            Some("image/jpeg") => "jpg",
            Some("image/png") => "png",
            Some("image/gif") => "gif",
            Some("image/tiff") => "tiff",
            Some("image/bmp") => "bmp",
            Some("image/webp") => "webp",
            _ => "bin",
        }
    }

    /// Detect MIME type from data magic bytes.
    pub fn detect_mime(data: &[u8]) -> Option<&'static str> {
        if data.len() < 4 {
            return None;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some("image/jpeg");
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some("image/png");
        }

        // GIF: GIF87a or GIF89a
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some("image/gif");
        }

        // TIFF: II*\0 (little-endian) or MM\0* (big-endian)
        if data.starts_with(&[0x49, 0x49, 0x2A, 0x00])
            || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
        {
            return Some("image/tiff");
        }

        // BMP: BM
        if data.starts_with(b"BM") {
            return Some("image/bmp");
        }

        // WEBP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some("image/webp");
        }

        None
    }
}
