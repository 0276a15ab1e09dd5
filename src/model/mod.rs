//! Data model for structured documents.

mod block;
mod document;
mod element;
mod section;

pub use block::{BlockBody, BlockKind, ContentBlock, ImagePayload, PageRange};
pub use document::{Document, DocumentMeta, DocumentSummary};
pub use element::Element;
pub use section::Section;
