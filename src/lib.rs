// Library exports for scriv
// A rich-text document model: an attributed run store with pluggable
// formatters, bidirectional HTML conversion, attachments and undo.

pub mod archive;
pub mod attachment;
pub mod attributes;
pub mod document;
pub mod formatter;
pub mod html;
pub mod identifier;
pub mod paragraph;
pub mod run_store;
pub mod span;
pub mod undo;

pub use attachment::{
    Attachment, AttachmentId, AttachmentPayload, AttachmentResolver, Image, Rect, Size,
};
pub use attributes::{AttrSet, Color, FontSpec, HeaderLevel};
pub use document::Document;
pub use formatter::Formatter;
pub use identifier::FormattingIdentifier;
pub use paragraph::{ListStyle, ParagraphProperty, ParagraphStyle};
pub use run_store::{EditNotice, RunStore, StoreError};
pub use span::{AttributedSpan, Run};
