// Attachments
// An attachment is a single placeholder character in the buffer plus a
// side-table entry holding the payload. Image resolution is delegated to
// an injected collaborator; the core never fetches anything itself.

use serde::{Deserialize, Serialize};

/// The placeholder character an attachment occupies in the text buffer.
pub const ATTACHMENT_CHAR: char = '\u{FFFC}';

pub type AttachmentId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttachmentPayload {
    Image {
        src: String,
        /// Optional width/height hint in pixels
        size: Option<(u32, u32)>,
    },
    HorizontalRule,
    Comment(String),
    /// A non-image file reference, as carried by pasted content from other
    /// editors. Not renderable here; stripped on insertion.
    File { src: String },
}

impl AttachmentPayload {
    /// Whether the core knows how to render this payload. Non-renderable
    /// payloads are stripped when an attributed span is inserted.
    pub fn is_renderable(&self) -> bool {
        match self {
            AttachmentPayload::Image { .. }
            | AttachmentPayload::HorizontalRule
            | AttachmentPayload::Comment(_) => true,
            AttachmentPayload::File { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub payload: AttachmentPayload,
}

impl Attachment {
    pub fn new(id: AttachmentId, payload: AttachmentPayload) -> Self {
        Attachment { id, payload }
    }
}

/// Opaque image handle handed back by the resolver. The core never looks
/// inside; it only passes images through to the rendering collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub data: Vec<u8>,
    pub size: Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub type ImageCallback = Box<dyn FnOnce(Image) + Send>;
pub type FailureCallback = Box<dyn FnOnce() + Send>;

/// Capability object for attachment rendering, injected at document
/// construction. Resolution may complete asynchronously on any thread;
/// marshalling the result back to the editing thread before touching the
/// document is the implementor's contract. Until `on_success` fires, the
/// document renders with `placeholder_image`.
pub trait AttachmentResolver {
    /// Fetch the image for an attachment URL. Exactly one of the two
    /// callbacks must eventually be invoked.
    fn resolve_image(
        &self,
        attachment: &Attachment,
        url: &str,
        on_success: ImageCallback,
        on_failure: FailureCallback,
    );

    /// A placeholder to render until the real image is available.
    fn placeholder_image(&self, attachment: &Attachment) -> Image;

    /// Desired bounds for the attachment within a line fragment.
    fn bounds_for(&self, attachment: &Attachment, line_fragment: Rect) -> Rect;

    /// An image representation at the requested size, if one is available.
    fn image_for(&self, attachment: &Attachment, size: Size) -> Option<Image>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderable_payloads() {
        assert!(
            AttachmentPayload::Image {
                src: "https://example.com/cat.png".to_string(),
                size: None
            }
            .is_renderable()
        );
        assert!(AttachmentPayload::HorizontalRule.is_renderable());
        assert!(AttachmentPayload::Comment("more".to_string()).is_renderable());
        assert!(
            !AttachmentPayload::File {
                src: "file:///tmp/doc.pdf".to_string()
            }
            .is_renderable()
        );
    }
}
