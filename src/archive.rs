// Opaque archive
// Serializes attributed spans for clipboard and transfer use. The format
// is versioned JSON behind an opaque byte interface; corrupt or
// unversioned input decodes to None, never an error.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::span::AttributedSpan;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    span: AttributedSpan,
}

pub fn archive(span: &AttributedSpan) -> Vec<u8> {
    let envelope = Envelope {
        version: FORMAT_VERSION,
        span: span.clone(),
    };
    serde_json::to_vec(&envelope).expect("archive serialization is infallible")
}

pub fn unarchive(bytes: &[u8]) -> Option<AttributedSpan> {
    let envelope: Envelope = match serde_json::from_slice(bytes) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!("discarding corrupt archive: {err}");
            return None;
        }
    };
    if envelope.version != FORMAT_VERSION {
        warn!(
            "discarding archive with unsupported version {}",
            envelope.version
        );
        return None;
    }
    Some(envelope.span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{Attachment, AttachmentPayload};
    use crate::attributes::AttrSet;
    use crate::span::Run;

    #[test]
    fn test_round_trip() {
        let mut bold = AttrSet::plain();
        bold.font.bold = true;
        let span = AttributedSpan {
            text: "hi\u{FFFC}".to_string(),
            runs: vec![Run::new(2, bold), Run::new(1, AttrSet::plain())],
            attachments: vec![(
                2,
                Attachment::new(7, AttachmentPayload::HorizontalRule),
            )],
        };

        let bytes = archive(&span);
        assert_eq!(unarchive(&bytes), Some(span));
    }

    #[test]
    fn test_corrupt_input_returns_none() {
        assert_eq!(unarchive(b"not json"), None);
        assert_eq!(unarchive(b""), None);
        assert_eq!(unarchive(b"{\"version\":99,\"span\":null}"), None);
    }
}
