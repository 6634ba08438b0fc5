// Attributed spans
// An owned snapshot of a slice of the document: text, attribute runs and
// the attachments the slice contains, with offsets relative to the span
// start. Spans are the currency of the undo log, the pasteboard archive
// and attributed insertion.

use serde::{Deserialize, Serialize};

use crate::attachment::{Attachment, ATTACHMENT_CHAR};
use crate::attributes::AttrSet;

/// A maximal stretch of characters sharing one attribute set. Lengths are
/// character counts, not bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub len: usize,
    pub attrs: AttrSet,
}

impl Run {
    pub fn new(len: usize, attrs: AttrSet) -> Self {
        Run { len, attrs }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributedSpan {
    pub text: String,
    pub runs: Vec<Run>,
    /// Attachments inside the span, keyed by character offset relative to
    /// the span start.
    pub attachments: Vec<(usize, Attachment)>,
}

impl AttributedSpan {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single-run span of plain text.
    pub fn plain(text: impl Into<String>, attrs: AttrSet) -> Self {
        let text = text.into();
        let len = text.chars().count();
        let runs = if len > 0 {
            vec![Run::new(len, attrs)]
        } else {
            Vec::new()
        };
        AttributedSpan {
            text,
            runs,
            attachments: Vec::new(),
        }
    }

    /// A span holding exactly one attachment placeholder.
    pub fn attachment(attachment: Attachment, attrs: AttrSet) -> Self {
        AttributedSpan {
            text: ATTACHMENT_CHAR.to_string(),
            runs: vec![Run::new(1, attrs)],
            attachments: vec![(0, attachment)],
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Merge adjacent attribute-equal runs in place.
    pub fn coalesce(&mut self) {
        let mut merged: Vec<Run> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if run.len == 0 {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.attrs == run.attrs => last.len += run.len,
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttrSet;

    #[test]
    fn test_plain_span() {
        let span = AttributedSpan::plain("hello", AttrSet::plain());
        assert_eq!(span.char_len(), 5);
        assert_eq!(span.runs.len(), 1);
        assert_eq!(span.runs[0].len, 5);
    }

    #[test]
    fn test_empty_plain_span_has_no_runs() {
        let span = AttributedSpan::plain("", AttrSet::plain());
        assert!(span.is_empty());
        assert!(span.runs.is_empty());
    }

    #[test]
    fn test_coalesce_merges_equal_neighbors() {
        let mut span = AttributedSpan {
            text: "abcd".to_string(),
            runs: vec![
                Run::new(1, AttrSet::plain()),
                Run::new(0, AttrSet::plain()),
                Run::new(2, AttrSet::plain()),
                Run::new(1, AttrSet::plain()),
            ],
            attachments: Vec::new(),
        };
        span.coalesce();
        assert_eq!(span.runs.len(), 1);
        assert_eq!(span.runs[0].len, 4);
    }
}
