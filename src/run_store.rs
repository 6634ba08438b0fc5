// Run store
// The ground truth of the document: one character buffer, a coalesced run
// sequence carrying attribute sets, and a side table mapping placeholder
// positions to attachments. All offsets are character counts.
//
// Invariants: the run lengths sum to the buffer's character count, runs
// are never empty, and no two adjacent runs carry equal attribute sets.

use std::collections::BTreeMap;
use std::ops::Range;

use log::{debug, warn};
use thiserror::Error;

use crate::attachment::{Attachment, AttachmentId, AttachmentPayload, ATTACHMENT_CHAR};
use crate::attributes::AttrSet;
use crate::span::{AttributedSpan, Run};

/// The paragraph separator character.
pub const PARAGRAPH_SEPARATOR: char = '\n';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("position {offset} beyond document length {len}")]
    OutOfRange { offset: usize, len: usize },
}

/// One batched change notification: the replaced range (pre-edit
/// coordinates) and the resulting character-count delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditNotice {
    pub range: Range<usize>,
    pub delta: isize,
}

#[derive(Debug, Default)]
pub struct RunStore {
    text: String,
    chars: usize,
    runs: Vec<Run>,
    attachments: BTreeMap<usize, Attachment>,
    next_attachment_id: AttachmentId,
    editing_depth: u32,
    pending: Option<EditNotice>,
    edits: Vec<EditNotice>,
}

impl PartialEq for RunStore {
    /// Attachment ids are regenerated whenever a span is re-inserted, so
    /// equality compares positions and payloads only.
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
            && self.runs == other.runs
            && self.attachments.len() == other.attachments.len()
            && self
                .attachments
                .iter()
                .zip(other.attachments.iter())
                .all(|((pa, a), (pb, b))| pa == pb && a.payload == b.payload)
    }
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw parts, assigning fresh attachment ids.
    /// Used by the HTML parser and the archive decoder.
    pub fn from_parts(
        text: String,
        runs: Vec<Run>,
        attachments: Vec<(usize, AttachmentPayload)>,
    ) -> Self {
        let chars = text.chars().count();
        let mut store = RunStore {
            text,
            chars,
            runs,
            ..Self::default()
        };
        store.coalesce();
        for (pos, payload) in attachments {
            store.register_attachment(pos, payload);
        }
        store.check_invariants();
        store
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_len(&self) -> usize {
        self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.chars == 0
    }

    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.text.chars().nth(offset)
    }

    /// The coalesced run sequence.
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    // MARK: - Edit batching

    /// Open an edit batch. Batches nest; notifications coalesce into one
    /// notice fired when the outermost batch closes.
    pub fn begin_editing(&mut self) {
        self.editing_depth += 1;
    }

    pub fn end_editing(&mut self) {
        debug_assert!(self.editing_depth > 0, "unbalanced end_editing");
        self.editing_depth = self.editing_depth.saturating_sub(1);
        if self.editing_depth == 0 {
            if let Some(notice) = self.pending.take() {
                self.edits.push(notice);
            }
        }
    }

    /// Drain the batched change notifications.
    pub fn take_edits(&mut self) -> Vec<EditNotice> {
        std::mem::take(&mut self.edits)
    }

    fn note_edit(&mut self, range: Range<usize>, delta: isize) {
        let merged = match self.pending.take() {
            Some(prev) => EditNotice {
                range: prev.range.start.min(range.start)..prev.range.end.max(range.end),
                delta: prev.delta + delta,
            },
            None => EditNotice { range, delta },
        };
        if self.editing_depth == 0 {
            self.edits.push(merged);
        } else {
            self.pending = Some(merged);
        }
    }

    // MARK: - Range helpers

    /// Out-of-range positions are a programming error: asserted in debug
    /// builds, clamped in release builds.
    pub fn clamp_range(&self, range: Range<usize>) -> Range<usize> {
        debug_assert!(
            range.start <= range.end && range.end <= self.chars,
            "range {}..{} beyond document length {}",
            range.start,
            range.end,
            self.chars
        );
        let end = range.end.min(self.chars);
        let start = range.start.min(end);
        start..end
    }

    fn byte_at(&self, char_offset: usize) -> usize {
        if char_offset >= self.chars {
            return self.text.len();
        }
        self.text
            .char_indices()
            .nth(char_offset)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    // MARK: - Queries

    /// The attribute set and run boundaries containing `offset`. The
    /// end-of-document position resolves to the final run, consistent with
    /// "one past the last character".
    pub fn attributes_at(&self, offset: usize) -> Result<(&AttrSet, Range<usize>), StoreError> {
        if offset > self.chars || self.chars == 0 {
            return Err(StoreError::OutOfRange {
                offset,
                len: self.chars,
            });
        }

        let mut pos = 0;
        for run in &self.runs {
            let end = pos + run.len;
            if offset < end || end == self.chars {
                return Ok((&run.attrs, pos..end));
            }
            pos = end;
        }
        unreachable!("run lengths no longer cover the buffer");
    }

    /// Convenience accessor for just the attribute set.
    pub fn attrs_at(&self, offset: usize) -> Option<&AttrSet> {
        self.attributes_at(offset).ok().map(|(attrs, _)| attrs)
    }

    // MARK: - Mutations

    /// Splice plain text into the given range. The inserted text takes the
    /// attributes immediately preceding the insertion point; callers that
    /// want explicit attributes (typing attributes) use
    /// `replace_with_span`.
    pub fn replace(&mut self, range: Range<usize>, text: &str) {
        let range = self.clamp_range(range);
        let attrs = self.insertion_attrs(range.start);
        let len = text.chars().count();
        let runs = if len > 0 {
            vec![Run::new(len, attrs)]
        } else {
            Vec::new()
        };
        self.splice(range, text, runs, Vec::new());
    }

    /// Splice an attributed span into the given range. Attachments carried
    /// by the span are re-registered at adjusted offsets; payloads the
    /// core cannot render are stripped. Incoming text that lacks a heading
    /// attribute while its paragraph style carries one inherits the
    /// heading in effect at the insertion point.
    pub fn replace_with_span(&mut self, range: Range<usize>, span: &AttributedSpan) {
        let range = self.clamp_range(range);
        let mut runs = span.runs.clone();
        self.inherit_heading(range.start, span, &mut runs);

        let attachments: Vec<(usize, AttachmentPayload)> = span
            .attachments
            .iter()
            .filter(|(_, attachment)| {
                if attachment.payload.is_renderable() {
                    true
                } else {
                    warn!("stripping non-renderable attachment payload on insertion");
                    false
                }
            })
            .map(|(offset, attachment)| (*offset, attachment.payload.clone()))
            .collect();

        self.splice(range, &span.text, runs, attachments);
    }

    /// Overwrite the attributes for a range, re-coalescing afterwards.
    /// When the incoming set changes the effective heading level, the font
    /// is normalized to the heading's canonical font first so a stale
    /// span-level font cannot override the paragraph style.
    pub fn set_attributes(&mut self, attrs: AttrSet, range: Range<usize>) {
        let range = self.clamp_range(range);
        if range.is_empty() {
            return;
        }

        let mut attrs = attrs;
        let new_level = attrs.paragraph.header_level();
        let old_level = self
            .attrs_at(range.start)
            .and_then(|a| a.paragraph.header_level());
        if let Some(level) = new_level {
            if old_level != new_level {
                attrs.font = attrs.font.for_header(level);
                attrs.heading = Some(level);
            }
        }

        let len = range.end - range.start;
        self.runs = splice_runs(&self.runs, range.start, range.end, &[Run::new(len, attrs)]);
        self.note_edit(range, 0);
        self.check_invariants();
    }

    /// Apply a transform to the attributes of every run intersecting the
    /// range. The transform sees one attribute set per covered sub-run.
    pub fn update_attributes(&mut self, range: Range<usize>, f: impl Fn(&mut AttrSet)) {
        let range = self.clamp_range(range);
        if range.is_empty() {
            return;
        }

        let mut replacement: Vec<Run> = Vec::new();
        let mut pos = 0;
        for run in &self.runs {
            let run_range = pos..pos + run.len;
            pos += run.len;
            let start = run_range.start.max(range.start);
            let end = run_range.end.min(range.end);
            if start >= end {
                continue;
            }
            let mut attrs = run.attrs.clone();
            f(&mut attrs);
            replacement.push(Run::new(end - start, attrs));
        }

        self.runs = splice_runs(&self.runs, range.start, range.end, &replacement);
        self.note_edit(range, 0);
        self.check_invariants();
    }

    // MARK: - Snapshots

    /// An owned attributed snapshot of the range, attachment entries
    /// rebased to span-relative offsets.
    pub fn attributed_substring(&self, range: Range<usize>) -> AttributedSpan {
        let range = self.clamp_range(range);
        let start_byte = self.byte_at(range.start);
        let end_byte = self.byte_at(range.end);

        let mut runs: Vec<Run> = Vec::new();
        let mut pos = 0;
        for run in &self.runs {
            let run_range = pos..pos + run.len;
            pos += run.len;
            let start = run_range.start.max(range.start);
            let end = run_range.end.min(range.end);
            if start < end {
                runs.push(Run::new(end - start, run.attrs.clone()));
            }
        }

        let attachments = self
            .attachments
            .range(range.clone())
            .map(|(offset, attachment)| (offset - range.start, attachment.clone()))
            .collect();

        let mut span = AttributedSpan {
            text: self.text[start_byte..end_byte].to_string(),
            runs,
            attachments,
        };
        span.coalesce();
        span
    }

    /// A standalone store holding just the given range.
    pub fn slice(&self, range: Range<usize>) -> RunStore {
        let span = self.attributed_substring(range);
        let mut store = RunStore::new();
        store.replace_with_span(0..0, &span);
        store.take_edits();
        store
    }

    /// A snapshot of the whole document.
    pub fn full_span(&self) -> AttributedSpan {
        self.attributed_substring(0..self.chars)
    }

    // MARK: - Paragraph geometry

    /// The range of the paragraph containing `offset`, including its
    /// trailing separator when present.
    pub fn paragraph_range(&self, offset: usize) -> Range<usize> {
        let offset = offset.min(self.chars);
        let chars: Vec<char> = self.text.chars().collect();

        let mut start = offset;
        while start > 0 && chars[start - 1] != PARAGRAPH_SEPARATOR {
            start -= 1;
        }

        let mut end = offset;
        while end < self.chars && chars[end] != PARAGRAPH_SEPARATOR {
            end += 1;
        }
        if end < self.chars {
            end += 1; // include the separator
        }

        start..end
    }

    /// Every paragraph range intersecting the given range, in order. A
    /// zero-length input yields the single containing paragraph.
    pub fn paragraph_ranges(&self, range: Range<usize>) -> Vec<Range<usize>> {
        let range = self.clamp_range(range);
        let mut out = Vec::new();
        let mut pos = range.start;
        loop {
            let paragraph = self.paragraph_range(pos);
            let next = paragraph.end;
            let done = next >= range.end || next <= pos;
            out.push(paragraph);
            if done {
                break;
            }
            pos = next;
        }
        out
    }

    /// Whether the paragraph containing `offset` has no content besides
    /// its separator.
    pub fn is_empty_paragraph(&self, offset: usize) -> bool {
        let range = self.paragraph_range(offset);
        let mut len = range.end - range.start;
        if len > 0 && self.char_at(range.end - 1) == Some(PARAGRAPH_SEPARATOR) {
            len -= 1;
        }
        len == 0
    }

    /// Whether `offset` sits on the empty final line of the document.
    pub fn is_empty_line_at_eof(&self, offset: usize) -> bool {
        offset == self.chars
            && (self.chars == 0 || self.char_at(self.chars - 1) == Some(PARAGRAPH_SEPARATOR))
    }

    // MARK: - Attachments

    pub fn attachment_at(&self, offset: usize) -> Option<&Attachment> {
        self.attachments.get(&offset)
    }

    pub fn attachments(&self) -> impl Iterator<Item = (usize, &Attachment)> {
        self.attachments.iter().map(|(pos, a)| (*pos, a))
    }

    /// The placeholder range occupied by the given attachment.
    pub fn range_for_attachment(&self, id: AttachmentId) -> Option<Range<usize>> {
        self.attachments
            .iter()
            .find(|(_, a)| a.id == id)
            .map(|(pos, _)| *pos..pos + 1)
    }

    fn register_attachment(&mut self, pos: usize, payload: AttachmentPayload) -> AttachmentId {
        let id = self.next_attachment_id;
        self.next_attachment_id += 1;
        debug_assert_eq!(self.char_at(pos), Some(ATTACHMENT_CHAR));
        self.attachments.insert(pos, Attachment::new(id, payload));
        id
    }

    // MARK: - Internals

    /// Attributes for text inserted at `at`: the run immediately before
    /// the insertion point, falling back to the first run, then defaults.
    fn insertion_attrs(&self, at: usize) -> AttrSet {
        if at > 0 {
            if let Some(attrs) = self.attrs_at(at - 1) {
                return attrs.clone();
            }
        }
        self.attrs_at(0).cloned().unwrap_or_default()
    }

    /// Incoming autocorrected text sometimes arrives without the heading
    /// attribute its paragraph style implies; re-attach the one in effect
    /// at the insertion point.
    fn inherit_heading(&self, at: usize, span: &AttributedSpan, runs: &mut [Run]) {
        if self.chars == 0 || span.is_empty() {
            return;
        }
        let Some(level) = self.insertion_attrs(at).heading else {
            return;
        };
        let Some(first) = runs.first() else {
            return;
        };
        if first.attrs.heading.is_some() || first.attrs.paragraph.header_level().is_none() {
            return;
        }
        for run in runs.iter_mut() {
            if run.attrs.heading.is_none() {
                run.attrs.heading = Some(level);
            }
        }
    }

    fn splice(
        &mut self,
        range: Range<usize>,
        new_text: &str,
        new_runs: Vec<Run>,
        new_attachments: Vec<(usize, AttachmentPayload)>,
    ) {
        let new_len = new_text.chars().count();
        debug_assert_eq!(new_runs.iter().map(|r| r.len).sum::<usize>(), new_len);

        let start_byte = self.byte_at(range.start);
        let end_byte = self.byte_at(range.end);
        self.text.replace_range(start_byte..end_byte, new_text);

        self.runs = splice_runs(&self.runs, range.start, range.end, &new_runs);

        let removed = range.end - range.start;
        self.chars = self.chars - removed + new_len;

        self.shift_attachments(range.clone(), new_len);
        for (offset, payload) in new_attachments {
            self.register_attachment(range.start + offset, payload);
        }

        self.note_edit(range, new_len as isize - removed as isize);
        self.check_invariants();
    }

    /// Drop side-table entries inside the replaced range and shift every
    /// entry past it by the length delta.
    fn shift_attachments(&mut self, replaced: Range<usize>, new_len: usize) {
        let affected: Vec<usize> = self
            .attachments
            .range(replaced.start..)
            .map(|(pos, _)| *pos)
            .collect();
        let mut moved = Vec::new();
        for pos in affected {
            let attachment = self.attachments.remove(&pos).unwrap();
            if pos < replaced.end {
                debug!(
                    "garbage-collecting attachment {} at deleted position {}",
                    attachment.id, pos
                );
                continue;
            }
            moved.push((pos - replaced.end + replaced.start + new_len, attachment));
        }
        for (pos, attachment) in moved {
            self.attachments.insert(pos, attachment);
        }
    }

    fn coalesce(&mut self) {
        self.runs = coalesce_runs(std::mem::take(&mut self.runs));
    }

    fn check_invariants(&self) {
        debug_assert_eq!(
            self.runs.iter().map(|r| r.len).sum::<usize>(),
            self.chars,
            "run lengths out of sync with buffer"
        );
        debug_assert!(self.runs.iter().all(|r| r.len > 0), "zero-length run");
        debug_assert!(
            self.runs.windows(2).all(|w| w[0].attrs != w[1].attrs),
            "adjacent attribute-equal runs"
        );
        debug_assert!(
            self.attachments
                .iter()
                .all(|(pos, _)| self.char_at(*pos) == Some(ATTACHMENT_CHAR)),
            "attachment entry without placeholder character"
        );
    }
}

/// Replace the character span `[start, end)` in a run sequence with the
/// given runs, merging attribute-equal neighbors afterwards.
fn splice_runs(runs: &[Run], start: usize, end: usize, insert: &[Run]) -> Vec<Run> {
    let mut out: Vec<Run> = Vec::with_capacity(runs.len() + insert.len());
    let mut pos = 0;
    let mut inserted = false;

    for run in runs {
        let run_start = pos;
        let run_end = pos + run.len;
        pos = run_end;

        let before = start.saturating_sub(run_start).min(run.len);
        if before > 0 {
            out.push(Run::new(before, run.attrs.clone()));
        }

        if !inserted && run_start <= start && start <= run_end {
            out.extend(insert.iter().cloned());
            inserted = true;
        }

        if run_end > end {
            let tail_start = end.max(run_start);
            let tail = run_end - tail_start;
            if tail > 0 && tail_start >= start {
                out.push(Run::new(tail, run.attrs.clone()));
            }
        }
    }

    if !inserted {
        out.extend(insert.iter().cloned());
    }

    coalesce_runs(out)
}

fn coalesce_runs(runs: Vec<Run>) -> Vec<Run> {
    let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs {
        if run.len == 0 {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.attrs == run.attrs => last.len += run.len,
            _ => merged.push(run),
        }
    }
    merged
}
