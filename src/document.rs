// Document
// The editing facade: owns the run store, pending typing attributes, the
// selection, the undo log and the injected attachment resolver. Every
// mutating operation here records its inverse on the undo stack.

use std::collections::HashSet;
use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;

use crate::archive;
use crate::attachment::{
    Attachment, AttachmentId, AttachmentPayload, AttachmentResolver, FailureCallback, Image,
    ImageCallback, Rect, Size,
};
use crate::attributes::{AttrSet, HeaderLevel};
use crate::formatter::Formatter;
use crate::html;
use crate::identifier::FormattingIdentifier;
use crate::paragraph::{
    ListStyle, ParagraphProperty, ParagraphStyle, MAX_BLOCKQUOTE_DEPTH, MAX_LIST_DEPTH,
};
use crate::run_store::{EditNotice, RunStore, PARAGRAPH_SEPARATOR};
use crate::span::{AttributedSpan, Run};
use crate::undo::{ReplaceCommand, UndoStack};

pub struct Document {
    store: RunStore,
    typing_attributes: AttrSet,
    selection: Range<usize>,
    undo_stack: UndoStack,
    default_attributes: AttrSet,
    resolver: Option<Box<dyn AttachmentResolver>>,
    max_list_depth: u8,
    max_blockquote_depth: u8,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::with_default_attributes(AttrSet::plain())
    }

    pub fn with_default_attributes(default_attributes: AttrSet) -> Self {
        Document {
            store: RunStore::new(),
            typing_attributes: default_attributes.clone(),
            selection: 0..0,
            undo_stack: UndoStack::new(),
            default_attributes,
            resolver: None,
            max_list_depth: MAX_LIST_DEPTH,
            max_blockquote_depth: MAX_BLOCKQUOTE_DEPTH,
        }
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn text(&self) -> &str {
        self.store.text()
    }

    pub fn char_len(&self) -> usize {
        self.store.char_len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drain the change notifications batched since the last call.
    pub fn take_edits(&mut self) -> Vec<EditNotice> {
        self.store.take_edits()
    }

    // MARK: - Selection & typing attributes

    pub fn selection(&self) -> Range<usize> {
        self.selection.clone()
    }

    /// Move the selection, re-deriving the pending typing attributes from
    /// the character before the caret. On the empty line at end of file,
    /// paragraph properties are dropped from the typing attributes so a
    /// finished list or quote does not leak into what is typed next.
    pub fn set_selection(&mut self, range: Range<usize>) {
        self.selection = self.store.clamp_range(range);
        self.recalculate_typing_attributes();
    }

    pub fn typing_attributes(&self) -> &AttrSet {
        &self.typing_attributes
    }

    pub fn set_typing_attributes(&mut self, attrs: AttrSet) {
        self.typing_attributes = attrs;
    }

    fn recalculate_typing_attributes(&mut self) {
        let location = self.selection.start;
        if self.store.is_empty() {
            self.typing_attributes = self.default_attributes.clone();
            return;
        }
        if self.store.is_empty_line_at_eof(location) {
            self.typing_attributes = self.typing_attributes.without_paragraph_properties();
            return;
        }
        let probe = location.saturating_sub(1).min(self.store.char_len() - 1);
        if let Some(attrs) = self.store.attrs_at(probe) {
            self.typing_attributes = attrs.clone();
        }
    }

    // MARK: - Text editing

    /// Insert text at the selection, carrying the pending typing
    /// attributes. Pressing Enter in an empty styled paragraph clears the
    /// paragraph formatting instead of inserting a separator.
    pub fn insert_text(&mut self, text: &str) {
        if text == "\n"
            && self.selection.is_empty()
            && self.remove_paragraph_formatting_on_empty_enter()
        {
            return;
        }

        let span = AttributedSpan::plain(text, self.typing_attributes.clone());
        let range = self.selection.clone();
        self.perform_replace(range.clone(), &span);
        let caret = range.start + span.char_len();
        self.selection = caret..caret;
    }

    /// Delete the selection, or the grapheme cluster before the caret.
    pub fn delete_backward(&mut self) {
        let mut range = self.selection.clone();
        if range.is_empty() {
            if range.start == 0 {
                return;
            }
            let len = self.previous_grapheme_len(range.start);
            range = range.start - len..range.start;
        }

        let strip_paragraph = self.merge_strip_target(&range);
        if strip_paragraph.is_some() {
            self.typing_attributes = self.typing_attributes.without_paragraph_properties();
        }

        // One undo command covers both the property strip and the
        // character deletion.
        let composite = range.start
            ..strip_paragraph
                .as_ref()
                .map(|paragraph| paragraph.end)
                .unwrap_or(range.end);
        let delete_range = range.clone();
        self.perform_composite(composite, move |store| {
            if let Some(paragraph) = strip_paragraph {
                store.update_attributes(paragraph, |attrs| {
                    *attrs = attrs.without_paragraph_properties();
                });
            }
            store.replace(delete_range, "");
        });
        self.selection = range.start..range.start;

        if self.store.is_empty() {
            // Backspacing the document empty also resets lingering
            // paragraph styles in the typing attributes.
            self.typing_attributes = self.typing_attributes.without_paragraph_properties();
        } else {
            self.recalculate_typing_attributes();
        }
    }

    /// Replace an arbitrary range with plain text, undoable.
    pub fn replace_range(&mut self, range: Range<usize>, text: &str) {
        let range = self.store.clamp_range(range);
        let edit_range = range.clone();
        self.perform_composite(range.clone(), move |store| {
            store.replace(edit_range, text);
        });
        let caret = range.start + text.chars().count();
        self.selection = caret..caret;
    }

    fn previous_grapheme_len(&self, caret: usize) -> usize {
        let byte = self
            .store
            .text()
            .char_indices()
            .nth(caret)
            .map(|(i, _)| i)
            .unwrap_or(self.store.text().len());
        self.store.text()[..byte]
            .graphemes(true)
            .next_back()
            .map(|g| g.chars().count())
            .unwrap_or(1)
    }

    /// Pressing delete at a paragraph boundary should not resurrect a
    /// list or quote from the other side: when the deletion merges this
    /// paragraph into a preceding empty one, the surviving paragraph is
    /// stripped of block properties. The rule is deliberately asymmetric;
    /// see the product note in DESIGN.md.
    fn merge_strip_target(&self, deletion: &Range<usize>) -> Option<Range<usize>> {
        let current = self.store.paragraph_range(self.selection.start);
        // The deletion crosses the paragraph boundary only when it starts
        // before the current paragraph does.
        if current.start == 0 || deletion.start >= current.start {
            return None;
        }
        let previous = self.store.paragraph_range(current.start - 1);
        if previous == current || !self.store.is_empty_paragraph(previous.start) {
            return None;
        }
        Some(current)
    }

    fn remove_paragraph_formatting_on_empty_enter(&mut self) -> bool {
        if !self.store.is_empty_paragraph(self.selection.start)
            && !self.store.is_empty_line_at_eof(self.selection.start)
        {
            return false;
        }
        if !self.typing_attributes.paragraph.has_block_properties() {
            return false;
        }

        self.typing_attributes = self.typing_attributes.without_paragraph_properties();
        let paragraph = self.store.paragraph_range(self.selection.start);
        if !paragraph.is_empty() {
            let edit_range = paragraph.clone();
            self.perform_composite(paragraph, move |store| {
                store.update_attributes(edit_range, |attrs| {
                    *attrs = attrs.without_paragraph_properties();
                });
            });
        }
        true
    }

    // MARK: - Formatting

    pub fn toggle_bold(&mut self, range: Range<usize>) {
        self.toggle(&Formatter::Bold, range);
    }

    pub fn toggle_italic(&mut self, range: Range<usize>) {
        self.toggle(&Formatter::Italic, range);
    }

    pub fn toggle_underline(&mut self, range: Range<usize>) {
        self.toggle(&Formatter::Underline, range);
    }

    pub fn toggle_strikethrough(&mut self, range: Range<usize>) {
        self.toggle(&Formatter::Strikethrough, range);
    }

    pub fn toggle_mark(&mut self, range: Range<usize>) {
        self.toggle(&Formatter::Mark, range);
    }

    pub fn toggle_code(&mut self, range: Range<usize>) {
        self.toggle(&Formatter::Code, range);
    }

    pub fn toggle_header(&mut self, level: HeaderLevel, range: Range<usize>) {
        self.toggle(&Formatter::Header(level), range);
    }

    pub fn toggle_ordered_list(&mut self, range: Range<usize>) {
        self.toggle(&Formatter::List(ListStyle::Ordered), range);
    }

    pub fn toggle_unordered_list(&mut self, range: Range<usize>) {
        self.toggle(&Formatter::List(ListStyle::Unordered), range);
    }

    pub fn toggle_blockquote(&mut self, range: Range<usize>) {
        self.toggle(&Formatter::Blockquote, range);
    }

    pub fn toggle_pre(&mut self, range: Range<usize>) {
        self.toggle(&Formatter::Pre, range);
    }

    pub fn set_link(&mut self, href: &str, range: Range<usize>) {
        let formatter = Formatter::Link(href.to_string());
        let application = formatter.application_range(self.store.clamp_range(range), &self.store);
        if application.is_empty() {
            formatter.apply_to_attrs(&mut self.typing_attributes);
            return;
        }
        let edit_range = application.clone();
        self.perform_composite(application, move |store| {
            formatter.apply(store, edit_range);
        });
    }

    pub fn remove_link(&mut self, range: Range<usize>) {
        let formatter = Formatter::Link(String::new());
        let application = formatter.application_range(self.store.clamp_range(range), &self.store);
        if application.is_empty() {
            formatter.remove_from_attrs(&mut self.typing_attributes);
            return;
        }
        let edit_range = application.clone();
        self.perform_composite(application, move |store| {
            formatter.remove(store, edit_range);
        });
    }

    /// Toggle a formatter over a range. A zero-length application range
    /// flips the pending typing attributes only; otherwise the edit is
    /// undoable and the typing attributes re-derive from the store.
    pub fn toggle(&mut self, formatter: &Formatter, range: Range<usize>) {
        let mut range = self.store.clamp_range(range);
        if formatter.is_paragraph_level() {
            range = self.ensure_separator_for_empty_final_paragraph(range);
        }

        let application = formatter.application_range(range, &self.store);
        if application.is_empty() {
            formatter.toggle_in_attrs(&mut self.typing_attributes);
            return;
        }

        let toggled = formatter.clone();
        let edit_range = application.clone();
        self.perform_composite(application.clone(), move |store| {
            toggled.toggle(store, edit_range);
        });

        let probe = application
            .start
            .min(self.store.char_len().saturating_sub(1));
        if let Some(attrs) = self.store.attrs_at(probe) {
            self.typing_attributes = attrs.clone();
        }
    }

    /// A paragraph-level style applied to an empty final paragraph needs
    /// a character to carry the attributes; insert a synthetic separator
    /// first, preserving the caller's range.
    fn ensure_separator_for_empty_final_paragraph(&mut self, range: Range<usize>) -> Range<usize> {
        if range.start == self.store.char_len() && self.store.is_empty_line_at_eof(range.start) {
            let span = AttributedSpan::plain(
                PARAGRAPH_SEPARATOR.to_string(),
                self.typing_attributes.clone(),
            );
            self.perform_replace(range.start..range.start, &span);
        }
        range
    }

    // MARK: - Indentation

    /// Push one more list or blockquote level onto every paragraph the
    /// selection touches. At the depth cap this falls through to a
    /// literal tab insertion.
    pub fn increase_indent(&mut self) {
        let list_depth = self.typing_attributes.paragraph.list_depth();
        let quote_depth = self.typing_attributes.paragraph.blockquote_depth();

        if list_depth > 0 && list_depth < self.max_list_depth {
            let max = self.max_list_depth;
            self.apply_to_selected_paragraphs(move |style| {
                style.push_list_level(ListStyle::Unordered, max);
            });
        } else if quote_depth > 0 && quote_depth < self.max_blockquote_depth {
            let max = self.max_blockquote_depth;
            self.apply_to_selected_paragraphs(move |style| {
                style.push_blockquote_level(max);
            });
        } else {
            self.insert_text("\t");
        }
    }

    /// Pop the innermost list or blockquote level; at depth zero the
    /// property is gone entirely and the paragraph falls back to plain.
    pub fn decrease_indent(&mut self) {
        if self.typing_attributes.paragraph.list_depth() > 0 {
            self.apply_to_selected_paragraphs(|style| {
                style.pop_list_level();
            });
        } else if self.typing_attributes.paragraph.blockquote_depth() > 0 {
            self.apply_to_selected_paragraphs(|style| {
                style.pop_blockquote_level();
            });
        }
    }

    fn apply_to_selected_paragraphs(&mut self, f: impl Fn(&mut ParagraphStyle) + Copy) {
        f(&mut self.typing_attributes.paragraph);
        if self.store.is_empty() {
            return;
        }
        let ranges = self.store.paragraph_ranges(self.selection.clone());
        let (Some(first), Some(last)) = (ranges.first(), ranges.last()) else {
            return;
        };
        let application = first.start..last.end;
        if application.is_empty() {
            return;
        }
        let edit_range = application.clone();
        self.perform_composite(application, move |store| {
            store.update_attributes(edit_range, |attrs| {
                f(&mut attrs.paragraph);
            });
        });
    }

    // MARK: - Formatting queries

    fn formatter_map() -> Vec<(FormattingIdentifier, Formatter)> {
        vec![
            (FormattingIdentifier::Bold, Formatter::Bold),
            (FormattingIdentifier::Italic, Formatter::Italic),
            (FormattingIdentifier::Underline, Formatter::Underline),
            (
                FormattingIdentifier::Strikethrough,
                Formatter::Strikethrough,
            ),
            (FormattingIdentifier::Mark, Formatter::Mark),
            (FormattingIdentifier::Code, Formatter::Code),
            (FormattingIdentifier::Link, Formatter::Link(String::new())),
            (
                FormattingIdentifier::Orderedlist,
                Formatter::List(ListStyle::Ordered),
            ),
            (
                FormattingIdentifier::Unorderedlist,
                Formatter::List(ListStyle::Unordered),
            ),
            (FormattingIdentifier::Blockquote, Formatter::Blockquote),
            (FormattingIdentifier::Sourcecode, Formatter::Pre),
            (
                FormattingIdentifier::Header1,
                Formatter::Header(HeaderLevel::H1),
            ),
            (
                FormattingIdentifier::Header2,
                Formatter::Header(HeaderLevel::H2),
            ),
            (
                FormattingIdentifier::Header3,
                Formatter::Header(HeaderLevel::H3),
            ),
            (
                FormattingIdentifier::Header4,
                Formatter::Header(HeaderLevel::H4),
            ),
            (
                FormattingIdentifier::Header5,
                Formatter::Header(HeaderLevel::H5),
            ),
            (
                FormattingIdentifier::Header6,
                Formatter::Header(HeaderLevel::H6),
            ),
        ]
    }

    fn identifiers_in_attrs(attrs: &AttrSet) -> HashSet<FormattingIdentifier> {
        let mut identifiers = HashSet::new();
        for (identifier, formatter) in Self::formatter_map() {
            if formatter.present_in_attrs(attrs) {
                identifiers.insert(identifier);
            }
        }
        if attrs.paragraph.is_plain() {
            identifiers.insert(FormattingIdentifier::Paragraph);
        }
        identifiers
    }

    /// The formatting identifiers in effect at a character index.
    pub fn formatting_identifiers_at(&self, index: usize) -> HashSet<FormattingIdentifier> {
        if self.store.is_empty() {
            return self.formatting_identifiers_for_typing_attributes();
        }
        let index = index.min(self.store.char_len() - 1);
        let mut identifiers = match self.store.attrs_at(index) {
            Some(attrs) => Self::identifiers_in_attrs(attrs),
            None => HashSet::new(),
        };
        if let Some(attachment) = self.store.attachment_at(index) {
            identifiers.insert(match attachment.payload {
                AttachmentPayload::HorizontalRule => FormattingIdentifier::Horizontalrule,
                _ => FormattingIdentifier::Media,
            });
        }
        identifiers
    }

    /// The identifiers holding for every character of the range.
    pub fn formatting_identifiers_spanning(
        &self,
        range: Range<usize>,
    ) -> HashSet<FormattingIdentifier> {
        if self.store.is_empty() {
            return self.formatting_identifiers_for_typing_attributes();
        }
        let range = self.store.clamp_range(range);
        if range.is_empty() {
            return self.formatting_identifiers_at(range.start);
        }

        let mut identifiers = HashSet::new();
        for (identifier, formatter) in Self::formatter_map() {
            if formatter.present_in(&self.store, range.clone()) {
                identifiers.insert(identifier);
            }
        }
        let span = self.store.attributed_substring(range);
        if !span.runs.is_empty() && span.runs.iter().all(|run| run.attrs.paragraph.is_plain()) {
            identifiers.insert(FormattingIdentifier::Paragraph);
        }
        identifiers
    }

    pub fn formatting_identifiers_for_typing_attributes(&self) -> HashSet<FormattingIdentifier> {
        Self::identifiers_in_attrs(&self.typing_attributes)
    }

    // MARK: - HTML

    pub fn get_html(&self, prettify: bool) -> String {
        html::html_from(&self.store, prettify)
    }

    pub fn get_html_range(&self, range: Range<usize>, prettify: bool) -> String {
        html::html_from_range(&self.store, range, prettify)
    }

    /// Load HTML, replacing the document. Unparsable fragments degrade to
    /// plain text carrying the default attributes; the undo history is
    /// reset.
    pub fn set_html(&mut self, html: &str) {
        self.store = html::run_store_from(html, &self.default_attributes);
        self.store.take_edits();
        self.undo_stack.clear();
        self.selection = 0..0;
        self.recalculate_typing_attributes();
    }

    /// Load HTML as a regular edit, keeping the undo stack intact.
    pub fn set_html_undoable(&mut self, html: &str) {
        let len = self.store.char_len();
        self.replace_with_html(0..len, html);
    }

    pub fn replace_with_html(&mut self, range: Range<usize>, html: &str) {
        let parsed = html::run_store_from(html, &self.default_attributes);
        let span = parsed.full_span();
        let range = self.store.clamp_range(range);
        self.perform_replace(range.clone(), &span);
        let caret = range.start + span.char_len();
        self.selection = caret..caret;
        self.recalculate_typing_attributes();
    }

    // MARK: - Attachments

    pub fn replace_with_image(&mut self, range: Range<usize>, src: &str, size: Option<(u32, u32)>) {
        self.replace_with_attachment(
            range,
            AttachmentPayload::Image {
                src: src.to_string(),
                size,
            },
        );
    }

    pub fn replace_with_horizontal_rule(&mut self, range: Range<usize>) {
        self.replace_with_attachment(range, AttachmentPayload::HorizontalRule);
    }

    pub fn replace_with_comment(&mut self, range: Range<usize>, comment: &str) {
        self.replace_with_attachment(range, AttachmentPayload::Comment(comment.to_string()));
    }

    fn replace_with_attachment(&mut self, range: Range<usize>, payload: AttachmentPayload) {
        let span = AttributedSpan::attachment(
            Attachment::new(0, payload),
            self.typing_attributes.clone(),
        );
        let range = self.store.clamp_range(range);
        self.perform_replace(range.clone(), &span);
        let caret = range.start + 1;
        self.selection = caret..caret;
    }

    pub fn attachment_at(&self, index: usize) -> Option<&Attachment> {
        self.store.attachment_at(index)
    }

    /// The range a collaborator must invalidate once an asynchronous
    /// image resolution lands. Only the affected placeholder is touched,
    /// never the whole document.
    pub fn invalidate_attachment(&self, id: AttachmentId) -> Option<Range<usize>> {
        self.store.range_for_attachment(id)
    }

    // MARK: - Attachment resolution

    pub fn set_attachment_resolver(&mut self, resolver: Box<dyn AttachmentResolver>) {
        self.resolver = Some(resolver);
    }

    /// Invoking a resolver-backed path with no resolver installed is a
    /// caller wiring defect: rendering cannot proceed without one.
    fn resolver(&self) -> &dyn AttachmentResolver {
        self.resolver
            .as_deref()
            .expect("attachment resolver not configured")
    }

    pub fn resolve_attachment_image(
        &self,
        id: AttachmentId,
        on_success: ImageCallback,
        on_failure: FailureCallback,
    ) {
        let Some(range) = self.store.range_for_attachment(id) else {
            return;
        };
        let attachment = self
            .store
            .attachment_at(range.start)
            .expect("range came from the side table");
        if let AttachmentPayload::Image { src, .. } = &attachment.payload {
            self.resolver()
                .resolve_image(attachment, src, on_success, on_failure);
        }
    }

    pub fn placeholder_image_for(&self, id: AttachmentId) -> Option<Image> {
        let range = self.store.range_for_attachment(id)?;
        let attachment = self.store.attachment_at(range.start)?;
        Some(self.resolver().placeholder_image(attachment))
    }

    pub fn bounds_for_attachment(&self, id: AttachmentId, line_fragment: Rect) -> Option<Rect> {
        let range = self.store.range_for_attachment(id)?;
        let attachment = self.store.attachment_at(range.start)?;
        Some(self.resolver().bounds_for(attachment, line_fragment))
    }

    pub fn image_for_attachment(&self, id: AttachmentId, size: Size) -> Option<Image> {
        let range = self.store.range_for_attachment(id)?;
        let attachment = self.store.attachment_at(range.start)?;
        self.resolver().image_for(attachment, size)
    }

    // MARK: - Captions

    /// The caption paragraph following an attachment, if one exists.
    pub fn caption_for(&self, id: AttachmentId) -> Option<AttributedSpan> {
        let caption = self.caption_paragraph(id)?;
        let content = self.paragraph_content(&caption);
        Some(self.store.attributed_substring(content))
    }

    /// Attach or replace a caption below the attachment. The attachment's
    /// paragraph becomes a figure, the caption paragraph a figcaption.
    pub fn replace_caption(&mut self, id: AttachmentId, caption: &AttributedSpan) {
        let Some(attachment_range) = self.store.range_for_attachment(id) else {
            return;
        };
        let attachment_paragraph = self.store.paragraph_range(attachment_range.start);

        let mut caption_style = ParagraphStyle::new();
        caption_style.push(ParagraphProperty::Figure);
        caption_style.push(ParagraphProperty::Figcaption);
        let mut caption_span = caption.clone();
        for run in &mut caption_span.runs {
            run.attrs.paragraph = caption_style.clone();
            run.attrs.heading = None;
        }
        caption_span.coalesce();

        let existing_content = self
            .caption_paragraph(id)
            .map(|range| self.paragraph_content(&range));
        let composite_end = existing_content
            .as_ref()
            .map(|content| content.end)
            .unwrap_or(attachment_paragraph.end);
        let composite = attachment_paragraph.start..composite_end;
        let figure_paragraph = attachment_paragraph.clone();

        self.perform_composite(composite, move |store| {
            store.update_attributes(figure_paragraph.clone(), |attrs| {
                if !attrs.paragraph.contains_figure() {
                    attrs.paragraph.push(ParagraphProperty::Figure);
                }
            });
            match existing_content {
                Some(content) => {
                    store.replace_with_span(content, &caption_span);
                }
                None => {
                    // No caption yet: append a separator to terminate the
                    // attachment paragraph, then the caption content.
                    let at = store.paragraph_range(figure_paragraph.start).end;
                    let separator_attrs = store
                        .attrs_at(figure_paragraph.start)
                        .cloned()
                        .unwrap_or_default();
                    let mut span = AttributedSpan {
                        text: String::from(PARAGRAPH_SEPARATOR),
                        runs: vec![Run::new(1, separator_attrs)],
                        attachments: Vec::new(),
                    };
                    span.text.push_str(&caption_span.text);
                    span.runs.extend(caption_span.runs.clone());
                    span.attachments = caption_span
                        .attachments
                        .iter()
                        .map(|(offset, a)| (offset + 1, a.clone()))
                        .collect();
                    store.replace_with_span(at..at, &span);
                }
            }
        });
    }

    /// Remove the caption paragraph and the figure marker.
    pub fn remove_caption(&mut self, id: AttachmentId) {
        let Some(attachment_range) = self.store.range_for_attachment(id) else {
            return;
        };
        let Some(caption) = self.caption_paragraph(id) else {
            return;
        };
        let attachment_paragraph = self.store.paragraph_range(attachment_range.start);
        let composite = attachment_paragraph.start..caption.end;
        let figure_paragraph = attachment_paragraph.clone();

        // A final caption has no trailing separator, so the separator
        // before it goes instead; otherwise the caption paragraph is
        // deleted whole and the attachment keeps its own separator.
        let caption_terminated =
            self.store.char_at(caption.end - 1) == Some(PARAGRAPH_SEPARATOR);
        let delete = if caption_terminated {
            caption.clone()
        } else {
            caption.start.saturating_sub(1)..caption.end
        };

        self.perform_composite(composite, move |store| {
            store.replace(delete.clone(), "");
            let remaining = figure_paragraph.start..figure_paragraph.end.min(delete.start);
            store.update_attributes(remaining, |attrs| {
                attrs
                    .paragraph
                    .remove_all(|p| matches!(p, ParagraphProperty::Figure));
            });
        });
    }

    fn caption_paragraph(&self, id: AttachmentId) -> Option<Range<usize>> {
        let attachment_range = self.store.range_for_attachment(id)?;
        let paragraph = self.store.paragraph_range(attachment_range.start);
        if paragraph.end >= self.store.char_len() {
            return None;
        }
        let caption = self.store.paragraph_range(paragraph.end);
        let attrs = self.store.attrs_at(caption.start)?;
        if attrs.paragraph.contains_figcaption() {
            Some(caption)
        } else {
            None
        }
    }

    fn paragraph_content(&self, paragraph: &Range<usize>) -> Range<usize> {
        let mut end = paragraph.end;
        if end > paragraph.start && self.store.char_at(end - 1) == Some(PARAGRAPH_SEPARATOR) {
            end -= 1;
        }
        paragraph.start..end
    }

    // MARK: - Undo / redo

    pub fn can_undo(&self) -> bool {
        self.undo_stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo_stack.can_redo()
    }

    /// Apply the top undo command. Replacing the recorded range with the
    /// recorded snapshot restores the prior state; the content that was
    /// just removed becomes the redo command.
    pub fn undo(&mut self) -> bool {
        let Some(command) = self.undo_stack.pop_undo() else {
            return false;
        };
        let inverse = self.apply_replace_command(&command);
        self.undo_stack.push_redo(inverse);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(command) = self.undo_stack.pop_redo() else {
            return false;
        };
        let inverse = self.apply_replace_command(&command);
        self.undo_stack.push_undo(inverse);
        true
    }

    fn apply_replace_command(&mut self, command: &ReplaceCommand) -> ReplaceCommand {
        let removed = self.store.attributed_substring(command.range.clone());
        self.store.begin_editing();
        self.store
            .replace_with_span(command.range.clone(), &command.span);
        self.store.end_editing();

        let restored = command.range.start..command.range.start + command.span.char_len();
        self.selection = restored.clone();
        self.recalculate_typing_attributes();

        ReplaceCommand {
            range: restored,
            span: removed,
        }
    }

    // MARK: - Archive

    /// Serialize the whole document as opaque bytes for clipboard or
    /// transfer use.
    pub fn archive(&self) -> Vec<u8> {
        archive::archive(&self.store.full_span())
    }

    pub fn archive_range(&self, range: Range<usize>) -> Vec<u8> {
        archive::archive(&self.store.attributed_substring(range))
    }

    /// Decode an archive produced by `archive`. Corrupt input yields
    /// `None`, never an error.
    pub fn unarchive(bytes: &[u8]) -> Option<Document> {
        let span = archive::unarchive(bytes)?;
        let mut document = Document::new();
        document.store.begin_editing();
        document.store.replace_with_span(0..0, &span);
        document.store.end_editing();
        document.store.take_edits();
        document.recalculate_typing_attributes();
        Some(document)
    }

    // MARK: - Undoable edit plumbing

    fn perform_replace(&mut self, range: Range<usize>, span: &AttributedSpan) {
        let target = range.clone();
        let insert = span.clone();
        self.perform_composite(range, move |store| {
            store.replace_with_span(target, &insert);
        });
    }

    /// Run a mutation confined to `range`, recording one undo command
    /// covering the final extent of the edited region.
    fn perform_composite(&mut self, range: Range<usize>, f: impl FnOnce(&mut RunStore)) {
        let original = self.store.attributed_substring(range.clone());
        let len_before = self.store.char_len();

        self.store.begin_editing();
        f(&mut self.store);
        self.store.end_editing();

        let delta = self.store.char_len() as isize - len_before as isize;
        let final_end = (range.end as isize + delta) as usize;
        self.undo_stack.record(ReplaceCommand {
            range: range.start..final_end,
            span: original,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_with(text: &str) -> Document {
        let mut document = Document::new();
        document.insert_text(text);
        document
    }

    #[test]
    fn test_insert_text_carries_typing_attributes() {
        let mut document = Document::new();
        document.toggle_bold(0..0);
        document.insert_text("hi");
        assert!(document.store().attrs_at(0).unwrap().font.bold);
    }

    #[test]
    fn test_undo_restores_exact_state() {
        let mut document = document_with("Hello world");
        let before_text = document.text().to_string();
        let before = document.store().full_span();

        document.toggle_bold(0..5);
        assert!(document.store().attrs_at(0).unwrap().font.bold);

        assert!(document.undo());
        assert_eq!(document.text(), before_text);
        assert_eq!(document.store().full_span(), before);
    }

    #[test]
    fn test_undo_redo_symmetry_for_text_edit() {
        let mut document = document_with("abc");
        document.set_selection(3..3);
        document.insert_text("def");
        assert_eq!(document.text(), "abcdef");

        assert!(document.undo());
        assert_eq!(document.text(), "abc");

        assert!(document.redo());
        assert_eq!(document.text(), "abcdef");

        assert!(document.undo());
        assert_eq!(document.text(), "abc");
    }

    #[test]
    fn test_toggle_with_caret_only_touches_typing_attributes() {
        let mut document = document_with("hello");
        document.set_selection(2..2);
        document.toggle_bold(2..2);
        assert!(document.typing_attributes().font.bold);
        assert!(!document.store().attrs_at(2).unwrap().font.bold);
    }

    #[test]
    fn test_paragraph_toggle_on_caret_formats_whole_paragraph() {
        let mut document = document_with("one\ntwo");
        document.toggle_blockquote(5..5);
        assert_eq!(
            document
                .store()
                .attrs_at(5)
                .unwrap()
                .paragraph
                .blockquote_depth(),
            1
        );
        // Only the second paragraph is touched.
        assert_eq!(
            document
                .store()
                .attrs_at(0)
                .unwrap()
                .paragraph
                .blockquote_depth(),
            0
        );
    }

    #[test]
    fn test_paragraph_expansion_determinism() {
        let mut a = document_with("one\ntwo\nthree");
        let mut b = document_with("one\ntwo\nthree");
        a.toggle_blockquote(5..5);
        b.toggle_blockquote(4..8);
        assert_eq!(a.store().full_span(), b.store().full_span());
    }

    #[test]
    fn test_empty_document_list_toggle_then_typing() {
        let mut document = Document::new();
        document.toggle_unordered_list(0..0);
        document.insert_text("a");
        document.insert_text("\n");
        document.insert_text("b");

        let html = document.get_html(false);
        assert_eq!(html, "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn test_enter_in_empty_list_item_exits_list() {
        let mut document = Document::new();
        document.toggle_unordered_list(0..0);
        document.insert_text("a");
        document.insert_text("\n");
        // The new line is an empty list item; Enter again exits the list.
        document.insert_text("\n");
        assert!(!document.typing_attributes().paragraph.has_block_properties());
    }

    #[test]
    fn test_indent_caps_at_max_depth_then_inserts_tab() {
        let mut document = document_with("quote");
        document.set_selection(0..0);
        document.toggle_blockquote(0..5);

        for _ in 0..10 {
            document.increase_indent();
        }

        let depth = document
            .store()
            .attrs_at(0)
            .unwrap()
            .paragraph
            .blockquote_depth();
        assert_eq!(depth, MAX_BLOCKQUOTE_DEPTH);
        // The overflowing calls fell through to literal tab insertion.
        assert!(document.text().contains('\t'));
    }

    #[test]
    fn test_decrease_indent_to_zero_removes_property() {
        let mut document = document_with("quote");
        document.set_selection(0..0);
        document.toggle_blockquote(0..5);
        document.increase_indent();

        document.decrease_indent();
        document.decrease_indent();
        assert_eq!(
            document
                .store()
                .attrs_at(0)
                .unwrap()
                .paragraph
                .blockquote_depth(),
            0
        );
        // Further decreases are no-ops.
        document.decrease_indent();
        assert_eq!(document.text(), "quote");
    }

    #[test]
    fn test_delete_backward_merge_strips_styles_after_empty_paragraph() {
        // Empty plain paragraph followed by a list item; deleting the
        // separator must not resurrect the list on the merged line.
        let mut document = Document::new();
        document.set_html("<p></p><ul><li>item</li></ul>");
        assert_eq!(document.text(), "\nitem");

        document.set_selection(1..1);
        document.delete_backward();

        assert_eq!(document.text(), "item");
        assert!(
            !document
                .store()
                .attrs_at(0)
                .unwrap()
                .paragraph
                .has_block_properties()
        );
    }

    #[test]
    fn test_delete_backward_mid_paragraph_keeps_styles() {
        let mut document = Document::new();
        document.set_html("<ul><li>ab</li></ul>");
        document.set_selection(2..2);
        document.delete_backward();
        assert_eq!(document.text(), "a");
        assert_eq!(
            document.store().attrs_at(0).unwrap().paragraph.list_depth(),
            1
        );
    }

    #[test]
    fn test_attachment_deleted_with_placeholder() {
        let mut document = document_with("abcde");
        document.replace_with_image(3..3, "cat.png", None);
        assert_eq!(document.char_len(), 6);
        assert!(document.attachment_at(3).is_some());

        document.set_selection(4..4);
        document.delete_backward();
        assert_eq!(document.char_len(), 5);
        assert!(document.attachment_at(3).is_none());
        assert_eq!(document.store().attachments().count(), 0);
    }

    #[test]
    fn test_archive_round_trip() {
        let mut document = document_with("Hello world");
        document.toggle_bold(0..5);
        document.replace_with_horizontal_rule(5..6);

        let bytes = document.archive();
        let restored = Document::unarchive(&bytes).unwrap();
        assert_eq!(restored.store(), document.store());
    }

    #[test]
    fn test_unarchive_corrupt_returns_none() {
        assert!(Document::unarchive(b"garbage").is_none());
    }

    #[test]
    fn test_formatting_identifiers_on_empty_document_reflect_typing() {
        let mut document = Document::new();
        document.toggle_bold(0..0);
        let identifiers = document.formatting_identifiers_at(0);
        assert!(identifiers.contains(&FormattingIdentifier::Bold));
    }

    #[test]
    fn test_set_html_resets_undo() {
        let mut document = document_with("x");
        assert!(document.can_undo());
        document.set_html("<p>y</p>");
        assert!(!document.can_undo());
    }

    #[test]
    fn test_set_html_undoable_keeps_history() {
        let mut document = document_with("x");
        document.set_html_undoable("<p>y</p>");
        assert_eq!(document.text(), "y");
        assert!(document.undo());
        assert_eq!(document.text(), "x");
    }

    #[test]
    fn test_caption_lifecycle() {
        let mut document = Document::new();
        document.replace_with_image(0..0, "cat.png", None);
        let id = document.attachment_at(0).unwrap().id;

        assert!(document.caption_for(id).is_none());

        let caption = AttributedSpan::plain("a cat", AttrSet::plain());
        document.replace_caption(id, &caption);
        assert_eq!(document.caption_for(id).unwrap().text, "a cat");
        assert!(
            document
                .store()
                .attrs_at(0)
                .unwrap()
                .paragraph
                .contains_figure()
        );

        let replacement = AttributedSpan::plain("another cat", AttrSet::plain());
        document.replace_caption(id, &replacement);
        assert_eq!(document.caption_for(id).unwrap().text, "another cat");

        document.remove_caption(id);
        assert!(document.caption_for(id).is_none());
        assert!(
            !document
                .store()
                .attrs_at(0)
                .unwrap()
                .paragraph
                .contains_figure()
        );
    }

    #[test]
    fn test_typing_attributes_follow_selection() {
        let mut document = document_with("ab");
        document.toggle_bold(0..1);
        document.set_selection(1..1);
        assert!(document.typing_attributes().font.bold);
        document.set_selection(2..2);
        assert!(!document.typing_attributes().font.bold);
    }

    #[test]
    #[should_panic(expected = "attachment resolver not configured")]
    fn test_missing_resolver_is_fatal() {
        let mut document = Document::new();
        document.replace_with_image(0..0, "cat.png", None);
        let id = document.attachment_at(0).unwrap().id;
        let _ = document.placeholder_image_for(id);
    }
}
