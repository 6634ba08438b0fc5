// Formatters
// A closed set of style appliers sharing one capability surface:
// application-range resolution, presence queries, apply, remove, toggle.
// Span-level formatters act on the exact range; paragraph-level ones
// expand to full paragraph boundaries first.

use std::ops::Range;

use crate::attributes::{AttrSet, HeaderLevel};
use crate::paragraph::{
    ListStyle, ParagraphProperty, MAX_BLOCKQUOTE_DEPTH, MAX_LIST_DEPTH,
};
use crate::run_store::RunStore;

#[derive(Debug, Clone, PartialEq)]
pub enum Formatter {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Mark,
    Code,
    Link(String),
    Header(HeaderLevel),
    List(ListStyle),
    Blockquote,
    Pre,
}

impl Formatter {
    pub fn is_paragraph_level(&self) -> bool {
        matches!(
            self,
            Formatter::Header(_) | Formatter::List(_) | Formatter::Blockquote | Formatter::Pre
        )
    }

    /// The range a style application actually targets. Span-level
    /// formatters leave the selection unchanged (a zero-length range stays
    /// zero-length and only affects pending typing attributes).
    /// Paragraph-level formatters expand to the union of every paragraph
    /// the selection touches.
    pub fn application_range(&self, selection: Range<usize>, store: &RunStore) -> Range<usize> {
        if !self.is_paragraph_level() {
            return selection;
        }
        let ranges = store.paragraph_ranges(selection);
        match (ranges.first(), ranges.last()) {
            (Some(first), Some(last)) => first.start..last.end,
            _ => 0..0,
        }
    }

    // MARK: - Presence

    pub fn present_in_attrs(&self, attrs: &AttrSet) -> bool {
        match self {
            Formatter::Bold => attrs.font.bold,
            Formatter::Italic => attrs.font.italic,
            Formatter::Underline => attrs.underline,
            Formatter::Strikethrough => attrs.strikethrough,
            Formatter::Mark => attrs.mark,
            Formatter::Code => attrs.code,
            Formatter::Link(_) => attrs.link.is_some(),
            Formatter::Header(level) => attrs.paragraph.header_level() == Some(*level),
            Formatter::List(style) => attrs.paragraph.innermost_list_style() == Some(*style),
            Formatter::Blockquote => attrs.paragraph.blockquote_depth() > 0,
            Formatter::Pre => attrs.paragraph.contains_pre(),
        }
    }

    pub fn present_at(&self, store: &RunStore, index: usize) -> bool {
        store
            .attrs_at(index)
            .map(|attrs| self.present_in_attrs(attrs))
            .unwrap_or(false)
    }

    /// Presence over a range requires the attribute to hold for every
    /// character in it, not just one.
    pub fn present_in(&self, store: &RunStore, range: Range<usize>) -> bool {
        let range = store.clamp_range(range);
        if range.is_empty() {
            return self.present_at(store, range.start);
        }
        let span = store.attributed_substring(range);
        !span.runs.is_empty()
            && span
                .runs
                .iter()
                .all(|run| self.present_in_attrs(&run.attrs))
    }

    // MARK: - Application

    pub fn apply(&self, store: &mut RunStore, range: Range<usize>) -> Range<usize> {
        let formatter = self.clone();
        store.update_attributes(range.clone(), move |attrs| formatter.apply_to_attrs(attrs));
        range
    }

    pub fn remove(&self, store: &mut RunStore, range: Range<usize>) -> Range<usize> {
        let formatter = self.clone();
        store.update_attributes(range.clone(), move |attrs| {
            formatter.remove_from_attrs(attrs)
        });
        range
    }

    /// Remove when present over the whole target range, apply otherwise.
    pub fn toggle(&self, store: &mut RunStore, range: Range<usize>) -> Range<usize> {
        if self.present_in(store, range.clone()) {
            self.remove(store, range)
        } else {
            self.apply(store, range)
        }
    }

    /// Toggle within a bare attribute set (pending typing attributes).
    pub fn toggle_in_attrs(&self, attrs: &mut AttrSet) {
        if self.present_in_attrs(attrs) {
            self.remove_from_attrs(attrs);
        } else {
            self.apply_to_attrs(attrs);
        }
    }

    pub fn apply_to_attrs(&self, attrs: &mut AttrSet) {
        match self {
            Formatter::Bold => attrs.font.bold = true,
            Formatter::Italic => attrs.font.italic = true,
            Formatter::Underline => attrs.underline = true,
            Formatter::Strikethrough => attrs.strikethrough = true,
            Formatter::Mark => attrs.mark = true,
            Formatter::Code => attrs.code = true,
            Formatter::Link(href) => attrs.link = Some(href.clone()),
            Formatter::Header(level) => {
                attrs
                    .paragraph
                    .remove_all(|p| matches!(p, ParagraphProperty::Header(_)));
                attrs.paragraph.push(ParagraphProperty::Header(*level));
                attrs.heading = Some(*level);
                attrs.font = attrs.font.for_header(*level);
            }
            Formatter::List(style) => {
                if !attrs.paragraph.swap_innermost_list_style(*style) {
                    attrs.paragraph.push_list_level(*style, MAX_LIST_DEPTH);
                }
            }
            Formatter::Blockquote => {
                if attrs.paragraph.blockquote_depth() == 0 {
                    attrs.paragraph.push_blockquote_level(MAX_BLOCKQUOTE_DEPTH);
                }
            }
            Formatter::Pre => {
                if !attrs.paragraph.contains_pre() {
                    attrs.paragraph.push(ParagraphProperty::Pre);
                }
                attrs.font.monospace = true;
            }
        }
    }

    pub fn remove_from_attrs(&self, attrs: &mut AttrSet) {
        match self {
            Formatter::Bold => attrs.font.bold = false,
            Formatter::Italic => attrs.font.italic = false,
            Formatter::Underline => attrs.underline = false,
            Formatter::Strikethrough => attrs.strikethrough = false,
            Formatter::Mark => attrs.mark = false,
            Formatter::Code => attrs.code = false,
            Formatter::Link(_) => attrs.link = None,
            Formatter::Header(_) => {
                attrs
                    .paragraph
                    .remove_all(|p| matches!(p, ParagraphProperty::Header(_)));
                attrs.heading = None;
                attrs.font = attrs.font.without_header();
            }
            Formatter::List(_) => {
                attrs.paragraph.pop_list_level();
            }
            Formatter::Blockquote => {
                attrs.paragraph.pop_blockquote_level();
            }
            Formatter::Pre => {
                attrs
                    .paragraph
                    .remove_all(|p| matches!(p, ParagraphProperty::Pre));
                attrs.font.monospace = false;
            }
        }
    }
}
