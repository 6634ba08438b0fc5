// Paragraph properties
// Block semantics are a stack of tagged variants, innermost last. Nesting
// (lists in quotes, quotes in quotes) is modeled by stacking entries; the
// depth field records each entry's 1-based nesting level for its own kind.

use serde::{Deserialize, Serialize};

use crate::attributes::HeaderLevel;

/// Maximum nesting depth for list items
pub const MAX_LIST_DEPTH: u8 = 7;

/// Maximum nesting depth for blockquotes
pub const MAX_BLOCKQUOTE_DEPTH: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListStyle {
    Ordered,
    Unordered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParagraphProperty {
    Paragraph,
    Header(HeaderLevel),
    ListItem { style: ListStyle, depth: u8 },
    Blockquote { depth: u8 },
    Pre,
    Figure,
    Figcaption,
}

impl ParagraphProperty {
    /// Whether this property carries block semantics beyond a plain
    /// paragraph.
    pub fn is_block_property(&self) -> bool {
        !matches!(self, ParagraphProperty::Paragraph)
    }
}

/// Ordered property stack for one paragraph, outermost first.
///
/// An empty stack is an implicit plain paragraph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParagraphStyle {
    properties: Vec<ParagraphProperty>,
}

impl ParagraphStyle {
    pub fn new() -> Self {
        ParagraphStyle {
            properties: Vec::new(),
        }
    }

    pub fn with_properties(properties: Vec<ParagraphProperty>) -> Self {
        ParagraphStyle { properties }
    }

    pub fn properties(&self) -> &[ParagraphProperty] {
        &self.properties
    }

    pub fn is_plain(&self) -> bool {
        self.properties
            .iter()
            .all(|p| !p.is_block_property())
    }

    /// The topmost (innermost) property, which determines the effective
    /// block semantics for layout and HTML export.
    pub fn effective(&self) -> ParagraphProperty {
        self.properties
            .last()
            .copied()
            .unwrap_or(ParagraphProperty::Paragraph)
    }

    pub fn push(&mut self, property: ParagraphProperty) {
        self.properties.push(property);
    }

    /// All list entries, outermost first.
    pub fn lists(&self) -> Vec<(ListStyle, u8)> {
        self.properties
            .iter()
            .filter_map(|p| match p {
                ParagraphProperty::ListItem { style, depth } => Some((*style, *depth)),
                _ => None,
            })
            .collect()
    }

    /// All blockquote entries, outermost first.
    pub fn blockquotes(&self) -> Vec<u8> {
        self.properties
            .iter()
            .filter_map(|p| match p {
                ParagraphProperty::Blockquote { depth } => Some(*depth),
                _ => None,
            })
            .collect()
    }

    /// The innermost header level, if any.
    pub fn header_level(&self) -> Option<HeaderLevel> {
        self.properties.iter().rev().find_map(|p| match p {
            ParagraphProperty::Header(level) => Some(*level),
            _ => None,
        })
    }

    pub fn list_depth(&self) -> u8 {
        self.lists().len() as u8
    }

    pub fn blockquote_depth(&self) -> u8 {
        self.blockquotes().len() as u8
    }

    /// The style of the innermost list entry, if any.
    pub fn innermost_list_style(&self) -> Option<ListStyle> {
        self.lists().last().map(|(style, _)| *style)
    }

    pub fn contains_pre(&self) -> bool {
        self.properties.contains(&ParagraphProperty::Pre)
    }

    pub fn contains_figure(&self) -> bool {
        self.properties.contains(&ParagraphProperty::Figure)
    }

    pub fn contains_figcaption(&self) -> bool {
        self.properties.contains(&ParagraphProperty::Figcaption)
    }

    /// Whether the stack carries any property besides plain paragraphs.
    pub fn has_block_properties(&self) -> bool {
        self.properties.iter().any(|p| p.is_block_property())
    }

    /// Push one more list level, inheriting the innermost style. Returns
    /// false when the depth cap is already reached.
    pub fn push_list_level(&mut self, fallback_style: ListStyle, max_depth: u8) -> bool {
        let depth = self.list_depth();
        if depth >= max_depth {
            return false;
        }
        let style = self.innermost_list_style().unwrap_or(fallback_style);
        self.properties.push(ParagraphProperty::ListItem {
            style,
            depth: depth + 1,
        });
        true
    }

    /// Pop the innermost list level. Returns false when none is present.
    pub fn pop_list_level(&mut self) -> bool {
        self.remove_last(|p| matches!(p, ParagraphProperty::ListItem { .. }))
    }

    /// Change the innermost list entry's style in place. Returns false
    /// when no list entry is present.
    pub fn swap_innermost_list_style(&mut self, style: ListStyle) -> bool {
        let Some(idx) = self
            .properties
            .iter()
            .rposition(|p| matches!(p, ParagraphProperty::ListItem { .. }))
        else {
            return false;
        };
        if let ParagraphProperty::ListItem { style: current, .. } = &mut self.properties[idx] {
            *current = style;
        }
        true
    }

    /// Push one more blockquote level. Returns false at the depth cap.
    pub fn push_blockquote_level(&mut self, max_depth: u8) -> bool {
        let depth = self.blockquote_depth();
        if depth >= max_depth {
            return false;
        }
        self.properties
            .push(ParagraphProperty::Blockquote { depth: depth + 1 });
        true
    }

    /// Pop the innermost blockquote level. Returns false when none is
    /// present.
    pub fn pop_blockquote_level(&mut self) -> bool {
        self.remove_last(|p| matches!(p, ParagraphProperty::Blockquote { .. }))
    }

    /// Remove every property matching the predicate.
    pub fn remove_all(&mut self, predicate: impl Fn(&ParagraphProperty) -> bool) {
        self.properties.retain(|p| !predicate(p));
    }

    fn remove_last(&mut self, predicate: impl Fn(&ParagraphProperty) -> bool) -> bool {
        if let Some(idx) = self.properties.iter().rposition(|p| predicate(p)) {
            self.properties.remove(idx);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stack_is_plain_paragraph() {
        let style = ParagraphStyle::new();
        assert!(style.is_plain());
        assert_eq!(style.effective(), ParagraphProperty::Paragraph);
    }

    #[test]
    fn test_push_list_level_inherits_style() {
        let mut style = ParagraphStyle::new();
        assert!(style.push_list_level(ListStyle::Ordered, MAX_LIST_DEPTH));
        assert!(style.push_list_level(ListStyle::Unordered, MAX_LIST_DEPTH));

        // The second push inherits Ordered from the innermost entry, not
        // the fallback.
        assert_eq!(
            style.lists(),
            vec![(ListStyle::Ordered, 1), (ListStyle::Ordered, 2)]
        );
    }

    #[test]
    fn test_list_depth_cap() {
        let mut style = ParagraphStyle::new();
        for _ in 0..MAX_LIST_DEPTH {
            assert!(style.push_list_level(ListStyle::Unordered, MAX_LIST_DEPTH));
        }
        assert!(!style.push_list_level(ListStyle::Unordered, MAX_LIST_DEPTH));
        assert_eq!(style.list_depth(), MAX_LIST_DEPTH);
    }

    #[test]
    fn test_blockquote_depth_cap() {
        let mut style = ParagraphStyle::new();
        for _ in 0..MAX_BLOCKQUOTE_DEPTH {
            assert!(style.push_blockquote_level(MAX_BLOCKQUOTE_DEPTH));
        }
        assert!(!style.push_blockquote_level(MAX_BLOCKQUOTE_DEPTH));
        assert_eq!(style.blockquote_depth(), MAX_BLOCKQUOTE_DEPTH);
    }

    #[test]
    fn test_pop_to_zero_removes_property_entirely() {
        let mut style = ParagraphStyle::new();
        style.push_blockquote_level(MAX_BLOCKQUOTE_DEPTH);
        assert!(style.pop_blockquote_level());
        assert!(!style.pop_blockquote_level());
        assert!(style.is_plain());
    }

    #[test]
    fn test_mixed_stack_effective_is_innermost() {
        let mut style = ParagraphStyle::new();
        style.push_blockquote_level(MAX_BLOCKQUOTE_DEPTH);
        style.push_list_level(ListStyle::Unordered, MAX_LIST_DEPTH);
        assert_eq!(
            style.effective(),
            ParagraphProperty::ListItem {
                style: ListStyle::Unordered,
                depth: 1
            }
        );
        assert_eq!(style.blockquote_depth(), 1);
    }
}
