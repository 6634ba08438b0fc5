// Attribute model
// A closed set of span-scoped and paragraph-scoped attributes attached to
// character runs. Paragraph-scoped values are stored per run and kept
// uniform across a paragraph by formatter logic, not by the store.

use serde::{Deserialize, Serialize};

use crate::paragraph::ParagraphStyle;

/// Heading level, h1 through h6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderLevel {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
}

impl HeaderLevel {
    pub fn from_number(level: u8) -> Option<HeaderLevel> {
        match level {
            1 => Some(HeaderLevel::H1),
            2 => Some(HeaderLevel::H2),
            3 => Some(HeaderLevel::H3),
            4 => Some(HeaderLevel::H4),
            5 => Some(HeaderLevel::H5),
            6 => Some(HeaderLevel::H6),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            HeaderLevel::H1 => 1,
            HeaderLevel::H2 => 2,
            HeaderLevel::H3 => 3,
            HeaderLevel::H4 => 4,
            HeaderLevel::H5 => 5,
            HeaderLevel::H6 => 6,
        }
    }

    /// Canonical point size for this heading level
    pub fn font_size(self) -> u16 {
        match self {
            HeaderLevel::H1 => 28,
            HeaderLevel::H2 => 26,
            HeaderLevel::H3 => 22,
            HeaderLevel::H4 => 20,
            HeaderLevel::H5 => 18,
            HeaderLevel::H6 => 16,
        }
    }
}

pub const DEFAULT_FONT_SIZE: u16 = 16;

/// Font attribute: size plus style traits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontSpec {
    pub size: u16,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        FontSpec {
            size: DEFAULT_FONT_SIZE,
            bold: false,
            italic: false,
            monospace: false,
        }
    }
}

impl FontSpec {
    /// The canonical font for a heading level: sized per level, bold,
    /// other traits carried over from `self`.
    pub fn for_header(self, level: HeaderLevel) -> FontSpec {
        FontSpec {
            size: level.font_size(),
            bold: true,
            ..self
        }
    }

    /// The font with heading styling removed again.
    pub fn without_header(self) -> FontSpec {
        FontSpec {
            size: DEFAULT_FONT_SIZE,
            bold: false,
            ..self
        }
    }
}

/// RGB text color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// The attribute set attached to one run of characters.
///
/// `paragraph` and `heading` are paragraph-scoped: they conceptually apply
/// to the whole paragraph and are kept consistent across it by the
/// formatters. Everything else is span-scoped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrSet {
    pub font: FontSpec,
    pub color: Option<Color>,
    pub underline: bool,
    pub strikethrough: bool,
    pub mark: bool,
    pub code: bool,
    pub link: Option<String>,
    pub paragraph: ParagraphStyle,
    pub heading: Option<HeaderLevel>,
}

impl Default for AttrSet {
    fn default() -> Self {
        AttrSet {
            font: FontSpec::default(),
            color: None,
            underline: false,
            strikethrough: false,
            mark: false,
            code: false,
            link: None,
            paragraph: ParagraphStyle::new(),
            heading: None,
        }
    }
}

impl AttrSet {
    pub fn plain() -> Self {
        Self::default()
    }

    /// Compare only the span-scoped attributes. Used when merging adjacent
    /// runs into a single inline tag during HTML export.
    pub fn same_inline_attrs(&self, other: &AttrSet) -> bool {
        self.font == other.font
            && self.color == other.color
            && self.underline == other.underline
            && self.strikethrough == other.strikethrough
            && self.mark == other.mark
            && self.code == other.code
            && self.link == other.link
    }

    /// Strip every paragraph-scoped value, leaving span attributes alone.
    /// Fonts derived from paragraph styling (heading size, pre monospace)
    /// revert with the property that set them.
    pub fn without_paragraph_properties(&self) -> AttrSet {
        let mut font = if self.heading.is_some() {
            self.font.without_header()
        } else {
            self.font
        };
        if self.paragraph.contains_pre() {
            font.monospace = false;
        }
        AttrSet {
            paragraph: ParagraphStyle::new(),
            heading: None,
            font,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_level_round_trip() {
        for n in 1..=6 {
            let level = HeaderLevel::from_number(n).unwrap();
            assert_eq!(level.number(), n);
        }
        assert_eq!(HeaderLevel::from_number(0), None);
        assert_eq!(HeaderLevel::from_number(7), None);
    }

    #[test]
    fn test_header_font_is_bold_and_sized() {
        let font = FontSpec::default().for_header(HeaderLevel::H1);
        assert!(font.bold);
        assert_eq!(font.size, 28);

        let back = font.without_header();
        assert!(!back.bold);
        assert_eq!(back.size, DEFAULT_FONT_SIZE);
    }

    #[test]
    fn test_same_inline_attrs_ignores_paragraph() {
        let mut a = AttrSet::plain();
        let mut b = AttrSet::plain();
        b.heading = Some(HeaderLevel::H2);
        assert!(a.same_inline_attrs(&b));

        a.link = Some("https://example.com".to_string());
        assert!(!a.same_inline_attrs(&b));
    }
}
