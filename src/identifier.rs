// Formatting identifiers
// The vocabulary the formatting query surface speaks: one identifier per
// style a toolbar could reflect.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormattingIdentifier {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Blockquote,
    Orderedlist,
    Unorderedlist,
    Header1,
    Header2,
    Header3,
    Header4,
    Header5,
    Header6,
    Paragraph,
    Horizontalrule,
    Mark,
    Link,
    Code,
    Media,
    Sourcecode,
}

impl FormattingIdentifier {
    pub fn as_str(self) -> &'static str {
        match self {
            FormattingIdentifier::Bold => "bold",
            FormattingIdentifier::Italic => "italic",
            FormattingIdentifier::Underline => "underline",
            FormattingIdentifier::Strikethrough => "strikethrough",
            FormattingIdentifier::Blockquote => "blockquote",
            FormattingIdentifier::Orderedlist => "orderedlist",
            FormattingIdentifier::Unorderedlist => "unorderedlist",
            FormattingIdentifier::Header1 => "header1",
            FormattingIdentifier::Header2 => "header2",
            FormattingIdentifier::Header3 => "header3",
            FormattingIdentifier::Header4 => "header4",
            FormattingIdentifier::Header5 => "header5",
            FormattingIdentifier::Header6 => "header6",
            FormattingIdentifier::Paragraph => "p",
            FormattingIdentifier::Horizontalrule => "horizontalruler",
            FormattingIdentifier::Mark => "mark",
            FormattingIdentifier::Link => "link",
            FormattingIdentifier::Code => "code",
            FormattingIdentifier::Media => "media",
            FormattingIdentifier::Sourcecode => "sourcecode",
        }
    }

    pub fn header(level: u8) -> Option<FormattingIdentifier> {
        match level {
            1 => Some(FormattingIdentifier::Header1),
            2 => Some(FormattingIdentifier::Header2),
            3 => Some(FormattingIdentifier::Header3),
            4 => Some(FormattingIdentifier::Header4),
            5 => Some(FormattingIdentifier::Header5),
            6 => Some(FormattingIdentifier::Header6),
            _ => None,
        }
    }
}

impl fmt::Display for FormattingIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
