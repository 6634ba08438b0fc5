// HTML export
// Walks the run sequence paragraph by paragraph, emitting nested block
// tags derived from each paragraph's property stack (outermost property
// first) around inline tags derived from span attributes. Consecutive
// paragraphs sharing outer properties share the outer tags; adjacent runs
// with identical inline attributes merge into one tag.

use std::ops::Range;

use super::entities::{escape_attr, escape_text};
use crate::attachment::AttachmentPayload;
use crate::attributes::AttrSet;
use crate::paragraph::{ListStyle, ParagraphProperty, ParagraphStyle};
use crate::run_store::{RunStore, PARAGRAPH_SEPARATOR};

pub fn html_from(store: &RunStore, prettify: bool) -> String {
    if store.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    let mut open_containers: Vec<String> = Vec::new();
    let mut pre_open = false;

    for paragraph in store.paragraph_ranges(0..store.char_len()) {
        let content = content_range(store, &paragraph);
        let Some(base) = store.attrs_at(paragraph.start) else {
            continue;
        };
        let mut tags = block_tags(&base.paragraph);
        let leaf = tags.pop().expect("block tag chain is never empty");
        let containers = tags;

        if pre_open && leaf == "pre" && containers == open_containers {
            out.push('\n');
            emit_inline(&mut out, store, content, base);
            continue;
        }
        if pre_open {
            out.push_str("</pre>");
            pre_open = false;
        }

        let keep = common_prefix(&open_containers, &containers);
        while open_containers.len() > keep {
            let tag = open_containers.pop().unwrap();
            push_block_break(&mut out, prettify, open_containers.len());
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
        for tag in &containers[keep..] {
            push_block_break(&mut out, prettify, open_containers.len());
            out.push('<');
            out.push_str(tag);
            out.push('>');
            open_containers.push(tag.clone());
        }

        push_block_break(&mut out, prettify, open_containers.len());
        out.push('<');
        out.push_str(&leaf);
        out.push('>');
        emit_inline(&mut out, store, content, base);
        if leaf == "pre" {
            pre_open = true;
        } else {
            out.push_str("</");
            out.push_str(&leaf);
            out.push('>');
        }
    }

    if pre_open {
        out.push_str("</pre>");
    }
    while let Some(tag) = open_containers.pop() {
        push_block_break(&mut out, prettify, open_containers.len());
        out.push_str("</");
        out.push_str(&tag);
        out.push('>');
    }

    out
}

pub fn html_from_range(store: &RunStore, range: Range<usize>, prettify: bool) -> String {
    html_from(&store.slice(range), prettify)
}

fn content_range(store: &RunStore, paragraph: &Range<usize>) -> Range<usize> {
    let mut end = paragraph.end;
    if end > paragraph.start && store.char_at(end - 1) == Some(PARAGRAPH_SEPARATOR) {
        end -= 1;
    }
    paragraph.start..end
}

/// The open-tag chain for one paragraph, outermost first. The chain
/// always ends in a content-bearing leaf; container-only stacks get a
/// trailing `p`.
fn block_tags(style: &ParagraphStyle) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for property in style.properties() {
        match property {
            ParagraphProperty::Paragraph => {}
            ParagraphProperty::Header(level) => tags.push(format!("h{}", level.number())),
            ParagraphProperty::ListItem { style, .. } => {
                tags.push(
                    match style {
                        ListStyle::Ordered => "ol",
                        ListStyle::Unordered => "ul",
                    }
                    .to_string(),
                );
                tags.push("li".to_string());
            }
            ParagraphProperty::Blockquote { .. } => tags.push("blockquote".to_string()),
            ParagraphProperty::Pre => tags.push("pre".to_string()),
            ParagraphProperty::Figure => tags.push("figure".to_string()),
            ParagraphProperty::Figcaption => tags.push("figcaption".to_string()),
        }
    }
    match tags.last().map(String::as_str) {
        None | Some("blockquote") | Some("ul") | Some("ol") | Some("figure") => {
            tags.push("p".to_string());
        }
        _ => {}
    }
    tags
}

fn common_prefix(a: &[String], b: &[String]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn push_block_break(out: &mut String, prettify: bool, depth: usize) {
    if !prettify || out.is_empty() {
        return;
    }
    out.push('\n');
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn emit_inline(out: &mut String, store: &RunStore, content: Range<usize>, base: &AttrSet) {
    if content.is_empty() {
        return;
    }
    let span = store.attributed_substring(content);
    let in_pre = base.paragraph.contains_pre();

    // Merge adjacent runs whose inline attributes agree so output is not
    // fragmented by paragraph-scoped differences.
    let mut segments: Vec<(usize, AttrSet)> = Vec::new();
    for run in &span.runs {
        match segments.last_mut() {
            Some((len, attrs)) if attrs.same_inline_attrs(&run.attrs) => *len += run.len,
            _ => segments.push((run.len, run.attrs.clone())),
        }
    }

    let chars: Vec<char> = span.text.chars().collect();
    let mut pos = 0;
    for (len, attrs) in segments {
        let segment = pos..pos + len;
        let tags = inline_tags(&attrs, in_pre);

        // Attachment placeholders interrupt the segment; text pieces
        // between them are wrapped in the segment's inline tags.
        let mut piece_start = segment.start;
        let attachment_positions: Vec<usize> = span
            .attachments
            .iter()
            .map(|(offset, _)| *offset)
            .filter(|offset| segment.contains(offset))
            .collect();
        for attachment_pos in attachment_positions {
            emit_text_piece(out, &chars[piece_start..attachment_pos], &tags);
            let attachment = span
                .attachments
                .iter()
                .find(|(offset, _)| *offset == attachment_pos)
                .map(|(_, a)| a)
                .expect("attachment position came from this span");
            emit_attachment(out, &attachment.payload);
            piece_start = attachment_pos + 1;
        }
        emit_text_piece(out, &chars[piece_start..segment.end], &tags);
        pos = segment.end;
    }
}

fn emit_text_piece(out: &mut String, chars: &[char], tags: &[InlineTag]) {
    if chars.is_empty() {
        return;
    }
    for tag in tags {
        match tag {
            InlineTag::Plain(name) => {
                out.push('<');
                out.push_str(name);
                out.push('>');
            }
            InlineTag::Anchor(href) => {
                out.push_str("<a href=\"");
                out.push_str(&escape_attr(href));
                out.push_str("\">");
            }
        }
    }
    let text: String = chars.iter().collect();
    out.push_str(&escape_text(&text));
    for tag in tags.iter().rev() {
        let name = match tag {
            InlineTag::Plain(name) => name,
            InlineTag::Anchor(_) => "a",
        };
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
}

fn emit_attachment(out: &mut String, payload: &AttachmentPayload) {
    match payload {
        AttachmentPayload::Image { src, size } => {
            out.push_str("<img src=\"");
            out.push_str(&escape_attr(src));
            out.push('"');
            if let Some((width, height)) = size {
                out.push_str(&format!(" width=\"{width}\" height=\"{height}\""));
            }
            out.push('>');
        }
        AttachmentPayload::HorizontalRule => out.push_str("<hr>"),
        AttachmentPayload::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        // Never stored; stripped on insertion.
        AttachmentPayload::File { .. } => {}
    }
}

enum InlineTag {
    Plain(&'static str),
    Anchor(String),
}

/// Inline wrappers for a segment, in fixed canonical order. A heading's
/// canonical bold is baseline, not emphasis; monospace inside pre needs
/// no code tag.
fn inline_tags(attrs: &AttrSet, in_pre: bool) -> Vec<InlineTag> {
    let mut tags = Vec::new();
    if let Some(href) = &attrs.link {
        tags.push(InlineTag::Anchor(href.clone()));
    }
    if attrs.font.bold && attrs.heading.is_none() {
        tags.push(InlineTag::Plain("strong"));
    }
    if attrs.font.italic {
        tags.push(InlineTag::Plain("em"));
    }
    if attrs.underline {
        tags.push(InlineTag::Plain("u"));
    }
    if attrs.strikethrough {
        tags.push(InlineTag::Plain("del"));
    }
    if attrs.mark {
        tags.push(InlineTag::Plain("mark"));
    }
    if attrs.code && !in_pre {
        tags.push(InlineTag::Plain("code"));
    }
    tags
}
