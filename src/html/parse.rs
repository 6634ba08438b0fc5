// HTML import
// Walks the tag tree and reconstructs run-store content: block tags map
// to paragraph-property stacks (nesting inferred from tag nesting, depth
// capped), inline tags map to span attributes, and img/hr/comments map to
// attachment placeholders. Unknown or malformed markup degrades to plain
// text carrying the default attributes; the parse itself never fails.

use log::debug;

use super::tokenizer::tokenize;
use super::tree::{build_tree, Node};
use crate::attachment::{AttachmentPayload, ATTACHMENT_CHAR};
use crate::attributes::{AttrSet, HeaderLevel};
use crate::paragraph::{
    ListStyle, ParagraphProperty, ParagraphStyle, MAX_BLOCKQUOTE_DEPTH, MAX_LIST_DEPTH,
};
use crate::run_store::{RunStore, PARAGRAPH_SEPARATOR};
use crate::span::Run;

pub fn run_store_from(html: &str, default_attrs: &AttrSet) -> RunStore {
    let nodes = build_tree(tokenize(html));
    let mut builder = Builder::new(default_attrs.clone());
    let ctx = BlockContext::default();
    builder.walk_block_children(&nodes, &ctx);
    builder.finish()
}

/// Paragraph-level state accumulated while descending the tag tree.
#[derive(Debug, Clone, Default)]
struct BlockContext {
    style: ParagraphStyle,
    heading: Option<HeaderLevel>,
    pre: bool,
}

impl BlockContext {
    fn with_header(&self, level: HeaderLevel) -> BlockContext {
        let mut ctx = self.clone();
        ctx.style
            .remove_all(|p| matches!(p, ParagraphProperty::Header(_)));
        ctx.style.push(ParagraphProperty::Header(level));
        ctx.heading = Some(level);
        ctx
    }

    /// The tag dictates the nested list's style, unlike indentation,
    /// which inherits from the innermost level.
    fn with_list(&self, style: ListStyle) -> BlockContext {
        let mut ctx = self.clone();
        let depth = ctx.style.list_depth();
        if depth < MAX_LIST_DEPTH {
            ctx.style.push(ParagraphProperty::ListItem {
                style,
                depth: depth + 1,
            });
        } else {
            debug!("list nesting beyond depth cap, flattening");
        }
        ctx
    }

    fn with_blockquote(&self) -> BlockContext {
        let mut ctx = self.clone();
        if !ctx.style.push_blockquote_level(MAX_BLOCKQUOTE_DEPTH) {
            debug!("blockquote nesting beyond depth cap, flattening");
        }
        ctx
    }

    fn with_pre(&self) -> BlockContext {
        let mut ctx = self.clone();
        if !ctx.style.contains_pre() {
            ctx.style.push(ParagraphProperty::Pre);
        }
        ctx.pre = true;
        ctx
    }

    fn with_figure(&self) -> BlockContext {
        let mut ctx = self.clone();
        ctx.style.push(ParagraphProperty::Figure);
        ctx
    }

    fn with_figcaption(&self) -> BlockContext {
        let mut ctx = self.clone();
        ctx.style.push(ParagraphProperty::Figcaption);
        ctx
    }

    /// The base attribute set for a paragraph emitted under this context.
    fn attrs(&self, default: &AttrSet) -> AttrSet {
        let mut attrs = default.clone();
        attrs.paragraph = self.style.clone();
        attrs.heading = self.heading;
        if let Some(level) = self.heading {
            attrs.font = attrs.font.for_header(level);
        }
        if self.pre {
            attrs.font.monospace = true;
        }
        attrs
    }
}

fn is_block_element(name: &str) -> bool {
    matches!(
        name,
        "p" | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "ul"
            | "ol"
            | "li"
            | "blockquote"
            | "pre"
            | "figure"
            | "figcaption"
            | "hr"
            | "div"
            | "table"
            | "section"
            | "article"
            | "aside"
            | "header"
            | "footer"
            | "nav"
            | "main"
    )
}

fn is_block_node(node: &Node) -> bool {
    matches!(node, Node::Element { name, .. } if is_block_element(name))
}

struct Builder {
    text: String,
    chars: usize,
    runs: Vec<Run>,
    attachments: Vec<(usize, AttachmentPayload)>,
    default_attrs: AttrSet,
    started: bool,
    para_start: usize,
    last_block_attrs: Option<AttrSet>,
}

impl Builder {
    fn new(default_attrs: AttrSet) -> Self {
        Builder {
            text: String::new(),
            chars: 0,
            runs: Vec::new(),
            attachments: Vec::new(),
            default_attrs,
            started: false,
            para_start: 0,
            last_block_attrs: None,
        }
    }

    fn finish(self) -> RunStore {
        RunStore::from_parts(self.text, self.runs, self.attachments)
    }

    /// Walk a sequence of block-level children: block elements dispatch,
    /// runs of stray inline content gather into implicit paragraphs, and
    /// whitespace-only text between blocks is dropped.
    fn walk_block_children(&mut self, nodes: &[Node], ctx: &BlockContext) {
        let mut inline: Vec<&Node> = Vec::new();
        for node in nodes {
            if is_block_node(node) {
                self.flush_inline(&mut inline, ctx);
                self.handle_block(node, ctx);
            } else if matches!(node, Node::Text(t) if t.trim().is_empty()) && inline.is_empty() {
                continue;
            } else {
                inline.push(node);
            }
        }
        self.flush_inline(&mut inline, ctx);
    }

    fn flush_inline(&mut self, inline: &mut Vec<&Node>, ctx: &BlockContext) {
        if inline.is_empty() {
            return;
        }
        let base = ctx.attrs(&self.default_attrs);
        self.start_block(base.clone());
        let nodes: Vec<Node> = inline.drain(..).cloned().collect();
        self.walk_inline(&nodes, &base, ctx.pre);
    }

    fn handle_block(&mut self, node: &Node, ctx: &BlockContext) {
        let Node::Element { name, children, .. } = node else {
            return;
        };
        match name.as_str() {
            "p" => self.walk_mixed(children, ctx),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = HeaderLevel::from_number(name.as_bytes()[1] - b'0')
                    .expect("block dispatch only matches h1-h6");
                self.walk_mixed(children, &ctx.with_header(level));
            }
            "blockquote" => self.walk_block_children(children, &ctx.with_blockquote()),
            "ul" => self.walk_list(children, &ctx.with_list(ListStyle::Unordered)),
            "ol" => self.walk_list(children, &ctx.with_list(ListStyle::Ordered)),
            // A stray li outside any list gets one implicit level.
            "li" => self.walk_mixed(children, &ctx.with_list(ListStyle::Unordered)),
            "pre" => self.walk_mixed(children, &ctx.with_pre()),
            "figure" => self.walk_block_children(children, &ctx.with_figure()),
            "figcaption" => self.walk_mixed(children, &ctx.with_figcaption()),
            "hr" => {
                let attrs = ctx.attrs(&self.default_attrs);
                self.start_block(attrs.clone());
                self.push_attachment(AttachmentPayload::HorizontalRule, &attrs);
            }
            // Structural wrappers the model has no counterpart for are
            // transparent; their children degrade into the current context.
            _ => self.walk_block_children(children, ctx),
        }
    }

    fn walk_list(&mut self, children: &[Node], ctx: &BlockContext) {
        for child in children {
            match child {
                Node::Element { name, children, .. } if name == "li" => {
                    self.walk_mixed(children, ctx);
                }
                Node::Element { name, .. } if name == "ul" || name == "ol" => {
                    self.handle_block(child, ctx);
                }
                Node::Text(t) if t.trim().is_empty() => {}
                other => {
                    // Anything else inside a list degrades to an implicit
                    // list item.
                    self.walk_mixed(std::slice::from_ref(other), ctx);
                }
            }
        }
    }

    /// Emit the children of a leaf block element: leading inline content
    /// forms the paragraph, nested block children (nested lists inside a
    /// list item, for example) dispatch recursively.
    fn walk_mixed(&mut self, children: &[Node], ctx: &BlockContext) {
        let base = ctx.attrs(&self.default_attrs);
        let mut inline: Vec<Node> = Vec::new();
        let mut emitted = false;

        for child in children {
            if is_block_node(child) {
                if !inline.is_empty() {
                    self.start_block(base.clone());
                    self.walk_inline(&inline, &base, ctx.pre);
                    inline.clear();
                    emitted = true;
                }
                self.handle_block(child, ctx);
                emitted = true;
            } else {
                inline.push(child.clone());
            }
        }

        if !inline.is_empty() || !emitted {
            self.start_block(base.clone());
            self.walk_inline(&inline, &base, ctx.pre);
        }
    }

    fn walk_inline(&mut self, nodes: &[Node], attrs: &AttrSet, pre: bool) {
        for node in nodes {
            match node {
                Node::Text(text) => self.push_text(text, attrs, pre),
                Node::Comment(text) => {
                    self.push_attachment(AttachmentPayload::Comment(text.clone()), attrs);
                }
                Node::Element { name, children, .. } => {
                    let mut styled = attrs.clone();
                    match name.as_str() {
                        "strong" | "b" => styled.font.bold = true,
                        "em" | "i" => styled.font.italic = true,
                        "u" | "ins" => styled.underline = true,
                        "del" | "s" | "strike" => styled.strikethrough = true,
                        "mark" => styled.mark = true,
                        "code" | "tt" => styled.code = true,
                        "a" => styled.link = Some(node.attr("href").unwrap_or("").to_string()),
                        "br" => {
                            self.push_char(PARAGRAPH_SEPARATOR, attrs);
                            continue;
                        }
                        "img" => {
                            let src = node.attr("src").unwrap_or("").to_string();
                            let width = node.attr("width").and_then(|v| v.parse().ok());
                            let height = node.attr("height").and_then(|v| v.parse().ok());
                            let size = width.zip(height);
                            self.push_attachment(AttachmentPayload::Image { src, size }, attrs);
                            continue;
                        }
                        "hr" => {
                            self.push_attachment(AttachmentPayload::HorizontalRule, attrs);
                            continue;
                        }
                        // Unknown inline markup is transparent: its text
                        // survives with the surrounding attributes.
                        _ => {}
                    }
                    self.walk_inline(children, &styled, pre);
                }
            }
        }
    }

    fn start_block(&mut self, base: AttrSet) {
        if self.started {
            let sep_attrs = self.last_block_attrs.clone().unwrap_or_else(|| base.clone());
            self.push_char(PARAGRAPH_SEPARATOR, &sep_attrs);
        }
        self.started = true;
        self.para_start = self.chars;
        self.last_block_attrs = Some(base);
    }

    fn push_text(&mut self, text: &str, attrs: &AttrSet, pre: bool) {
        let processed = if pre {
            text.to_string()
        } else {
            self.collapse_whitespace(text)
        };
        if processed.is_empty() {
            return;
        }
        self.text.push_str(&processed);
        self.chars += processed.chars().count();
        self.runs
            .push(Run::new(processed.chars().count(), attrs.clone()));
    }

    /// Collapse whitespace runs to single spaces, dropping a leading space
    /// at the start of a paragraph or right after one.
    fn collapse_whitespace(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut at_space = self.chars == self.para_start
            || self.text.ends_with(' ');
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !at_space {
                    out.push(' ');
                    at_space = true;
                }
            } else {
                out.push(ch);
                at_space = false;
            }
        }
        out
    }

    fn push_char(&mut self, ch: char, attrs: &AttrSet) {
        self.text.push(ch);
        self.chars += 1;
        self.runs.push(Run::new(1, attrs.clone()));
    }

    fn push_attachment(&mut self, payload: AttachmentPayload, attrs: &AttrSet) {
        let pos = self.chars;
        self.push_char(ATTACHMENT_CHAR, attrs);
        self.attachments.push((pos, payload));
    }
}
