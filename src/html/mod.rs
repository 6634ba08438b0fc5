// HTML conversion
// Bidirectional mapping between the run store and an HTML tag tree.
// Import never fails: unparsable markup degrades to attributed plain
// text. Export canonicalizes (strong/em/del, fixed attribute order), so
// one import/export round trip reaches a fixed point.

mod entities;
mod parse;
mod render;
mod tokenizer;
mod tree;

pub use parse::run_store_from;
pub use render::{html_from, html_from_range};
