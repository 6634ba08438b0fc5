// Tag tree
// Builds a forest of element/text/comment nodes from the token stream.
// Recovery rules: unmatched end tags are dropped, unclosed elements are
// closed at end of input, and a close tag for an outer element implicitly
// closes everything opened inside it.

use log::debug;

use super::tokenizer::Token;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        children: Vec<Node>,
    },
    Text(String),
    Comment(String),
}

impl Node {
    pub fn attr(&self, key: &str) -> Option<&str> {
        match self {
            Node::Element { attributes, .. } => attributes
                .iter()
                .find(|(name, _)| name == key)
                .and_then(|(_, value)| value.as_deref()),
            _ => None,
        }
    }
}

fn is_void_element(name: &str) -> bool {
    matches!(name, "br" | "hr" | "img")
}

pub fn build_tree(tokens: Vec<Token>) -> Vec<Node> {
    // Stack of open elements; the bottom entry collects the roots.
    let mut stack: Vec<(String, Vec<(String, Option<String>)>, Vec<Node>)> =
        vec![(String::new(), Vec::new(), Vec::new())];

    for token in tokens {
        match token {
            Token::Text(text) => {
                stack.last_mut().unwrap().2.push(Node::Text(text));
            }
            Token::Comment(text) => {
                stack.last_mut().unwrap().2.push(Node::Comment(text));
            }
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                if self_closing || is_void_element(&name) {
                    stack.last_mut().unwrap().2.push(Node::Element {
                        name,
                        attributes,
                        children: Vec::new(),
                    });
                } else {
                    stack.push((name, attributes, Vec::new()));
                }
            }
            Token::EndTag(name) => {
                let Some(open_idx) = stack.iter().rposition(|(n, _, _)| *n == name) else {
                    debug!("dropping unmatched end tag </{name}>");
                    continue;
                };
                if open_idx == 0 {
                    continue;
                }
                while stack.len() > open_idx {
                    let (name, attributes, children) = stack.pop().unwrap();
                    stack.last_mut().unwrap().2.push(Node::Element {
                        name,
                        attributes,
                        children,
                    });
                }
            }
        }
    }

    // Close anything still open at end of input.
    while stack.len() > 1 {
        let (name, attributes, children) = stack.pop().unwrap();
        stack.last_mut().unwrap().2.push(Node::Element {
            name,
            attributes,
            children,
        });
    }

    stack.pop().unwrap().2
}
