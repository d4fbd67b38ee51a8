//! Template scanner
//!
//! Each `if`/`for` body is collected by a recursive call that owns its
//! stop tag (`endif`/`endfor`) and consumes it before returning, so an
//! outer block never sees an inner block's closing tag.

use super::RenderNode;
use crate::parser::MAX_NESTING;
use tracing::{error, warn};

/// Node cap applied when no explicit limit is configured.
pub const DEFAULT_MAX_NODES: usize = 1000;

/// Parse `source` with the default node cap.
pub fn parse_template(source: &str) -> Vec<RenderNode> {
    TemplateParser::new(source, DEFAULT_MAX_NODES).parse()
}

enum Tag {
    Stop,
    Node(RenderNode),
    Ignored,
}

pub struct TemplateParser<'a> {
    source: &'a str,
    pos: usize,
    max_nodes: usize,
    emitted: usize,
    truncated: bool,
    depth: usize,
}

impl<'a> TemplateParser<'a> {
    pub fn new(source: &'a str, max_nodes: usize) -> Self {
        TemplateParser {
            source,
            pos: 0,
            max_nodes,
            emitted: 0,
            truncated: false,
            depth: 0,
        }
    }

    pub fn parse(mut self) -> Vec<RenderNode> {
        self.parse_block(None)
    }

    /// Nodes emitted so far, across every nesting level.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    fn claim(&mut self) -> bool {
        if self.emitted >= self.max_nodes {
            if !self.truncated {
                error!(limit = self.max_nodes, "template node limit reached, output truncated");
            }
            self.truncated = true;
            return false;
        }
        self.emitted += 1;
        true
    }

    /// Open blocks past the nesting limit are dropped; their bodies stay
    /// in the enclosing block and their closing tags are ignored as strays.
    fn enter_block(&mut self, tag: &str) -> bool {
        if self.depth >= MAX_NESTING {
            error!(tag = tag, limit = MAX_NESTING, "template nesting too deep, tag ignored");
            return false;
        }
        self.claim()
    }

    fn block(&mut self, stop: &str) -> Vec<RenderNode> {
        self.depth += 1;
        let children = self.parse_block(Some(stop));
        self.depth -= 1;
        children
    }

    fn push_text(&mut self, nodes: &mut Vec<RenderNode>, text: &str) {
        if !text.is_empty() && self.claim() {
            nodes.push(RenderNode::Text(text.to_string()));
        }
    }

    fn parse_block(&mut self, stop: Option<&str>) -> Vec<RenderNode> {
        let mut nodes = Vec::new();
        let source = self.source;

        while !self.truncated && self.pos < source.len() {
            let rest = &source[self.pos..];

            let open = match (rest.find("{{"), rest.find("{%")) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            match open {
                None => {
                    self.push_text(&mut nodes, rest);
                    self.pos = source.len();
                }
                Some(offset) if offset > 0 => {
                    self.push_text(&mut nodes, &rest[..offset]);
                    self.pos += offset;
                }
                Some(_) => {
                    let is_var = rest.starts_with("{{");
                    let close = if is_var { "}}" } else { "%}" };

                    // Unterminated tags degrade to literal text.
                    let Some(end) = rest[2..].find(close) else {
                        self.push_text(&mut nodes, rest);
                        self.pos = source.len();
                        break;
                    };

                    let inner = rest[2..2 + end].trim();
                    self.pos += end + 4;

                    if is_var {
                        if self.claim() {
                            nodes.push(RenderNode::Var(inner.to_string()));
                        }
                        continue;
                    }

                    match self.control_tag(inner, stop) {
                        Tag::Stop => return nodes,
                        Tag::Node(node) => nodes.push(node),
                        Tag::Ignored => {}
                    }
                }
            }
        }

        if let Some(stop) = stop {
            if !self.truncated {
                warn!(tag = stop, "template block is missing its closing tag");
            }
        }

        nodes
    }

    fn control_tag(&mut self, inner: &str, stop: Option<&str>) -> Tag {
        if Some(inner) == stop {
            return Tag::Stop;
        }

        let mut words = inner.split_whitespace();
        match words.next() {
            Some("if") => {
                if !self.enter_block(inner) {
                    return Tag::Ignored;
                }
                let condition = words.next().unwrap_or_default().to_string();
                let children = self.block("endif");
                Tag::Node(RenderNode::If {
                    condition,
                    children,
                })
            }
            Some("for") => {
                if !self.enter_block(inner) {
                    return Tag::Ignored;
                }
                let item = words.next().unwrap_or_default().to_string();
                let list = match (words.next(), words.next()) {
                    (Some("in"), Some(list)) => list.to_string(),
                    _ => {
                        warn!(tag = inner, "malformed for tag, expected 'for ITEM in LIST'");
                        String::new()
                    }
                };
                let children = self.block("endfor");
                Tag::Node(RenderNode::For {
                    item,
                    list,
                    children,
                })
            }
            _ => {
                warn!(tag = inner, "ignoring unknown template tag");
                Tag::Ignored
            }
        }
    }
}
