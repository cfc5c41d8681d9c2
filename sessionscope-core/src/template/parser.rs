//! Template parsing
//!
//! Splits template text into tags and literal runs, then builds a block
//! tree by recursive descent. Parsing never fails:
//!
//! - an unterminated `{{` and everything after it is literal text
//! - a closing tag that does not close the innermost open block is literal text
//! - a block left open runs to the end of the template
//! - a tag that is not a variable, `#each`, `#if`, `/each` or `/if` is literal text

use std::vec::IntoIter;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Each,
    If,
}

impl BlockKind {
    fn name(&self) -> &'static str {
        match self {
            BlockKind::Each => "each",
            BlockKind::If => "if",
        }
    }
}

/// A node of the parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Literal text, emitted as is
    Text(String),
    /// `{{path}}` or `{{path|filter}}`
    Var {
        path: String,
        filter: Option<String>,
    },
    /// `{{#each path}}...{{/each}}`
    Each { path: String, body: Vec<Node> },
    /// `{{#if path}}...{{/if}}`
    If { path: String, body: Vec<Node> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Var {
        path: String,
        filter: Option<String>,
    },
    Open {
        kind: BlockKind,
        path: String,
    },
    Close {
        kind: BlockKind,
        raw: String,
    },
}

/// Parse template text into a node tree.
pub fn parse(source: &str) -> Vec<Node> {
    let mut tokens = tokenize(source).into_iter();
    let nodes = parse_nodes(&mut tokens, None);
    merge_text(nodes)
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(len) = after_open.find(CLOSE) else {
            break;
        };

        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_string()));
        }

        let raw = &rest[start..start + OPEN.len() + len + CLOSE.len()];
        tokens.push(classify_tag(&after_open[..len], raw));
        rest = &after_open[len + CLOSE.len()..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }
    tokens
}

fn classify_tag(inner: &str, raw: &str) -> Token {
    let tag = inner.trim();

    if let Some(rest) = tag.strip_prefix('#') {
        return match block_open(rest) {
            Some((kind, path)) => Token::Open { kind, path },
            None => Token::Text(raw.to_string()),
        };
    }

    if let Some(rest) = tag.strip_prefix('/') {
        return match rest.trim() {
            "each" => Token::Close {
                kind: BlockKind::Each,
                raw: raw.to_string(),
            },
            "if" => Token::Close {
                kind: BlockKind::If,
                raw: raw.to_string(),
            },
            _ => Token::Text(raw.to_string()),
        };
    }

    let (path, filter) = match tag.split_once('|') {
        Some((path, filter)) => (path.trim(), Some(filter.trim())),
        None => (tag, None),
    };
    if path.is_empty() {
        return Token::Text(raw.to_string());
    }

    Token::Var {
        path: path.to_string(),
        filter: filter.filter(|f| !f.is_empty()).map(str::to_string),
    }
}

/// `each items` -> (Each, "items")
fn block_open(tag: &str) -> Option<(BlockKind, String)> {
    [BlockKind::Each, BlockKind::If].into_iter().find_map(|kind| {
        let rest = tag.strip_prefix(kind.name())?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        Some((kind, rest.trim().to_string()))
    })
}

fn parse_nodes(tokens: &mut IntoIter<Token>, closing: Option<BlockKind>) -> Vec<Node> {
    let mut nodes = Vec::new();

    while let Some(token) = tokens.next() {
        match token {
            Token::Text(text) => nodes.push(Node::Text(text)),
            Token::Var { path, filter } => nodes.push(Node::Var { path, filter }),
            Token::Open { kind, path } => {
                let body = parse_nodes(tokens, Some(kind));
                nodes.push(match kind {
                    BlockKind::Each => Node::Each { path, body },
                    BlockKind::If => Node::If { path, body },
                });
            }
            Token::Close { kind, raw } => {
                if closing == Some(kind) {
                    return nodes;
                }
                tracing::debug!(tag = %raw, "Stray closing tag kept as text");
                nodes.push(Node::Text(raw));
            }
        }
    }

    if let Some(kind) = closing {
        tracing::debug!(block = kind.name(), "Unclosed block runs to end of template");
    }
    nodes
}

/// Join adjacent text nodes, recursively.
fn merge_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let node = match node {
            Node::Each { path, body } => Node::Each {
                path,
                body: merge_text(body),
            },
            Node::If { path, body } => Node::If {
                path,
                body: merge_text(body),
            },
            other => other,
        };
        if let Node::Text(text) = &node {
            if let Some(Node::Text(prev)) = merged.last_mut() {
                prev.push_str(text);
                continue;
            }
        }
        merged.push(node);
    }
    merged
}
