//! Tree interpreter
//!
//! Walks the parsed [`Node`] tree against a JSON value. Names resolve
//! against the innermost loop scope first, then enclosing loops, then the
//! root value. Nothing here fails; a path that does not resolve is null.

use super::parser::Node;
use crate::format::{format_number, format_percent};
use serde_json::Value;
use std::borrow::Cow;

/// One `#each` iteration.
struct Frame<'a> {
    key: Option<&'a str>,
    index: usize,
    item: &'a Value,
}

fn render_nodes<'a>(
    nodes: &[Node],
    root: &'a Value,
    scopes: &mut Vec<Frame<'a>>,
    out: &mut String,
) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var { path, filter } => {
                let value = resolve(path, root, scopes);
                out.push_str(&apply_filter(filter.as_deref(), value.as_deref()));
            }
            Node::If { path, body } => {
                if is_truthy(resolve(path, root, scopes).as_deref()) {
                    render_nodes(body, root, scopes, out);
                }
            }
            Node::Each { path, body } => {
                // Loops over computed values (@key, @index) have nothing to walk
                let Some(Cow::Borrowed(target)) = resolve(path, root, scopes) else {
                    continue;
                };
                match target {
                    Value::Array(items) => {
                        for (index, item) in items.iter().enumerate() {
                            scopes.push(Frame {
                                key: None,
                                index,
                                item,
                            });
                            render_nodes(body, root, scopes, out);
                            scopes.pop();
                        }
                    }
                    Value::Object(map) => {
                        for (index, (key, item)) in map.iter().enumerate() {
                            scopes.push(Frame {
                                key: Some(key.as_str()),
                                index,
                                item,
                            });
                            render_nodes(body, root, scopes, out);
                            scopes.pop();
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Start rendering with no loop scopes.
pub(super) fn render_root(nodes: &[Node], root: &Value) -> String {
    let mut out = String::new();
    render_nodes(nodes, root, &mut Vec::new(), &mut out);
    out
}

fn resolve<'a>(path: &str, root: &'a Value, scopes: &[Frame<'a>]) -> Option<Cow<'a, Value>> {
    let mut segments = path.split('.').map(str::trim);
    let head = segments.next().filter(|s| !s.is_empty())?;
    let innermost = scopes.last();

    match head {
        "@key" => {
            let key = innermost?.key?;
            segments
                .next()
                .is_none()
                .then(|| Cow::Owned(Value::String(key.to_string())))
        }
        "@index" => {
            let index = innermost?.index;
            segments
                .next()
                .is_none()
                .then(|| Cow::Owned(Value::from(index)))
        }
        "this" => {
            let base = innermost.map_or(root, |frame| frame.item);
            walk(base, segments).map(Cow::Borrowed)
        }
        _ => {
            let base = scopes
                .iter()
                .rev()
                .map(|frame| frame.item)
                .chain(std::iter::once(root))
                .find_map(|scope| scope.as_object()?.get(head))?;
            walk(base, segments).map(Cow::Borrowed)
        }
    }
}

fn walk<'a, 'p>(mut current: &'a Value, segments: impl Iterator<Item = &'p str>) -> Option<&'a Value> {
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Null, false, zero and empty strings/containers are falsy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// Text substituted for a value. Null renders as the empty string and
/// containers as compact JSON.
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

fn apply_filter(filter: Option<&str>, value: Option<&Value>) -> String {
    match filter {
        None => stringify(value),
        Some("number") => match value.and_then(Value::as_f64) {
            Some(n) => format_number(n),
            None => stringify(value),
        },
        Some("percent") => match value.and_then(Value::as_f64) {
            Some(n) => format_percent(n),
            None => stringify(value),
        },
        Some("length") => {
            let len = match value {
                Some(Value::Array(items)) => items.len(),
                Some(Value::Object(map)) => map.len(),
                _ => 0,
            };
            len.to_string()
        }
        Some(unknown) => {
            tracing::debug!(filter = unknown, "Unknown template filter ignored");
            stringify(value)
        }
    }
}
