//! Minimal template language for rendering reports
//!
//! ## Syntax
//!
//! | Form | Meaning |
//! |------|---------|
//! | `{{path}}` | Value at a dotted path, empty when missing or null |
//! | `{{path\|filter}}` | Value passed through `number`, `percent` or `length` |
//! | `{{#each path}}...{{/each}}` | Body once per element or entry |
//! | `{{#if path}}...{{/if}}` | Body when the value is truthy |
//!
//! Inside `#each`, `{{this}}` is the current element, `{{@key}}` the
//! current mapping key and `{{@index}}` the zero-based position. Fields of
//! a mapping element are reachable by name.
//!
//! ## Example
//!
//! ```
//! use sessionscope_core::template;
//! use serde_json::json;
//!
//! let out = template::render(
//!     "{{#each tools}}{{@key}}={{this}} {{/each}}",
//!     &json!({"tools": {"Bash": 2, "Read": 5}}),
//! );
//! assert_eq!(out, "Bash=2 Read=5 ");
//! ```

mod parser;
mod render;

pub use parser::{parse, BlockKind, Node};
pub use render::{is_truthy, stringify};

use crate::report::SessionReport;
use crate::Result;
use serde_json::Value;

/// The template compiled into the library, used when no template file is
/// configured.
pub const BUILTIN_TEMPLATE: &str = include_str!("../../templates/session-report.md");

/// A parsed template, reusable across renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parse template text. Malformed input degrades to literal text.
    pub fn parse(source: &str) -> Self {
        Self {
            nodes: parser::parse(source),
        }
    }

    /// The built-in report template.
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_TEMPLATE)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Render against any JSON value.
    pub fn render(&self, data: &Value) -> String {
        render::render_root(&self.nodes, data)
    }

    /// Render a session report.
    pub fn render_report(&self, report: &SessionReport) -> Result<String> {
        Ok(self.render(&report.to_value()?))
    }
}

/// Parse and render in one step.
pub fn render(template_text: &str, data: &Value) -> String {
    Template::parse(template_text).render(data)
}
