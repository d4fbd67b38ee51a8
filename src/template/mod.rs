//! Template language: `{{ name }}` interpolation plus `{% if %}` and
//! `{% for %}` blocks
//!
//! # Example
//!
//! ```
//! use sitescript::template::{render_str, RenderContext};
//!
//! let ctx = RenderContext::new().with_var("name", "Eve");
//! assert_eq!(render_str("Hello {{ name }}!", &ctx), "Hello Eve!");
//! ```

pub mod parser;
pub mod render;

pub use parser::{parse_template, TemplateParser, DEFAULT_MAX_NODES};
pub use render::{render, RenderContext};

use serde::Serialize;

/// Parsed template tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RenderNode {
    /// Literal text
    Text(String),
    /// `{{ name }}` or `{{ name.field }}`
    Var(String),
    /// `{% if condition %} ... {% endif %}`
    If {
        condition: String,
        children: Vec<RenderNode>,
    },
    /// `{% for item in list %} ... {% endfor %}`
    For {
        item: String,
        list: String,
        children: Vec<RenderNode>,
    },
}

/// Parse with the default node cap and render in one step.
pub fn render_str(source: &str, context: &RenderContext) -> String {
    render(&parse_template(source), context)
}
