//! Template renderer

use super::RenderNode;
use crate::value::{Lists, Value};
use std::collections::HashMap;

/// Variables and server lists visible to a template
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub variables: HashMap<String, Value>,
    pub lists: Lists,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }

    pub fn with_list(mut self, name: &str, rows: Vec<crate::value::Row>) -> Self {
        self.lists.insert(name.to_string(), rows);
        self
    }
}

/// Render a node tree; unresolved names render as empty text.
pub fn render(nodes: &[RenderNode], context: &RenderContext) -> String {
    let mut scope = Scope {
        context,
        frames: Vec::new(),
    };
    let mut out = String::new();
    scope.render_into(nodes, &mut out);
    out
}

// Loop bindings live in frames above the base context.
struct Scope<'a> {
    context: &'a RenderContext,
    frames: Vec<HashMap<String, Value>>,
}

impl<'a> Scope<'a> {
    fn variable(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.context.variables.get(name))
    }

    /// Object field path on the root variable first, then the flat name.
    fn resolve(&self, name: &str) -> Option<&Value> {
        if let Some((root, path)) = name.split_once('.') {
            if let Some(value) = self.variable(root).and_then(|v| v.field_path(path)) {
                return Some(value);
            }
        }
        self.variable(name)
    }

    fn items(&self, list: &str) -> Vec<Value> {
        if let Some(items) = self.resolve(list).and_then(Value::as_list) {
            return items.to_vec();
        }
        self.context
            .lists
            .get(list)
            .map(|rows| rows.iter().map(Value::from_row).collect())
            .unwrap_or_default()
    }

    fn render_into(&mut self, nodes: &[RenderNode], out: &mut String) {
        for node in nodes {
            match node {
                RenderNode::Text(text) => out.push_str(text),
                RenderNode::Var(name) => {
                    if let Some(value) = self.resolve(name) {
                        match value.as_str() {
                            Some(text) => out.push_str(text),
                            None => out.push_str(&value.to_string()),
                        }
                    }
                }
                RenderNode::If {
                    condition,
                    children,
                } => {
                    if self.resolve(condition).is_some_and(Value::is_truthy) {
                        self.render_into(children, out);
                    }
                }
                RenderNode::For {
                    item,
                    list,
                    children,
                } => {
                    for value in self.items(list) {
                        self.frames.push(bind_item(item, value));
                        self.render_into(children, out);
                        self.frames.pop();
                    }
                }
            }
        }
    }
}

fn bind_item(item: &str, value: Value) -> HashMap<String, Value> {
    let mut frame = HashMap::new();
    match value {
        Value::Object(fields) => {
            for (key, field) in &fields {
                frame.insert(format!("{}.{}", item, key), field.clone());
            }
            let bound = match fields.get("value") {
                Some(canonical) => canonical.clone(),
                None => Value::Object(fields),
            };
            frame.insert(item.to_string(), bound);
        }
        other => {
            frame.insert(item.to_string(), other);
        }
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::super::render_str;
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(pairs: &[(&str, &str)]) -> crate::value::Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn json(text: &str) -> Value {
        Value::from(serde_json::from_str::<serde_json::Value>(text).unwrap())
    }

    #[test]
    fn test_single_variable() {
        let ctx = RenderContext::new().with_var("name", "Eve");
        assert_eq!(render_str("{{ name }}", &ctx), "Eve");
        assert_eq!(render_str("{{ name }}", &RenderContext::new()), "");
    }

    #[test]
    fn test_dotted_lookup_prefers_object_field() {
        let ctx = RenderContext::new()
            .with_var("user", json(r#"{"name": "Eve"}"#))
            .with_var("user.name", "flat")
            .with_var("page.title", "Home");
        assert_eq!(render_str("{{ user.name }}|{{ page.title }}", &ctx), "Eve|Home");
    }

    #[test]
    fn test_if_falsy_hides_for() {
        let source = "{% if a %}{% for b in items %}{{ b }}{% endfor %}{% endif %}";
        let items = json(r#"[{"value": "1"}, {"value": "2"}]"#);

        let hidden = RenderContext::new()
            .with_var("a", 0)
            .with_var("items", items.clone());
        assert_eq!(render_str(source, &hidden), "");

        let shown = RenderContext::new().with_var("a", true).with_var("items", items);
        assert_eq!(render_str(source, &shown), "12");
    }

    #[test]
    fn test_for_over_server_list_binds_fields() {
        let ctx = RenderContext::new().with_list(
            "saints",
            vec![
                row(&[("value", "Francis"), ("feast", "Oct 4")]),
                row(&[("value", "Clare"), ("feast", "Aug 11")]),
            ],
        );
        assert_eq!(
            render_str(
                "{% for s in saints %}{{ s }} ({{ s.feast }});{% endfor %}",
                &ctx
            ),
            "Francis (Oct 4);Clare (Aug 11);"
        );
    }

    #[test]
    fn test_for_object_without_value_field() {
        let ctx = RenderContext::new().with_var("people", json(r#"[{"name": "Ann"}]"#));
        assert_eq!(
            render_str("{% for p in people %}{{ p.name }}/{{ p }}{% endfor %}", &ctx),
            "Ann/[Object]"
        );
    }

    #[test]
    fn test_for_plain_items() {
        let ctx = RenderContext::new().with_var("nums", json("[1, 2, 3]"));
        assert_eq!(render_str("{% for n in nums %}{{ n }},{% endfor %}", &ctx), "1,2,3,");
    }

    #[test]
    fn test_variable_list_shadows_server_list() {
        let ctx = RenderContext::new()
            .with_var("xs", json(r#"["var"]"#))
            .with_list("xs", vec![row(&[("value", "server")])]);
        assert_eq!(render_str("{% for x in xs %}{{ x }}{% endfor %}", &ctx), "var");
    }

    #[test]
    fn test_missing_or_non_list_renders_empty() {
        let ctx = RenderContext::new().with_var("notalist", "abc");
        assert_eq!(
            render_str("[{% for x in notalist %}{{ x }}{% endfor %}{% for y in nothing %}y{% endfor %}]", &ctx),
            "[]"
        );
    }

    #[test]
    fn test_loop_binding_does_not_leak() {
        let ctx = RenderContext::new()
            .with_var("x", "outer")
            .with_var("xs", json(r#"["a", "b"]"#));
        assert_eq!(
            render_str("{% for x in xs %}{{ x }}{% endfor %}{{ x }}", &ctx),
            "abouter"
        );
    }
}
