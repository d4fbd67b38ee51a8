//! Template rendering through the public API

use pretty_assertions::assert_eq;
use sitescript::template::{parse_template, render, render_str, RenderContext, TemplateParser};
use sitescript::value::{Row, Value};

fn json(text: &str) -> Value {
    Value::from(serde_json::from_str::<serde_json::Value>(text).unwrap())
}

fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_round_trip_single_variable() {
    let ctx = RenderContext::new().with_var("name", "Eve");
    assert_eq!(render_str("{{ name }}", &ctx), "Eve");
    assert_eq!(render_str("{{ name }}", &RenderContext::new()), "");
}

#[test]
fn test_text_only_is_unchanged() {
    let page = "<p>No tags here, just { braces } and % signs.</p>\n";
    assert_eq!(render_str(page, &RenderContext::new()), page);
}

#[test]
fn test_nested_if_for() {
    let source = "{% if a %}{% for b in items %}{{ b }}{% endfor %}{% endif %}";
    let items = json(r#"[{"value": "1"}, {"value": "2"}]"#);

    for falsy in [Value::Null, Value::Int(0), Value::from(""), Value::Bool(false)] {
        let ctx = RenderContext::new()
            .with_var("a", falsy)
            .with_var("items", items.clone());
        assert_eq!(render_str(source, &ctx), "");
    }

    let ctx = RenderContext::new()
        .with_var("a", "yes")
        .with_var("items", items);
    assert_eq!(render_str(source, &ctx), "12");
}

#[test]
fn test_table_from_server_rows() {
    let ctx = RenderContext::new()
        .with_var("title", "Feasts")
        .with_list(
            "saints",
            vec![
                row(&[("value", "Francis"), ("feast", "Oct 4")]),
                row(&[("value", "Clare"), ("feast", "Aug 11")]),
            ],
        );
    let source = "<h1>{{ title }}</h1>\n{% for s in saints %}<tr><td>{{ s }}</td><td>{{ s.feast }}</td></tr>\n{% endfor %}";
    assert_eq!(
        render_str(source, &ctx),
        "<h1>Feasts</h1>\n<tr><td>Francis</td><td>Oct 4</td></tr>\n<tr><td>Clare</td><td>Aug 11</td></tr>\n"
    );
}

#[test]
fn test_nested_loops() {
    let ctx = RenderContext::new()
        .with_var("rows", json("[1, 2]"))
        .with_var("cols", json(r#"["a", "b"]"#));
    assert_eq!(
        render_str(
            "{% for r in rows %}{% for c in cols %}{{ r }}{{ c }} {% endfor %}{% endfor %}",
            &ctx
        ),
        "1a 1b 2a 2b "
    );
}

#[test]
fn test_if_with_dotted_condition() {
    let ctx = RenderContext::new().with_var("user", json(r#"{"admin": true, "name": "Eve"}"#));
    assert_eq!(
        render_str("{% if user.admin %}admin:{{ user.name }}{% endif %}{% if user.guest %}guest{% endif %}", &ctx),
        "admin:Eve"
    );
}

#[test]
fn test_unterminated_tag_degrades_to_text() {
    let ctx = RenderContext::new().with_var("a", "A");
    assert_eq!(render_str("{{ a }} and {{ b", &ctx), "A and {{ b");
    assert_eq!(render_str("{% if a %}shown", &ctx), "shown");
}

#[test]
fn test_node_cap_truncates_output() {
    let source = "x{{ v }}".repeat(100);
    let nodes = TemplateParser::new(&source, 10).parse();
    let ctx = RenderContext::new().with_var("v", "y");
    assert_eq!(render(&nodes, &ctx), "xy".repeat(5));
}

#[test]
fn test_parse_template_is_deterministic() {
    let source = "{% for x in xs %}{% if x %}{{ x.name }}{% endif %}{% endfor %}";
    assert_eq!(parse_template(source), parse_template(source));
}
