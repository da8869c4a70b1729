//
// Serializers that turn a fully-resolved `ConfigTree` back into text: JSON, HOCON, YAML, and the
// Java-properties format, grounded on pyhocon's `HOCONConverter` classmethods.
//

#[macro_use]
extern crate lazy_static;

use hocon_tree::{ConfigTree, Value};
use regex::Regex;

lazy_static! {
    static ref NEEDS_ESCAPE: Regex = Regex::new(r#"[\x00-\x1F"\\]"#).unwrap();
    static ref BARE_KEY: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Hocon,
    Yaml,
    Properties,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub indent: usize,
    pub compact: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { indent: 2, compact: false }
    }
}

pub fn render(tree: &ConfigTree, format: Format, opts: &RenderOptions) -> String {
    match format {
        Format::Json => to_json(tree, opts),
        Format::Hocon => to_hocon(tree, opts),
        Format::Yaml => to_yaml(tree, opts),
        Format::Properties => to_properties(tree),
    }
}

fn indent_str(opts: &RenderOptions, level: usize) -> String {
    if opts.compact {
        String::new()
    } else {
        " ".repeat(opts.indent * level)
    }
}

fn newline(opts: &RenderOptions) -> &'static str {
    if opts.compact {
        ""
    } else {
        "\n"
    }
}

pub fn to_json(tree: &ConfigTree, opts: &RenderOptions) -> String {
    let mut out = String::new();
    write_json_tree(tree, opts, 0, &mut out);
    out
}

fn write_json_value(value: &Value, opts: &RenderOptions, level: usize, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Real(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_json_string(s, out),
        Value::List(items) => write_json_list(items, opts, level, out),
        Value::Tree(t) => write_json_tree(t, opts, level, out),
        Value::Deferred(_) => out.push_str("null"),
    }
}

fn write_json_tree(tree: &ConfigTree, opts: &RenderOptions, level: usize, out: &mut String) {
    if tree.is_empty() {
        out.push_str("{}");
        return;
    }

    out.push('{');
    out.push_str(newline(opts));

    let count = tree.len();

    for (i, (key, value)) in tree.iter().enumerate() {
        out.push_str(&indent_str(opts, level + 1));
        write_json_string(key, out);
        out.push_str(": ");
        write_json_value(value, opts, level + 1, out);

        if i + 1 < count {
            out.push(',');
        }

        out.push_str(newline(opts));
    }

    out.push_str(&indent_str(opts, level));
    out.push('}');
}

fn write_json_list(items: &[Value], opts: &RenderOptions, level: usize, out: &mut String) {
    if items.is_empty() {
        out.push_str("[]");
        return;
    }

    out.push('[');
    out.push_str(newline(opts));

    for (i, item) in items.iter().enumerate() {
        out.push_str(&indent_str(opts, level + 1));
        write_json_value(item, opts, level + 1, out);

        if i + 1 < items.len() {
            out.push(',');
        }

        out.push_str(newline(opts));
    }

    out.push_str(&indent_str(opts, level));
    out.push(']');
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    out.push_str(&escape_string(s));
    out.push('"');
}

/// Escapes control characters, quotes and backslashes the way pyhocon's `__escape_string` does,
/// falling back to a `\uXXXX` sequence for anything else in the control-character range.
fn escape_string(s: &str) -> String {
    NEEDS_ESCAPE
        .replace_all(s, |caps: &regex::Captures| {
            let c = caps[0].chars().next().unwrap();

            match c {
                '"' => "\\\"".to_string(),
                '\\' => "\\\\".to_string(),
                '\n' => "\\n".to_string(),
                '\r' => "\\r".to_string(),
                '\t' => "\\t".to_string(),
                '\u{8}' => "\\b".to_string(),
                '\u{c}' => "\\f".to_string(),
                other => format!("\\u{:04x}", other as u32),
            }
        })
        .into_owned()
}

pub fn to_hocon(tree: &ConfigTree, opts: &RenderOptions) -> String {
    let mut out = String::new();
    write_hocon_tree(tree, opts, 0, true, &mut out);
    out
}

fn write_hocon_key(key: &str, out: &mut String) {
    if BARE_KEY.is_match(key) {
        out.push_str(key);
    } else {
        write_json_string(key, out);
    }
}

fn write_hocon_tree(tree: &ConfigTree, opts: &RenderOptions, level: usize, is_root: bool, out: &mut String) {
    if !is_root {
        out.push('{');
        out.push_str(newline(opts));
    }

    let inner_level = if is_root { level } else { level + 1 };

    for (key, value) in tree.iter() {
        out.push_str(&indent_str(opts, inner_level));
        write_hocon_key(key, out);

        if matches!(value, Value::Tree(_)) {
            out.push(' ');
        } else {
            out.push_str(" = ");
        }

        write_hocon_value(value, opts, inner_level, out);
        out.push_str(newline(opts));
    }

    if !is_root {
        out.push_str(&indent_str(opts, level));
        out.push('}');
    }
}

fn write_hocon_value(value: &Value, opts: &RenderOptions, level: usize, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Real(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_json_string(s, out),
        Value::List(items) => write_hocon_list(items, opts, level, out),
        Value::Tree(t) => write_hocon_tree(t, opts, level, false, out),
        Value::Deferred(_) => out.push_str("null"),
    }
}

fn write_hocon_list(items: &[Value], opts: &RenderOptions, level: usize, out: &mut String) {
    if items.is_empty() {
        out.push_str("[]");
        return;
    }

    out.push('[');
    out.push_str(newline(opts));

    for (i, item) in items.iter().enumerate() {
        out.push_str(&indent_str(opts, level + 1));
        write_hocon_value(item, opts, level + 1, out);

        if i + 1 < items.len() {
            out.push(',');
        }

        out.push_str(newline(opts));
    }

    out.push_str(&indent_str(opts, level));
    out.push(']');
}

pub fn to_yaml(tree: &ConfigTree, opts: &RenderOptions) -> String {
    let mut out = String::new();

    if tree.is_empty() {
        out.push_str("{}\n");
        return out;
    }

    write_yaml_tree(tree, opts, 0, &mut out);
    out
}

fn write_yaml_tree(tree: &ConfigTree, opts: &RenderOptions, level: usize, out: &mut String) {
    for (key, value) in tree.iter() {
        out.push_str(&indent_str(opts, level));
        out.push_str(key);
        out.push(':');

        write_yaml_value(value, opts, level, out);
    }
}

fn write_yaml_value(value: &Value, opts: &RenderOptions, level: usize, out: &mut String) {
    match value {
        Value::Tree(t) if !t.is_empty() => {
            out.push('\n');
            write_yaml_tree(t, opts, level + 1, out);
        }
        Value::Tree(_) => out.push_str(" {}\n"),
        Value::List(items) if !items.is_empty() => {
            out.push('\n');

            for item in items {
                out.push_str(&indent_str(opts, level));
                out.push_str("- ");
                write_yaml_scalar_or_inline(item, opts, level, out);
            }
        }
        Value::List(_) => out.push_str(" []\n"),
        other => {
            out.push(' ');
            write_yaml_scalar(other, out);
            out.push('\n');
        }
    }
}

fn write_yaml_scalar_or_inline(value: &Value, opts: &RenderOptions, level: usize, out: &mut String) {
    match value {
        Value::Tree(t) => {
            out.push('\n');
            write_yaml_tree(t, opts, level + 1, out);
        }
        other => {
            write_yaml_scalar(other, out);
            out.push('\n');
        }
    }
}

fn write_yaml_scalar(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Real(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            out.push('"');
            out.push_str(&escape_string(s));
            out.push('"');
        }
        Value::Deferred(_) => out.push_str("null"),
        Value::Tree(_) | Value::List(_) => unreachable!("handled by caller"),
    }
}

pub fn to_properties(tree: &ConfigTree) -> String {
    let mut lines = Vec::new();
    collect_properties(tree, &mut Vec::new(), &mut lines);
    lines.join("\n") + if lines.is_empty() { "" } else { "\n" }
}

fn collect_properties(tree: &ConfigTree, prefix: &mut Vec<String>, lines: &mut Vec<String>) {
    for (key, value) in tree.iter() {
        prefix.push(key.to_string());
        collect_properties_value(value, prefix, lines);
        prefix.pop();
    }
}

fn collect_properties_value(value: &Value, prefix: &mut Vec<String>, lines: &mut Vec<String>) {
    match value {
        Value::Tree(t) => collect_properties(t, prefix, lines),
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                prefix.push(i.to_string());
                collect_properties_value(item, prefix, lines);
                prefix.pop();
            }
        }
        Value::Deferred(_) => {}
        scalar => lines.push(format!("{} = {}", prefix.join("."), properties_scalar(scalar))),
    }
}

fn properties_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Real(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Tree(_) | Value::List(_) | Value::Deferred(_) => unreachable!("handled by caller"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hocon_tree::parse_key;
    use pretty_assertions::assert_eq;

    fn sample() -> ConfigTree {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("a"), Value::Int(1));
        tree.put_path(&parse_key("b.c"), Value::String("two".to_string()));
        tree.put_path(&parse_key("d"), Value::List(vec![Value::Int(1), Value::Int(2)]));
        tree
    }

    #[test]
    fn test_to_json() {
        let tree = sample();
        let opts = RenderOptions { indent: 2, compact: false };
        let json = to_json(&tree, &opts);

        assert_eq!(
            json,
            "{\n  \"a\": 1,\n  \"b\": {\n    \"c\": \"two\"\n  },\n  \"d\": [\n    1,\n    2\n  ]\n}"
        );
    }

    #[test]
    fn test_to_json_compact() {
        let tree = sample();
        let opts = RenderOptions { indent: 0, compact: true };
        let json = to_json(&tree, &opts);

        assert_eq!(json, r#"{"a": 1,"b": {"c": "two"},"d": [1,2]}"#);
    }

    #[test]
    fn test_to_properties() {
        let tree = sample();
        let props = to_properties(&tree);

        assert_eq!(props, "a = 1\nb.c = two\nd.0 = 1\nd.1 = 2\n");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("a\"b\\c\n"), r#"a\"b\\c\n"#);
    }

    #[test]
    fn test_to_hocon_bare_keys() {
        let tree = sample();
        let opts = RenderOptions::default();
        let hocon = to_hocon(&tree, &opts);

        assert!(hocon.contains("a = 1"));
        assert!(hocon.contains("b {"));
    }
}
