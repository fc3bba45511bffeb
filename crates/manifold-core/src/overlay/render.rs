//! Deterministic text for values and keys written into an overlay file

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::{ComponentOverrides, ValueStyle};

static PLAIN_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_./-]*$").expect("valid regex"));

const RESERVED_WORDS: &[&str] = &["true", "false", "null", "yes", "no", "on", "off", "y", "n"];

/// Inline (single-line) YAML for a value
pub(crate) fn render_value(value: &JsonValue, style: ValueStyle) -> String {
    match value {
        JsonValue::String(s) if style == ValueStyle::String => json_string(s),
        JsonValue::String(s) => plain_string(value).unwrap_or_else(|| json_string(s)),
        JsonValue::Array(_) | JsonValue::Object(_) => render_flow(value),
        other => other.to_string(),
    }
}

/// Key text, quoted only when a plain scalar would be ambiguous
pub(crate) fn render_key(key: &str) -> String {
    let lowered = key.to_ascii_lowercase();
    if PLAIN_KEY.is_match(key) && !RESERVED_WORDS.contains(&lowered.as_str()) {
        key.to_string()
    } else {
        json_string(key)
    }
}

pub(crate) fn render_index(index: usize) -> String {
    format!("\"{}\"", index)
}

/// Lines for the body of one component, each terminated by a newline
pub(crate) fn render_component_body(overrides: &ComponentOverrides, indent: usize, step: usize) -> String {
    let pad = " ".repeat(indent);
    let mut out = String::new();

    for (path, value) in &overrides.defaults {
        out.push_str(&format!(
            "{}{}: {}\n",
            pad,
            render_key(&path.key()),
            render_value(value, ValueStyle::Auto)
        ));
    }

    for (index, entries) in &overrides.indexed {
        if entries.is_empty() {
            continue;
        }
        out.push_str(&format!("{}{}:\n", pad, render_index(*index)));
        let inner = " ".repeat(indent + step);
        for (path, value) in entries {
            out.push_str(&format!(
                "{}{}: {}\n",
                inner,
                render_key(&path.key()),
                render_value(value, ValueStyle::Auto)
            ));
        }
    }

    out
}

/// `name:` followed by its body, or `name: {}` when it has no entries
pub(crate) fn render_component(name: &str, overrides: &ComponentOverrides, indent: usize, step: usize) -> String {
    let body = render_component_body(overrides, indent + step, step);
    if body.is_empty() {
        format!("{}{}: {{}}\n", " ".repeat(indent), render_key(name))
    } else {
        format!("{}{}:\n{}", " ".repeat(indent), render_key(name), body)
    }
}

fn render_flow(value: &JsonValue) -> String {
    match value {
        JsonValue::Object(map) => {
            let items: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", json_string(k), render_flow(v)))
                .collect();
            format!("{{{}}}", items.join(", "))
        }
        JsonValue::Array(items) => {
            let items: Vec<String> = items.iter().map(render_flow).collect();
            format!("[{}]", items.join(", "))
        }
        other => other.to_string(),
    }
}

fn json_string(s: &str) -> String {
    JsonValue::String(s.to_string()).to_string()
}

/// serde_yaml's rendering of a string, if it fits on one line and reads back unchanged
fn plain_string(value: &JsonValue) -> Option<String> {
    let yaml = serde_yaml::to_string(value).ok()?;
    let yaml = yaml.strip_prefix("---\n").unwrap_or(&yaml);
    let yaml = yaml.strip_suffix('\n').unwrap_or(yaml);
    if yaml.contains('\n') {
        return None;
    }
    let back: JsonValue = serde_yaml::from_str(yaml).ok()?;
    (back == *value).then(|| yaml.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ParamPath;
    use serde_json::json;

    #[test]
    fn test_render_scalars() {
        assert_eq!(render_value(&json!("v2"), ValueStyle::Auto), "v2");
        assert_eq!(render_value(&json!("v2"), ValueStyle::String), "\"v2\"");
        assert_eq!(render_value(&json!(3), ValueStyle::Auto), "3");
        assert_eq!(render_value(&json!(true), ValueStyle::Auto), "true");
        assert_eq!(render_value(&json!(null), ValueStyle::Auto), "null");
        // Style never changes a non-string value
        assert_eq!(render_value(&json!(3), ValueStyle::String), "3");
    }

    #[test]
    fn test_ambiguous_strings_read_back_as_strings() {
        for s in ["true", "3", "null", "", "a: b", "line1\nline2", " padded", "#x"] {
            let rendered = render_value(&json!(s), ValueStyle::Auto);
            assert!(!rendered.contains('\n'), "{rendered:?} spans lines");
            let back: JsonValue = serde_yaml::from_str(&format!("k: {rendered}")).unwrap();
            assert_eq!(back["k"], json!(s), "{s:?} rendered as {rendered:?}");
        }
    }

    #[test]
    fn test_render_flow() {
        let value = json!({"label1": "label1", "label2": "label2"});
        assert_eq!(
            render_value(&value, ValueStyle::Auto),
            r#"{"label1": "label1", "label2": "label2"}"#
        );
        assert_eq!(render_value(&json!([1, "a", {}]), ValueStyle::Auto), r#"[1, "a", {}]"#);

        let back: JsonValue = serde_yaml::from_str(&render_value(&value, ValueStyle::Auto)).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_render_key() {
        assert_eq!(render_key("spec.version"), "spec.version");
        assert_eq!(render_key("certificate-crd"), "certificate-crd");
        assert_eq!(render_key("yes"), "\"yes\"");
        assert_eq!(render_key("1abc"), "\"1abc\"");
        assert_eq!(render_key("has space"), "\"has space\"");
        assert_eq!(render_index(3), "\"3\"");
    }

    #[test]
    fn test_render_component() {
        let mut overrides = ComponentOverrides::default();
        overrides
            .defaults
            .insert(ParamPath::parse("spec.version").unwrap(), json!("v2"));
        overrides
            .indexed
            .entry(1)
            .or_default()
            .insert(ParamPath::parse("metadata.name").unwrap(), json!("x"));

        assert_eq!(
            render_component("crd", &overrides, 2, 2),
            "  crd:\n    spec.version: v2\n    \"1\":\n      metadata.name: x\n"
        );
        assert_eq!(
            render_component("crd", &ComponentOverrides::default(), 2, 2),
            "  crd: {}\n"
        );
    }
}
