//! Parameter rows for listing and editing

use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::path::ParamPath;
use crate::summary::index_as_string;
use crate::tree::ObjectTree;
use crate::whitelist::{Whitelist, extract};

/// One override or one extracted leaf
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamEntry {
    pub component: String,
    #[serde(serialize_with = "index_as_string")]
    pub index: usize,
    pub key: ParamPath,
    #[serde(serialize_with = "value_as_string")]
    pub value: JsonValue,
}

impl ParamEntry {
    /// Value as shown in listings: strings verbatim, anything else as compact JSON
    pub fn value_string(&self) -> String {
        display_value(&self.value)
    }
}

pub fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_as_string<S: Serializer>(value: &JsonValue, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&display_value(value))
}

/// Rows for the overrides in effect on one document, read back from its
/// materialized form
pub fn overrides_view(
    component: &str,
    index: usize,
    merged: &ObjectTree,
    overrides: &BTreeMap<ParamPath, JsonValue>,
) -> Vec<ParamEntry> {
    rows(component, index, extract(merged, overrides))
}

/// Rows for every whitelisted path present in `tree`
pub fn available_view(component: &str, index: usize, tree: &ObjectTree, whitelist: &Whitelist) -> Vec<ParamEntry> {
    rows(component, index, extract(tree, whitelist))
}

fn rows(component: &str, index: usize, found: Vec<(ParamPath, JsonValue)>) -> Vec<ParamEntry> {
    found
        .into_iter()
        .map(|(key, value)| ParamEntry {
            component: component.to_string(),
            index,
            key,
            value,
        })
        .collect()
}

/// Interpret a command-line value: booleans, null, numbers and JSON
/// collections are typed, anything else is a string
pub fn parse_param_value(raw: &str) -> JsonValue {
    match raw {
        "true" => JsonValue::Bool(true),
        "false" => JsonValue::Bool(false),
        "null" => JsonValue::Null,
        _ => {
            // A number only when it renders back unchanged
            if let Some(num) = serde_json::from_str::<serde_json::Number>(raw)
                .ok()
                .filter(|num| num.to_string() == raw)
            {
                JsonValue::Number(num)
            } else if raw.starts_with('[') || raw.starts_with('{') {
                serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
            } else {
                JsonValue::String(raw.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{OverridePrecedence, effective_overrides, materialize};
    use crate::overlay::OverlayStore;
    use serde_json::json;

    const DEPLOYMENT: &str = r#"apiVersion: apps/v1beta1
kind: Deployment
metadata:
  name: nginx-deployment
spec:
  replicas: 2
  template:
    metadata:
      labels:
        app: nginx
"#;

    #[test]
    fn test_overrides_view_reads_merged_values() {
        let store = OverlayStore::parse(
            "params.yaml",
            "components:\n  deployment:\n    metadata.labels: {\"label1\": \"label1\", \"label2\": \"label2\"}\n",
        )
        .unwrap();
        let base = ObjectTree::from_yaml(DEPLOYMENT).unwrap();
        let whitelist = Whitelist::default();
        let overrides = store.component("deployment");

        let merged = materialize(&base, "deployment", 0, overrides, &whitelist, OverridePrecedence::Index);
        let effective = effective_overrides(overrides.unwrap(), 0, OverridePrecedence::Index);
        let rows = overrides_view("deployment", 0, &merged, &effective);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].component, "deployment");
        assert_eq!(rows[0].index, 0);
        assert_eq!(rows[0].key.key(), "metadata.labels");
        assert_eq!(rows[0].value_string(), r#"{"label1":"label1","label2":"label2"}"#);

        insta::assert_json_snapshot!(rows, @r###"
        [
          {
            "component": "deployment",
            "index": "0",
            "key": "metadata.labels",
            "value": "{\"label1\":\"label1\",\"label2\":\"label2\"}"
          }
        ]
        "###);
    }

    #[test]
    fn test_available_view() {
        let tree = ObjectTree::from_yaml(DEPLOYMENT).unwrap();
        let rows = available_view("deployment", 0, &tree, &Whitelist::default());
        let keys: Vec<String> = rows.iter().map(|r| r.key.key()).collect();
        assert_eq!(keys, ["metadata.name", "spec.replicas", "spec.template.metadata.labels"]);
        assert_eq!(rows[1].value_string(), "2");
        assert_eq!(rows[0].value_string(), "nginx-deployment");
    }

    #[test]
    fn test_parse_param_value() {
        assert_eq!(parse_param_value("true"), json!(true));
        assert_eq!(parse_param_value("null"), json!(null));
        assert_eq!(parse_param_value("3"), json!(3));
        assert_eq!(parse_param_value("1.5"), json!(1.5));
        assert_eq!(parse_param_value("v2"), json!("v2"));
        assert_eq!(parse_param_value(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(parse_param_value("[1, 2]"), json!([1, 2]));
        assert_eq!(parse_param_value("{not json"), json!("{not json"));
        assert_eq!(parse_param_value("inf"), json!("inf"));
    }

    #[test]
    fn test_parse_param_value_keeps_text_exact() {
        assert_eq!(parse_param_value("-4"), json!(-4));
        assert_eq!(parse_param_value("18446744073709551615"), json!(u64::MAX));
        assert_eq!(parse_param_value("007"), json!("007"));
        assert_eq!(parse_param_value("1.50"), json!("1.50"));
        assert_eq!(parse_param_value("1e3"), json!("1e3"));
        assert_eq!(parse_param_value("-0"), json!("-0"));
        assert_eq!(parse_param_value(" 3"), json!(" 3"));
        assert_eq!(parse_param_value("99999999999999999999"), json!("99999999999999999999"));
    }
}
