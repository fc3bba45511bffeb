//! Object trees: one parsed manifest document

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::path::ParamPath;

/// A parsed structured document
///
/// Scalars, sequences and mappings map onto the JSON value model. Trees are
/// never edited in place: [`ObjectTree::with_value`] returns a new tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectTree(pub JsonValue);

impl ObjectTree {
    /// Parse a single YAML document
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Ok(Self(value))
    }

    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Value at `path`, if every segment resolves through a mapping
    pub fn get(&self, path: &ParamPath) -> Option<&JsonValue> {
        get_nested(&self.0, path.segments())
    }

    /// String value at a dotted path (`metadata.name`)
    pub fn get_str(&self, dotted: &str) -> Option<&str> {
        let parts: Vec<&str> = dotted.split('.').collect();
        get_nested(&self.0, &parts).and_then(JsonValue::as_str)
    }

    /// Copy of this tree with the subtree at `path` replaced by `value`
    ///
    /// Missing intermediate mappings are created; intermediate values that
    /// are not mappings are replaced by mappings.
    pub fn with_value(&self, path: &ParamPath, value: JsonValue) -> ObjectTree {
        let mut copy = self.0.clone();
        set_nested(&mut copy, path.segments(), value);
        ObjectTree(copy)
    }
}

/// Expand (path, value) pairs into a nested mapping
pub fn expand_paths<'a, I>(entries: I) -> JsonValue
where
    I: IntoIterator<Item = (&'a ParamPath, &'a JsonValue)>,
{
    let mut root = JsonValue::Object(serde_json::Map::new());
    for (path, value) in entries {
        set_nested(&mut root, path.segments(), value.clone());
    }
    root
}

fn set_nested<S: AsRef<str>>(value: &mut JsonValue, path: &[S], new_value: JsonValue) {
    let Some((first, rest)) = path.split_first() else {
        *value = new_value;
        return;
    };

    if !value.is_object() {
        *value = JsonValue::Object(serde_json::Map::new());
    }

    if let JsonValue::Object(map) = value {
        let entry = map
            .entry(first.as_ref().to_string())
            .or_insert(JsonValue::Null);
        set_nested(entry, rest, new_value);
    }
}

fn get_nested<'a, S: AsRef<str>>(value: &'a JsonValue, path: &[S]) -> Option<&'a JsonValue> {
    let Some((first, rest)) = path.split_first() else {
        return Some(value);
    };

    match value {
        JsonValue::Object(map) => map.get(first.as_ref()).and_then(|v| get_nested(v, rest)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> ParamPath {
        ParamPath::parse(s).unwrap()
    }

    #[test]
    fn test_get() {
        let tree = ObjectTree::from_yaml("metadata:\n  name: web\n  labels:\n    app: web\n").unwrap();
        assert_eq!(tree.get(&path("metadata.name")).unwrap(), "web");
        assert_eq!(tree.get(&path("metadata.labels")).unwrap(), &json!({"app": "web"}));
        assert!(tree.get(&path("metadata.name.x")).is_none());
        assert!(tree.get(&path("spec")).is_none());
        assert_eq!(tree.get_str("metadata.name"), Some("web"));
    }

    #[test]
    fn test_with_value_replaces_subtree() {
        let tree = ObjectTree(json!({"metadata": {"labels": {"a": "1", "b": "2"}}}));
        let updated = tree.with_value(&path("metadata.labels"), json!({"c": "3"}));

        assert_eq!(updated.get(&path("metadata.labels")).unwrap(), &json!({"c": "3"}));
        // Original untouched
        assert_eq!(tree.get(&path("metadata.labels.a")).unwrap(), "1");
    }

    #[test]
    fn test_with_value_creates_missing() {
        let tree = ObjectTree(json!({"kind": "Service"}));
        let updated = tree.with_value(&path("spec.version"), json!("v2"));
        assert_eq!(updated.0, json!({"kind": "Service", "spec": {"version": "v2"}}));
    }

    #[test]
    fn test_with_value_replaces_scalar_intermediate() {
        let tree = ObjectTree(json!({"spec": "oops"}));
        let updated = tree.with_value(&path("spec.version"), json!("v2"));
        assert_eq!(updated.0, json!({"spec": {"version": "v2"}}));
    }

    #[test]
    fn test_expand_paths() {
        let labels = path("metadata.labels");
        let name = path("metadata.name");
        let a = json!({"x": "y"});
        let b = json!("web");
        let expanded = expand_paths([(&labels, &a), (&name, &b)]);
        assert_eq!(expanded, json!({"metadata": {"labels": {"x": "y"}, "name": "web"}}));
    }
}
