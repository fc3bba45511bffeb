//! Overridable key paths and the whitelist-driven path extractor

use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, Result};
use crate::path::ParamPath;
use crate::tree::ObjectTree;

/// Paths that can be overridden out of the box
pub const DEFAULT_WHITELIST: &[&str] = &[
    "metadata.name",
    "metadata.namespace",
    "metadata.labels",
    "metadata.annotations",
    "spec.replicas",
    "spec.version",
    "spec.type",
    "spec.ports",
    "spec.selector",
    "spec.template.metadata.labels",
    "spec.template.spec.containers",
];

/// Anything that can answer "is this dotted key selected?"
pub trait KeyLookup {
    fn contains_key(&self, dotted: &str) -> bool;
}

impl KeyLookup for BTreeSet<String> {
    fn contains_key(&self, dotted: &str) -> bool {
        self.contains(dotted)
    }
}

impl<V> KeyLookup for BTreeMap<ParamPath, V> {
    fn contains_key(&self, dotted: &str) -> bool {
        self.keys().any(|p| p.key() == dotted)
    }
}

/// Fixed set of dot-joined key paths eligible for extraction and override
///
/// Entries never nest: no entry is an ancestor path of another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whitelist {
    paths: BTreeSet<ParamPath>,
    keys: BTreeSet<String>,
}

impl Default for Whitelist {
    fn default() -> Self {
        // The built-in table is known to be valid
        let paths = DEFAULT_WHITELIST
            .iter()
            .filter_map(|k| ParamPath::parse(k).ok())
            .collect::<Vec<_>>();
        Self::from_paths(paths)
    }
}

impl Whitelist {
    /// Build a whitelist from dotted keys, validating the no-nesting rule
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths = keys
            .into_iter()
            .map(|k| ParamPath::parse(k.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        validate_not_nested(&paths)?;
        Ok(Self::from_paths(paths))
    }

    /// Default whitelist plus `extra` entries
    pub fn with_extra<I, S>(extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys: Vec<String> = DEFAULT_WHITELIST.iter().map(|k| k.to_string()).collect();
        for key in extra {
            let key = key.as_ref().to_string();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Self::new(keys)
    }

    fn from_paths(paths: Vec<ParamPath>) -> Self {
        let keys = paths.iter().map(ParamPath::key).collect();
        Self {
            paths: paths.into_iter().collect(),
            keys,
        }
    }

    pub fn contains(&self, path: &ParamPath) -> bool {
        self.paths.contains(path)
    }

    /// Fail with `InvalidParam` unless `path` is whitelisted
    pub fn check(&self, path: &ParamPath) -> Result<()> {
        if self.contains(path) {
            Ok(())
        } else {
            Err(CoreError::InvalidParam {
                path: path.key(),
                message: format!(
                    "not an overridable path (allowed: {})",
                    self.keys.iter().cloned().collect::<Vec<_>>().join(", ")
                ),
            })
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamPath> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl KeyLookup for Whitelist {
    fn contains_key(&self, dotted: &str) -> bool {
        self.keys.contains(dotted)
    }
}

fn validate_not_nested(paths: &[ParamPath]) -> Result<()> {
    for a in paths {
        if let Some(b) = paths.iter().find(|b| a.is_ancestor_of(b)) {
            return Err(CoreError::InvalidParam {
                path: b.key(),
                message: format!("whitelist entry is nested under '{}'", a),
            });
        }
    }
    Ok(())
}

/// Flattened view of `tree` restricted to the keys `lookup` selects
///
/// Descends through mappings only; a selected key is emitted with its whole
/// value and not descended further. Sequences are opaque leaves. The result is
/// sorted by dotted key.
pub fn extract(tree: &ObjectTree, lookup: &impl KeyLookup) -> Vec<(ParamPath, JsonValue)> {
    let mut found = Vec::new();
    let mut prefix = Vec::new();
    visit(tree.inner(), lookup, &mut prefix, &mut found);
    found.sort_by(|a, b| a.0.cmp(&b.0));
    found
}

fn visit(
    value: &JsonValue,
    lookup: &impl KeyLookup,
    prefix: &mut Vec<String>,
    found: &mut Vec<(ParamPath, JsonValue)>,
) {
    let JsonValue::Object(map) = value else {
        return;
    };

    for (key, child) in map {
        prefix.push(key.clone());
        let dotted = prefix.join(".");

        if lookup.contains_key(&dotted) {
            // Keys containing '.' cannot be addressed, so they never match
            if let Ok(path) = ParamPath::new(prefix.iter().cloned()) {
                found.push((path, child.clone()));
            }
        } else if child.is_object() {
            visit(child, lookup, prefix, found);
        }

        prefix.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_whitelisted_leaves() {
        let tree = ObjectTree(json!({
            "metadata": {
                "name": "name",
                "labels": {"label1": "label1"}
            }
        }));
        let lookup: BTreeSet<String> = ["metadata.name".to_string(), "metadata.labels".to_string()]
            .into_iter()
            .collect();

        let got = extract(&tree, &lookup);

        assert_eq!(
            got,
            vec![
                (ParamPath::parse("metadata.labels").unwrap(), json!({"label1": "label1"})),
                (ParamPath::parse("metadata.name").unwrap(), json!("name")),
            ]
        );
    }

    #[test]
    fn test_extract_does_not_descend_sequences() {
        let tree = ObjectTree(json!({
            "spec": {
                "ports": [{"port": 80}],
                "template": {"spec": {"containers": [{"name": "web", "image": "nginx"}]}}
            }
        }));
        let got = extract(&tree, &Whitelist::default());
        let keys: Vec<String> = got.iter().map(|(p, _)| p.key()).collect();
        assert_eq!(keys, ["spec.ports", "spec.template.spec.containers"]);
        assert_eq!(got[0].1, json!([{"port": 80}]));
    }

    #[test]
    fn test_extract_is_deterministic() {
        let tree = ObjectTree::from_yaml(
            "spec:\n  version: v1\nmetadata:\n  namespace: ns\n  name: x\n  annotations: {a: b}\n",
        )
        .unwrap();
        let first = extract(&tree, &Whitelist::default());
        let second = extract(&tree, &Whitelist::default());
        assert_eq!(first, second);
        let keys: Vec<String> = first.iter().map(|(p, _)| p.key()).collect();
        assert_eq!(
            keys,
            ["metadata.annotations", "metadata.name", "metadata.namespace", "spec.version"]
        );
    }

    #[test]
    fn test_whitelist_rejects_nesting() {
        let err = Whitelist::new(["spec", "spec.version"]).unwrap_err();
        assert!(err.to_string().contains("nested"));
    }

    #[test]
    fn test_with_extra() {
        let whitelist = Whitelist::with_extra(["spec.strategy"]).unwrap();
        assert!(whitelist.contains(&ParamPath::parse("spec.strategy").unwrap()));
        assert!(whitelist.contains(&ParamPath::parse("metadata.name").unwrap()));
        assert_eq!(whitelist.len(), DEFAULT_WHITELIST.len() + 1);

        // Duplicates of defaults are ignored
        let same = Whitelist::with_extra(["metadata.name"]).unwrap();
        assert_eq!(same, Whitelist::default());
    }

    #[test]
    fn test_check() {
        let whitelist = Whitelist::default();
        assert!(whitelist.check(&ParamPath::parse("spec.version").unwrap()).is_ok());
        let err = whitelist.check(&ParamPath::parse("data.password").unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidParam { .. }));
    }

    #[test]
    fn test_default_whitelist_is_valid() {
        assert!(Whitelist::new(DEFAULT_WHITELIST).is_ok());
        assert_eq!(Whitelist::default().len(), DEFAULT_WHITELIST.len());
    }
}
