//! Applying a component's overrides to its base objects

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::overlay::ComponentOverrides;
use crate::path::ParamPath;
use crate::tree::ObjectTree;
use crate::whitelist::Whitelist;

/// Which scope wins when a default and an index-scoped override target the same path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverridePrecedence {
    /// The index-scoped override wins (default)
    #[default]
    Index,
    /// The index-less override wins
    Default,
}

/// Overrides that apply to document `index`, after resolving scope precedence
pub fn effective_overrides(
    overrides: &ComponentOverrides,
    index: usize,
    precedence: OverridePrecedence,
) -> BTreeMap<ParamPath, JsonValue> {
    let empty = BTreeMap::new();
    let scoped = overrides.indexed.get(&index).unwrap_or(&empty);

    let (low, high) = match precedence {
        OverridePrecedence::Index => (&overrides.defaults, scoped),
        OverridePrecedence::Default => (scoped, &overrides.defaults),
    };

    let mut effective = low.clone();
    effective.extend(high.iter().map(|(k, v)| (k.clone(), v.clone())));
    effective
}

/// Produce the final object for document `index` of `component`
///
/// Every whitelisted override replaces the whole subtree at its path in a copy
/// of `base`; missing intermediate mappings are created. Overrides outside the
/// whitelist are skipped. `base` is left untouched.
pub fn materialize(
    base: &ObjectTree,
    component: &str,
    index: usize,
    overrides: Option<&ComponentOverrides>,
    whitelist: &Whitelist,
    precedence: OverridePrecedence,
) -> ObjectTree {
    let Some(overrides) = overrides else {
        return base.clone();
    };

    let mut merged = base.clone();
    for (path, value) in effective_overrides(overrides, index, precedence) {
        if !whitelist.contains(&path) {
            tracing::warn!(component, index, key = %path, "ignoring override outside the whitelist");
            continue;
        }
        merged = merged.with_value(&path, value);
    }

    tracing::debug!(component, index, "materialized object");
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{OverlayStore, ParamOptions};
    use serde_json::json;

    fn path(dotted: &str) -> ParamPath {
        ParamPath::parse(dotted).unwrap()
    }

    fn crd() -> ObjectTree {
        ObjectTree::from_yaml(
            r#"
apiVersion: apiextensions.k8s.io/v1beta1
kind: CustomResourceDefinition
metadata:
  name: certificates.certmanager.k8s.io
spec:
  group: certmanager.k8s.io
  version: v1alpha1
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_override_replaces_whole_subtree() {
        let base = ObjectTree(json!({
            "metadata": {"labels": {"app": "web", "tier": "front"}}
        }));
        let mut overrides = ComponentOverrides::default();
        overrides
            .defaults
            .insert(path("metadata.labels"), json!({"label1": "label1"}));

        let merged = materialize(
            &base,
            "deployment",
            0,
            Some(&overrides),
            &Whitelist::default(),
            OverridePrecedence::default(),
        );

        assert_eq!(merged.get(&path("metadata.labels")), Some(&json!({"label1": "label1"})));
        // Base is untouched
        assert_eq!(base.get_str("metadata.labels.app"), Some("web"));
    }

    #[test]
    fn test_missing_paths_are_created() {
        let base = ObjectTree(json!({"kind": "Service"}));
        let mut overrides = ComponentOverrides::default();
        overrides.defaults.insert(path("spec.type"), json!("NodePort"));

        let merged = materialize(
            &base,
            "svc",
            0,
            Some(&overrides),
            &Whitelist::default(),
            OverridePrecedence::Index,
        );
        assert_eq!(merged.0, json!({"kind": "Service", "spec": {"type": "NodePort"}}));
    }

    #[test]
    fn test_non_whitelisted_overrides_are_skipped() {
        let base = ObjectTree(json!({"data": {"password": "a"}}));
        let mut overrides = ComponentOverrides::default();
        overrides.defaults.insert(path("data.password"), json!("b"));

        let merged = materialize(
            &base,
            "secret",
            0,
            Some(&overrides),
            &Whitelist::default(),
            OverridePrecedence::Index,
        );
        assert_eq!(merged, base);
    }

    #[test]
    fn test_scope_precedence() {
        let mut overrides = ComponentOverrides::default();
        overrides.defaults.insert(path("metadata.name"), json!("everyone"));
        overrides.defaults.insert(path("spec.replicas"), json!(2));
        overrides
            .indexed
            .entry(1)
            .or_default()
            .insert(path("metadata.name"), json!("second"));

        let index_wins = effective_overrides(&overrides, 1, OverridePrecedence::Index);
        assert_eq!(index_wins[&path("metadata.name")], json!("second"));
        assert_eq!(index_wins[&path("spec.replicas")], json!(2));

        let default_wins = effective_overrides(&overrides, 1, OverridePrecedence::Default);
        assert_eq!(default_wins[&path("metadata.name")], json!("everyone"));

        // Other documents only see the defaults
        let other = effective_overrides(&overrides, 0, OverridePrecedence::Index);
        assert_eq!(other[&path("metadata.name")], json!("everyone"));
    }

    #[test]
    fn test_set_then_delete_reverts_to_base() {
        let base = crd();
        let whitelist = Whitelist::default();
        let mut store = OverlayStore::parse("params.yaml", "components:\n  deployment: {}\n").unwrap();
        let version = path("spec.version");

        store
            .set("certificate-crd", &version, json!("v2"), &ParamOptions::default())
            .unwrap();
        let merged = materialize(
            &base,
            "certificate-crd",
            0,
            store.component("certificate-crd"),
            &whitelist,
            OverridePrecedence::Index,
        );
        assert_eq!(merged.get_str("spec.version"), Some("v2"));
        assert_eq!(merged.get_str("spec.group"), Some("certmanager.k8s.io"));

        store
            .delete("certificate-crd", &version, &ParamOptions::default())
            .unwrap();
        assert!(store.get("certificate-crd", &version, None).unwrap_err().is_not_found());
        let merged = materialize(
            &base,
            "certificate-crd",
            0,
            store.component("certificate-crd"),
            &whitelist,
            OverridePrecedence::Index,
        );
        assert_eq!(merged.get_str("spec.version"), Some("v1alpha1"));
        assert_eq!(merged, base);
    }
}
