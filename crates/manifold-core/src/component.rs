//! Components: discovery, template evaluation and per-component operations
//!
//! A component is one manifest source file under the app's components
//! directory. Plain `.yaml`/`.yml`/`.json` sources are used as written;
//! sources ending in `.j2` are handed to a [`TemplateEvaluator`] together
//! with the component's current parameter values first.

use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::app::Materializer;
use crate::document::{Document, SourceFormat, SplitReport, split_documents, split_documents_lenient};
use crate::error::{CoreError, Result};
use crate::merge::{effective_overrides, materialize};
use crate::overlay::{OverlayStore, ParamOptions};
use crate::params::{ParamEntry, available_view, overrides_view};
use crate::path::ParamPath;
use crate::summary::{Summary, summarize_all};
use crate::tree::expand_paths;
use crate::whitelist::Whitelist;

const MANIFEST_EXTENSIONS: &[(&str, SourceFormat)] = &[
    (".yaml", SourceFormat::Yaml),
    (".yml", SourceFormat::Yaml),
    (".json", SourceFormat::Json),
];

/// Input handed to a template evaluator
#[derive(Debug, Clone, Copy)]
pub struct EvalRequest<'a> {
    pub app: &'a str,
    pub component: &'a str,
    /// File name of the source, for diagnostics
    pub source_name: &'a str,
    pub source: &'a str,
    /// Default-scope overrides of the component, expanded into nested mappings
    pub params: &'a JsonValue,
}

/// Turns a component template into manifest text
pub trait TemplateEvaluator {
    fn evaluate(&self, request: &EvalRequest<'_>) -> Result<String>;
}

/// Evaluator for plain sources: returns the source unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticEvaluator;

impl TemplateEvaluator for StaticEvaluator {
    fn evaluate(&self, request: &EvalRequest<'_>) -> Result<String> {
        Ok(request.source.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    name: String,
    path: PathBuf,
    format: SourceFormat,
    templated: bool,
}

impl Component {
    /// Component for a manifest file, or `None` if the file is not one
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let file_name = path.file_name()?.to_str()?;
        if file_name.starts_with('.') {
            return None;
        }

        let lower = file_name.to_ascii_lowercase();
        let (stem_len, templated) = match lower.strip_suffix(".j2") {
            Some(rest) => (rest.len(), true),
            None => (lower.len(), false),
        };
        let (ext, format) = MANIFEST_EXTENSIONS
            .iter()
            .find(|(ext, _)| lower[..stem_len].ends_with(ext))?;

        let name = &file_name[..stem_len - ext.len()];
        if name.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            format: *format,
            templated,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn is_templated(&self) -> bool {
        self.templated
    }

    fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }

    /// Parameter values handed to the template evaluator
    pub fn template_params(&self, m: &Materializer<'_>) -> JsonValue {
        let defaults = m
            .store
            .component(&self.name)
            .map(|c| &c.defaults)
            .into_iter()
            .flatten()
            .filter(|(path, _)| m.whitelist.contains(path));
        expand_paths(defaults)
    }

    /// Manifest text after template evaluation
    pub fn render(&self, m: &Materializer<'_>) -> Result<String> {
        let source = std::fs::read_to_string(&self.path)?;
        let params = self.template_params(m);
        let source_name = self.source_name();

        let evaluator: &dyn TemplateEvaluator = if self.templated {
            m.evaluator
        } else {
            &StaticEvaluator
        };
        evaluator.evaluate(&EvalRequest {
            app: m.app,
            component: &self.name,
            source_name: &source_name,
            source: &source,
            params: &params,
        })
    }

    /// Base documents, before overrides; fails on the first malformed document
    pub fn documents(&self, m: &Materializer<'_>) -> Result<Vec<Document>> {
        let text = self.render(m)?;
        split_documents(&self.source_name(), &text, self.format)
    }

    /// Final documents of every document that parses, plus the errors of
    /// those that do not
    pub fn objects_report(&self, m: &Materializer<'_>) -> Result<SplitReport> {
        let text = self.render(m)?;
        let report = split_documents_lenient(&self.source_name(), &text, self.format);
        Ok(SplitReport {
            documents: report
                .documents
                .into_iter()
                .map(|doc| self.apply(m, doc))
                .collect(),
            errors: report.errors,
        })
    }

    /// Final documents: base documents with overrides applied
    pub fn objects(&self, m: &Materializer<'_>) -> Result<Vec<Document>> {
        Ok(self
            .documents(m)?
            .into_iter()
            .map(|doc| self.apply(m, doc))
            .collect())
    }

    fn apply(&self, m: &Materializer<'_>, doc: Document) -> Document {
        let tree = materialize(
            &doc.tree,
            &self.name,
            doc.index,
            m.store.component(&self.name),
            m.whitelist,
            m.precedence,
        );
        Document { tree, ..doc }
    }

    /// One summary per final document
    pub fn summarize(&self, m: &Materializer<'_>) -> Result<Vec<Summary>> {
        summarize_all(&self.name, &self.objects(m)?)
    }

    /// Override rows in effect, optionally for a single document
    pub fn params(&self, m: &Materializer<'_>, index: Option<usize>) -> Result<Vec<ParamEntry>> {
        let Some(overrides) = m.store.component(&self.name) else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::new();
        for doc in self.selected(self.objects(m)?, index)? {
            let mut effective = effective_overrides(overrides, doc.index, m.precedence);
            effective.retain(|path, _| m.whitelist.contains(path));
            rows.extend(overrides_view(&self.name, doc.index, &doc.tree, &effective));
        }
        Ok(rows)
    }

    /// Every whitelisted path present in the base documents
    pub fn available_params(&self, m: &Materializer<'_>, index: Option<usize>) -> Result<Vec<ParamEntry>> {
        Ok(self
            .selected(self.documents(m)?, index)?
            .iter()
            .flat_map(|doc| available_view(&self.name, doc.index, &doc.tree, m.whitelist))
            .collect())
    }

    fn selected(&self, docs: Vec<Document>, index: Option<usize>) -> Result<Vec<Document>> {
        match index {
            None => Ok(docs),
            Some(i) => {
                let picked: Vec<Document> = docs.into_iter().filter(|d| d.index == i).collect();
                if picked.is_empty() {
                    Err(CoreError::not_found(format!("document {} of component '{}'", i, self.name)))
                } else {
                    Ok(picked)
                }
            }
        }
    }

    /// Set one override; the path must be whitelisted
    pub fn set_param(
        &self,
        store: &mut OverlayStore,
        whitelist: &Whitelist,
        path: &ParamPath,
        value: JsonValue,
        options: &ParamOptions,
    ) -> Result<()> {
        whitelist.check(path)?;
        store.set(&self.name, path, value, options)
    }

    /// Remove one override; `NotFound` if it is absent
    pub fn delete_param(&self, store: &mut OverlayStore, path: &ParamPath, options: &ParamOptions) -> Result<()> {
        store.delete(&self.name, path, options)
    }
}

/// Components found directly under `dir`, sorted by name
///
/// The overlay file is skipped. A missing directory has no components.
pub fn discover(dir: &Path, params_path: &Path) -> Result<Vec<Component>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut components = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| CoreError::Io(e.into()))?;
        if !entry.file_type().is_file() || entry.path() == params_path {
            continue;
        }
        match Component::from_path(entry.path()) {
            Some(component) => components.push(component),
            None => tracing::debug!(path = %entry.path().display(), "skipping non-manifest file"),
        }
    }

    components.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    if let Some(pair) = components.windows(2).find(|w| w[0].name == w[1].name) {
        return Err(CoreError::InvalidApp {
            message: format!(
                "component '{}' is defined by both {} and {}",
                pair[0].name,
                pair[0].path.display(),
                pair[1].path.display()
            ),
        });
    }

    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::OverridePrecedence;
    use serde_json::json;
    use tempfile::TempDir;

    const RBAC: &str = r#"apiVersion: rbac.authorization.k8s.io/v1beta1
kind: ClusterRole
metadata:
  name: cert-manager
---
apiVersion: rbac.authorization.k8s.io/v1beta1
kind: ClusterRoleBinding
metadata:
  name: cert-manager
"#;

    const CRD: &str = r#"{
  "apiVersion": "apiextensions.k8s.io/v1beta1",
  "kind": "CustomResourceDefinition",
  "metadata": {"name": "certificates.certmanager.k8s.io"},
  "spec": {"group": "certmanager.k8s.io", "version": "v1alpha1"}
}"#;

    /// Replaces `REPLICAS` with `params.spec.replicas`
    struct ReplicaEvaluator;

    impl TemplateEvaluator for ReplicaEvaluator {
        fn evaluate(&self, request: &EvalRequest<'_>) -> Result<String> {
            let replicas = request
                .params
                .pointer("/spec/replicas")
                .cloned()
                .unwrap_or(json!(1));
            Ok(request.source.replace("REPLICAS", &replicas.to_string()))
        }
    }

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new(params: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let components = dir.path().join("components");
            std::fs::create_dir_all(&components).unwrap();
            std::fs::write(components.join("rbac.yaml"), RBAC).unwrap();
            std::fs::write(components.join("certificate-crd.json"), CRD).unwrap();
            std::fs::write(
                components.join("web.yaml.j2"),
                "kind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: REPLICAS\n",
            )
            .unwrap();
            std::fs::write(components.join("params.yaml"), params).unwrap();
            std::fs::write(components.join("README.md"), "docs").unwrap();
            Self { dir }
        }

        fn components(&self) -> Vec<Component> {
            let dir = self.dir.path().join("components");
            discover(&dir, &dir.join("params.yaml")).unwrap()
        }

        fn component(&self, name: &str) -> Component {
            self.components().into_iter().find(|c| c.name() == name).unwrap()
        }
    }

    fn materializer<'a>(store: &'a OverlayStore, whitelist: &'a Whitelist) -> Materializer<'a> {
        Materializer {
            app: "demo",
            store,
            whitelist,
            precedence: OverridePrecedence::Index,
            evaluator: &ReplicaEvaluator,
        }
    }

    #[test]
    fn test_component_names() {
        let cases = [
            ("deployment.yaml", Some(("deployment", SourceFormat::Yaml, false))),
            ("svc.yml", Some(("svc", SourceFormat::Yaml, false))),
            ("crd.json", Some(("crd", SourceFormat::Json, false))),
            ("web.yaml.j2", Some(("web", SourceFormat::Yaml, true))),
            ("my.app.JSON.j2", Some(("my.app", SourceFormat::Json, true))),
            ("notes.txt", None),
            ("web.j2", None),
            (".hidden.yaml", None),
            (".yaml", None),
        ];
        for (file, expected) in cases {
            let got = Component::from_path(Path::new("components").join(file))
                .map(|c| (c.name().to_string(), c.format(), c.is_templated()));
            assert_eq!(
                got,
                expected.map(|(n, f, t)| (n.to_string(), f, t)),
                "{file}"
            );
        }
    }

    #[test]
    fn test_discover_sorted_without_overlay() {
        let fixture = Fixture::new("");
        let names: Vec<String> = fixture
            .components()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, ["certificate-crd", "rbac", "web"]);

        assert!(discover(Path::new("/nonexistent/components"), Path::new("p")).unwrap().is_empty());
    }

    #[test]
    fn test_discover_rejects_duplicates() {
        let fixture = Fixture::new("");
        std::fs::write(fixture.dir.path().join("components/rbac.json"), "{}").unwrap();
        let dir = fixture.dir.path().join("components");
        let err = discover(&dir, &dir.join("params.yaml")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidApp { .. }));
    }

    #[test]
    fn test_summaries() {
        let fixture = Fixture::new("");
        let store = OverlayStore::parse("params.yaml", "").unwrap();
        let whitelist = Whitelist::default();
        let m = materializer(&store, &whitelist);

        let rbac = fixture.component("rbac").summarize(&m).unwrap();
        let kinds: Vec<&str> = rbac.iter().map(|s| s.kind.as_str()).collect();
        assert_eq!(kinds, ["ClusterRole", "ClusterRoleBinding"]);
        assert!(rbac.iter().all(|s| s.name == "cert-manager"));

        let crd = fixture.component("certificate-crd").summarize(&m).unwrap();
        assert_eq!(crd[0].name, "certificates_certmanager_k8s_io");
        assert_eq!(crd[0].file_type, SourceFormat::Json);
    }

    #[test]
    fn test_index_scoped_params() {
        let fixture = Fixture::new("components:\n  rbac:\n    \"1\":\n      metadata.name: cert-manager2\n");
        let store = OverlayStore::load(fixture.dir.path().join("components/params.yaml")).unwrap();
        let whitelist = Whitelist::default();
        let m = materializer(&store, &whitelist);
        let rbac = fixture.component("rbac");

        let objects = rbac.objects(&m).unwrap();
        assert_eq!(objects[0].tree.get_str("metadata.name"), Some("cert-manager"));
        assert_eq!(objects[1].tree.get_str("metadata.name"), Some("cert-manager2"));

        let rows = rbac.params(&m, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[0].value_string(), "cert-manager2");

        assert!(rbac.params(&m, Some(0)).unwrap().is_empty());
        assert!(rbac.params(&m, Some(5)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_objects_report_keeps_parsed_siblings() {
        let fixture = Fixture::new("components:\n  mixed:\n    \"2\":\n      metadata.name: renamed\n");
        std::fs::write(
            fixture.dir.path().join("components/mixed.yaml"),
            "kind: A\nmetadata:\n  name: a\n---\nkind: [unclosed\n---\nkind: C\nmetadata:\n  name: c\n",
        )
        .unwrap();
        let store = OverlayStore::load(fixture.dir.path().join("components/params.yaml")).unwrap();
        let whitelist = Whitelist::default();
        let m = materializer(&store, &whitelist);
        let mixed = fixture.component("mixed");

        let report = mixed.objects_report(&m).unwrap();
        assert!(!report.is_clean());
        assert!(matches!(report.errors[0], CoreError::Parse { index: Some(1), .. }));
        let indexes: Vec<usize> = report.documents.iter().map(|d| d.index).collect();
        assert_eq!(indexes, [0, 2]);
        assert_eq!(report.documents[1].tree.get_str("metadata.name"), Some("renamed"));

        assert!(mixed.objects(&m).is_err());
    }

    #[test]
    fn test_templated_component_sees_params() {
        let fixture = Fixture::new("components:\n  web:\n    spec.replicas: 4\n");
        let store = OverlayStore::load(fixture.dir.path().join("components/params.yaml")).unwrap();
        let whitelist = Whitelist::default();
        let m = materializer(&store, &whitelist);
        let web = fixture.component("web");

        assert_eq!(m.store.component("web").unwrap().len(), 1);
        let docs = web.documents(&m).unwrap();
        assert_eq!(docs[0].tree.get(&"spec.replicas".parse().unwrap()), Some(&json!(4)));
        assert_eq!(web.template_params(&m), json!({"spec": {"replicas": 4}}));

        let available = web.available_params(&m, None).unwrap();
        let keys: Vec<String> = available.iter().map(|r| r.key.key()).collect();
        assert_eq!(keys, ["metadata.name", "spec.replicas"]);
    }

    #[test]
    fn test_set_and_delete_param_round_trip() {
        let fixture = Fixture::new("components: {}\n");
        let path = fixture.dir.path().join("components/params.yaml");
        let whitelist = Whitelist::default();
        let crd = fixture.component("certificate-crd");
        let version: ParamPath = "spec.version".parse().unwrap();

        let mut store = OverlayStore::load(&path).unwrap();
        crd.set_param(&mut store, &whitelist, &version, json!("v2"), &ParamOptions::default())
            .unwrap();
        store.persist().unwrap();

        let store = OverlayStore::load(&path).unwrap();
        let objects = crd.objects(&materializer(&store, &whitelist)).unwrap();
        assert_eq!(objects[0].tree.get_str("spec.version"), Some("v2"));

        let mut store = OverlayStore::load(&path).unwrap();
        crd.delete_param(&mut store, &version, &ParamOptions::default())
            .unwrap();
        store.persist().unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "components:\n  certificate-crd: {}\n"
        );

        let store = OverlayStore::load(&path).unwrap();
        let objects = crd.objects(&materializer(&store, &whitelist)).unwrap();
        assert_eq!(objects[0].tree.get_str("spec.version"), Some("v1alpha1"));

        let mut store = OverlayStore::load(&path).unwrap();
        let err = crd
            .set_param(&mut store, &whitelist, &"data.secret".parse().unwrap(), json!("x"), &ParamOptions::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidParam { .. }));
        assert!(!store.is_dirty());
    }
}
