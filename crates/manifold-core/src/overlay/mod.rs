//! Parameter overlay store
//!
//! Holds, per component, the `path -> value` overrides of one overlay file:
//!
//! ```yaml
//! components:
//!   certificate-crd:
//!     spec.version: v2          # applies to every document of the component
//!   rbac:
//!     "1":                      # applies to document 1 only
//!       metadata.name: cert-manager2
//! ```
//!
//! The store keeps the original text. Serializing an unedited store returns
//! it byte for byte, and each edit rewrites only the span of the affected
//! entry (or inserts a new one in key order), leaving comments, ordering and
//! formatting elsewhere untouched.

mod render;
mod syntax;

use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::path::ParamPath;
use syntax::{NodeId, NodeKind, Syntax};

/// How a value should be written into the overlay text
///
/// A display hint only; the stored value is the same either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueStyle {
    /// Plain scalar when unambiguous, flow collection for sequences and mappings
    #[default]
    Auto,
    /// Always double-quote string values
    String,
}

/// Options for [`OverlayStore::set`] and [`OverlayStore::delete`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParamOptions {
    /// Document index the override is scoped to; `None` targets every document
    pub index: Option<usize>,
    pub style: ValueStyle,
}

impl ParamOptions {
    pub fn for_index(index: Option<usize>) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }
}

/// Overrides held for one component
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentOverrides {
    /// Index-less overrides, applied to every document
    pub defaults: BTreeMap<ParamPath, JsonValue>,
    /// Overrides scoped to a single document index
    pub indexed: BTreeMap<usize, BTreeMap<ParamPath, JsonValue>>,
}

impl ComponentOverrides {
    pub fn scope(&self, index: Option<usize>) -> Option<&BTreeMap<ParamPath, JsonValue>> {
        match index {
            None => Some(&self.defaults),
            Some(i) => self.indexed.get(&i),
        }
    }

    fn scope_mut(&mut self, index: Option<usize>) -> &mut BTreeMap<ParamPath, JsonValue> {
        match index {
            None => &mut self.defaults,
            Some(i) => self.indexed.entry(i).or_default(),
        }
    }

    /// Total number of entries across all scopes
    pub fn len(&self) -> usize {
        self.defaults.len() + self.indexed.values().map(BTreeMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Edit state of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Text matches what was loaded or last persisted
    Loaded,
    /// Edited since load; `persist` will write
    Dirty,
}

/// One overlay file: its text, an outline of that text, and the decoded overrides
#[derive(Debug, Clone)]
pub struct OverlayStore {
    source_name: String,
    path: Option<PathBuf>,
    loaded_digest: Option<String>,
    text: String,
    syntax: Syntax,
    components: BTreeMap<String, ComponentOverrides>,
    state: StoreState,
}

struct Splice {
    start: usize,
    end: usize,
    replacement: String,
}

struct Prepared {
    text: String,
    syntax: Syntax,
    components: BTreeMap<String, ComponentOverrides>,
}

impl OverlayStore {
    /// Parse overlay text that has no backing file
    pub fn parse(source_name: &str, text: &str) -> Result<Self> {
        let syntax = Syntax::parse(source_name, text)?;
        let components = decode(source_name, text)?;
        check_outline(source_name, &syntax, &components)?;

        Ok(Self {
            source_name: source_name.to_string(),
            path: None,
            loaded_digest: None,
            text: text.to_string(),
            syntax,
            components,
            state: StoreState::Loaded,
        })
    }

    /// Load an overlay file; a missing file is an empty store
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source_name = path.display().to_string();

        let (text, digest) = match std::fs::read(path) {
            Ok(bytes) => {
                let digest = sha256_hex(&bytes);
                let text = String::from_utf8(bytes).map_err(|e| {
                    CoreError::parse(&source_name, None, format!("not valid UTF-8: {}", e))
                })?;
                (text, Some(digest))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (String::new(), None),
            Err(e) => return Err(e.into()),
        };

        let mut store = Self::parse(&source_name, &text)?;
        store.path = Some(path.to_path_buf());
        store.loaded_digest = digest;
        Ok(store)
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == StoreState::Dirty
    }

    /// Current text of the store
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Serialized form; identical to the input when nothing was edited
    pub fn serialize(&self) -> String {
        self.text.clone()
    }

    pub fn components(&self) -> impl Iterator<Item = (&str, &ComponentOverrides)> {
        self.components.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn component(&self, name: &str) -> Option<&ComponentOverrides> {
        self.components.get(name)
    }

    /// Override value for `path`, scoped to `index` when given
    pub fn get(&self, component: &str, path: &ParamPath, index: Option<usize>) -> Result<&JsonValue> {
        self.components
            .get(component)
            .and_then(|c| c.scope(index))
            .and_then(|scope| scope.get(path))
            .ok_or_else(|| CoreError::not_found(describe(component, path, index)))
    }

    /// Insert or replace one override
    pub fn set(
        &mut self,
        component: &str,
        path: &ParamPath,
        value: JsonValue,
        options: &ParamOptions,
    ) -> Result<()> {
        let mut updated = self.components.get(component).cloned().unwrap_or_default();
        updated.scope_mut(options.index).insert(path.clone(), value.clone());

        let rendered = render::render_value(&value, options.style);
        let splice = self.plan_set(component, &updated, path, &rendered, options.index);
        let next = self.prepare(splice)?;

        let written = next
            .components
            .get(component)
            .and_then(|c| c.scope(options.index))
            .and_then(|scope| scope.get(path));
        if written != Some(&value) {
            return Err(CoreError::InvalidParam {
                path: path.key(),
                message: format!("value {} does not survive a round trip through YAML", value),
            });
        }
        self.commit(next);

        tracing::debug!(
            component,
            key = %path,
            index = ?options.index,
            "set parameter override"
        );
        Ok(())
    }

    /// Remove one override; `NotFound` if it is absent
    pub fn delete(&mut self, component: &str, path: &ParamPath, options: &ParamOptions) -> Result<()> {
        let index = options.index;
        let mut updated = self
            .components
            .get(component)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("component '{}' in {}", component, self.source_name)))?;

        let removed = match index {
            None => updated.defaults.remove(path).is_some(),
            Some(i) => {
                let removed = updated
                    .indexed
                    .get_mut(&i)
                    .is_some_and(|scope| scope.remove(path).is_some());
                if updated.indexed.get(&i).is_some_and(BTreeMap::is_empty) {
                    updated.indexed.remove(&i);
                }
                removed
            }
        };
        if !removed {
            return Err(CoreError::not_found(describe(component, path, index)));
        }

        let splice = self.plan_delete(component, &updated, path, index);
        let next = self.prepare(splice)?;
        self.commit(next);

        tracing::debug!(component, key = %path, index = ?index, "deleted parameter override");
        Ok(())
    }

    /// Write the text back to the backing file if it was edited
    ///
    /// Fails with `WriteConflict` when the file changed on disk since it was
    /// loaded. The new content is written to a temporary file in the same
    /// directory and renamed over the target, so a failure leaves the old
    /// file in place.
    pub fn persist(&mut self) -> Result<()> {
        if self.state == StoreState::Loaded {
            return Ok(());
        }

        let path = self.path.clone().ok_or_else(|| CoreError::WriteConflict {
            path: self.source_name.clone(),
            message: "store has no backing file".to_string(),
        })?;
        let conflict = |message: String| CoreError::WriteConflict {
            path: path.display().to_string(),
            message,
        };

        let (current, permissions) = match std::fs::read(&path) {
            Ok(bytes) => (
                Some(sha256_hex(&bytes)),
                std::fs::metadata(&path).ok().map(|m| m.permissions()),
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (None, None),
            Err(e) => return Err(conflict(e.to_string())),
        };
        if current != self.loaded_digest {
            return Err(conflict("file changed since it was loaded".to_string()));
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| conflict(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| conflict(e.to_string()))?;
        tmp.write_all(self.text.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| conflict(e.to_string()))?;
        if let Some(permissions) = permissions {
            std::fs::set_permissions(tmp.path(), permissions).map_err(|e| conflict(e.to_string()))?;
        }
        tmp.persist(&path).map_err(|e| conflict(e.error.to_string()))?;

        self.loaded_digest = Some(sha256_hex(self.text.as_bytes()));
        self.state = StoreState::Loaded;
        tracing::debug!(path = %path.display(), "persisted overlay");
        Ok(())
    }

    /// Apply a splice to a copy of the text and re-read it
    fn prepare(&self, splice: Splice) -> Result<Prepared> {
        let mut text = self.text.clone();
        let replacement = match line_break(&self.text) {
            "\n" => splice.replacement,
            eol => splice.replacement.replace('\n', eol),
        };
        text.replace_range(splice.start..splice.end, &replacement);

        let syntax = Syntax::parse(&self.source_name, &text)?;
        let components = decode(&self.source_name, &text)?;
        check_outline(&self.source_name, &syntax, &components)?;

        Ok(Prepared {
            text,
            syntax,
            components,
        })
    }

    fn commit(&mut self, next: Prepared) {
        self.text = next.text;
        self.syntax = next.syntax;
        self.components = next.components;
        self.state = StoreState::Dirty;
    }

    fn plan_set(
        &self,
        component: &str,
        updated: &ComponentOverrides,
        path: &ParamPath,
        rendered: &str,
        index: Option<usize>,
    ) -> Splice {
        let syn = &self.syntax;
        let step = syn.indent_step();
        let key = path.key();

        let Some(components) = syn.components() else {
            let block = format!("components:\n{}", render::render_component(component, updated, step, step));
            return self.append_at(syn.document_end(&self.text), block);
        };
        if syn.node(components).inline {
            return self.rewrite_components(components, Some((component, updated)));
        }

        let Some(comp) = syn.component(components, component) else {
            let indent = syn.child_indent(components);
            let block = render::render_component(component, updated, indent, step);
            let at = insert_position(syn, components, |n| n.kind == NodeKind::Component, component);
            return self.append_at(at, block);
        };
        if syn.node(comp).inline {
            return self.rewrite_container(comp, updated);
        }

        let scope = match index {
            None => comp,
            Some(i) => match syn.scope(comp, i) {
                Some(scope) => scope,
                None => {
                    let indent = syn.child_indent(comp);
                    let block = format!(
                        "{}{}:\n{}{}: {}\n",
                        " ".repeat(indent),
                        render::render_index(i),
                        " ".repeat(indent + step),
                        render::render_key(&key),
                        rendered
                    );
                    let at = scope_insert_position(syn, comp, i);
                    return self.append_at(at, block);
                }
            },
        };
        if syn.node(scope).inline {
            return self.rewrite_container(comp, updated);
        }

        match syn.entry(scope, &key) {
            Some(entry) => {
                let node = syn.node(entry);
                let mut end = syn.value_end(entry);
                // A trailing comment on a one-line value stays where it is
                if node.line == node.last_line {
                    let value = &self.text[node.value_start..end];
                    if let Some(hash) = syntax::comment_start(value) {
                        end = node.value_start + value[..hash].trim_end_matches([' ', '\t']).len();
                    }
                }
                Splice {
                    start: node.value_start,
                    end,
                    replacement: format!(" {}", rendered),
                }
            }
            None => {
                let indent = syn.child_indent(scope);
                let line = format!("{}{}: {}\n", " ".repeat(indent), render::render_key(&key), rendered);
                let at = insert_position(syn, scope, |n| n.kind == NodeKind::Entry, &key);
                self.append_at(at, line)
            }
        }
    }

    fn plan_delete(
        &self,
        component: &str,
        updated: &ComponentOverrides,
        path: &ParamPath,
        index: Option<usize>,
    ) -> Splice {
        let syn = &self.syntax;

        // Located during `check_outline`, so the nodes exist unless written inline
        let Some(components) = syn.components() else {
            return self.rewrite_everything(component, updated);
        };
        if syn.node(components).inline {
            return self.rewrite_components(components, Some((component, updated)));
        }
        let Some(comp) = syn.component(components, component) else {
            return self.rewrite_components(components, Some((component, updated)));
        };
        if syn.node(comp).inline || updated.is_empty() {
            return self.rewrite_container(comp, updated);
        }

        let scope = match index {
            None => comp,
            Some(i) => match syn.scope(comp, i) {
                Some(scope) => scope,
                None => return self.rewrite_container(comp, updated),
            },
        };
        if syn.node(scope).inline {
            return self.rewrite_container(comp, updated);
        }

        if index.is_some() && updated.scope(index).is_none() {
            return Splice {
                start: syn.block_start(scope),
                end: syn.block_end(scope),
                replacement: String::new(),
            };
        }

        match syn.entry(scope, &path.key()) {
            Some(entry) => Splice {
                start: syn.block_start(entry),
                end: syn.block_end(entry),
                replacement: String::new(),
            },
            None => self.rewrite_container(comp, updated),
        }
    }

    /// Replace a component's value span with a block rendering of `updated`
    fn rewrite_container(&self, node: NodeId, updated: &ComponentOverrides) -> Splice {
        let syn = &self.syntax;
        let indent = syn.node(node).indent + syn.indent_step();
        let body = render::render_component_body(updated, indent, syn.indent_step());
        Splice {
            start: syn.node(node).value_start,
            end: syn.value_end(node),
            replacement: block_value(&body),
        }
    }

    /// Re-render the whole `components` value, substituting one component
    fn rewrite_components(&self, components: NodeId, replace: Option<(&str, &ComponentOverrides)>) -> Splice {
        let syn = &self.syntax;
        let step = syn.indent_step();
        let indent = syn.node(components).indent + step;

        let mut all = self.components.clone();
        if let Some((name, overrides)) = replace {
            all.insert(name.to_string(), overrides.clone());
        }
        let body: String = all
            .iter()
            .map(|(name, overrides)| render::render_component(name, overrides, indent, step))
            .collect();

        Splice {
            start: syn.node(components).value_start,
            end: syn.value_end(components),
            replacement: block_value(&body),
        }
    }

    fn rewrite_everything(&self, component: &str, updated: &ComponentOverrides) -> Splice {
        let step = self.syntax.indent_step();
        let block = format!("components:\n{}", render::render_component(component, updated, step, step));
        self.append_at(self.syntax.document_end(&self.text), block)
    }

    /// Insert `block` (newline-terminated lines) at a line boundary
    fn append_at(&self, at: usize, block: String) -> Splice {
        let needs_newline = at > 0 && at == self.text.len() && !self.text.ends_with('\n');
        Splice {
            start: at,
            end: at,
            replacement: if needs_newline { format!("\n{}", block) } else { block },
        }
    }
}

/// Line terminator of the text's first line; `\n` when there is none
fn line_break(text: &str) -> &'static str {
    match text.find('\n') {
        Some(i) if text[..i].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

/// Value text following a container key: ` {}` when empty, else the block
fn block_value(body: &str) -> String {
    if body.is_empty() {
        " {}".to_string()
    } else {
        format!("\n{}", body.strip_suffix('\n').unwrap_or(body))
    }
}

/// Offset for a new child of `parent` so that children matching `same_kind`
/// stay sorted by key
fn insert_position(
    syn: &Syntax,
    parent: NodeId,
    same_kind: impl Fn(&syntax::Node) -> bool,
    key: &str,
) -> usize {
    let siblings: Vec<NodeId> = syn
        .children(parent)
        .filter(|&id| same_kind(syn.node(id)))
        .collect();

    if let Some(&next) = siblings.iter().find(|&&id| syn.node(id).key.as_str() > key) {
        return syn.leading_start(next);
    }
    match siblings.last() {
        Some(&last) => syn.block_end(last),
        None => syn.key_line_end(parent),
    }
}

/// Offset for a new index scope: after the component's default entries,
/// ordered by index among the other scopes
fn scope_insert_position(syn: &Syntax, comp: NodeId, index: usize) -> usize {
    let next = syn.children(comp).find(|&id| match syn.node(id).kind {
        NodeKind::Scope(i) => i > index,
        _ => false,
    });
    match (next, syn.node(comp).children.last()) {
        (Some(next), _) => syn.leading_start(next),
        (None, Some(&last)) => syn.block_end(last),
        (None, None) => syn.key_line_end(comp),
    }
}

fn describe(component: &str, path: &ParamPath, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("parameter '{}' for {}[{}]", path, component, i),
        None => format!("parameter '{}' for {}", path, component),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Decode the overrides with full YAML semantics
fn decode(source_name: &str, text: &str) -> Result<BTreeMap<String, ComponentOverrides>> {
    let bad = |message: String| CoreError::parse(source_name, None, message);

    let blank = text.lines().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed.starts_with('#')
    });
    if blank {
        return Ok(BTreeMap::new());
    }

    let root: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| bad(e.to_string()))?;
    let components = match root {
        serde_yaml::Value::Null => return Ok(BTreeMap::new()),
        serde_yaml::Value::Mapping(mut map) => map.remove("components"),
        _ => return Err(bad("top level must be a mapping".to_string())),
    };

    let mut decoded = BTreeMap::new();
    let components = match components {
        None | Some(serde_yaml::Value::Null) => return Ok(decoded),
        Some(serde_yaml::Value::Mapping(map)) => map,
        Some(_) => return Err(bad("'components' must be a mapping".to_string())),
    };

    for (name, body) in components {
        let name = key_string(&name).ok_or_else(|| bad("component names must be strings".to_string()))?;
        let mut overrides = ComponentOverrides::default();

        for (key, value) in mapping_entries(body, &name).map_err(bad)? {
            if is_index_key(&key) {
                let index: usize = key
                    .parse()
                    .map_err(|_| bad(format!("index '{}' of component '{}' is out of range", key, name)))?;
                let scope_name = format!("{}[{}]", name, index);
                let mut entries = BTreeMap::new();
                for (path, value) in mapping_entries(value, &scope_name).map_err(bad)? {
                    entries.insert(parse_path(source_name, &path)?, to_json(source_name, value)?);
                }
                if !entries.is_empty() {
                    overrides.indexed.insert(index, entries);
                }
            } else {
                overrides
                    .defaults
                    .insert(parse_path(source_name, &key)?, to_json(source_name, value)?);
            }
        }

        decoded.insert(name, overrides);
    }

    Ok(decoded)
}

fn mapping_entries(value: serde_yaml::Value, owner: &str) -> std::result::Result<Vec<(String, serde_yaml::Value)>, String> {
    match value {
        serde_yaml::Value::Null => Ok(Vec::new()),
        serde_yaml::Value::Mapping(map) => map
            .into_iter()
            .map(|(k, v)| {
                key_string(&k)
                    .map(|k| (k, v))
                    .ok_or_else(|| format!("non-scalar key under '{}'", owner))
            })
            .collect(),
        _ => Err(format!("'{}' must be a mapping of parameters", owner)),
    }
}

fn key_string(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_index_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

fn parse_path(source_name: &str, key: &str) -> Result<ParamPath> {
    ParamPath::parse(key)
        .map_err(|e| CoreError::parse(source_name, None, format!("bad parameter key '{}': {}", key, e)))
}

fn to_json(source_name: &str, value: serde_yaml::Value) -> Result<JsonValue> {
    serde_json::to_value(value).map_err(|e| CoreError::parse(source_name, None, e.to_string()))
}

/// Every decoded entry must be addressable in the outline, or sit inside a
/// container written inline (those are re-rendered whole on edit)
fn check_outline(
    source_name: &str,
    syntax: &Syntax,
    decoded: &BTreeMap<String, ComponentOverrides>,
) -> Result<()> {
    let unsupported = |what: String| {
        CoreError::parse(source_name, None, format!("unsupported overlay layout near {}", what))
    };

    if decoded.is_empty() {
        return Ok(());
    }
    let Some(components) = syntax.components() else {
        return Err(unsupported("'components'".to_string()));
    };
    if syntax.node(components).inline {
        return Ok(());
    }

    for (name, overrides) in decoded {
        let comp = syntax
            .component(components, name)
            .ok_or_else(|| unsupported(format!("component '{}'", name)))?;
        if syntax.node(comp).inline {
            continue;
        }
        for path in overrides.defaults.keys() {
            syntax
                .entry(comp, &path.key())
                .ok_or_else(|| unsupported(format!("'{}' of component '{}'", path, name)))?;
        }
        for (index, entries) in &overrides.indexed {
            let scope = syntax
                .scope(comp, *index)
                .ok_or_else(|| unsupported(format!("index {} of component '{}'", index, name)))?;
            if syntax.node(scope).inline {
                continue;
            }
            for path in entries.keys() {
                syntax
                    .entry(scope, &path.key())
                    .ok_or_else(|| unsupported(format!("'{}' of {}[{}]", path, name, index)))?;
            }
        }
    }

    Ok(())
}
