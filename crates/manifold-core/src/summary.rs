//! Identity rows for listing objects

use serde::{Serialize, Serializer};

use crate::document::{Document, SourceFormat};
use crate::error::{CoreError, Result};

/// Compact identity of one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub component: String,
    #[serde(serialize_with = "index_as_string")]
    pub index: usize,
    pub file_type: SourceFormat,
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

/// Summarize one document of `component`
///
/// `kind` is required. A missing `apiVersion` is reported as empty; the name
/// comes from `metadata.name`, sanitized for JSON sources, and falls back to
/// `<component>-<index>` when absent.
pub fn summarize(component: &str, document: &Document) -> Result<Summary> {
    let tree = &document.tree;

    let kind = tree
        .get_str("kind")
        .filter(|k| !k.is_empty())
        .ok_or_else(|| CoreError::MalformedObject {
            component: component.to_string(),
            index: document.index,
            field: "kind".to_string(),
        })?;

    let name = match (tree.get_str("metadata.name"), document.format) {
        (Some(name), SourceFormat::Yaml) if !name.is_empty() => name.to_string(),
        (Some(name), SourceFormat::Json) if !name.is_empty() => sanitize(name),
        _ => sanitize(&format!("{}-{}", component, document.index)),
    };

    Ok(Summary {
        component: component.to_string(),
        index: document.index,
        file_type: document.format,
        api_version: tree.get_str("apiVersion").unwrap_or_default().to_string(),
        kind: kind.to_string(),
        name,
    })
}

/// One summary per document, in document order
pub fn summarize_all(component: &str, documents: &[Document]) -> Result<Vec<Summary>> {
    documents.iter().map(|doc| summarize(component, doc)).collect()
}

/// Replace everything but ASCII alphanumerics, `-` and `_` with `_`
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub(crate) fn index_as_string<S: Serializer>(index: &usize, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(index)
}
