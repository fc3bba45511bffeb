//! Splitting manifest sources into indexed documents
//!
//! A manifest source holds one JSON document or any number of YAML documents
//! separated by `---`. Each document becomes an [`ObjectTree`] tagged with its
//! zero-based position. Documents are parsed independently, so one malformed
//! document never poisons its siblings.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::tree::ObjectTree;

/// Encoding of a manifest source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Yaml,
    Json,
}

impl SourceFormat {
    /// Detect from a file name, looking through a trailing `.j2`
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let name = name.strip_suffix(".j2").unwrap_or(&name);

        if name.ends_with(".json") {
            SourceFormat::Json
        } else {
            SourceFormat::Yaml
        }
    }

    /// The `fileType` reported for documents of this format
    pub fn file_type(&self) -> &'static str {
        match self {
            SourceFormat::Yaml => "yaml",
            SourceFormat::Json => "json",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_type())
    }
}

/// One document of a manifest source
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub index: usize,
    pub format: SourceFormat,
    pub tree: ObjectTree,
}

/// Documents that parsed, plus the errors of those that did not
#[derive(Debug, Default)]
pub struct SplitReport {
    pub documents: Vec<Document>,
    pub errors: Vec<CoreError>,
}

impl SplitReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Split a source into documents, failing on the first malformed one
pub fn split_documents(source_name: &str, text: &str, format: SourceFormat) -> Result<Vec<Document>> {
    let report = split_documents_lenient(source_name, text, format);
    match report.errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(report.documents),
    }
}

/// Split a source into documents, collecting per-document errors
///
/// Empty documents (blank, comment-only or `null`) are skipped and do not
/// consume an index.
pub fn split_documents_lenient(source_name: &str, text: &str, format: SourceFormat) -> SplitReport {
    let mut report = SplitReport::default();

    match format {
        SourceFormat::Json => {
            if text.trim().is_empty() {
                return report;
            }
            match serde_json::from_str::<JsonValue>(text) {
                Ok(value) => push_document(&mut report, source_name, value, format),
                Err(e) => report
                    .errors
                    .push(CoreError::parse(source_name, Some(0), e.to_string())),
            }
        }
        SourceFormat::Yaml => {
            for chunk in yaml_chunks(text) {
                if is_blank_yaml(&chunk) {
                    continue;
                }
                let index = report.documents.len() + report.errors.len();
                match serde_yaml::from_str::<JsonValue>(&chunk) {
                    Ok(JsonValue::Null) => {}
                    Ok(value) => push_document(&mut report, source_name, value, format),
                    Err(e) => report
                        .errors
                        .push(CoreError::parse(source_name, Some(index), e.to_string())),
                }
            }
        }
    }

    tracing::debug!(
        source = source_name,
        documents = report.documents.len(),
        errors = report.errors.len(),
        "split manifest source"
    );

    report
}

fn push_document(report: &mut SplitReport, source_name: &str, value: JsonValue, format: SourceFormat) {
    let index = report.documents.len() + report.errors.len();
    if value.is_object() {
        report.documents.push(Document {
            index,
            format,
            tree: ObjectTree(value),
        });
    } else {
        report.errors.push(CoreError::parse(
            source_name,
            Some(index),
            "document is not an object",
        ));
    }
}

/// Cut a YAML stream at column-0 `---` and `...` markers
fn yaml_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut in_document = false;

    for line in text.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);

        if let Some(rest) = document_start(bare) {
            if in_document || !current.trim().is_empty() {
                chunks.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            in_document = true;
            if !rest.trim().is_empty() {
                current.push_str(rest.trim_start());
                current.push('\n');
            }
            continue;
        }

        if bare == "..." || bare.starts_with("... ") {
            chunks.push(std::mem::take(&mut current));
            in_document = false;
            continue;
        }

        // Directives only appear before a document start
        if !in_document && bare.starts_with('%') {
            continue;
        }

        current.push_str(line);
    }

    if in_document || !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

fn document_start(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("---")?;
    if rest.is_empty() || rest.starts_with([' ', '\t']) {
        Some(rest)
    } else {
        None
    }
}

fn is_blank_yaml(chunk: &str) -> bool {
    chunk.lines().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed.starts_with('#')
    })
}
