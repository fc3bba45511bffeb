//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to parse {}: {message}", describe_source(.source_name, .index))]
    Parse {
        source_name: String,
        index: Option<usize>,
        message: String,
    },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Malformed object {component}[{index}]: missing required field '{field}'")]
    MalformedObject {
        component: String,
        index: usize,
        field: String,
    },

    #[error("Write conflict on {path}: {message}")]
    WriteConflict { path: String, message: String },

    #[error("Invalid parameter '{path}': {message}")]
    InvalidParam { path: String, message: String },

    #[error("Invalid app.yaml: {message}")]
    InvalidApp { message: String },

    #[error("Template evaluation failed for component '{component}': {message}")]
    Template { component: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn parse(
        source_name: impl Into<String>,
        index: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            index,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// True for `NotFound`, so callers can choose to swallow it
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn describe_source(source_name: &str, index: &Option<usize>) -> String {
    match index {
        Some(i) => format!("{} (document {})", source_name, i),
        None => source_name.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_document() {
        let err = CoreError::parse("rbac.yaml", Some(1), "bad indentation");
        assert_eq!(
            err.to_string(),
            "Failed to parse rbac.yaml (document 1): bad indentation"
        );

        let err = CoreError::parse("params.yaml", None, "oops");
        assert_eq!(err.to_string(), "Failed to parse params.yaml: oops");
    }

    #[test]
    fn test_is_not_found() {
        assert!(CoreError::not_found("component 'x'").is_not_found());
        assert!(!CoreError::parse("a", None, "b").is_not_found());
    }
}
