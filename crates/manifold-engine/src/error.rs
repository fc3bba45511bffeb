//! Engine error types

use manifold_core::CoreError;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::suggestions::{extract_quoted_name, suggest_undefined_variable, suggest_unknown_filter};

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    SyntaxError,
    TypeError,
    InvalidOperation,
    Other,
}

/// Template error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(manifold::template::render))]
pub struct TemplateError {
    pub message: String,

    pub kind: TemplateErrorKind,

    /// Template source code
    #[source_code]
    pub src: NamedSource<String>,

    /// Line of the failing template, 1-based
    pub line: Option<usize>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    /// Suggestion for fixing the error
    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Convert a MiniJinja error, locating it in `template_source`
    pub fn from_minijinja(
        err: minijinja::Error,
        template_name: &str,
        template_source: &str,
        params: &serde_json::Value,
    ) -> Self {
        let kind = categorize(&err);
        let line = err.line();
        let detail = err.detail().map(str::to_string);

        let message = match (&detail, kind) {
            (Some(detail), _) => detail.clone(),
            (None, TemplateErrorKind::UndefinedVariable) => "undefined variable".to_string(),
            (None, _) => err.kind().to_string(),
        };

        let suggestion = match kind {
            TemplateErrorKind::UndefinedVariable => {
                let line_text = line.and_then(|l| template_source.lines().nth(l.saturating_sub(1)));
                line_text
                    .and_then(first_expression)
                    .and_then(|expr| suggest_undefined_variable(&expr, params))
            }
            TemplateErrorKind::UnknownFilter => detail
                .as_deref()
                .and_then(extract_quoted_name)
                .and_then(|name| suggest_unknown_filter(&name)),
            TemplateErrorKind::SyntaxError => Some(
                "Check bracket matching: `{{ }}` for expressions, `{% %}` for statements".to_string(),
            ),
            _ => None,
        };

        Self {
            message,
            kind,
            src: NamedSource::new(template_name, template_source.to_string()),
            line,
            span: line.and_then(|l| calculate_span(template_source, l)),
            suggestion,
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }

    /// One-paragraph description for reporting outside of miette
    pub fn describe(&self) -> String {
        let mut out = match self.line {
            Some(line) => format!("{} (line {})", self.message, line),
            None => self.message.clone(),
        };
        if let Some(suggestion) = &self.suggestion {
            out.push_str("; ");
            out.push_str(suggestion);
        }
        out
    }

    /// Convert into the core error for `component`
    pub fn into_core(self, component: &str) -> CoreError {
        CoreError::Template {
            component: component.to_string(),
            message: self.describe(),
        }
    }
}

fn categorize(err: &minijinja::Error) -> TemplateErrorKind {
    match err.kind() {
        minijinja::ErrorKind::UndefinedError => TemplateErrorKind::UndefinedVariable,
        minijinja::ErrorKind::UnknownFilter => TemplateErrorKind::UnknownFilter,
        minijinja::ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
        minijinja::ErrorKind::InvalidOperation => TemplateErrorKind::InvalidOperation,
        minijinja::ErrorKind::NonPrimitive | minijinja::ErrorKind::NonKey => TemplateErrorKind::TypeError,
        _ => TemplateErrorKind::Other,
    }
}

/// Text of the first `{{ ... }}` expression on a line, without filters
fn first_expression(line: &str) -> Option<String> {
    let start = line.find("{{")?;
    let end = line[start..].find("}}")?;
    let expr = line[start + 2..start + end].trim_matches(['-', ' ']);
    let expr = expr.split('|').next().unwrap_or(expr).trim();
    (!expr.is_empty()).then(|| expr.to_string())
}

/// Span covering line `line_num` (1-based)
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;
    for (i, line) in source.split_inclusive('\n').enumerate() {
        if i + 1 == line_num {
            let len = line.trim_end_matches(['\n', '\r']).len();
            return Some(SourceSpan::new(offset.into(), len));
        }
        offset += line.len();
    }
    None
}

pub type Result<T> = std::result::Result<T, EngineError>;
