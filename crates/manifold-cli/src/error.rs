//! CLI error types with exit code handling
//!
//! Every command returns [`Result`]; `main` renders the error through miette
//! and exits with [`CliError::exit_code`].

use manifold_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Component, document or parameter lookup failed
    #[error("Not found: {message}")]
    #[diagnostic(code(manifold::cli::not_found))]
    NotFound {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Template rendering failed
    #[error("Template error: {message}")]
    #[diagnostic(code(manifold::cli::template))]
    Template {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A manifest, overlay or app.yaml could not be read as expected
    #[error("{message}")]
    #[diagnostic(code(manifold::cli::parse))]
    Parse {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The overlay file was modified by someone else
    #[error("{message}")]
    #[diagnostic(
        code(manifold::cli::write_conflict),
        help("Re-run the command to apply the change on top of the current file")
    )]
    WriteConflict { message: String },

    /// Rejected user input
    #[error("{message}")]
    #[diagnostic(code(manifold::cli::input))]
    Input {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("IO error: {message}")]
    #[diagnostic(code(manifold::cli::io))]
    Io { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(manifold::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Template { .. } => exit_codes::TEMPLATE_ERROR,
            CliError::Parse { .. } => exit_codes::PARSE_ERROR,
            CliError::WriteConflict { .. } => exit_codes::WRITE_CONFLICT,
            CliError::Input { .. } => exit_codes::ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create an input error with help text
    pub fn input_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::NotFound { .. } => CliError::NotFound {
                message: message.trim_start_matches("Not found: ").to_string(),
                help: Some("Run `manifold component list` or `manifold param list` to see what exists".to_string()),
            },
            CoreError::Template { message: detail, component } => CliError::Template {
                message: format!("component '{}': {}", component, detail),
                help: None,
            },
            CoreError::Parse { .. }
            | CoreError::MalformedObject { .. }
            | CoreError::YamlParse(_)
            | CoreError::JsonParse(_) => CliError::Parse { message, help: None },
            CoreError::InvalidApp { .. } => CliError::Parse {
                message,
                help: Some("An app root needs an app.yaml with `apiVersion: manifold/v1` and a `name`".to_string()),
            },
            CoreError::WriteConflict { .. } => CliError::WriteConflict { message },
            CoreError::InvalidParam { .. } => CliError::Input { message, help: None },
            CoreError::Io(_) => CliError::Io { message },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<miette::Report> for CliError {
    fn from(err: miette::Report) -> Self {
        CliError::Other {
            message: format!("{:?}", err),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
