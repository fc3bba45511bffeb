//! Manifold Engine - Jinja2 templating for component sources
//!
//! This crate provides a MiniJinja-based template engine with:
//! - Manifest-oriented filters (toyaml, quote, nindent, etc.)
//! - Error messages with source spans and "did you mean" hints
//! - `JinjaEvaluator`, the `TemplateEvaluator` used for `.j2` components

pub mod engine;
pub mod error;
pub mod filters;
pub mod suggestions;

pub use engine::{Engine, EngineBuilder, JinjaEvaluator};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
pub use suggestions::{AVAILABLE_FILTERS, CONTEXT_VARIABLES};
