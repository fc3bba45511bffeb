//! Manifold Core - manifest objects with path-addressed parameter overrides
//!
//! This crate provides the building blocks used by the `manifold` CLI:
//! - `ObjectTree` / `ParamPath`: parsed documents and paths into them
//! - `split_documents`: multi-document YAML and JSON sources
//! - `Whitelist` / `extract`: the overridable paths of an object
//! - `OverlayStore`: the parameter overlay file, edited with minimal diffs
//! - `materialize`: base objects with overrides applied
//! - `summarize`: identity rows for listings
//! - `LoadedApp` / `Component`: app layout and per-component operations

pub mod app;
pub mod component;
pub mod context;
pub mod document;
pub mod error;
pub mod merge;
pub mod overlay;
pub mod params;
pub mod path;
pub mod summary;
pub mod tree;
pub mod whitelist;

pub use app::{AppConfig, LoadedApp, Materializer, OverridesConfig};
pub use component::{Component, EvalRequest, StaticEvaluator, TemplateEvaluator, discover};
pub use context::TemplateContext;
pub use document::{Document, SourceFormat, SplitReport, split_documents, split_documents_lenient};
pub use error::{CoreError, Result};
pub use merge::{OverridePrecedence, effective_overrides, materialize};
pub use overlay::{ComponentOverrides, OverlayStore, ParamOptions, StoreState, ValueStyle};
pub use params::{ParamEntry, available_view, overrides_view, parse_param_value};
pub use path::ParamPath;
pub use summary::{Summary, summarize, summarize_all};
pub use tree::ObjectTree;
pub use whitelist::{DEFAULT_WHITELIST, KeyLookup, Whitelist, extract};
