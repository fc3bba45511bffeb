//! CLI commands

pub mod component;
pub mod param;
pub mod show;

use manifold_core::{Component, LoadedApp, Materializer, OverlayStore};
use manifold_engine::{Engine, JinjaEvaluator};
use std::path::Path;

use crate::error::Result;

/// A loaded app together with its overlay and the template evaluator
pub struct Session {
    pub app: LoadedApp,
    pub store: OverlayStore,
    evaluator: JinjaEvaluator,
}

impl Session {
    pub fn open(root: &Path) -> Result<Self> {
        let app = LoadedApp::load(root)?;
        let store = app.open_overlay()?;
        tracing::debug!(
            app = app.name(),
            params = %app.params_path.display(),
            overrides = store.components().count(),
            "opened app"
        );

        Ok(Self {
            app,
            store,
            evaluator: JinjaEvaluator::new(Engine::builder().strict(true).build()),
        })
    }

    pub fn materializer(&self) -> Materializer<'_> {
        self.app.materializer(&self.store, &self.evaluator)
    }

    /// The named components in the order given, or every component when `names` is empty
    pub fn select(&self, names: &[String]) -> Result<Vec<Component>> {
        if names.is_empty() {
            return Ok(self.app.components()?);
        }
        names
            .iter()
            .map(|name| self.app.component(name).map_err(Into::into))
            .collect()
    }
}
