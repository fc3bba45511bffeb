//! Application definition (`app.yaml`) and loading

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::component::{Component, TemplateEvaluator, discover};
use crate::error::{CoreError, Result};
use crate::merge::OverridePrecedence;
use crate::overlay::OverlayStore;
use crate::whitelist::Whitelist;

pub const APP_FILE: &str = "app.yaml";
pub const API_VERSION: &str = "manifold/v1";

/// Contents of `app.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// API version (manifold/v1)
    pub api_version: String,

    /// Application name
    pub name: String,

    /// Directory holding component sources, relative to the app root
    #[serde(default = "default_components_dir")]
    pub components_dir: PathBuf,

    /// Overlay file, relative to the app root (default: `<componentsDir>/params.yaml`)
    #[serde(default)]
    pub params_file: Option<PathBuf>,

    /// Paths added to the built-in whitelist
    #[serde(default)]
    pub whitelist: Vec<String>,

    #[serde(default)]
    pub overrides: OverridesConfig,
}

/// Override merge settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverridesConfig {
    #[serde(default)]
    pub precedence: OverridePrecedence,
}

fn default_components_dir() -> PathBuf {
    PathBuf::from("components")
}

/// Loaded application with resolved paths
#[derive(Debug, Clone)]
pub struct LoadedApp {
    pub config: AppConfig,

    /// Root directory of the app
    pub root: PathBuf,

    pub components_dir: PathBuf,

    /// Overlay file path
    pub params_path: PathBuf,

    pub whitelist: Whitelist,
}

impl LoadedApp {
    /// Load an app from its root directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();

        if !root.is_dir() {
            return Err(CoreError::not_found(format!("app directory {}", root.display())));
        }

        let app_file = root.join(APP_FILE);
        if !app_file.exists() {
            return Err(CoreError::InvalidApp {
                message: format!("{} not found in {}", APP_FILE, root.display()),
            });
        }

        let content = std::fs::read_to_string(&app_file)?;
        let config: AppConfig = serde_yaml::from_str(&content).map_err(|e| CoreError::InvalidApp {
            message: e.to_string(),
        })?;

        if config.api_version != API_VERSION {
            return Err(CoreError::InvalidApp {
                message: format!(
                    "Unsupported API version: {}. Expected: {}",
                    config.api_version, API_VERSION
                ),
            });
        }

        let whitelist = Whitelist::with_extra(&config.whitelist).map_err(|e| CoreError::InvalidApp {
            message: format!("whitelist: {}", e),
        })?;

        let components_dir = root.join(&config.components_dir);
        let params_path = match &config.params_file {
            Some(file) => root.join(file),
            None => components_dir.join("params.yaml"),
        };

        tracing::debug!(
            app = %config.name,
            root = %root.display(),
            whitelist = whitelist.len(),
            "loaded app"
        );

        Ok(Self {
            config,
            root,
            components_dir,
            params_path,
            whitelist,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn precedence(&self) -> OverridePrecedence {
        self.config.overrides.precedence
    }

    /// Open the overlay store; a missing overlay file is an empty store
    pub fn open_overlay(&self) -> Result<OverlayStore> {
        OverlayStore::load(&self.params_path)
    }

    /// Components in name order
    pub fn components(&self) -> Result<Vec<Component>> {
        discover(&self.components_dir, &self.params_path)
    }

    /// Look up one component by name
    pub fn component(&self, name: &str) -> Result<Component> {
        let mut components = self.components()?;
        match components.iter().position(|c| c.name() == name) {
            Some(pos) => Ok(components.swap_remove(pos)),
            None => {
                let names: Vec<&str> = components.iter().map(Component::name).collect();
                Err(CoreError::not_found(match closest(name, &names) {
                    Some(hint) => format!("component '{}' (did you mean '{}'?)", name, hint),
                    None => format!("component '{}'", name),
                }))
            }
        }
    }

    /// Bundle the settings needed to produce objects for this app
    pub fn materializer<'a>(
        &'a self,
        store: &'a OverlayStore,
        evaluator: &'a dyn TemplateEvaluator,
    ) -> Materializer<'a> {
        Materializer {
            app: self.name(),
            store,
            whitelist: &self.whitelist,
            precedence: self.precedence(),
            evaluator,
        }
    }
}

/// Everything needed to turn a component source into final objects
#[derive(Clone, Copy)]
pub struct Materializer<'a> {
    pub app: &'a str,
    pub store: &'a OverlayStore,
    pub whitelist: &'a Whitelist,
    pub precedence: OverridePrecedence,
    pub evaluator: &'a dyn TemplateEvaluator,
}

fn closest<'a>(name: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, strsim::jaro_winkler(name, c)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_app(dir: &Path, app_yaml: &str) {
        std::fs::write(dir.join(APP_FILE), app_yaml).unwrap();
        std::fs::create_dir_all(dir.join("components")).unwrap();
        std::fs::write(dir.join("components/web.yaml"), "kind: Service\n").unwrap();
        std::fs::write(dir.join("components/worker.yaml"), "kind: Deployment\n").unwrap();
    }

    #[test]
    fn test_load_defaults() {
        let dir = TempDir::new().unwrap();
        write_app(dir.path(), "apiVersion: manifold/v1\nname: demo\n");

        let app = LoadedApp::load(dir.path()).unwrap();
        assert_eq!(app.name(), "demo");
        assert_eq!(app.components_dir, dir.path().join("components"));
        assert_eq!(app.params_path, dir.path().join("components/params.yaml"));
        assert_eq!(app.precedence(), OverridePrecedence::Index);
        assert_eq!(app.whitelist, Whitelist::default());
    }

    #[test]
    fn test_load_custom_settings() {
        let dir = TempDir::new().unwrap();
        write_app(
            dir.path(),
            r#"apiVersion: manifold/v1
name: demo
paramsFile: overrides.yaml
whitelist:
  - spec.strategy
overrides:
  precedence: default
"#,
        );

        let app = LoadedApp::load(dir.path()).unwrap();
        assert_eq!(app.params_path, dir.path().join("overrides.yaml"));
        assert_eq!(app.precedence(), OverridePrecedence::Default);
        assert!(app.whitelist.contains(&"spec.strategy".parse().unwrap()));
    }

    #[test]
    fn test_rejects_bad_app_files() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            LoadedApp::load(dir.path()).unwrap_err(),
            CoreError::InvalidApp { .. }
        ));

        write_app(dir.path(), "apiVersion: manifold/v2\nname: demo\n");
        let err = LoadedApp::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported API version"));

        write_app(dir.path(), "apiVersion: manifold/v1\nname: demo\nwhitelist: [spec.template]\n");
        let err = LoadedApp::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("nested"));

        assert!(LoadedApp::load(dir.path().join("missing")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_component_lookup_suggests() {
        let dir = TempDir::new().unwrap();
        write_app(dir.path(), "apiVersion: manifold/v1\nname: demo\n");
        let app = LoadedApp::load(dir.path()).unwrap();

        assert_eq!(app.component("web").unwrap().name(), "web");
        let err = app.component("wokrer").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("did you mean 'worker'"), "{err}");
    }

    #[test]
    fn test_open_missing_overlay() {
        let dir = TempDir::new().unwrap();
        write_app(dir.path(), "apiVersion: manifold/v1\nname: demo\n");
        let app = LoadedApp::load(dir.path()).unwrap();

        let store = app.open_overlay().unwrap();
        assert_eq!(store.components().count(), 0);
        assert_eq!(store.path(), Some(app.params_path.as_path()));
    }
}
