//! Template evaluation context

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::component::EvalRequest;

/// Context available to component templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateContext {
    /// Component parameter values, expanded into nested mappings
    pub params: JsonValue,

    /// Component being evaluated
    pub component: ComponentInfo,

    /// Owning application
    pub app: AppInfo,
}

/// Component information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub name: String,

    /// Source file name
    pub file: String,
}

/// Application information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
}

impl From<&EvalRequest<'_>> for TemplateContext {
    fn from(request: &EvalRequest<'_>) -> Self {
        Self {
            params: request.params.clone(),
            component: ComponentInfo {
                name: request.component.to_string(),
                file: request.source_name.to_string(),
            },
            app: AppInfo {
                name: request.app.to_string(),
            },
        }
    }
}
