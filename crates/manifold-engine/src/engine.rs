//! Template engine based on MiniJinja

use manifold_core::{EvalRequest, TemplateContext, TemplateEvaluator};
use minijinja::Environment;

use crate::error::{EngineError, Result, TemplateError};
use crate::filters;

/// Template engine builder
pub struct EngineBuilder {
    strict_mode: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self { strict_mode: true }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn build(self) -> Engine {
        Engine::new(self.strict_mode)
    }
}

/// The template engine
#[derive(Debug, Clone)]
pub struct Engine {
    strict_mode: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Engine {
    pub fn new(strict_mode: bool) -> Self {
        Self { strict_mode }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        if self.strict_mode {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Lenient);
        }
        env.set_keep_trailing_newline(true);

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("quote", filters::quote);
        env.add_filter("squote", filters::squote);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("indent", filters::indent);
        env.add_filter("required", filters::required);
        env.add_filter("sha256", filters::sha256);
        env.add_filter("trunc", filters::trunc);

        env
    }

    /// Render one template
    pub fn render_string(&self, template: &str, context: &TemplateContext, template_name: &str) -> Result<String> {
        let mut env = self.create_environment();
        let fail = |e: minijinja::Error| TemplateError::from_minijinja(e, template_name, template, &context.params);

        env.add_template_owned(template_name.to_string(), template.to_string())
            .map_err(fail)?;
        let tmpl = env.get_template(template_name).map_err(fail)?;

        let ctx = minijinja::context! {
            params => &context.params,
            component => &context.component,
            app => &context.app,
        };

        let rendered = tmpl.render(ctx).map_err(fail)?;
        tracing::debug!(template = template_name, bytes = rendered.len(), "rendered template");
        Ok(rendered)
    }
}

/// [`TemplateEvaluator`] for `.j2` component sources
#[derive(Debug, Clone, Default)]
pub struct JinjaEvaluator {
    engine: Engine,
}

impl JinjaEvaluator {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

impl TemplateEvaluator for JinjaEvaluator {
    fn evaluate(&self, request: &EvalRequest<'_>) -> manifold_core::Result<String> {
        let context = TemplateContext::from(request);
        self.engine
            .render_string(request.source, &context, request.source_name)
            .map_err(|e| match e {
                EngineError::Template(e) => e.into_core(request.component),
            })
    }
}
