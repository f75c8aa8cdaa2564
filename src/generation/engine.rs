//! Pluggable template engine.
//!
//! The pipeline only needs `compile` and `render`. [`HandlebarsEngine`] is the
//! default implementation.

use crate::generation::helpers::{HelperFn, HelperSet};
use handlebars::{
    Context, Handlebars, Helper, HelperDef, RenderContext, RenderError, ScopedJson, Template,
};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Engine-specific compiled form of a template. Cheap to clone.
#[derive(Clone)]
pub struct CompiledTemplate {
    name: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl CompiledTemplate {
    pub fn new<T: Any + Send + Sync>(name: impl Into<String>, inner: T) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Whether two handles share one compilation.
    pub fn same_compilation(&self, other: &CompiledTemplate) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

pub trait TemplateEngine: Send + Sync {
    fn compile(&self, name: &str, text: &str) -> Result<CompiledTemplate, String>;

    fn render(
        &self,
        template: &CompiledTemplate,
        helpers: &HelperSet,
        context: &Value,
    ) -> Result<String, String>;
}

/// Handlebars-backed engine. Output is not HTML-escaped.
#[derive(Debug, Default, Clone, Copy)]
pub struct HandlebarsEngine;

struct FnHelper(HelperFn);

impl HelperDef for FnHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'reg, 'rc>, RenderError> {
        let args: Vec<Value> = h.params().iter().map(|p| p.value().clone()).collect();
        let value = (self.0)(&args)
            .map_err(|msg| RenderError::new(format!("helper '{}': {}", h.name(), msg)))?;
        Ok(ScopedJson::Derived(value))
    }
}

impl TemplateEngine for HandlebarsEngine {
    fn compile(&self, name: &str, text: &str) -> Result<CompiledTemplate, String> {
        let template = Template::compile(text).map_err(|e| e.to_string())?;
        Ok(CompiledTemplate::new(name, template))
    }

    fn render(
        &self,
        template: &CompiledTemplate,
        helpers: &HelperSet,
        context: &Value,
    ) -> Result<String, String> {
        let compiled = template
            .downcast::<Template>()
            .ok_or_else(|| format!("'{}' was not compiled by handlebars", template.name()))?;
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        for (name, helper) in &helpers.helpers {
            registry.register_helper(name, Box::new(FnHelper(*helper)));
        }
        registry.register_template(template.name(), compiled.clone());
        registry
            .render(template.name(), context)
            .map_err(|e| e.to_string())
    }
}
