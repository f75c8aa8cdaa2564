//! Generation executor: runs every configured unit concurrently and joins
//! all outcomes. A failed unit is logged and reported; it never stops its
//! siblings and never fails the run.

use crate::error::GenerationError;
use crate::generation::engine::{CompiledTemplate, TemplateEngine};
use crate::generation::helpers::HelperRegistry;
use crate::generation::options::{GenerationConfig, UnitOptions};
use crate::generation::output::OutputSink;
use crate::generation::plan::{TemplateId, UnitPlan};
use crate::generation::rows::{group_rows, Snapshot};
use crate::generation::templates::{resolve_templates, TemplateCache};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, info};

/// Result of one unit.
#[derive(Debug)]
pub struct UnitOutcome {
    pub index: usize,
    pub filename: String,
    pub result: Result<Vec<PathBuf>, GenerationError>,
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a run, in descriptor order.
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub outcomes: Vec<UnitOutcome>,
}

impl GenerationReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn written_files(&self) -> Vec<&PathBuf> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flatten()
            .collect()
    }
}

/// Collaborators shared by every unit of a run.
pub struct GenerationExecutor<'a> {
    pub snapshot: Snapshot,
    pub config: &'a GenerationConfig,
    pub engine: &'a dyn TemplateEngine,
    pub cache: &'a TemplateCache,
    pub helpers: &'a HelperRegistry,
    pub output: &'a dyn OutputSink,
}

impl GenerationExecutor<'_> {
    pub async fn execute(&self, units: &[UnitOptions]) -> GenerationReport {
        let mut pending = FuturesUnordered::new();
        for (index, unit) in units.iter().enumerate() {
            info!(unit = index, filename = %unit.filename, "Generation unit started");
            pending.push(async move { (index, unit, self.run_unit(unit).await) });
        }

        let mut outcomes = Vec::with_capacity(units.len());
        while let Some((index, unit, result)) = pending.next().await {
            match &result {
                Ok(files) => info!(
                    unit = index,
                    filename = %unit.filename,
                    files = files.len(),
                    "Generation unit completed"
                ),
                Err(err) => error!(
                    unit = index,
                    filename = %unit.filename,
                    error = %err,
                    "Generation unit failed"
                ),
            }
            outcomes.push(UnitOutcome {
                index,
                filename: unit.filename.clone(),
                result,
            });
        }
        outcomes.sort_by_key(|o| o.index);
        GenerationReport { outcomes }
    }

    async fn run_unit(&self, unit: &UnitOptions) -> Result<Vec<PathBuf>, GenerationError> {
        let plan = UnitPlan::from_options(unit)?;

        let directory = self.config.unit_template_directory(unit);
        let resolved = resolve_templates(&directory, &plan.templates).await?;

        let mut compiled: HashMap<TemplateId, CompiledTemplate> = HashMap::new();
        for (id, path) in resolved {
            let template = self.cache.get_or_compile(self.engine, &path).await?;
            compiled.insert(id, template);
        }

        let mut rows = self.snapshot.rows(&plan.row_types)?;
        group_rows(&mut rows, &plan.groupings);

        let helpers = self.helpers.resolve(&plan.helper_api)?;

        let mut base = Map::new();
        base.insert("filename".into(), Value::from(plan.filename.clone()));
        base.insert(
            "generationDirectory".into(),
            Value::from(self.output.directory().display().to_string()),
        );
        base.insert("helperApi".into(), Value::from(plan.helper_api.clone()));
        base.insert("sessionId".into(), json!(self.snapshot.session()));
        for (row_type, values) in &rows {
            base.insert(row_type.as_str().into(), Value::Array(values.clone()));
        }

        let mut rendered: Vec<(String, String)> = plan
            .outputs()
            .iter()
            .map(|name| (name.clone(), String::new()))
            .collect();
        for step in &plan.steps {
            let template = compiled.get(&step.template).ok_or_else(|| {
                GenerationError::TemplateResolution {
                    template: step.template.to_string(),
                    message: "template was not resolved".to_string(),
                }
            })?;
            let step_rows = rows
                .iter()
                .find(|(t, _)| *t == step.row_type)
                .map(|(_, v)| Value::Array(v.clone()))
                .unwrap_or_else(|| Value::Array(Vec::new()));
            let mut context = base.clone();
            context.insert("dbRowType".into(), Value::from(step.row_type.as_str()));
            context.insert("rows".into(), step_rows);

            let text = self
                .engine
                .render(template, &helpers, &Value::Object(context))
                .map_err(|message| GenerationError::Render {
                    template: step.template.to_string(),
                    message,
                })?;
            if let Some((_, buffer)) = rendered.iter_mut().find(|(name, _)| *name == step.output) {
                buffer.push_str(&text);
            }
        }

        let mut written = Vec::with_capacity(rendered.len());
        for (name, contents) in &rendered {
            written.push(self.output.write(name, contents).await?);
        }
        Ok(written)
    }
}
