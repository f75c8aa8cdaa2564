//! Template-driven code generation.
//!
//! A run reads the options descriptor and executes each configured unit:
//! resolve and compile its templates, fetch and enrich the rows it needs,
//! group them, bind helpers and the output directory, then render and write.
//! Units run concurrently and fail independently.

pub mod engine;
pub mod executor;
pub mod helpers;
pub mod options;
pub mod output;
pub mod plan;
pub mod rows;
pub mod run;
pub mod templates;

pub use engine::{CompiledTemplate, HandlebarsEngine, TemplateEngine};
pub use executor::{GenerationExecutor, GenerationReport, UnitOutcome};
pub use helpers::{HelperFn, HelperRegistry, HelperSet};
pub use options::{GenerationConfig, GenerationOptions, UnitOptions};
pub use output::{FsOutput, MemoryOutput, OutputSink};
pub use plan::{OrderedSet, RowType, TemplateId, UnitPlan};
pub use rows::Snapshot;
pub use run::{run_generation, run_generation_blocking, run_generation_with};
pub use templates::{register_template_packages, TemplateCache};
