//! Generation report and template listing.

use super::shared::{format_section_heading, table, yes_no};
use crate::generation::GenerationReport;
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub fn format_generation_report(report: &GenerationReport) -> String {
    let mut out = format!("{}\n", format_section_heading("Generation"));
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(files) => {
                out.push_str(&format!("  {} {}\n", "ok".green(), outcome.filename));
                for file in files {
                    out.push_str(&format!("      {}\n", file.display()));
                }
            }
            Err(e) => {
                out.push_str(&format!("  {} {}: {}\n", "failed".red(), outcome.filename, e));
            }
        }
    }
    out.push_str(&format!(
        "\n{} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    ));
    out
}

/// One template file under the template directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateListing {
    pub path: PathBuf,
    /// Units (by output filename) that render it.
    pub units: Vec<String>,
}

pub fn format_template_listing(directory: &std::path::Path, rows: &[TemplateListing]) -> String {
    if rows.is_empty() {
        return format!("No templates under {}.", directory.display());
    }
    let mut t = table(vec!["Template", "Used", "Units"]);
    for row in rows {
        t.add_row(vec![
            row.path.display().to_string(),
            yes_no(!row.units.is_empty()),
            row.units.join(", "),
        ]);
    }
    format!("{}\n{}", format_section_heading(&directory.display().to_string()), t)
}
