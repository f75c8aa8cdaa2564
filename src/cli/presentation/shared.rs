//! Shared presentation helpers.

use crate::error::ApiError;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

/// Section heading in bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::ConfigError(format!("Cannot encode output: {}", e)))
}

pub(crate) fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(header);
    table
}

pub(crate) fn yes_no(value: bool) -> String {
    if value {
        format!("{}", "yes".green())
    } else {
        format!("{}", "no".dimmed())
    }
}

pub(crate) fn optional_hex(code: Option<u32>) -> String {
    code.map(crate::types::hex_code).unwrap_or_else(|| "-".to_string())
}
