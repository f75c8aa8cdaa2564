//! Package and session formatters.

use super::shared::{format_section_heading, table, to_json};
use crate::error::ApiError;
use crate::store::schema::{OptionRecord, PackageRecord, SessionRecord};
use crate::types::PackageId;
use chrono::{TimeZone, Utc};
use owo_colors::OwoColorize;

fn format_time(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn dirty_label(dirty: bool) -> String {
    if dirty {
        format!("{}", "modified".yellow())
    } else {
        format!("{}", "saved".green())
    }
}

pub fn format_packages(packages: &[PackageRecord], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(packages);
    }
    if packages.is_empty() {
        return Ok("No packages loaded.".to_string());
    }
    let mut t = table(vec!["Id", "Type", "Version", "CRC", "Path"]);
    for p in packages {
        t.add_row(vec![
            p.id.to_string(),
            p.package_type.to_string(),
            p.version.clone().unwrap_or_else(|| "-".to_string()),
            format!("{:08x}", p.crc),
            p.path.clone(),
        ]);
    }
    Ok(t.to_string())
}

pub fn format_options(package: PackageId, options: &[(String, Vec<OptionRecord>)]) -> String {
    if options.is_empty() {
        return format!("Package {} has no options.", package);
    }
    let mut out = String::new();
    for (category, values) in options {
        out.push_str(&format!("{}\n", format_section_heading(category)));
        for v in values {
            out.push_str(&format!("  {}\n", v.value));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

pub fn format_sessions(sessions: &[SessionRecord], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(sessions);
    }
    if sessions.is_empty() {
        return Ok("No sessions.".to_string());
    }
    let mut t = table(vec!["Id", "Key", "Window", "Created", "State"]);
    for s in sessions {
        t.add_row(vec![
            s.id.to_string(),
            s.session_key.clone(),
            s.window_id.map(|w| w.to_string()).unwrap_or_else(|| "-".to_string()),
            format_time(s.created_at_ms),
            dirty_label(s.dirty),
        ]);
    }
    Ok(t.to_string())
}

pub fn format_session_info(
    session: &SessionRecord,
    packages: &[PackageRecord],
    format: &str,
) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(&serde_json::json!({
            "session": session,
            "packages": packages,
        }));
    }
    let mut out = format!("{}\n", format_section_heading(&format!("Session {}", session.id)));
    out.push_str(&format!("  Key: {}\n", session.session_key));
    if let Some(window) = session.window_id {
        out.push_str(&format!("  Window: {}\n", window));
    }
    out.push_str(&format!("  Created: {}\n", format_time(session.created_at_ms)));
    out.push_str(&format!("  State: {}\n", dirty_label(session.dirty)));
    if !packages.is_empty() {
        out.push_str("  Packages:\n");
        for p in packages {
            out.push_str(&format!("    {} {} ({})\n", p.id, p.path, p.package_type));
        }
    }
    Ok(out.trim_end().to_string())
}
