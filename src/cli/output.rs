//! CLI output: error mapping and command outcome.

use crate::error::ApiError;

/// Map domain errors to the message printed on stderr.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::SessionNotFound(id) => format!("No session with id {}", id),
        other => other.to_string(),
    }
}

/// Text to print and whether the command fully succeeded. A command can
/// print a report and still fail, as `generate` does when a unit fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }

    pub fn failed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: false,
        }
    }
}
