//! CLI presentation: text and json formatters per command family.

mod generation;
mod profile;
mod session;
mod shared;

pub use generation::{format_generation_report, format_template_listing, TemplateListing};
pub use profile::{
    format_cluster_state, format_endpoint_types, format_endpoints, format_key_values,
};
pub use session::{format_options, format_packages, format_session_info, format_sessions};
pub use shared::{format_section_heading, to_json};
