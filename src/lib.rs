//! zclgen: device protocol profile store and template-driven code generator.
//!
//! A session holds a device configuration (endpoint types with their
//! cluster, attribute and command state, endpoints and key-values) in a
//! sled-backed relational store, layered over catalog packages loaded from
//! definition files. Every session write marks the session dirty. The
//! generation pipeline renders the configuration through templates named in
//! an options descriptor, one independent unit per output.

pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod importexport;
pub mod loader;
pub mod logging;
pub mod query;
pub mod store;
pub mod types;
