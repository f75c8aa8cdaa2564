//! Typed queries over the [`Store`](crate::store::Store).
//!
//! Each submodule adds an `impl Store` block. Missing rows are not errors:
//! lookups return `None`, lists come back empty and deletes report 0.
//! Writes that reference a missing package, session, endpoint type or
//! catalog row fail with [`StorageError::ConstraintViolation`](crate::error::StorageError).

pub mod catalog;
pub mod config;
pub mod generic;
pub mod package;
pub mod session;

pub use catalog::{AtomicDef, AttributeDef, ClusterDef, CommandDef, DeviceTypeDef};
pub use config::{
    AttributeOverride, EndpointTypeAttribute, EndpointTypeCluster, EndpointTypeCommand,
    EndpointTypeSummary, EndpointUpdate, Seeding,
};
pub use session::SessionInfo;
