//! fieldgate core types
//!
//! Errors, dotted-path addressing, field catalogs, actions and engine
//! configuration. Pure types and logic with no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod catalog;
pub mod config;
pub mod error;
pub mod path;

// Re-exports
pub use action::Action;
pub use catalog::{CatalogSource, FieldCatalog, FieldSet};
pub use config::{EmptyElementPolicy, EngineConfig};
pub use error::{CoreError, CoreResult};
pub use path::{get_nested, set_nested, DottedPath};
