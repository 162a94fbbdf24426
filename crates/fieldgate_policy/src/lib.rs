//! fieldgate policy engine
//!
//! Compiles declarative per-role field grants into an immutable registry,
//! resolves the fields a principal may see or write on an instance, and
//! projects instances down to those fields.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod lang;
pub mod matcher;
pub mod redact;
pub mod resolver;

pub use compiler::{AssetPolicy, Branch, PolicyCompiler, PolicyRegistry, RoleRule, RoleTable};
pub use lang::{AssetDeclaration, PolicyDocument};
pub use matcher::{Clause, Condition, Matcher, ValueSource};
pub use redact::project;
pub use resolver::{AssetInstance, Grant, PermissionResolver, Resolution};
