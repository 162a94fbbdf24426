//! fieldgate request guard
//!
//! Applies resolved field sets to response payloads and request bodies,
//! and wires principal acquisition into the request pipeline.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod middleware;
pub mod route;
pub mod sanitizer;

pub use auth::{AuthError, Authenticator, RequestContext, StaticAuthenticator};
pub use middleware::RequestGuard;
pub use route::asset_from_route;
pub use sanitizer::{InputOptions, OutputOptions, Sanitizer};
