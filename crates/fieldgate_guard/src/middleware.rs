//! Request pipeline hooks.
//!
//! A web framework registers [`RequestGuard::guard_input`] before its handler
//! runs and [`RequestGuard::sanitize_output`] after the handler produced a
//! result, before serialization.

use crate::auth::{Authenticator, RequestContext};
use crate::route::asset_from_route;
use crate::sanitizer::{InputOptions, OutputOptions, Sanitizer};
use fieldgate_core::{CoreError, CoreResult, DottedPath};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Authenticates, then sanitizes, one request at a time
#[derive(Clone)]
pub struct RequestGuard {
    sanitizer: Arc<Sanitizer>,
    authenticator: Arc<dyn Authenticator>,
    asset: Option<String>,
    payload_path: Option<DottedPath>,
    role_attribute_path: Option<DottedPath>,
}

impl RequestGuard {
    /// Create a guard deriving the asset from the route
    #[must_use]
    pub fn new(sanitizer: Arc<Sanitizer>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            sanitizer,
            authenticator,
            asset: None,
            payload_path: None,
            role_attribute_path: None,
        }
    }

    /// Use a fixed asset name instead of the route convention
    #[must_use]
    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self
    }

    /// Sanitize only the value at `path` of outbound payloads
    #[must_use]
    pub fn with_payload_path(mut self, path: &str) -> Self {
        self.payload_path = Some(DottedPath::parse(path));
        self
    }

    /// Read the role from `path` in the principal
    #[must_use]
    pub fn with_role_attribute_path(mut self, path: &str) -> Self {
        self.role_attribute_path = Some(DottedPath::parse(path));
        self
    }

    /// Pre-handler hook: reduce the body to the fields the caller may write.
    ///
    /// Non-object bodies pass through without authenticating.
    ///
    /// # Errors
    ///
    /// Returns the authenticator's error unchanged, or any resolution error
    pub async fn guard_input(&self, request: &RequestContext, body: Value) -> CoreResult<Value> {
        if !body.is_object() {
            return Ok(body);
        }
        let asset = self.asset_for(request)?;
        let principal = self.principal(request).await?;

        let options = InputOptions {
            asset,
            action: request.method.clone(),
            role_attribute_path: self.role_attribute_path.clone(),
        };
        self.sanitizer.guard_input(&principal, body, &options)
    }

    /// Pre-serialization hook: reduce the handler result to readable fields
    ///
    /// # Errors
    ///
    /// Returns the authenticator's error unchanged, or any resolution or
    /// path error
    pub async fn sanitize_output(&self, request: &RequestContext, payload: Value) -> CoreResult<Value> {
        let asset = self.asset_for(request)?;
        let principal = self.principal(request).await?;

        let options = OutputOptions {
            asset,
            action: request.method.clone(),
            payload_path: self.payload_path.clone(),
            role_attribute_path: self.role_attribute_path.clone(),
        };
        self.sanitizer.sanitize_output(&principal, payload, &options)
    }

    async fn principal(&self, request: &RequestContext) -> CoreResult<Value> {
        self.authenticator.authenticate(request).await.map_err(|err| {
            let err = CoreError::from(err);
            warn!(route = %request.route, kind = err.kind(), error = %err, "authentication failed");
            err
        })
    }

    fn asset_for(&self, request: &RequestContext) -> CoreResult<String> {
        if let Some(asset) = &self.asset {
            return Ok(asset.clone());
        }
        asset_from_route(&request.route).ok_or_else(|| {
            CoreError::configuration(format!("cannot derive an asset from route {}", request.route))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, StaticAuthenticator};
    use async_trait::async_trait;
    use fieldgate_core::{Action, EngineConfig, FieldCatalog};
    use fieldgate_policy::{AssetDeclaration, PolicyCompiler};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Rejecting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Authenticator for Rejecting {
        async fn authenticate(&self, _request: &RequestContext) -> Result<Value, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::new("No Authorization was found in request.headers"))
        }
    }

    fn sanitizer(config: EngineConfig) -> Arc<Sanitizer> {
        let catalog = FieldCatalog::new()
            .with_asset("Post", ["_id", "title", "summary", "content", "author", "comments"]);
        let decl = AssetDeclaration::new("Post")
            .with_rule("GET", "writer", json!({ "$fields": ["title", "author"] }))
            .with_rule("POST", "writer", json!({ "$fields": ["title"] }));
        let registry = PolicyCompiler::new(config).compile(&[decl], &catalog).unwrap();
        Arc::new(Sanitizer::new(Arc::new(registry)))
    }

    fn writer_guard() -> RequestGuard {
        RequestGuard::new(
            sanitizer(EngineConfig::default()),
            Arc::new(StaticAuthenticator::new(json!({ "type": "writer" }))),
        )
    }

    #[tokio::test]
    async fn test_output_from_route() {
        let guard = writer_guard();
        let ctx = RequestContext::new(Action::Get, "/post/2");
        let out = guard
            .sanitize_output(&ctx, json!({ "_id": 2, "title": "Foo Bar", "author": "Jane Doe", "summary": "s" }))
            .await
            .unwrap();
        assert_eq!(out, json!({ "title": "Foo Bar", "author": "Jane Doe" }));
    }

    #[tokio::test]
    async fn test_input_uses_request_method() {
        let guard = writer_guard();
        let ctx = RequestContext::new(Action::Post, "/post/");
        let out = guard
            .guard_input(&ctx, json!({ "_id": 9, "title": "New", "author": "Me" }))
            .await
            .unwrap();
        assert_eq!(out, json!({ "title": "New" }));
    }

    #[tokio::test]
    async fn test_nested_payload_path() {
        let guard = writer_guard().with_payload_path("post.nested");
        let ctx = RequestContext::new(Action::Get, "/post/2");
        let out = guard
            .sanitize_output(
                &ctx,
                json!({ "message": "Updated Successfully", "post": { "nested": { "_id": 2, "title": "T" } } }),
            )
            .await
            .unwrap();
        assert_eq!(
            out,
            json!({ "message": "Updated Successfully", "post": { "nested": { "title": "T" } } })
        );
    }

    #[tokio::test]
    async fn test_authentication_failure_aborts() {
        let auth = Arc::new(Rejecting {
            calls: AtomicUsize::new(0),
        });
        let guard = RequestGuard::new(sanitizer(EngineConfig::default()), auth.clone());
        let ctx = RequestContext::new(Action::Get, "/post/");

        let err = guard.sanitize_output(&ctx, json!([{ "title": "x" }])).await.unwrap_err();
        assert_eq!(
            err,
            CoreError::Authentication("No Authorization was found in request.headers".into())
        );
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_object_body_skips_authentication() {
        let auth = Arc::new(Rejecting {
            calls: AtomicUsize::new(0),
        });
        let guard = RequestGuard::new(sanitizer(EngineConfig::default()), auth.clone());
        let ctx = RequestContext::new(Action::Post, "/post/");

        let out = guard.guard_input(&ctx, json!(42)).await.unwrap();
        assert_eq!(out, json!(42));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_route_without_asset() {
        let guard = writer_guard();
        let ctx = RequestContext::new(Action::Get, "/");
        let err = guard.sanitize_output(&ctx, json!({})).await.unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_explicit_asset_and_denial() {
        let guard = RequestGuard::new(
            sanitizer(EngineConfig::default().with_deny_by_default(true)),
            Arc::new(StaticAuthenticator::new(json!({ "type": "writer" }))),
        )
        .with_asset("Post");
        let ctx = RequestContext::new(Action::Delete, "/anything/2");
        let err = guard.sanitize_output(&ctx, json!({ "title": "x" })).await.unwrap_err();
        assert_eq!(err.to_string(), "Insufficient Privileges");
    }
}
