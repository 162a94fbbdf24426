//! Principal acquisition.
//!
//! Credential verification (JWT decoding and the like) lives outside the
//! engine; it plugs in through [`Authenticator`].

use async_trait::async_trait;
use fieldgate_core::{Action, CoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Authentication failure, passed through to the caller unmodified
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AuthError {
    /// Message from the verifier
    pub message: String,
}

impl AuthError {
    /// Create an authentication error
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        CoreError::Authentication(err.message)
    }
}

/// The parts of an inbound request the guard needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Request method
    pub method: Action,
    /// Request route, e.g. `/post/2`
    pub route: String,
    /// Raw `Authorization` header, if any
    #[serde(default)]
    pub authorization: Option<String>,
}

impl RequestContext {
    /// Create a context without credentials
    #[must_use]
    pub fn new(method: Action, route: impl Into<String>) -> Self {
        Self {
            method,
            route: route.into(),
            authorization: None,
        }
    }

    /// Attach an `Authorization` header value
    #[must_use]
    pub fn with_authorization(mut self, header: impl Into<String>) -> Self {
        self.authorization = Some(header.into());
        self
    }
}

/// Verifies a request's credentials and yields the principal attribute bag
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate the request
    async fn authenticate(&self, request: &RequestContext) -> Result<Value, AuthError>;
}

/// Authenticator returning a fixed principal for every request
#[derive(Debug, Clone)]
pub struct StaticAuthenticator {
    principal: Value,
}

impl StaticAuthenticator {
    /// Always authenticate as `principal`
    #[must_use]
    pub fn new(principal: Value) -> Self {
        Self { principal }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, _request: &RequestContext) -> Result<Value, AuthError> {
        Ok(self.principal.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_authenticator() {
        let auth = StaticAuthenticator::new(json!({ "type": "writer" }));
        let ctx = RequestContext::new(Action::Get, "/post/");
        assert_eq!(auth.authenticate(&ctx).await.unwrap(), json!({ "type": "writer" }));
    }

    #[test]
    fn test_auth_error_into_core() {
        let err: CoreError = AuthError::new("Authorization token is invalid").into();
        assert_eq!(err.to_string(), "Authorization token is invalid");
    }

    #[test]
    fn test_request_context_builder() {
        let ctx = RequestContext::new(Action::Post, "/post/").with_authorization("Bearer abc");
        assert_eq!(ctx.authorization.as_deref(), Some("Bearer abc"));
    }
}
