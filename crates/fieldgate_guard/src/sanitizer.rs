//! Payload sanitization for responses and request bodies.

use fieldgate_core::{Action, CoreResult, DottedPath, EmptyElementPolicy, EngineConfig};
use fieldgate_policy::redact::is_empty_projection;
use fieldgate_policy::resolver::role_at;
use fieldgate_policy::{project, AssetInstance, PermissionResolver, PolicyRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Options for filtering an outbound payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Asset the payload objects belong to
    pub asset: String,
    /// Action the request performed
    pub action: Action,
    /// Where the objects sit inside the payload; whole payload if absent
    #[serde(default)]
    pub payload_path: Option<DottedPath>,
    /// Role location override; engine default if absent
    #[serde(default)]
    pub role_attribute_path: Option<DottedPath>,
}

impl OutputOptions {
    /// Filter the whole payload as `asset` under `action`
    #[must_use]
    pub fn new(asset: impl Into<String>, action: Action) -> Self {
        Self {
            asset: asset.into(),
            action,
            payload_path: None,
            role_attribute_path: None,
        }
    }

    /// Filter only the value at `path`
    #[must_use]
    pub fn at_path(mut self, path: &str) -> Self {
        self.payload_path = Some(DottedPath::parse(path));
        self
    }

    /// Read the role from `path` in the principal
    #[must_use]
    pub fn with_role_attribute_path(mut self, path: &str) -> Self {
        self.role_attribute_path = Some(DottedPath::parse(path));
        self
    }
}

/// Options for filtering an inbound body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputOptions {
    /// Asset the body describes
    pub asset: String,
    /// Inbound write action (the request method)
    pub action: Action,
    /// Role location override; engine default if absent
    #[serde(default)]
    pub role_attribute_path: Option<DottedPath>,
}

impl InputOptions {
    /// Filter a body as `asset` under `action`
    #[must_use]
    pub fn new(asset: impl Into<String>, action: Action) -> Self {
        Self {
            asset: asset.into(),
            action,
            role_attribute_path: None,
        }
    }

    /// Read the role from `path` in the principal
    #[must_use]
    pub fn with_role_attribute_path(mut self, path: &str) -> Self {
        self.role_attribute_path = Some(DottedPath::parse(path));
        self
    }
}

/// Applies resolved field sets to whole payloads
#[derive(Debug, Clone)]
pub struct Sanitizer {
    resolver: PermissionResolver,
}

impl Sanitizer {
    /// Create a sanitizer over a compiled registry
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self {
            resolver: PermissionResolver::new(registry),
        }
    }

    fn config(&self) -> &EngineConfig {
        self.resolver.registry().config()
    }

    /// Filter an outbound payload.
    ///
    /// Arrays are filtered element by element, each element resolved as its
    /// own instance, order preserved. With a payload path only the value at
    /// that path is replaced and the full payload is returned.
    ///
    /// Filtering an already filtered payload is stable only while every
    /// condition field is also granted: a branch keyed on `_id` that does not
    /// grant `_id` matches the first pass and no longer matches the second.
    ///
    /// # Errors
    ///
    /// Returns `NestedPathNotFound` if the payload path does not resolve and
    /// `InsufficientPrivileges` if the policy denies the request; no partial
    /// output is produced in either case
    pub fn sanitize_output(
        &self,
        principal: &Value,
        payload: Value,
        options: &OutputOptions,
    ) -> CoreResult<Value> {
        let role = self.role(principal, options.role_attribute_path.as_ref());
        let Some(path) = &options.payload_path else {
            return self.filter(principal, role.as_deref(), payload, &options.asset, &options.action);
        };

        let verbose = self.config().verbose_errors;
        let target = path
            .get(&payload, verbose)
            .inspect_err(|err| warn!(%path, asset = %options.asset, kind = err.kind(), "payload path not found"))?
            .clone();
        let filtered = self.filter(principal, role.as_deref(), target, &options.asset, &options.action)?;

        let mut root = payload;
        path.set(&mut root, filtered, verbose)
            .inspect_err(|err| warn!(%path, asset = %options.asset, kind = err.kind(), "payload path not writable"))?;
        Ok(root)
    }

    /// Filter an inbound body down to the writable fields.
    ///
    /// Non-object bodies are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientPrivileges` if the policy denies the request
    pub fn guard_input(
        &self,
        principal: &Value,
        body: Value,
        options: &InputOptions,
    ) -> CoreResult<Value> {
        if !body.is_object() {
            return Ok(body);
        }
        let role = self.role(principal, options.role_attribute_path.as_ref());
        let resolution = self.resolver.resolve(
            AssetInstance::new(&options.asset, &body),
            &options.action,
            role.as_deref(),
            principal,
        )?;
        Ok(project(body, &resolution.fields))
    }

    fn role(&self, principal: &Value, path: Option<&DottedPath>) -> Option<String> {
        role_at(
            principal,
            path.unwrap_or(&self.config().role_attribute_path),
        )
    }

    fn filter(
        &self,
        principal: &Value,
        role: Option<&str>,
        value: Value,
        asset: &str,
        action: &Action,
    ) -> CoreResult<Value> {
        let items = match value {
            Value::Array(items) => items,
            single => return self.filter_one(principal, role, single, asset, action),
        };

        let total = items.len();
        let mut kept = Vec::with_capacity(total);
        for item in items {
            let projected = self.filter_one(principal, role, item, asset, action)?;
            if self.config().empty_elements == EmptyElementPolicy::Drop
                && is_empty_projection(&projected)
            {
                continue;
            }
            kept.push(projected);
        }

        debug!(%asset, %action, total, kept = kept.len(), "sanitized array payload");
        Ok(Value::Array(kept))
    }

    fn filter_one(
        &self,
        principal: &Value,
        role: Option<&str>,
        instance: Value,
        asset: &str,
        action: &Action,
    ) -> CoreResult<Value> {
        let resolution =
            self.resolver
                .resolve(AssetInstance::new(asset, &instance), action, role, principal)?;
        Ok(project(instance, &resolution.fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldgate_core::{CoreError, FieldCatalog};
    use fieldgate_policy::{AssetDeclaration, PolicyCompiler};
    use proptest::prelude::*;
    use serde_json::json;

    fn catalog() -> FieldCatalog {
        FieldCatalog::new()
            .with_asset(
                "Post",
                ["_id", "title", "summary", "content", "author", "comments"],
            )
            .with_asset("DeleteResponse", ["message"])
    }

    fn sanitizer(config: EngineConfig, decls: Vec<AssetDeclaration>) -> Sanitizer {
        let registry = PolicyCompiler::new(config).compile(&decls, &catalog()).unwrap();
        Sanitizer::new(Arc::new(registry))
    }

    fn posts() -> Value {
        json!([
            {
                "_id": 2,
                "title": "Foo Bar",
                "summary": "Summary of post no. 2",
                "content": "Content of post no. 2",
                "author": "Jane Doe",
                "comments": ["Lorem", "Ipsum"]
            },
            {
                "_id": 3,
                "title": "Bar Foo",
                "summary": "Summary of post no. 3",
                "content": "Content of post no. 3",
                "author": "John Doe",
                "comments": ["Lorem", "Ipsum"]
            }
        ])
    }

    fn writer() -> Value {
        json!({ "type": "writer" })
    }

    fn writer_fields() -> AssetDeclaration {
        AssetDeclaration::new("Post").with_rule(
            "GET",
            "writer",
            json!({ "$fields": ["title", "author", "content"] }),
        )
    }

    #[test]
    fn test_single_object() {
        let s = sanitizer(EngineConfig::default(), vec![writer_fields()]);
        let post = posts()[0].clone();
        let out = s
            .sanitize_output(&writer(), post, &OutputOptions::new("Post", Action::Get))
            .unwrap();
        assert_eq!(
            out,
            json!({ "title": "Foo Bar", "content": "Content of post no. 2", "author": "Jane Doe" })
        );
    }

    #[test]
    fn test_array_keeps_order() {
        let s = sanitizer(EngineConfig::default(), vec![writer_fields()]);
        let out = s
            .sanitize_output(&writer(), posts(), &OutputOptions::new("Post", Action::Get))
            .unwrap();
        let items = out.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["title"], json!("Foo Bar"));
        assert_eq!(items[1]["title"], json!("Bar Foo"));
        assert!(items.iter().all(|i| i.get("_id").is_none()));
    }

    #[test]
    fn test_unmatched_elements_kept_empty() {
        let decl = AssetDeclaration::new("Post").with_rule(
            "GET",
            "writer",
            json!({ "$if": [{ "_id": 2 }], "$fields": [["title"]] }),
        );
        let s = sanitizer(EngineConfig::default(), vec![decl]);
        let out = s
            .sanitize_output(&writer(), posts(), &OutputOptions::new("Post", Action::Get))
            .unwrap();
        assert_eq!(out, json!([{ "title": "Foo Bar" }, {}]));
    }

    #[test]
    fn test_unmatched_elements_dropped() {
        let decl = AssetDeclaration::new("Post").with_rule(
            "GET",
            "writer",
            json!({ "$if": [{ "_id": 2 }], "$fields": [["title"]] }),
        );
        let s = sanitizer(
            EngineConfig::default().with_empty_elements(EmptyElementPolicy::Drop),
            vec![decl],
        );
        let out = s
            .sanitize_output(&writer(), posts(), &OutputOptions::new("Post", Action::Get))
            .unwrap();
        assert_eq!(out, json!([{ "title": "Foo Bar" }]));
    }

    #[test]
    fn test_nested_path() {
        let s = sanitizer(EngineConfig::default(), vec![writer_fields()]);
        let payload = json!({ "message": "ok", "posts": { "nested": posts() } });
        let out = s
            .sanitize_output(
                &writer(),
                payload,
                &OutputOptions::new("Post", Action::Get).at_path("posts.nested"),
            )
            .unwrap();
        assert_eq!(out["message"], json!("ok"));
        assert_eq!(out["posts"]["nested"].as_array().unwrap().len(), 2);
        assert!(out["posts"]["nested"][0].get("summary").is_none());
    }

    #[test]
    fn test_missing_path_opaque_and_verbose() {
        let options = OutputOptions::new("Post", Action::Get).at_path("posts.nested.inner");

        let s = sanitizer(EngineConfig::default(), vec![writer_fields()]);
        let err = s.sanitize_output(&writer(), posts(), &options).unwrap_err();
        assert_eq!(err.to_string(), "Fatal Error");

        let s = sanitizer(EngineConfig::default().with_verbose_errors(true), vec![writer_fields()]);
        let err = s.sanitize_output(&writer(), posts(), &options).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Inexistent nested value for path \"posts.nested.inner\""
        );
    }

    #[test]
    fn test_denied_by_default() {
        let s = sanitizer(
            EngineConfig::default().with_deny_by_default(true),
            vec![AssetDeclaration::new("Post")],
        );
        let err = s
            .sanitize_output(&writer(), posts(), &OutputOptions::new("Post", Action::Get))
            .unwrap_err();
        assert_eq!(err, CoreError::InsufficientPrivileges);
    }

    #[test]
    fn test_explicit_response_asset() {
        let decls = vec![AssetDeclaration::new("Post"), AssetDeclaration::new("DeleteResponse")];
        let s = sanitizer(EngineConfig::default(), decls);
        let out = s
            .sanitize_output(
                &writer(),
                json!({ "message": "Successfully deleted post", "should": "not show" }),
                &OutputOptions::new("DeleteResponse", Action::Delete),
            )
            .unwrap();
        assert_eq!(out, json!({ "message": "Successfully deleted post" }));
    }

    #[test]
    fn test_role_path_override() {
        let decl = AssetDeclaration::new("Post")
            .with_rule("GET", "writer", json!({ "$fields": ["title"] }));
        let s = sanitizer(EngineConfig::default().with_deny_by_default(true), vec![decl]);
        let principal = json!({ "user_type": { "is": "writer" } });
        let options = OutputOptions::new("Post", Action::Get).with_role_attribute_path("user_type.is");
        let out = s.sanitize_output(&principal, posts()[1].clone(), &options).unwrap();
        assert_eq!(out, json!({ "title": "Bar Foo" }));
    }

    #[test]
    fn test_guard_input() {
        let decl = AssetDeclaration::new("Post").with_rule(
            "POST",
            "writer",
            json!({ "$fields": ["_id", "title", "author", "content"] }),
        );
        let s = sanitizer(EngineConfig::default(), vec![decl]);
        let body = posts()[0].clone();
        assert_eq!(body.as_object().unwrap().len(), 6);

        let out = s
            .guard_input(&writer(), body, &InputOptions::new("Post", Action::Post))
            .unwrap();
        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["_id", "title", "content", "author"]);
    }

    #[test]
    fn test_guard_input_non_object_passthrough() {
        let s = sanitizer(
            EngineConfig::default().with_deny_by_default(true),
            vec![AssetDeclaration::new("Post")],
        );
        let out = s
            .guard_input(&writer(), json!("raw text"), &InputOptions::new("Post", Action::Post))
            .unwrap();
        assert_eq!(out, json!("raw text"));
    }

    #[test]
    fn test_second_pass_loses_ungranted_condition_field() {
        let decl = AssetDeclaration::new("Post")
            .with_rule("GET", "writer", json!({ "$if": { "_id": 1 }, "$fields": ["title"] }));
        let s = sanitizer(EngineConfig::default(), vec![decl]);
        let options = OutputOptions::new("Post", Action::Get);

        let once = s
            .sanitize_output(&writer(), json!({ "_id": 1, "title": "t", "author": "a" }), &options)
            .unwrap();
        assert_eq!(once, json!({ "title": "t" }));

        let twice = s.sanitize_output(&writer(), once, &options).unwrap();
        assert_eq!(twice, json!({}));
    }

    #[test]
    fn test_false_and_empty_fields_rules_grant_catalog() {
        let instance = json!({ "_id": 1, "title": "t", "author": "a" });
        for rule in [json!(false), json!({ "$fields": [] }), json!([])] {
            let decl = AssetDeclaration::new("Post").with_rule("GET", "writer", rule);
            let s = sanitizer(EngineConfig::default().with_deny_by_default(true), vec![decl]);
            let out = s
                .sanitize_output(&writer(), instance.clone(), &OutputOptions::new("Post", Action::Get))
                .unwrap();
            assert_eq!(out, instance);
        }
    }

    proptest::proptest! {
        // Grants cover the condition fields, so a second pass matches the same branches.
        #[test]
        fn prop_sanitize_idempotent(id in 0i64..6, verbose in any::<bool>()) {
            let decl = AssetDeclaration::new("Post").with_rule(
                "GET",
                "writer",
                json!({
                    "$if": [{ "_id": 2 }, { "author": "Jane Doe" }],
                    "$fields": [["_id", "title"], ["author", "content"]]
                }),
            );
            let s = sanitizer(EngineConfig::default().with_verbose_errors(verbose), vec![decl]);
            let mut payload = posts();
            payload[0]["_id"] = json!(id);
            let options = OutputOptions::new("Post", Action::Get);

            let once = s.sanitize_output(&writer(), payload, &options).unwrap();
            let twice = s.sanitize_output(&writer(), once.clone(), &options).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
