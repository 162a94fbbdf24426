//! Permission resolution: which fields may a principal touch on an instance.

use crate::compiler::{AssetPolicy, PolicyRegistry};
use crate::matcher::Matcher;
use fieldgate_core::{Action, CoreError, CoreResult, DottedPath, FieldSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// A payload object tagged with the asset it belongs to
#[derive(Debug, Clone, Copy)]
pub struct AssetInstance<'a> {
    /// Asset name
    pub asset_name: &'a str,
    /// Instance data
    pub data: &'a Value,
}

impl<'a> AssetInstance<'a> {
    /// Tag `data` as an instance of `asset_name`
    #[must_use]
    pub fn new(asset_name: &'a str, data: &'a Value) -> Self {
        Self { asset_name, data }
    }
}

/// How a field set was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grant {
    /// A declared rule applied
    Rule,
    /// No rule applied; full catalog because the policy allows by default
    Fallback,
}

/// Outcome of a resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Allowed fields
    pub fields: FieldSet,
    /// Indices of the branches that matched
    pub matched_branches: Vec<usize>,
    /// Origin of the grant
    pub grant: Grant,
}

/// Resolves allowed field sets against a shared registry
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    registry: Arc<PolicyRegistry>,
    matcher: Matcher,
}

impl PermissionResolver {
    /// Create a resolver over a compiled registry
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self {
            registry,
            matcher: Matcher::new(),
        }
    }

    /// The registry being consulted
    #[must_use]
    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Extract the principal's role with the configured attribute path
    #[must_use]
    pub fn role_of(&self, principal: &Value) -> Option<String> {
        role_at(principal, &self.registry.config().role_attribute_path)
    }

    /// Allowed fields of `instance` for `principal` performing `action`
    ///
    /// # Errors
    ///
    /// Returns `InsufficientPrivileges` when no rule applies and the policy
    /// denies by default
    pub fn resolve_allowed_fields(
        &self,
        asset_name: &str,
        action: &Action,
        principal: &Value,
        instance: &Value,
    ) -> CoreResult<FieldSet> {
        let role = self.role_of(principal);
        self.resolve(
            AssetInstance::new(asset_name, instance),
            action,
            role.as_deref(),
            principal,
        )
        .map(|resolution| resolution.fields)
    }

    /// Resolve with an explicit role.
    ///
    /// Every branch of the role's rule is checked; the result is the union
    /// of the fields of all matching branches. A rule that exists but
    /// matches nothing yields an empty set, not an error.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientPrivileges` when no rule exists for
    /// (asset, action, role) and the policy denies by default
    pub fn resolve(
        &self,
        instance: AssetInstance<'_>,
        action: &Action,
        role: Option<&str>,
        principal: &Value,
    ) -> CoreResult<Resolution> {
        let asset = self.registry.asset(instance.asset_name);
        let rule = asset.zip(role).and_then(|(asset, role)| asset.rule(action, role));

        let (Some(asset), Some(rule)) = (asset, rule) else {
            return self.fallback(asset, instance.asset_name, action, role);
        };

        let mut fields = FieldSet::new();
        let mut matched_branches = Vec::new();
        for (idx, branch) in rule.branches().iter().enumerate() {
            if !self.matcher.matches(&branch.condition, instance.data, principal) {
                continue;
            }
            matched_branches.push(idx);
            fields.extend_from(branch.fields.as_ref().unwrap_or(&asset.all_fields));
        }

        debug!(
            asset = %instance.asset_name,
            %action,
            role = role.unwrap_or_default(),
            matched = ?matched_branches,
            fields = fields.len(),
            "resolved fields"
        );

        Ok(Resolution {
            fields,
            matched_branches,
            grant: Grant::Rule,
        })
    }

    fn fallback(
        &self,
        asset: Option<&AssetPolicy>,
        asset_name: &str,
        action: &Action,
        role: Option<&str>,
    ) -> CoreResult<Resolution> {
        if self.registry.config().deny_by_default {
            let err = CoreError::InsufficientPrivileges;
            warn!(
                asset = %asset_name,
                %action,
                role = role.unwrap_or_default(),
                kind = err.kind(),
                "no rule, denying"
            );
            return Err(err);
        }

        let asset = asset.ok_or_else(|| {
            CoreError::configuration(format!("asset {} is not declared", asset_name))
        })?;

        debug!(asset = %asset_name, %action, role = role.unwrap_or_default(), "no rule, full catalog");
        Ok(Resolution {
            fields: asset.all_fields.clone(),
            matched_branches: Vec::new(),
            grant: Grant::Fallback,
        })
    }
}

/// Read a role key at `path`; scalars are rendered as text, anything else is no role.
///
/// Integral floats render without a fraction, so `3.0` finds the rule for `"3"`.
#[must_use]
pub fn role_at(principal: &Value, path: &DottedPath) -> Option<String> {
    match path.lookup(principal)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => Some(f.to_string()),
            _ => Some(n.to_string()),
        },
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
