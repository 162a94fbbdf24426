//! Engine-wide configuration.

use crate::path::DottedPath;
use serde::{Deserialize, Serialize};

/// What happens to array elements whose allowed field set is empty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyElementPolicy {
    /// Keep the element as an empty object
    #[default]
    Keep,
    /// Remove the element from the array
    Drop,
}

/// Engine configuration, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deny access when no rule exists for (asset, action, role)
    pub deny_by_default: bool,
    /// Include the offending path in missing-path errors
    pub verbose_errors: bool,
    /// Where the role lives in the principal
    pub role_attribute_path: DottedPath,
    /// Treatment of fully-redacted array elements
    pub empty_elements: EmptyElementPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deny_by_default: false,
            verbose_errors: false,
            role_attribute_path: DottedPath::parse("type"),
            empty_elements: EmptyElementPolicy::Keep,
        }
    }
}

impl EngineConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set deny-by-default
    #[must_use]
    pub fn with_deny_by_default(mut self, deny: bool) -> Self {
        self.deny_by_default = deny;
        self
    }

    /// Set verbose errors
    #[must_use]
    pub fn with_verbose_errors(mut self, verbose: bool) -> Self {
        self.verbose_errors = verbose;
        self
    }

    /// Set the role attribute path
    #[must_use]
    pub fn with_role_attribute_path(mut self, path: &str) -> Self {
        self.role_attribute_path = DottedPath::parse(path);
        self
    }

    /// Set the empty element policy
    #[must_use]
    pub fn with_empty_elements(mut self, policy: EmptyElementPolicy) -> Self {
        self.empty_elements = policy;
        self
    }
}
