//! Policy declaration format.
//!
//! ```json
//! {
//!   "name": "Post",
//!   "actions": {
//!     "GET": {
//!       "admin": true,
//!       "writer": { "$fields": ["title", "author", "content"] },
//!       "reader": {
//!         "$if": [{ "_id": 2 }, { "$author": "profile.name" }],
//!         "$fields": [["title"], ["title", "content"]]
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Rule values stay untyped JSON here; their shape is validated by the
//! compiler so that every malformed rule surfaces as the same
//! configuration error.

use crate::compiler::{PolicyCompiler, PolicyRegistry};
use fieldgate_core::{CoreResult, EngineConfig, FieldCatalog};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key holding the granted field list(s) of a rule
pub const FIELDS_KEY: &str = "$fields";

/// Key holding the condition map(s) of a rule
pub const CONDITION_KEY: &str = "$if";

/// Prefix marking a condition key whose value is a principal attribute path
pub const ATTRIBUTE_REF_PREFIX: char = '$';

/// Rules for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDeclaration {
    /// Asset name, as used in the field catalog
    pub name: String,
    /// Action verb -> role value -> raw rule
    #[serde(default)]
    pub actions: IndexMap<String, IndexMap<String, Value>>,
}

impl AssetDeclaration {
    /// Create a declaration with no actions
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: IndexMap::new(),
        }
    }

    /// Add a raw rule for (action, role)
    #[must_use]
    pub fn with_rule(mut self, action: &str, role: &str, rule: Value) -> Self {
        self.actions
            .entry(action.to_string())
            .or_default()
            .insert(role.to_string(), rule);
        self
    }
}

/// Everything needed to build a registry: configuration, rules and catalogs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDocument {
    /// Engine configuration
    pub config: EngineConfig,
    /// Per-asset rules
    pub assets: Vec<AssetDeclaration>,
    /// Per-asset field catalogs
    pub catalogs: FieldCatalog,
}

impl PolicyDocument {
    /// Parse a document from JSON text
    ///
    /// # Errors
    ///
    /// Returns the parser error if the text is not a valid document
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Compile the document into a registry
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any rule is malformed
    pub fn compile(&self) -> CoreResult<PolicyRegistry> {
        PolicyCompiler::new(self.config.clone()).compile(&self.assets, &self.catalogs)
    }
}
