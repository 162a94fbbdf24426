//! Field sets and per-asset field catalogs.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// An ordered set of field names
///
/// Order follows first insertion. Equality ignores order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet {
    fields: IndexSet<String>,
}

impl FieldSet {
    /// Create an empty field set
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: IndexSet::new(),
        }
    }

    /// Insert a field, returns false if it was already present
    pub fn insert(&mut self, field: impl Into<String>) -> bool {
        self.fields.insert(field.into())
    }

    /// Union another set into this one, keeping this set's order first
    pub fn extend_from(&mut self, other: &FieldSet) {
        self.fields.extend(other.fields.iter().cloned());
    }

    /// Check if a field is in the set
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Number of fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

impl PartialEq for FieldSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|f| other.contains(f))
    }
}

impl Eq for FieldSet {}

impl<S: Into<String>> FromIterator<S> for FieldSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a String;
    type IntoIter = indexmap::set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Supplies the complete declarable field list for an asset.
///
/// Usually backed by a schema or ORM model; the engine only reads it
/// once, while compiling the policy.
pub trait CatalogSource {
    /// All fields of `asset`, or `None` if the asset is unknown
    fn fields_of(&self, asset: &str) -> Option<FieldSet>;
}

/// Asset name to field set, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldCatalog {
    assets: IndexMap<String, FieldSet>,
}

impl FieldCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self {
            assets: IndexMap::new(),
        }
    }

    /// Register an asset's fields
    #[must_use]
    pub fn with_asset<I, S>(mut self, asset: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assets.insert(asset.into(), fields.into_iter().collect());
        self
    }
}

impl CatalogSource for FieldCatalog {
    fn fields_of(&self, asset: &str) -> Option<FieldSet> {
        self.assets.get(asset).cloned()
    }
}
