//! Condition matching against concrete instances.

use fieldgate_core::DottedPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a condition's comparison value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueSource {
    /// A constant scalar from the rule declaration
    Literal(Value),
    /// A path into the principal, resolved on every evaluation
    AttributeRef(DottedPath),
}

impl ValueSource {
    /// Resolve to a comparison value for this principal
    #[must_use]
    pub fn resolve<'a>(&'a self, principal: &'a Value) -> Option<&'a Value> {
        match self {
            Self::Literal(value) => Some(value),
            Self::AttributeRef(path) => path.lookup(principal),
        }
    }
}

/// One `field == value` requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    /// Instance field compared
    pub field: String,
    /// Expected value
    pub source: ValueSource,
}

/// A conjunction of clauses; empty matches everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    clauses: Vec<Clause>,
}

impl Condition {
    /// The always-true condition
    #[must_use]
    pub fn always() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Add a literal comparison
    #[must_use]
    pub fn with_literal(mut self, field: impl Into<String>, value: Value) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            source: ValueSource::Literal(value),
        });
        self
    }

    /// Add a comparison against a principal attribute
    #[must_use]
    pub fn with_attribute(mut self, field: impl Into<String>, path: &str) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            source: ValueSource::AttributeRef(DottedPath::parse(path)),
        });
        self
    }

    /// Clauses in declaration order
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Whether this condition has no clauses
    #[must_use]
    pub fn is_always(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether any clause depends on the principal
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.clauses
            .iter()
            .any(|c| matches!(c.source, ValueSource::AttributeRef(_)))
    }
}

/// Evaluates conditions. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher;

impl Matcher {
    /// Create a new matcher
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Check every clause of `condition` against `instance`.
    ///
    /// A clause fails when the instance lacks the field, the attribute
    /// reference does not resolve, or the values differ.
    #[must_use]
    pub fn matches(&self, condition: &Condition, instance: &Value, principal: &Value) -> bool {
        condition.clauses.iter().all(|clause| {
            let Some(actual) = instance.get(clause.field.as_str()) else {
                return false;
            };
            clause
                .source
                .resolve(principal)
                .is_some_and(|expected| scalar_eq(actual, expected))
        })
    }
}

/// Strict equality over string, number and boolean scalars.
///
/// Numbers compare by value so `3` equals `3.0`. Anything else,
/// including null, arrays and objects, never matches.
#[must_use]
pub fn scalar_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Number(l), Value::Number(r)) => {
            if l == r {
                return true;
            }
            match (l.as_f64(), r.as_f64()) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Whether a value may be used as a condition literal
#[must_use]
pub fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}
