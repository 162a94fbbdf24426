//! Action identifiers.
//!
//! Actions are keyed by HTTP verb. The CRUD names `read`, `create`,
//! `update` and `delete` are accepted as aliases of `GET`, `POST`,
//! `PATCH` and `DELETE`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An action a principal performs on an asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// `GET` / `read`
    Get,
    /// `POST` / `create`
    Post,
    /// `PATCH` / `update`
    Patch,
    /// `DELETE` / `delete`
    Delete,
    /// Any other verb, kept verbatim
    Other(String),
}

impl Action {
    /// Parse a verb or alias; never fails, unknown verbs become `Other`
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "GET" | "read" => Self::Get,
            "POST" | "create" => Self::Post,
            "PATCH" | "update" => Self::Patch,
            "DELETE" | "delete" => Self::Delete,
            other => Self::Other(other.to_string()),
        }
    }

    /// Canonical verb
    #[must_use]
    pub fn verb(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Other(verb) => verb,
        }
    }

}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.verb().to_string()
    }
}
