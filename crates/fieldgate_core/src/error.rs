//! Core error types for fieldgate.
//!
//! The displayed messages are part of the wire contract: callers (and their
//! HTTP layers) match on them, so they must not change.

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Message shown for a missing nested path when verbose errors are disabled
pub const OPAQUE_PATH_MESSAGE: &str = "Fatal Error";

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Malformed rule declaration, raised while compiling the policy
    #[error("Invalid user rights provided")]
    Configuration {
        /// What was wrong; logged, never displayed
        detail: String,
    },

    /// No rule applies and the policy denies by default
    #[error("Insufficient Privileges")]
    InsufficientPrivileges,

    /// Dotted path traversal hit a missing value
    #[error("{}", nested_path_message(.path, .verbose))]
    NestedPathNotFound {
        /// Full path as requested
        path: String,
        /// Whether the path is disclosed in the message
        verbose: bool,
    },

    /// Credential verification failed upstream
    #[error("{0}")]
    Authentication(String),
}

impl CoreError {
    /// Build a configuration error with a diagnostic detail
    #[must_use]
    pub fn configuration(detail: impl Into<String>) -> Self {
        Self::Configuration {
            detail: detail.into(),
        }
    }

    /// Build a missing-path error
    #[must_use]
    pub fn nested_path(path: impl Into<String>, verbose: bool) -> Self {
        Self::NestedPathNotFound {
            path: path.into(),
            verbose,
        }
    }

    /// Short machine-readable kind, used in structured logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::InsufficientPrivileges => "insufficient_privileges",
            Self::NestedPathNotFound { .. } => "nested_path_not_found",
            Self::Authentication(_) => "authentication",
        }
    }
}

fn nested_path_message(path: &str, verbose: &bool) -> String {
    if *verbose {
        format!("Inexistent nested value for path \"{}\"", path)
    } else {
        OPAQUE_PATH_MESSAGE.to_string()
    }
}
