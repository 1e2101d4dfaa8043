//! Error types for the ItemGraph engine
//!
//! Almost every operation in this crate is total: unseen users and items
//! degrade to empty results rather than failures. The error surface is
//! therefore small and covers exactly two concerns:
//! - configuration loading and validation
//! - caller contract violations (empty identifiers, a zero result limit)

use std::borrow::Cow;
use thiserror::Error;

/// Result type alias for ItemGraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ItemGraph engine
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Configuration error: {message}")]
    Config {
        message: Cow<'static, str>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: &'static str },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig {
        key: &'static str,
        message: Cow<'static, str>,
    },

    // ========================================================================
    // Caller Contract Violations
    // ========================================================================
    /// An external identifier was empty (or whitespace only). Silently
    /// interning such a token would create an unreachable phantom entity,
    /// so it is rejected at the boundary instead.
    #[error("Empty {kind} identifier")]
    EmptyIdentifier { kind: &'static str },

    /// A result limit of zero was requested. The limit must be positive;
    /// callers that want "no results" should simply not call `recommend`.
    #[error("Invalid recommendation limit: {k} (must be positive)")]
    InvalidLimit { k: usize },
}

impl Error {
    // ========================================================================
    // Constructors for common error patterns
    // ========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create an empty-identifier error for the given entity kind
    pub fn empty_identifier(kind: &'static str) -> Self {
        Self::EmptyIdentifier { kind }
    }

    // ========================================================================
    // Error Classification
    // ========================================================================

    /// Returns true if this error was caused by invalid caller input
    /// rather than by the engine's own configuration.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::EmptyIdentifier { .. } | Error::InvalidLimit { .. }
        )
    }

    /// Stable error code, useful for harnesses that aggregate failures
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } | Error::MissingEnvVar { .. } | Error::InvalidConfig { .. } => {
                "CONFIG_ERROR"
            }
            Error::EmptyIdentifier { .. } => "EMPTY_IDENTIFIER",
            Error::InvalidLimit { .. } => "INVALID_LIMIT",
        }
    }
}

impl From<std::env::VarError> for Error {
    fn from(_err: std::env::VarError) -> Self {
        Error::Config {
            message: "Environment variable error".into(),
            source: None,
        }
    }
}
