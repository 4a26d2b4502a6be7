//! Error handling for the Ledgerline authorization engine.
//!
//! This module provides:
//! - A domain error type covering directory, schema, and verification failures
//! - Stable machine-readable error codes for API consumers
//! - A crate-wide `Result` alias

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::authz::models::{PermissionCode, RoleSlug};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for authorization engine operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Internal errors (1000-1099)
    InternalError,

    // Serialization / schema errors (2200-2299)
    SchemaVersionMismatch,
    SerializationError,

    // Local persistence errors (2300-2399)
    PersistenceError,

    // External service errors (3000-3099)
    DirectoryUnavailable,

    // Authorization errors (4100-4199)
    UnknownRole,
    ConflictingOverride,
    VerificationMismatch,

    // Configuration errors (5000-5099)
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::InternalError => 1000,

            Self::SchemaVersionMismatch => 2200,
            Self::SerializationError => 2201,

            Self::PersistenceError => 2300,

            Self::DirectoryUnavailable => 3000,

            Self::UnknownRole => 4100,
            Self::ConflictingOverride => 4101,
            Self::VerificationMismatch => 4102,

            Self::ConfigurationError => 5000,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors from the authorization engine.
///
/// Propagation policy:
/// - `DirectoryUnavailable` during resolution is recovered locally (stale
///   cache, persisted snapshot, or deny-all) and never reaches an access
///   evaluator, which stays a total boolean-returning function.
/// - `SchemaVersionMismatch` is recovered by discarding and rebuilding.
/// - `UnknownRole` is non-fatal during flattening: the role contributes
///   nothing and resolution continues.
/// - `VerificationMismatch` must be surfaced to the caller that performed
///   the write; it is never swallowed.
#[derive(Debug, Clone, Error)]
pub enum AuthzError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("directory service unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("snapshot schema version {found} does not match engine version {expected}")]
    SchemaVersionMismatch { expected: u32, found: u32 },

    #[error("unknown role: {0}")]
    UnknownRole(RoleSlug),

    #[error("conflicting grant and revoke overrides for permission {code}")]
    ConflictingOverride { code: PermissionCode },

    #[error("verification failed for role {role}: {} missing, {} extra", missing.len(), extra.len())]
    VerificationMismatch {
        role: RoleSlug,
        missing: Vec<PermissionCode>,
        extra: Vec<PermissionCode>,
    },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("local persistence failed: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AuthzError {
    /// The stable machine-readable code for this error.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal(_) => ErrorCode::InternalError,
            Self::DirectoryUnavailable(_) => ErrorCode::DirectoryUnavailable,
            Self::SchemaVersionMismatch { .. } => ErrorCode::SchemaVersionMismatch,
            Self::UnknownRole(_) => ErrorCode::UnknownRole,
            Self::ConflictingOverride { .. } => ErrorCode::ConflictingOverride,
            Self::VerificationMismatch { .. } => ErrorCode::VerificationMismatch,
            Self::Serialization(_) => ErrorCode::SerializationError,
            Self::Persistence(_) => ErrorCode::PersistenceError,
            Self::Configuration(_) => ErrorCode::ConfigurationError,
        }
    }

    /// Whether the resolution pipeline may recover from this error by
    /// serving a fallback snapshot.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DirectoryUnavailable(_)
                | Self::SchemaVersionMismatch { .. }
                | Self::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for AuthzError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for AuthzError {
    fn from(err: reqwest::Error) -> Self {
        Self::DirectoryUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for AuthzError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ErrorCode::SchemaVersionMismatch.numeric_code(), 2200);
        assert_eq!(ErrorCode::DirectoryUnavailable.numeric_code(), 3000);
        assert_eq!(ErrorCode::UnknownRole.numeric_code(), 4100);
        assert_eq!(ErrorCode::ConflictingOverride.numeric_code(), 4101);
        assert_eq!(ErrorCode::VerificationMismatch.numeric_code(), 4102);
    }

    #[test]
    fn test_error_to_code_mapping() {
        let err = AuthzError::DirectoryUnavailable("timeout".into());
        assert_eq!(err.code(), ErrorCode::DirectoryUnavailable);

        let err = AuthzError::SchemaVersionMismatch { expected: 3, found: 2 };
        assert_eq!(err.code(), ErrorCode::SchemaVersionMismatch);
        assert!(err.is_recoverable());

        let err = AuthzError::ConflictingOverride {
            code: PermissionCode::new("transactions.post"),
        };
        assert_eq!(err.code(), ErrorCode::ConflictingOverride);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_verification_mismatch_display() {
        let err = AuthzError::VerificationMismatch {
            role: RoleSlug::new("accountant"),
            missing: vec![PermissionCode::new("transactions.post")],
            extra: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("accountant"));
        assert!(msg.contains("1 missing"));
    }

    #[test]
    fn test_error_code_serde_format() {
        let json = serde_json::to_string(&ErrorCode::DirectoryUnavailable).unwrap();
        assert_eq!(json, "\"DIRECTORY_UNAVAILABLE\"");
    }
}
