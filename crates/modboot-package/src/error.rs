//! Descriptor validation errors

use std::fmt;

/// Error raised while validating a package descriptor
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The descriptor does not match the strict schema (unknown field,
    /// missing required field, wrong type or malformed JSON)
    #[error("Invalid package descriptor: {0}")]
    Schema(#[from] serde_json::Error),

    /// The version is not a valid semantic version
    #[error("Version must be a valid SemVer, got '{version}': {reason}")]
    InvalidVersion {
        /// Offending version string
        version: String,
        /// Parser message
        reason: String,
    },

    /// A dependency range is not a valid SemVer range
    #[error("Version range for '{dependency}' must be a valid SemVer range, got '{range}': {reason}")]
    InvalidRange {
        /// Dependency id the range was declared for
        dependency: String,
        /// Offending range string
        range: String,
        /// Parser message
        reason: String,
    },
}

/// Result type for descriptor validation
pub type Result<T> = std::result::Result<T, ValidationError>;

impl ValidationError {
    /// Create a new invalid version error
    pub fn invalid_version(version: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidVersion {
            version: version.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a new invalid range error
    pub fn invalid_range(
        dependency: impl Into<String>,
        range: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Self::InvalidRange {
            dependency: dependency.into(),
            range: range.into(),
            reason: reason.to_string(),
        }
    }

    /// Attach the dependency id to a range error produced without one
    pub(crate) fn for_dependency(self, dependency: &str) -> Self {
        match self {
            Self::InvalidRange { range, reason, .. } => Self::InvalidRange {
                dependency: dependency.to_string(),
                range,
                reason,
            },
            other => other,
        }
    }
}
