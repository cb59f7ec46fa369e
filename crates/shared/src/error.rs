//! Application-wide error classification.
//!
//! Every domain error maps onto one of these kinds so callers can decide
//! whether to retry and which status to surface without matching on
//! individual variants.

use serde::Serialize;

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Caller-supplied input is invalid. Never retried.
    Validation,
    /// Caller referenced a missing or stale identifier.
    NotFound,
    /// Current state prevents the operation; may succeed with fresh state.
    Conflict,
    /// Transient failure of the store or a timeout.
    Infrastructure,
}

impl ErrorKind {
    /// Returns the HTTP status code conventionally used for this kind.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Infrastructure => 503,
        }
    }

    /// Returns the stable string form of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Infrastructure => "INFRASTRUCTURE_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
