//! Error types for the planflow pipeline.
//!
//! The taxonomy distinguishes failures by blast radius: per-meal and per-image
//! errors are absorbed locally, per-week stream errors fail the run, and
//! quota exhaustion is surfaced as its own kind so callers can drive billing
//! UX instead of showing a generic failure.

use thiserror::Error;
use uuid::Uuid;

/// The main error type for planflow operations.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Required configuration input is missing or inconsistent.
    ///
    /// Fails fast; no partial run state is created.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The user's remaining usage allowance was insufficient.
    ///
    /// Distinguished from generic failures; does not abort sibling
    /// operations in the same day.
    #[error("quota exceeded during {operation}")]
    QuotaExceeded {
        /// The operation that hit the quota (e.g. "recipe_detail").
        operation: String,
    },

    /// A week's generation stream failed. Aborts only that week;
    /// already-completed weeks remain intact.
    #[error("week {week} stream failed: {message}")]
    Stream {
        /// The 1-based week number.
        week: u32,
        /// Description of the failure.
        message: String,
    },

    /// A single meal's detail or image call failed.
    ///
    /// Leaves that meal unenriched; never fails the day or the run.
    #[error("enrichment failed for meal {meal_id}: {message}")]
    Enrichment {
        /// The meal whose enrichment failed.
        meal_id: Uuid,
        /// Description of the failure.
        message: String,
    },

    /// A checkpoint or final save failed. Retryable; in-memory state is
    /// left unchanged.
    #[error("persistence failed after {weeks_saved} week(s): {message}")]
    Persistence {
        /// Description of the failure.
        message: String,
        /// How many weeks were persisted before the failure (no rollback).
        weeks_saved: u32,
    },

    /// Cooperative cancellation was observed.
    #[error("run cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlanError {
    /// Creates an invalid-configuration error.
    #[must_use]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Creates a quota-exceeded error for the named operation.
    #[must_use]
    pub fn quota_exceeded(operation: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            operation: operation.into(),
        }
    }

    /// Creates a stream error for the given week.
    #[must_use]
    pub fn stream(week: u32, message: impl Into<String>) -> Self {
        Self::Stream {
            week,
            message: message.into(),
        }
    }

    /// Creates an enrichment error for the given meal.
    #[must_use]
    pub fn enrichment(meal_id: Uuid, message: impl Into<String>) -> Self {
        Self::Enrichment {
            meal_id,
            message: message.into(),
        }
    }

    /// Creates a persistence error.
    #[must_use]
    pub fn persistence(message: impl Into<String>, weeks_saved: u32) -> Self {
        Self::Persistence {
            message: message.into(),
            weeks_saved,
        }
    }

    /// Returns true if this error terminates the run.
    ///
    /// Only configuration errors and week stream failures are fatal;
    /// everything else is absorbed or retryable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::Stream { .. } | Self::Cancelled(_)
        )
    }

    /// Returns true if this error is quota exhaustion.
    #[must_use]
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }

    /// Returns true if the operation may be retried without losing state.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_is_distinguished() {
        let err = PlanError::quota_exceeded("recipe_detail");
        assert!(err.is_quota());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("recipe_detail"));
    }

    #[test]
    fn test_stream_error_is_fatal() {
        let err = PlanError::stream(2, "connection reset");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("week 2"));
    }

    #[test]
    fn test_enrichment_error_is_absorbed() {
        let err = PlanError::enrichment(Uuid::new_v4(), "timeout");
        assert!(!err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_persistence_error_is_retryable() {
        let err = PlanError::persistence("insert failed", 1);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("1 week(s)"));
    }
}
