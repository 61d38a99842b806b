//! Error taxonomy for the advisor pipeline.
//!
//! Only `Validation` is fatal for a request. Every other kind is absorbed at
//! the stage boundary: the stage settles as `Error`/`Fallback`, the run
//! continues with degraded confidence, and the caller still receives a report.

use thiserror::Error;

use crate::stage::StageName;

/// A type alias for Result with the error type defaulting to `AdvisorError`.
pub type Result<T, E = AdvisorError> = std::result::Result<T, E>;

/// All error kinds the pipeline can surface.
#[derive(Debug, Clone, Error)]
pub enum AdvisorError {
    /// Structurally invalid request input. Fatal, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// The client exhausted its token bucket. Fatal for this request only.
    #[error("rate limit exceeded for client '{client_id}'")]
    RateLimitExceeded {
        /// The rejected client identity.
        client_id: String,
        /// Seconds until a token is refilled.
        retry_after_secs: u64,
    },

    /// A dependency did not answer within the stage budget. Recoverable.
    #[error("dependency '{dependency}' timed out after {waited_ms}ms")]
    DependencyTimeout { dependency: String, waited_ms: u64 },

    /// The circuit breaker guarding a dependency is open. Recoverable via
    /// the caller-supplied fallback.
    #[error("circuit open for dependency '{dependency}'")]
    CircuitOpen { dependency: String },

    /// A dependency is unreachable or unconfigured. Recoverable.
    #[error("dependency '{dependency}' unavailable: {reason}")]
    DependencyUnavailable { dependency: String, reason: String },

    /// A stage failed internally; captured, logged, run continues.
    #[error("stage '{stage}' failed: {reason}")]
    Stage { stage: StageName, reason: String },

    /// Anything unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AdvisorError {
    /// HTTP status the ingress boundary maps this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            AdvisorError::Validation(_) => 400,
            AdvisorError::RateLimitExceeded { .. } => 429,
            AdvisorError::CircuitOpen { .. } | AdvisorError::DependencyUnavailable { .. } => 503,
            AdvisorError::DependencyTimeout { .. } => 504,
            AdvisorError::Stage { .. } | AdvisorError::Internal(_) => 500,
        }
    }

    /// True for errors that must abort the request instead of degrading it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AdvisorError::Validation(_) | AdvisorError::RateLimitExceeded { .. }
        )
    }
}
