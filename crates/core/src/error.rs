//! Unified error taxonomy (§7).
//!
//! Mirrors the teacher's `StrataError` in shape — one variant per
//! taxonomy entry, `thiserror`-derived `Display`, and small
//! classification helpers for callers that want to branch on category
//! rather than match every variant — but scoped to exactly the kinds
//! §7 defines. `StaleVersion` is intentionally absent here: it is
//! internal to the Writer and never surfaced across the public API
//! boundary (§7, §4.5).

use thiserror::Error;

/// Result alias used throughout the `tagengine-*` crates.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// The unified error type for all tag-engine operations (§7).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed request — e.g. a missing workspace. Unknown tag names
    /// are *not* `InvalidQuery`; see §4.4 step 1 and boundary B2/B3.
    #[error("invalid query: {reason}")]
    InvalidQuery {
        /// Human-readable description of what was malformed.
        reason: String,
    },

    /// The workspace or a referenced card external id does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// Description of what was not found.
        what: String,
    },

    /// Caller-initiated cancellation.
    #[error("query cancelled")]
    Cancelled,

    /// The query's deadline was exceeded before completion.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Store or cache I/O failure; transient, safe to retry.
    #[error("unavailable: {reason}")]
    Unavailable {
        /// Description of the transient failure.
        reason: String,
    },

    /// Detected inconsistency in persisted state. Non-retryable; the
    /// affected workspace refuses further writes until `rebuild-index`
    /// completes (§6, §7).
    #[error("corrupt state: {reason}")]
    Corrupt {
        /// Description of the detected inconsistency.
        reason: String,
    },
}

impl EngineError {
    /// Shorthand constructor for [`EngineError::InvalidQuery`].
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        EngineError::InvalidQuery {
            reason: reason.into(),
        }
    }

    /// Shorthand constructor for [`EngineError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        EngineError::NotFound { what: what.into() }
    }

    /// Shorthand constructor for [`EngineError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        EngineError::Unavailable {
            reason: reason.into(),
        }
    }

    /// Shorthand constructor for [`EngineError::Corrupt`].
    pub fn corrupt(reason: impl Into<String>) -> Self {
        EngineError::Corrupt {
            reason: reason.into(),
        }
    }

    /// Safe to retry without caller intervention (§7 propagation
    /// policy: bounded retries with jitter, `Unavailable` only).
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Unavailable { .. })
    }

    /// Caller-driven termination that must never reach the result
    /// cache (§4.4, §5).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EngineError::Cancelled | EngineError::DeadlineExceeded)
    }

    /// Serious, non-retryable corruption that should halt writes to the
    /// affected workspace until a rebuild.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, EngineError::Corrupt { .. })
    }
}
