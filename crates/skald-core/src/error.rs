use thiserror::Error;

/// Error taxonomy for the digest core.
///
/// Only `Cancelled` may abort a run. Everything else is recovered at the
/// point it occurs: collaborator failures substitute empty results,
/// malformed records are skipped, corrupt stores reinitialize empty, and
/// invariant violations are rejected where they happen.
#[derive(Debug, Error)]
pub enum SkaldError {
    /// An external collaborator (extraction, delivery) failed or timed out.
    #[error("collaborator unavailable ({which}): {detail}")]
    CollaboratorUnavailable { which: String, detail: String },

    /// A message or event failed basic shape validation.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A persisted store was unreadable or unparseable.
    #[error("state corruption in {store}: {detail}")]
    StateCorruption { store: String, detail: String },

    /// An operation would violate a store invariant (e.g. a backward
    /// blocker status transition).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The run was cancelled by the caller.
    #[error("run cancelled")]
    Cancelled,
}

impl SkaldError {
    /// Timeout/failure of a named collaborator call.
    pub fn collaborator(which: impl Into<String>, detail: impl Into<String>) -> Self {
        SkaldError::CollaboratorUnavailable {
            which: which.into(),
            detail: detail.into(),
        }
    }
}
