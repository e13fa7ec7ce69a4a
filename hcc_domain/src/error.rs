//! # Domain Error Taxonomy
//!
//! A single error enum spans the crate. Infrastructure adapters wrap their
//! underlying library errors into this enum at the boundary via `From`
//! conversions; application and domain code never matches on a third-party
//! error type directly.
//!
//! The taxonomy mirrors the error handling design: transient infrastructure
//! failures, oracle (LLM) failures, input validation failures, business rule
//! failures, and fatal per-document failures. `is_recoverable` and
//! `is_oracle_failure` let the stage runner decide ack-vs-fail behavior
//! without matching on variants at every call site.

/// Errors that can occur anywhere in the HCC extraction pipeline.
#[derive(Debug, thiserror::Error)]
pub enum HccError {
    /// The document registry rejected or could not service an operation.
    #[error("registry error: {0}")]
    Registry(String),

    /// No document exists for the given id.
    #[error("document not found: {0}")]
    NotFound(uuid::Uuid),

    /// A uniqueness constraint was violated (e.g. duplicate storage path).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The artifact store could not store or retrieve bytes.
    #[error("artifact store error: {0}")]
    ArtifactStore(String),

    /// The requested artifact does not exist in the store.
    #[error("artifact not found: {kind}/{path}")]
    ArtifactNotFound { kind: String, path: String },

    /// The message bus could not publish or consume a message.
    #[error("message bus error: {0}")]
    MessageBus(String),

    /// The LLM call failed, timed out, or returned unparseable output.
    /// This is never fatal to a document; stages degrade to rule-based
    /// results and record the reason.
    #[error("llm failure: {0}")]
    LlmFailure(String),

    /// A message failed to parse, had the wrong `message_type`, or was
    /// missing a required field. The stage skeleton acks (drops) these.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A status transition was attempted that the state machine forbids.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Configuration was missing or malformed at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Catch-all for I/O errors surfaced while reading local files
    /// (reference CSV, local artifact backend).
    #[error("io error: {0}")]
    Io(String),

    /// JSON (de)serialization failed outside the tolerant LLM parser.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl HccError {
    /// Transient infrastructure errors are retryable by the caller (the
    /// broker's redelivery, or an operator rerunning a batch); they are not
    /// reasons to mark a document Failed by themselves. Stage handlers still
    /// choose to surface them as a Failed document per the fatal-per-document
    /// policy in the error handling design, but this flag lets callers decide
    /// whether a bare retry might succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HccError::Registry(_) | HccError::ArtifactStore(_) | HccError::MessageBus(_) | HccError::Io(_)
        )
    }

    /// True for failures attributable to the LLM oracle, which must never
    /// fail a document outright.
    pub fn is_oracle_failure(&self) -> bool {
        matches!(self, HccError::LlmFailure(_))
    }

    /// True for errors that should be logged and the message dropped
    /// (acked) rather than causing any registry mutation.
    pub fn is_input_validation(&self) -> bool {
        matches!(self, HccError::InvalidMessage(_))
    }
}

impl From<std::io::Error> for HccError {
    fn from(err: std::io::Error) -> Self {
        HccError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for HccError {
    fn from(err: serde_json::Error) -> Self {
        HccError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HccError>;
