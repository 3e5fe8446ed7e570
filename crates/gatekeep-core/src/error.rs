//! Shared error types across gatekeep crates.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed config.
    BadRequest,
    /// Referenced object does not exist.
    NotFound,
    /// A binding references a policy that cannot be evaluated.
    Configuration,
    /// Orchestration bug (e.g. missing results).
    Invariant,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::Configuration => "CONFIGURATION",
            ClientCode::Invariant => "INVARIANT",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, GatekeepError>;

/// Unified error type used by core and engine.
///
/// None of these variants ever stands for "access denied": a denied decision is
/// a failing `PolicyResult`, not an error.
#[derive(Debug, Error)]
pub enum GatekeepError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("cache: {0}")]
    Cache(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl GatekeepError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            GatekeepError::BadRequest(_) => ClientCode::BadRequest,
            GatekeepError::NotFound(_) => ClientCode::NotFound,
            GatekeepError::Configuration(_) => ClientCode::Configuration,
            GatekeepError::Invariant(_) => ClientCode::Invariant,
            GatekeepError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            GatekeepError::Cache(_) | GatekeepError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Fatal errors abort an evaluation and must be surfaced as a system error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatekeepError::Configuration(_) | GatekeepError::Invariant(_)
        )
    }
}

/// Recoverable predicate failure (missing input, upstream miss, ...).
///
/// The worker turns this into a failing result instead of crashing the
/// evaluation. When an inner cause is attached, its text is what ends up in the
/// result messages.
#[derive(Debug, Error)]
pub struct PolicyException {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl PolicyException {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error; the cause's text becomes the reported message.
    pub fn with_cause<E>(cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: cause.to_string(),
            source: Some(Box::new(cause)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

impl fmt::Display for PolicyException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(cause) => write!(f, "{cause}"),
            None => f.write_str(&self.message),
        }
    }
}
