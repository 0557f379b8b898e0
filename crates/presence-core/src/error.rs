use thiserror::Error;

/// Boxed error from a store backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by session operations and store adapters.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Store unreachable, rejected write, or malformed response.
    #[error("persistence error: {0}")]
    Persistence(#[source] BoxError),
    /// The operation addressed a session the store does not know about.
    #[error("session not found: {0}")]
    NotFound(String),
    /// A session cannot be started without an identity key.
    #[error("actor email must not be empty")]
    InvalidActor,
}

impl SessionError {
    pub fn persistence(err: impl Into<BoxError>) -> Self {
        Self::Persistence(err.into())
    }
}
