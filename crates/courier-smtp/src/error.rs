//! Error types for session and transport operations.

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Session and transport error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No host configured for the session.
    #[error("Cannot find valid hostname for mail session")]
    MissingHostName,

    /// Configuration value could not be used.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Invalid envelope address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Envelope cannot be delivered (e.g. no recipients).
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Failure reported by the SMTP client or server.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Message refused by a non-network transport.
    #[error("Message rejected: {0}")]
    Rejected(String),
}

impl Error {
    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Smtp(e) if e.is_permanent())
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Smtp(e) if e.is_transient())
    }
}
