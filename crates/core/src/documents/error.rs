//! Error types for the document services.

use thiserror::Error;

/// Errors from the token, listing and content services.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Credentials were rejected (token service or bearer token).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Non-success HTTP status without a SOAP fault.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The service answered with a SOAP fault.
    #[error("SOAP fault: {0}")]
    Fault(String),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Connection or transport failure.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Response could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DocumentError {
    /// Whether the failure is an authentication problem rather than missing data.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<reqwest::Error> for DocumentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DocumentError::Timeout
        } else if e.is_connect() {
            DocumentError::Connection(e.to_string())
        } else {
            DocumentError::InvalidResponse(e.to_string())
        }
    }
}
