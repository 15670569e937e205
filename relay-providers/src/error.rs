use thiserror::Error;

/// Errors that can be returned by a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status and a (possibly
    /// generic) error message extracted from its body.
    #[error("provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (DNS, TLS, connect, timeout, ...).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success response was missing an expected field or had an unexpected shape.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Status code reported by the provider, if the failure came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
