//! Error type for transport exchanges.

use thiserror::Error;

/// Boxed error source carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures while exchanging a request with the remote end.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The exchange exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// DNS resolution, TCP connect or TLS handshake failed.
    #[error("connection failed: {0}")]
    Connect(#[source] BoxError),

    /// The redirect chain could not be followed.
    #[error("redirect failed: {0}")]
    Redirect(#[source] BoxError),

    /// Any other exchange failure.
    #[error("{0}")]
    Other(#[source] BoxError),
}

impl TransportError {
    /// Creates a connect error from any source.
    pub fn connect(source: impl Into<BoxError>) -> Self {
        Self::Connect(source.into())
    }

    /// Creates a catch-all error from any source.
    pub fn other(source: impl Into<BoxError>) -> Self {
        Self::Other(source.into())
    }

    /// Classifies a reqwest error.
    #[must_use]
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect(Box::new(error))
        } else if error.is_redirect() {
            Self::Redirect(Box::new(error))
        } else {
            Self::Other(Box::new(error))
        }
    }

    /// Returns true for timeouts.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
