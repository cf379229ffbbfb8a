//! Error types for the dispatch module.
//!
//! [`FetchError`] is per-URL data carried inside a [`FetchResult`](super::FetchResult);
//! it never aborts a run. [`DispatchError`] is the only error that crosses the
//! dispatch boundary.

use reqwest::StatusCode;
use thiserror::Error;

use crate::options::OptionsError;
use crate::transport::TransportError;

/// Failure of one request. Isolated to the URL it belongs to.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The submitted URL could not be parsed or uses an unsupported scheme.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The URL as submitted.
        url: String,
        /// Why the URL was rejected.
        reason: String,
    },

    /// The configured method is not a valid HTTP token.
    #[error("invalid HTTP method {method:?} for {url}")]
    InvalidMethod {
        /// The URL the request was built for.
        url: String,
        /// The rejected method.
        method: String,
    },

    /// A configured header name or value is not valid on the wire.
    #[error("invalid header {name:?} for {url}")]
    InvalidHeader {
        /// The URL the request was built for.
        url: String,
        /// The rejected header name.
        name: String,
    },

    /// The exchange exceeded the run's timeout before a response head arrived.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// DNS, connect, TLS, redirect or other exchange failure.
    #[error("transport error fetching {url}: {source}")]
    Transport {
        /// The URL that failed.
        url: String,
        /// The underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// The response head arrived but reading the body failed.
    #[error("error reading body of {url} (HTTP {status}): {source}")]
    Body {
        /// The URL whose body failed.
        url: String,
        /// Status of the response whose body failed.
        status: StatusCode,
        /// The underlying read failure.
        #[source]
        source: TransportError,
    },

    /// The request was abandoned because executing it panicked.
    #[error("request for {url} aborted unexpectedly")]
    Aborted {
        /// The URL whose request was abandoned.
        url: String,
    },
}

impl FetchError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid method error.
    pub fn invalid_method(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self::InvalidMethod {
            url: url.into(),
            method: method.into(),
        }
    }

    /// Creates an invalid header error.
    pub fn invalid_header(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self::InvalidHeader {
            url: url.into(),
            name: name.into(),
        }
    }

    /// Wraps a transport failure, promoting timeouts to [`FetchError::Timeout`].
    pub fn transport(url: impl Into<String>, source: TransportError) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Transport { url, source }
        }
    }

    /// Creates a body read error for a response with the given status.
    pub fn body(url: impl Into<String>, status: StatusCode, source: TransportError) -> Self {
        Self::Body {
            url: url.into(),
            status,
            source,
        }
    }

    /// Creates an aborted-request error.
    pub fn aborted(url: impl Into<String>) -> Self {
        Self::Aborted { url: url.into() }
    }

    /// Status of the response, if one was received before the failure.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Body { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for errors raised before any network activity.
    #[must_use]
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. } | Self::InvalidMethod { .. } | Self::InvalidHeader { .. }
        )
    }
}

/// Errors that stop a run from starting.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The options cannot drive a run (e.g. concurrency below one).
    #[error("invalid options: {0}")]
    Options(#[from] OptionsError),

    /// The default transport could not be created.
    #[error("failed to initialize HTTP transport: {0}")]
    TransportInit(#[source] reqwest::Error),

    /// The background run could not be joined.
    #[error("dispatch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
