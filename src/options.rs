//! Request-shaping options shared by every request of a dispatch run.
//!
//! [`Options`] is a plain value. A [`Dispatcher`](crate::Dispatcher) owns one,
//! and each run works on a snapshot taken when the run starts, so replacing
//! the options later never affects requests already queued.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default HTTP method.
pub const DEFAULT_METHOD: &str = "GET";

/// Default exchange timeout (60 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Errors raised when options cannot drive a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    /// Concurrency below one would leave the queue without consumers.
    #[error("invalid concurrency value {value}: must be at least {MIN_CONCURRENCY}")]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Options controlling how each request of a run is built and exchanged.
///
/// Header precedence: `user_agent` and `cookie` are applied first, then the
/// `headers` map, so an entry like `User-Agent` in `headers` wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// HTTP method, validated when each request is built.
    pub method: String,
    /// Extra request headers, applied after the identity headers.
    pub headers: BTreeMap<String, String>,
    /// Request body sent with every request.
    pub body: Vec<u8>,
    /// `User-Agent` value; empty means unset.
    pub user_agent: String,
    /// `Cookie` value; empty means unset.
    pub cookie: String,
    /// Exchange timeout enforced by the transport; zero means no timeout.
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// Whether the transport follows 30x responses.
    pub follow_redirects: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            method: DEFAULT_METHOD.to_string(),
            headers: BTreeMap::new(),
            body: Vec::new(),
            user_agent: String::new(),
            cookie: String::new(),
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            follow_redirects: false,
        }
    }
}

impl Options {
    /// Creates options with documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Adds or replaces one header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the `User-Agent` identity header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the `Cookie` identity header.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = cookie.into();
        self
    }

    /// Sets the exchange timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the redirect policy.
    #[must_use]
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Parses options from a JSON document. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the document is malformed.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Checks the values a run cannot start without.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::InvalidConcurrency`] for a worker count below
    /// one.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.concurrency < MIN_CONCURRENCY {
            return Err(OptionsError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
