//! Per-URL outcomes emitted on the result stream.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use url::Url;

use super::FetchError;

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// Response status. 30x is reported as-is when redirects are not followed.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// URL that produced the response.
    pub final_url: Url,
    /// Complete response body.
    pub body: Vec<u8>,
}

impl FetchedResponse {
    /// Returns true when `final_url` differs from the submitted URL.
    #[must_use]
    pub fn redirected(&self, requested: &str) -> bool {
        !Url::parse(requested).is_ok_and(|requested| requested == self.final_url)
    }
}

/// Outcome of one submitted URL: a response or an error, never both.
#[derive(Debug)]
pub struct FetchResult {
    /// URL exactly as submitted.
    pub url: String,
    /// Success with a buffered response, or the failure for this URL.
    pub outcome: Result<FetchedResponse, FetchError>,
}

impl FetchResult {
    /// Creates a result from an outcome.
    pub fn new(url: impl Into<String>, outcome: Result<FetchedResponse, FetchError>) -> Self {
        Self {
            url: url.into(),
            outcome,
        }
    }

    /// Creates a successful result.
    pub fn success(url: impl Into<String>, response: FetchedResponse) -> Self {
        Self::new(url, Ok(response))
    }

    /// Creates a failed result.
    pub fn failure(url: impl Into<String>, error: FetchError) -> Self {
        Self::new(url, Err(error))
    }

    /// Returns true if a response was received and fully read.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Returns the response on success.
    #[must_use]
    pub fn response(&self) -> Option<&FetchedResponse> {
        self.outcome.as_ref().ok()
    }

    /// Returns the error on failure.
    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        self.outcome.as_ref().err()
    }

    /// Status of the response, or of the failed body read when one was received.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match &self.outcome {
            Ok(response) => Some(response.status),
            Err(error) => error.status(),
        }
    }

    /// Consumes the result, returning its outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] recorded for this URL.
    pub fn into_outcome(self) -> Result<FetchedResponse, FetchError> {
        self.outcome
    }
}
