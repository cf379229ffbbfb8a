//! Immutable per-URL request descriptors.

use std::sync::Arc;

use reqwest::header::{COOKIE, USER_AGENT};

use crate::options::Options;

/// One unit of work: a target URL plus the shared request shape of its run.
///
/// The method, body and header list are snapshotted from [`Options`] when the
/// descriptor is built and shared between all descriptors of a batch. Fields
/// are private; a descriptor never changes after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    url: String,
    method: Arc<str>,
    body: Arc<[u8]>,
    headers: Arc<[(String, String)]>,
}

impl RequestDescriptor {
    /// Builds a descriptor for one URL.
    #[must_use]
    pub fn new(url: impl Into<String>, options: &Options) -> Self {
        Shape::from_options(options).descriptor(url.into())
    }

    /// Builds one descriptor per URL, preserving order and duplicates.
    ///
    /// All descriptors share a single snapshot of the options.
    #[must_use]
    pub fn batch<I>(urls: I, options: &Options) -> Vec<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let shape = Shape::from_options(options);
        urls.into_iter()
            .map(|url| shape.descriptor(url.into()))
            .collect()
    }

    /// Target URL as submitted.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP method as configured.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Headers in application order. Later entries override earlier ones
    /// with the same (case-insensitive) name.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

struct Shape {
    method: Arc<str>,
    body: Arc<[u8]>,
    headers: Arc<[(String, String)]>,
}

impl Shape {
    fn from_options(options: &Options) -> Self {
        let mut headers = Vec::with_capacity(options.headers.len() + 2);
        if !options.user_agent.is_empty() {
            headers.push((USER_AGENT.as_str().to_string(), options.user_agent.clone()));
        }
        if !options.cookie.is_empty() {
            headers.push((COOKIE.as_str().to_string(), options.cookie.clone()));
        }
        headers.extend(
            options
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );

        Self {
            method: Arc::from(options.method.as_str()),
            body: Arc::from(options.body.as_slice()),
            headers: Arc::from(headers),
        }
    }

    fn descriptor(&self, url: String) -> RequestDescriptor {
        RequestDescriptor {
            url,
            method: Arc::clone(&self.method),
            body: Arc::clone(&self.body),
            headers: Arc::clone(&self.headers),
        }
    }
}
