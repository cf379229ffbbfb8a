//! Transport capability performing the network exchange for one request.
//!
//! The dispatcher never talks to an HTTP client directly. It hands a fully
//! formed [`PreparedRequest`] to a [`Transport`] and gets back the response
//! head plus a body stream, which the executor buffers.
//!
//! # Architecture
//!
//! - [`Transport`] - Async trait the dispatcher calls for every request
//! - [`ReqwestTransport`] - Default implementation on a pooled `reqwest` client
//! - [`TransportError`] - Exchange failures (timeout, connect, redirect, other)
//!
//! Timeout and redirect policy travel with each [`PreparedRequest`] so a
//! transport enforces the same values for every request of a run.

mod client;
mod error;

pub use client::{MAX_REDIRECTS, ReqwestTransport, ReqwestTransportBuilder};
pub use error::{BoxError, TransportError};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use url::Url;

/// Response body as a stream of chunks.
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// A request ready to go on the wire, plus the exchange policy of its run.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// Request method.
    pub method: Method,
    /// Parsed target URL.
    pub url: Url,
    /// Final header set, identity headers already merged.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Vec<u8>,
    /// Timeout for the whole exchange. Zero disables it.
    pub timeout: Duration,
    /// Whether 30x responses are followed.
    pub follow_redirects: bool,
}

/// Response head and unread body returned by a transport.
pub struct TransportResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// URL that produced this response (differs from the request URL after redirects).
    pub final_url: Url,
    /// Body chunks, not yet read.
    pub body: BodyStream,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("final_url", &self.final_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Capability that executes one HTTP exchange.
///
/// Implementations must honor `timeout` (zero meaning unlimited) and
/// `follow_redirects` on the request. When redirects are not followed, a
/// 30x response is returned as a normal response.
///
/// # Object Safety
///
/// This trait uses `async_trait` so the dispatcher can hold an
/// `Arc<dyn Transport>` and have it replaced between runs.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends the request and returns the response head with its body stream.
    async fn execute(&self, request: PreparedRequest) -> Result<TransportResponse, TransportError>;
}
