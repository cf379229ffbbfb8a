//! Default transport on top of a pooled `reqwest` client.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Proxy};
use tracing::{debug, instrument};

use super::{PreparedRequest, Transport, TransportError, TransportResponse};

/// Maximum redirect hops followed when redirects are enabled.
pub const MAX_REDIRECTS: usize = 10;

/// Default TCP connect timeout (30 seconds).
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Transport backed by `reqwest`.
///
/// Redirect policy in `reqwest` is fixed per client, so this holds two
/// clients sharing the same settings: one that stops at the first 30x
/// and one that follows up to [`MAX_REDIRECTS`] hops. The request's
/// `follow_redirects` flag picks between them. Both clients are cheap
/// to clone and pool their connections.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use virgo_core::{Dispatcher, Options, ReqwestTransport};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = ReqwestTransport::builder()
///     .proxy("http://127.0.0.1:3128")
///     .build()?;
/// let dispatcher = Dispatcher::with_transport(Options::default(), Arc::new(transport));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    direct: Client,
    following: Client,
}

impl ReqwestTransport {
    /// Creates a transport with default settings.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    /// Starts a builder for a customized transport.
    #[must_use]
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    fn client_for(&self, follow_redirects: bool) -> &Client {
        if follow_redirects {
            &self.following
        } else {
            &self.direct
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(
        level = "debug",
        skip(self, request),
        fields(method = %request.method, url = %request.url)
    )]
    async fn execute(&self, request: PreparedRequest) -> Result<TransportResponse, TransportError> {
        let PreparedRequest {
            method,
            url,
            headers,
            body,
            timeout,
            follow_redirects,
        } = request;

        let mut builder = self
            .client_for(follow_redirects)
            .request(method, url)
            .headers(headers)
            .body(body);
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().clone();
        debug!(status = status.as_u16(), final_url = %final_url, "received response head");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from_reqwest))
            .boxed();

        Ok(TransportResponse {
            status,
            headers,
            final_url,
            body,
        })
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct ReqwestTransportBuilder {
    connect_timeout: Duration,
    proxy: Option<String>,
    gzip: bool,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            proxy: None,
            gzip: true,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Sets the TCP connect timeout. The whole-exchange timeout comes from each request.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Routes all traffic through the given proxy URL.
    #[must_use]
    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy = Some(proxy_url.into());
        self
    }

    /// Enables or disables transparent gzip decompression.
    #[must_use]
    pub fn gzip(mut self, enabled: bool) -> Self {
        self.gzip = enabled;
        self
    }

    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error when the proxy URL is invalid or the
    /// client cannot be built.
    pub fn build(self) -> Result<ReqwestTransport, reqwest::Error> {
        let direct = self.client_builder()?.redirect(Policy::none()).build()?;
        let following = self
            .client_builder()?
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()?;
        debug!(
            connect_timeout_ms = self.connect_timeout.as_millis(),
            proxy = self.proxy.is_some(),
            "built reqwest transport"
        );
        Ok(ReqwestTransport { direct, following })
    }

    fn client_builder(&self) -> Result<ClientBuilder, reqwest::Error> {
        let mut builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .gzip(self.gzip);
        if let Some(proxy_url) = &self.proxy {
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }
        Ok(builder)
    }
}
