//! Turns one descriptor into a network exchange and a buffered outcome.

use futures_util::StreamExt;
use reqwest::Method;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, instrument};
use url::Url;

use super::{FetchError, FetchResult, FetchedResponse, RequestDescriptor};
use crate::options::{DEFAULT_METHOD, Options};
use crate::transport::{PreparedRequest, Transport, TransportResponse};

/// Upper bound for the body buffer preallocated from `Content-Length`.
const MAX_PREALLOCATED_BODY: usize = 1 << 20;

/// Executes one request and always yields a result for its URL.
#[instrument(
    level = "debug",
    skip(transport, descriptor, options),
    fields(url = %descriptor.url())
)]
pub(crate) async fn execute(
    transport: &dyn Transport,
    descriptor: &RequestDescriptor,
    options: &Options,
) -> FetchResult {
    match fetch(transport, descriptor, options).await {
        Ok(response) => {
            debug!(
                status = response.status.as_u16(),
                bytes = response.body.len(),
                "request completed"
            );
            FetchResult::success(descriptor.url(), response)
        }
        Err(error) => {
            debug!(error = %error, "request failed");
            FetchResult::failure(descriptor.url(), error)
        }
    }
}

async fn fetch(
    transport: &dyn Transport,
    descriptor: &RequestDescriptor,
    options: &Options,
) -> Result<FetchedResponse, FetchError> {
    let request = prepare(descriptor, options)?;
    let url = descriptor.url();

    let TransportResponse {
        status,
        headers,
        final_url,
        mut body,
    } = transport
        .execute(request)
        .await
        .map_err(|source| FetchError::transport(url, source))?;

    // Drain the whole body before the response is dropped so the connection
    // goes back to the pool.
    let mut buffer = Vec::with_capacity(content_length_hint(&headers));
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|source| FetchError::body(url, status, source))?;
        buffer.extend_from_slice(&chunk);
    }

    Ok(FetchedResponse {
        status,
        headers,
        final_url,
        body: buffer,
    })
}

/// Builds the wire request for a descriptor.
///
/// Headers are set in descriptor order with replace semantics, so a
/// configured header overrides an identity header of the same name.
pub(crate) fn prepare(
    descriptor: &RequestDescriptor,
    options: &Options,
) -> Result<PreparedRequest, FetchError> {
    let raw_url = descriptor.url();
    let url = parse_target(raw_url)?;
    let method = parse_method(raw_url, descriptor.method())?;

    let mut headers = HeaderMap::with_capacity(descriptor.headers().len());
    for (name, value) in descriptor.headers() {
        let header_name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| FetchError::invalid_header(raw_url, name.as_str()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| FetchError::invalid_header(raw_url, name.as_str()))?;
        headers.insert(header_name, header_value);
    }

    Ok(PreparedRequest {
        method,
        url,
        headers,
        body: descriptor.body().to_vec(),
        timeout: options.timeout,
        follow_redirects: options.follow_redirects,
    })
}

fn parse_target(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|e| FetchError::invalid_url(raw, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::invalid_url(
            raw,
            format!("unsupported scheme {other:?}"),
        )),
    }
}

fn parse_method(url: &str, raw: &str) -> Result<Method, FetchError> {
    let raw = if raw.is_empty() { DEFAULT_METHOD } else { raw };
    Method::from_bytes(raw.as_bytes()).map_err(|_| FetchError::invalid_method(url, raw))
}

fn content_length_hint(headers: &HeaderMap) -> usize {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .map_or(0, |len| len.min(MAX_PREALLOCATED_BODY))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;
    use reqwest::StatusCode;
    use reqwest::header::{COOKIE, USER_AGENT};

    use super::*;
    use crate::transport::TransportError;

    /// Replies with a fixed status and body chunks, remembering the last request.
    #[derive(Debug)]
    struct ScriptedTransport {
        status: StatusCode,
        chunks: Vec<Result<&'static [u8], &'static str>>,
        seen: Mutex<Option<PreparedRequest>>,
    }

    impl ScriptedTransport {
        fn new(status: u16, chunks: Vec<Result<&'static [u8], &'static str>>) -> Self {
            Self {
                status: StatusCode::from_u16(status).unwrap(),
                chunks,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(
            &self,
            request: PreparedRequest,
        ) -> Result<TransportResponse, TransportError> {
            let final_url = request.url.clone();
            *self.seen.lock().unwrap() = Some(request);
            let chunks: Vec<Result<Bytes, TransportError>> = self
                .chunks
                .iter()
                .map(|chunk| match chunk {
                    Ok(bytes) => Ok(Bytes::from_static(*bytes)),
                    Err(msg) => Err(TransportError::other(*msg)),
                })
                .collect();
            Ok(TransportResponse {
                status: self.status,
                headers: HeaderMap::new(),
                final_url,
                body: stream::iter(chunks).boxed(),
            })
        }
    }

    #[derive(Debug)]
    struct FailingTransport(fn() -> TransportError);

    #[async_trait]
    impl Transport for FailingTransport {
        async fn execute(&self, _: PreparedRequest) -> Result<TransportResponse, TransportError> {
            Err((self.0)())
        }
    }

    fn prepare_for(url: &str, options: &Options) -> Result<PreparedRequest, FetchError> {
        prepare(&RequestDescriptor::new(url, options), options)
    }

    async fn execute_for(transport: &dyn Transport, url: &str, options: &Options) -> FetchResult {
        execute(transport, &RequestDescriptor::new(url, options), options).await
    }

    #[test]
    fn test_prepare_applies_configured_header_after_identity() {
        let options = Options::new()
            .with_user_agent("")
            .with_cookie("a=1")
            .with_header("User-Agent", "Custom-Agent/1.0")
            .with_header("cookie", "b=2");
        let request = prepare_for("https://example.com/", &options).unwrap();

        assert_eq!(request.headers.get(USER_AGENT).unwrap(), "Custom-Agent/1.0");
        assert_eq!(request.headers.get_all(COOKIE).iter().count(), 1);
        assert_eq!(request.headers.get(COOKIE).unwrap(), "b=2");
    }

    #[test]
    fn test_prepare_carries_run_policy() {
        let options = Options::new()
            .with_method("POST")
            .with_body("x=1")
            .with_timeout(Duration::from_millis(250))
            .with_follow_redirects(true);
        let request = prepare_for("http://example.com/form", &options).unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, b"x=1");
        assert_eq!(request.timeout, Duration::from_millis(250));
        assert!(request.follow_redirects);
        assert_eq!(request.url.as_str(), "http://example.com/form");
    }

    #[test]
    fn test_prepare_empty_method_defaults_to_get() {
        let options = Options::new().with_method("");
        let request = prepare_for("https://example.com", &options).unwrap();
        assert_eq!(request.method, Method::GET);
    }

    #[test]
    fn test_prepare_rejects_malformed_url() {
        let options = Options::default();
        let error = prepare_for("not a url", &options).unwrap_err();
        assert!(matches!(error, FetchError::InvalidUrl { ref url, .. } if url == "not a url"));
    }

    #[test]
    fn test_prepare_rejects_unsupported_scheme() {
        let options = Options::default();
        let error = prepare_for("ftp://example.com/file", &options).unwrap_err();
        assert!(error.to_string().contains("unsupported scheme"), "{error}");
    }

    #[test]
    fn test_prepare_rejects_malformed_method() {
        let options = Options::new().with_method("GE T");
        let error = prepare_for("https://example.com", &options).unwrap_err();
        assert!(matches!(
            error,
            FetchError::InvalidMethod { ref method, .. } if method == "GE T"
        ));
    }

    #[test]
    fn test_prepare_rejects_malformed_header() {
        let options = Options::new().with_header("Bad Header", "v");
        let error = prepare_for("https://example.com", &options).unwrap_err();
        assert!(matches!(
            error,
            FetchError::InvalidHeader { ref name, .. } if name == "Bad Header"
        ));

        let options = Options::new().with_header("X-Ok", "line\nbreak");
        let error = prepare_for("https://example.com", &options).unwrap_err();
        assert!(matches!(error, FetchError::InvalidHeader { .. }));
    }

    #[tokio::test]
    async fn test_execute_buffers_all_chunks() {
        let transport = ScriptedTransport::new(200, vec![Ok(&b"hello "[..]), Ok(&b"world"[..])]);
        let options = Options::default();
        let result = execute_for(&transport, "https://example.com/", &options).await;

        let response = result.response().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, b"hello world");
        assert_eq!(result.url, "https://example.com/");
    }

    #[tokio::test]
    async fn test_execute_reports_non_success_status_as_response() {
        let transport = ScriptedTransport::new(404, vec![Ok(&b"missing"[..])]);
        let options = Options::default();
        let result = execute_for(&transport, "https://example.com/x", &options).await;

        assert!(result.is_success());
        assert_eq!(result.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_execute_body_failure_keeps_status() {
        let transport =
            ScriptedTransport::new(200, vec![Ok(&b"part"[..]), Err("reset by peer")]);
        let options = Options::default();
        let result = execute_for(&transport, "https://example.com/", &options).await;

        let error = result.error().unwrap();
        assert!(matches!(error, FetchError::Body { status, .. } if *status == StatusCode::OK));
        assert!(error.to_string().contains("reset by peer"));
    }

    #[tokio::test]
    async fn test_execute_construction_error_skips_transport() {
        let transport = ScriptedTransport::new(200, vec![]);
        let options = Options::default();
        let result = execute_for(&transport, "::", &options).await;

        assert!(result.error().unwrap().is_construction());
        assert!(transport.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_execute_transport_failures_are_isolated() {
        let options = Options::default();

        let transport = FailingTransport(|| TransportError::Timeout);
        let result = execute_for(&transport, "https://slow.test/", &options).await;
        assert!(matches!(result.error(), Some(FetchError::Timeout { .. })));

        let transport = FailingTransport(|| TransportError::connect("connection refused"));
        let result = execute_for(&transport, "https://down.test/", &options).await;
        assert!(matches!(result.error(), Some(FetchError::Transport { .. })));
    }

    #[test]
    fn test_content_length_hint_is_capped() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length_hint(&headers), 0);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("42"));
        assert_eq!(content_length_hint(&headers), 42);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("99999999999"));
        assert_eq!(content_length_hint(&headers), MAX_PREALLOCATED_BODY);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("junk"));
        assert_eq!(content_length_hint(&headers), 0);
    }
}
