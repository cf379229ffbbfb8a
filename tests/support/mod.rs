//! Shared helpers for integration tests: mock server startup and stub transports.

#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use tokio::sync::mpsc;
use virgo_core::{FetchResult, PreparedRequest, Transport, TransportError, TransportResponse};
use wiremock::MockServer;

/// Set to `1` to fail instead of skip when localhost sockets are unavailable.
const REQUIRE_SOCKETS_ENV: &str = "VIRGO_REQUIRE_SOCKET_TESTS";

/// Starts a wiremock server, or returns `None` when the sandbox forbids
/// binding localhost so the calling test can return early.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return Some(MockServer::start().await);
    }

    let required = std::env::var(REQUIRE_SOCKETS_ENV)
        .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true"));
    assert!(!required, "cannot bind a localhost socket and {REQUIRE_SOCKETS_ENV} is set");

    eprintln!("[mock-server] localhost sockets unavailable; skipping test");
    None
}

/// Sleeps for a fixed delay per request and tracks how many run at once.
///
/// Responds 200 with the request path as body.
#[derive(Debug)]
pub struct DelayTransport {
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl DelayTransport {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Transport for DelayTransport {
    async fn execute(&self, request: PreparedRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.url.to_string());

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let body = Bytes::from(request.url.path().to_string());
        Ok(TransportResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            final_url: request.url,
            body: stream::iter([Ok(body)]).boxed(),
        })
    }
}

/// Counts invocations and fails every request with a connect error.
#[derive(Debug, Default)]
pub struct RefusingTransport {
    calls: AtomicUsize,
}

impl RefusingTransport {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RefusingTransport {
    async fn execute(
        &self,
        _request: PreparedRequest,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::connect("connection refused"))
    }
}

/// Drains a result receiver until the channel closes.
pub async fn collect_results(mut receiver: mpsc::Receiver<FetchResult>) -> Vec<FetchResult> {
    let mut results = Vec::new();
    while let Some(result) = receiver.recv().await {
        results.push(result);
    }
    results
}
