//! Dispatcher owning the worker pool for one batch of URLs.
//!
//! # Run lifecycle
//!
//! 1. One [`RequestDescriptor`] per URL is pushed into a bounded queue whose
//!    capacity equals the URL count, so filling it never waits.
//! 2. Exactly `concurrency` workers are spawned. Each pulls descriptors until
//!    the queue is closed and empty, executes them and publishes a
//!    [`FetchResult`] per descriptor.
//! 3. The queue is closed for writing.
//! 4. All workers are joined.
//! 5. The result sink is dropped, which closes the stream for the consumer.
//!
//! # Example
//!
//! ```no_run
//! use virgo_core::{Dispatcher, Options};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::new(Options::default().with_concurrency(4))?;
//! let mut results = dispatcher.start(["https://example.com/", "https://example.org/"])?;
//! while let Some(result) = results.recv().await {
//!     match result.response() {
//!         Some(response) => println!("{} {}", response.status, result.url),
//!         None => println!("failed {}", result.url),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{FutureExt, Stream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::executor;
use super::{DispatchError, FetchError, FetchResult, RequestDescriptor};
use crate::options::Options;
use crate::transport::{ReqwestTransport, Transport};

/// Counts from a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    succeeded: usize,
    failed: usize,
}

impl DispatchStats {
    /// Returns the number of URLs that produced a fully read response.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Returns the number of URLs that produced an error.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Returns the number of results produced (succeeded + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Shared counters updated by workers during a run.
#[derive(Debug, Default)]
struct RunCounters {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl RunCounters {
    fn record(&self, result: &FetchResult) {
        if result.is_success() {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// Executes batches of URLs with a fixed-size worker pool.
///
/// A dispatcher owns its [`Options`] and [`Transport`]; independent
/// dispatchers share nothing. Each run snapshots both when it starts, so the
/// mutators only affect runs started afterwards. The mutators take
/// `&mut self`, which rules out changes while a borrowed [`dispatch`] call
/// is in progress.
///
/// [`dispatch`]: Dispatcher::dispatch
#[derive(Debug, Clone)]
pub struct Dispatcher {
    options: Arc<Options>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    /// Creates a dispatcher using the default [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::TransportInit`] if the HTTP client cannot be built.
    #[instrument(level = "debug", skip(options))]
    pub fn new(options: Options) -> Result<Self, DispatchError> {
        let transport = ReqwestTransport::new().map_err(DispatchError::TransportInit)?;
        Ok(Self::with_transport(options, Arc::new(transport)))
    }

    /// Creates a dispatcher with a caller-supplied transport.
    #[must_use]
    pub fn with_transport(options: Options, transport: Arc<dyn Transport>) -> Self {
        Self {
            options: Arc::new(options),
            transport,
        }
    }

    /// Returns the active options.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the active transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Replaces the options wholesale.
    pub fn set_options(&mut self, options: Options) {
        self.options = Arc::new(options);
    }

    /// Replaces only the timeout, leaving every other option untouched.
    pub fn set_timeout(&mut self, timeout: Duration) {
        Arc::make_mut(&mut self.options).timeout = timeout;
    }

    /// Replaces the transport wholesale (e.g. one routed through a proxy).
    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = transport;
    }

    /// Executes one request per URL and writes each result to `sink`.
    ///
    /// Returns once every result has been published and all workers have
    /// stopped. `sink` is dropped on return; if the caller kept no other
    /// sender, the receiving side then observes end-of-stream.
    ///
    /// Results arrive in completion order, not submission order. If the
    /// receiver is dropped early, remaining requests still run and their
    /// results are discarded. Size `sink` to the URL count to keep workers
    /// from waiting on a slow consumer.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Options`] before any network activity when
    /// the options are invalid. Per-URL failures are never returned here;
    /// they arrive as [`FetchResult`]s.
    #[instrument(skip(self, urls, sink), fields(concurrency = self.options.concurrency))]
    pub async fn dispatch<I>(
        &self,
        urls: I,
        sink: mpsc::Sender<FetchResult>,
    ) -> Result<DispatchStats, DispatchError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.options.validate()?;
        let descriptors = RequestDescriptor::batch(urls, &self.options);
        run(
            Arc::clone(&self.options),
            Arc::clone(&self.transport),
            descriptors,
            sink,
        )
        .await
    }

    /// Starts a run in the background and returns its result stream.
    ///
    /// The stream's capacity equals the URL count, so workers never wait on
    /// the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Options`] synchronously when the options are
    /// invalid; nothing is spawned in that case.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[instrument(skip(self, urls), fields(concurrency = self.options.concurrency))]
    pub fn start<I>(&self, urls: I) -> Result<ResultStream, DispatchError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.options.validate()?;
        let descriptors = RequestDescriptor::batch(urls, &self.options);
        let (sink, receiver) = mpsc::channel(descriptors.len().max(1));
        let handle = tokio::spawn(run(
            Arc::clone(&self.options),
            Arc::clone(&self.transport),
            descriptors,
            sink,
        ));
        Ok(ResultStream { receiver, handle })
    }
}

async fn run(
    options: Arc<Options>,
    transport: Arc<dyn Transport>,
    descriptors: Vec<RequestDescriptor>,
    sink: mpsc::Sender<FetchResult>,
) -> Result<DispatchStats, DispatchError> {
    let submitted = descriptors.len();
    if submitted == 0 {
        debug!("no URLs submitted; closing result stream");
        return Ok(DispatchStats::default());
    }

    let workers = options.concurrency.min(submitted);
    info!(urls = submitted, workers, "starting dispatch");
    let counters = Arc::new(RunCounters::default());
    let (producer, queue) = produce_requests(descriptors, &sink, &counters).await;

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        handles.push(tokio::spawn(worker(
            worker_id,
            queue.clone(),
            sink.clone(),
            Arc::clone(&transport),
            Arc::clone(&options),
            Arc::clone(&counters),
        )));
    }
    drop(queue);

    // Closing before joining lets workers stop once the queue drains.
    producer.close();
    drop(producer);

    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "dispatch worker panicked");
        }
    }

    // Last sender goes away only after every worker has finished.
    drop(sink);

    let stats = counters.snapshot();
    info!(
        succeeded = stats.succeeded(),
        failed = stats.failed(),
        total = stats.total(),
        "dispatch complete"
    );
    Ok(stats)
}

/// Fills a queue sized to the batch with every descriptor.
///
/// A descriptor the queue refuses is answered with an aborted result so its
/// URL still yields exactly one result.
async fn produce_requests(
    descriptors: Vec<RequestDescriptor>,
    sink: &mpsc::Sender<FetchResult>,
    counters: &RunCounters,
) -> (
    async_channel::Sender<RequestDescriptor>,
    async_channel::Receiver<RequestDescriptor>,
) {
    let (producer, queue) = async_channel::bounded(descriptors.len());
    for descriptor in descriptors {
        if let Err(refused) = producer.try_send(descriptor) {
            let descriptor = refused.into_inner();
            warn!(url = %descriptor.url(), "request queue refused descriptor");
            let result =
                FetchResult::failure(descriptor.url(), FetchError::aborted(descriptor.url()));
            counters.record(&result);
            if sink.send(result).await.is_err() {
                debug!("result receiver dropped; discarding result");
            }
        }
    }
    (producer, queue)
}

async fn worker(
    worker_id: usize,
    queue: async_channel::Receiver<RequestDescriptor>,
    sink: mpsc::Sender<FetchResult>,
    transport: Arc<dyn Transport>,
    options: Arc<Options>,
    counters: Arc<RunCounters>,
) {
    debug!(worker_id, "worker started");

    while let Ok(descriptor) = queue.recv().await {
        let result = AssertUnwindSafe(executor::execute(
            transport.as_ref(),
            &descriptor,
            &options,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            warn!(worker_id, url = %descriptor.url(), "request execution panicked");
            FetchResult::failure(descriptor.url(), FetchError::aborted(descriptor.url()))
        });

        counters.record(&result);
        if sink.send(result).await.is_err() {
            debug!(
                worker_id,
                url = %descriptor.url(),
                "result receiver dropped; discarding result"
            );
        }
    }

    debug!(worker_id, "queue drained; worker stopping");
}

/// Stream of results from a run started with [`Dispatcher::start`].
///
/// Yields exactly one [`FetchResult`] per submitted URL, then ends.
#[derive(Debug)]
pub struct ResultStream {
    receiver: mpsc::Receiver<FetchResult>,
    handle: JoinHandle<Result<DispatchStats, DispatchError>>,
}

impl ResultStream {
    /// Receives the next result, or `None` once the run has finished.
    pub async fn recv(&mut self) -> Option<FetchResult> {
        self.receiver.recv().await
    }

    /// Waits for the run to finish and returns its counts.
    ///
    /// Results not yet received are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Join`] if the background run panicked.
    pub async fn finish(self) -> Result<DispatchStats, DispatchError> {
        drop(self.receiver);
        self.handle.await?
    }
}

impl Stream for ResultStream {
    type Item = FetchResult;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}
