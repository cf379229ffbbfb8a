//! Bounded-concurrency dispatch of HTTP requests.
//!
//! This module turns a list of URLs into a stream of per-URL results using a
//! fixed pool of workers sharing one request queue.
//!
//! # Guarantees
//!
//! - Every submitted URL (duplicates included) yields exactly one [`FetchResult`]
//! - Per-URL failures are reported as data; only invalid [`Options`](crate::Options)
//!   abort a run, and they do so before any request is sent
//! - The result stream ends only after every worker has stopped
//! - Results arrive in completion order

mod engine;
mod error;
mod executor;
mod request;
mod result;

pub use engine::{DispatchStats, Dispatcher, ResultStream};
pub use error::{DispatchError, FetchError};
pub use request::RequestDescriptor;
pub use result::{FetchResult, FetchedResponse};
