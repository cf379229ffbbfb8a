//! Virgo Core Library
//!
//! This library fetches many URLs with one shared request configuration,
//! running a fixed number of requests at a time and reporting one result per
//! URL as soon as it completes.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`options`] - Request-shaping options and their validation
//! - [`transport`] - Transport capability and the default `reqwest` implementation
//! - [`dispatch`] - Worker pool, request execution and result types

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dispatch;
pub mod options;
pub mod transport;

// Re-export commonly used types
pub use dispatch::{
    DispatchError, DispatchStats, Dispatcher, FetchError, FetchResult, FetchedResponse,
    RequestDescriptor, ResultStream,
};
pub use options::{DEFAULT_CONCURRENCY, DEFAULT_METHOD, DEFAULT_TIMEOUT, Options, OptionsError};
pub use transport::{
    BodyStream, PreparedRequest, ReqwestTransport, ReqwestTransportBuilder, Transport,
    TransportError, TransportResponse,
};
