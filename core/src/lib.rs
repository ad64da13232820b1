//! Declarative single-request HTTP dispatch with lifecycle callbacks.
//!
//! # Overview
//! One component: a request descriptor. A loosely-typed [`RequestConfig`]
//! goes in; construction merges defaults, validates the verb and content
//! kind, resolves an anti-forgery token, and appends the default headers.
//! [`Request::send`] hands the exchange to a worker thread and returns
//! immediately; the outcome comes back through five lifecycle callbacks
//! (start, success, error, timeout, finish).
//!
//! # Design
//! - [`Request`] is a value object created fresh per request; `send`
//!   consumes it, so a descriptor cannot be reused.
//! - The network sits behind the [`Transport`] trait with exactly two
//!   production implementations — a full-interface ureq transport and a
//!   narrow plain-socket fallback — chosen by a capability probe at send
//!   time. Tests swap in scripted transports through [`Request::send_on`].
//! - The ambient token lookup is an injected closure
//!   ([`Request::with_token_source`]), not a global.
//! - A completed non-200 exchange is the `on_error` branch, not an `Err`;
//!   only construction problems and transport `open` refusals are errors.

pub mod error;
pub mod http;
pub mod request;
pub mod transport;

pub use error::{RequestError, TransportError};
pub use http::{ContentKind, Method, ReadyState, TransportState};
pub use request::{data_to_urlencoded, Callback, InFlight, Request, RequestConfig};
pub use transport::{
    acquire_transport, Capabilities, PlainTransport, SendOutcome, Transport, UreqTransport,
};
