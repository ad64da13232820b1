//! The request descriptor: declarative configuration in, one dispatched
//! HTTP request out, outcome reported through lifecycle callbacks.
//!
//! # Design
//! A [`Request`] is fully configured at construction: defaults merged, the
//! loosely-typed method and content-kind strings validated, the
//! anti-forgery token resolved once, the two default headers appended.
//! Construction touches no network. [`Request::send`] consumes the
//! descriptor (send-at-most-once is a move, not a convention), hands the
//! blocking exchange to a worker thread, and returns immediately; the
//! caller observes the outcome only through the five callbacks.
//!
//! The ambient token lookup is an injected closure rather than a global, so
//! construction is testable without any page-like environment around it.

use std::fmt;
use std::thread;
use std::time::Duration;

use log::debug;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

use crate::error::RequestError;
use crate::http::{ContentKind, Method, TransportState};
use crate::transport::{acquire_transport, Capabilities, SendOutcome, Transport};

/// Lifecycle callback. Receives the transport state as of the moment the
/// hook fires.
pub type Callback = Box<dyn FnMut(&TransportState) + Send>;

/// Loosely-typed request description. Everything except `url` is optional.
///
/// `method` and `kind` stay strings here so that a bad spelling is reported
/// as a named construction error rather than failing to represent at all.
#[derive(Default)]
pub struct RequestConfig {
    /// Target address. Required.
    pub url: Option<String>,

    /// HTTP verb, uppercase. Defaults to GET.
    pub method: Option<String>,

    /// Request payload, iterated in insertion order.
    pub data: Map<String, Value>,

    /// Payload encoding: `URLENCODED` (default) or `JSON`.
    pub kind: Option<String>,

    /// Anti-forgery token. When set, the ambient token source is not
    /// consulted.
    pub token: Option<String>,

    /// Caller headers, applied to the transport before the default headers.
    pub headers: Vec<(String, String)>,

    /// Whole-exchange deadline in milliseconds. 0 means none.
    pub timeout_ms: u64,

    pub on_start: Option<Callback>,
    pub on_success: Option<Callback>,
    pub on_error: Option<Callback>,
    pub on_timeout: Option<Callback>,
    pub on_finish: Option<Callback>,
}

/// A fully configured, not-yet-sent request.
///
/// Created fresh per request; sending consumes it. Absent callbacks have
/// already been resolved to no-ops.
pub struct Request {
    method: Method,
    url: String,
    data: Map<String, Value>,
    kind: ContentKind,
    token: Option<String>,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
    on_start: Callback,
    on_success: Callback,
    on_error: Callback,
    on_timeout: Callback,
    on_finish: Callback,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("data", &self.data)
            .field("kind", &self.kind)
            .field("token", &self.token)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn noop() -> Callback {
    Box::new(|_| {})
}

impl Request {
    /// Construct a descriptor with no ambient token source; only an
    /// explicit `config.token` yields a token header.
    pub fn new(config: RequestConfig) -> Result<Self, RequestError> {
        Self::with_token_source(config, || None)
    }

    /// Construct a descriptor, resolving a missing `config.token` through
    /// `source` exactly once.
    ///
    /// Validation order: url presence, then method, then content kind. The
    /// first failure halts construction; no partial descriptor escapes.
    pub fn with_token_source(
        config: RequestConfig,
        source: impl FnOnce() -> Option<String>,
    ) -> Result<Self, RequestError> {
        let url = config.url.ok_or(RequestError::MissingUrl)?;

        let method = match config.method {
            None => Method::Get,
            Some(raw) => match Method::parse(&raw) {
                Some(method) => method,
                None => return Err(RequestError::InvalidMethod(raw)),
            },
        };

        let kind = match config.kind {
            None => ContentKind::UrlEncoded,
            Some(raw) => match ContentKind::parse(&raw) {
                Some(kind) => kind,
                None => return Err(RequestError::InvalidContentType(raw)),
            },
        };

        let token = config.token.or_else(source);

        // Defaults go after the caller's headers: content type always, the
        // token header only when a token resolved.
        let mut headers = config.headers;
        headers.push(("Content-Type".to_string(), kind.content_type().to_string()));
        if let Some(token) = &token {
            headers.push(("X-CSRF-Token".to_string(), token.clone()));
        }

        let timeout = match config.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Ok(Request {
            method,
            url,
            data: config.data,
            kind,
            token,
            headers,
            timeout,
            on_start: config.on_start.unwrap_or_else(noop),
            on_success: config.on_success.unwrap_or_else(noop),
            on_error: config.on_error.unwrap_or_else(noop),
            on_timeout: config.on_timeout.unwrap_or_else(noop),
            on_finish: config.on_finish.unwrap_or_else(noop),
        })
    }

    /// Construct and immediately send. Equivalent to construct-then-send;
    /// the returned handle refers to the in-flight exchange.
    pub fn dispatch(config: RequestConfig) -> Result<InFlight, RequestError> {
        Request::new(config)?.send()
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Caller headers first, then the appended defaults.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Send on a transport chosen by capability probe. Returns as soon as
    /// the exchange is handed to its worker; the outcome arrives through
    /// the callbacks.
    pub fn send(self) -> Result<InFlight, RequestError> {
        self.send_on(acquire_transport(Capabilities::detect()))
    }

    /// Send on an explicit transport. This is the seam [`Request::send`]
    /// goes through; callers with their own [`Transport`] implementation
    /// use it directly.
    ///
    /// `open` failures (malformed URL, scheme the transport cannot speak)
    /// return synchronously from here and never reach `on_error`. After a
    /// successful open, `on_start` fires on the calling thread with the
    /// pre-send state, then the serialized payload is transmitted on the
    /// worker. Completion classifies by status — exactly 200 is
    /// `on_success`, everything else `on_error` — followed by `on_finish`,
    /// exactly once. A timeout is terminal: `on_timeout` fires and the
    /// success/error/finish hooks are suppressed.
    pub fn send_on(mut self, mut transport: Box<dyn Transport>) -> Result<InFlight, RequestError> {
        transport
            .open(self.method, &self.url)
            .map_err(RequestError::Transport)?;
        transport.set_timeout(self.timeout);
        for (name, value) in &self.headers {
            transport.set_header(name, value);
        }

        debug!("{} {} as {:?}", self.method.as_str(), self.url, self.kind);

        (self.on_start)(&transport.state());

        let body = self.serialize_data();
        let mut on_success = self.on_success;
        let mut on_error = self.on_error;
        let mut on_timeout = self.on_timeout;
        let mut on_finish = self.on_finish;

        let handle = thread::spawn(move || match transport.send(&body) {
            SendOutcome::Completed(state) => {
                if state.status == Some(200) {
                    on_success(&state);
                } else {
                    debug!("completed with status {:?}", state.status);
                    on_error(&state);
                }
                on_finish(&state);
            }
            SendOutcome::TimedOut(state) => {
                // Timeout is terminal; no classification, no finish.
                debug!("timed out");
                on_timeout(&state);
            }
        });

        Ok(InFlight { handle })
    }

    fn serialize_data(&self) -> String {
        match self.kind {
            ContentKind::Json => Value::Object(self.data.clone()).to_string(),
            ContentKind::UrlEncoded => data_to_urlencoded(&self.data),
        }
    }
}

/// `encodeURIComponent`'s escape set: everything except ASCII
/// alphanumerics and `- _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Serialize a data map as `key=value&…` pairs in insertion order. Values
/// are percent-encoded; keys are emitted as-is. An empty map yields an
/// empty string.
pub fn data_to_urlencoded(data: &Map<String, Value>) -> String {
    let mut pairs = Vec::with_capacity(data.len());
    for (key, value) in data {
        let text = value_text(value);
        let encoded = utf8_percent_encode(&text, COMPONENT).to_string();
        pairs.push(format!("{key}={encoded}"));
    }
    pairs.join("&")
}

/// String form of a payload value before percent-encoding. Strings
/// contribute their contents; other scalars and nested values use their
/// JSON text.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Handle to a dispatched request. The exchange runs on its own worker
/// thread; there is no cancellation, only the option to wait.
#[derive(Debug)]
pub struct InFlight {
    handle: thread::JoinHandle<()>,
}

impl InFlight {
    /// Block until the exchange and its callbacks have finished. A panic
    /// raised inside a callback resurfaces here.
    pub fn join(self) {
        if let Err(panic) = self.handle.join() {
            std::panic::resume_unwind(panic);
        }
    }
}
