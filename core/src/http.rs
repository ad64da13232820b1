//! Plain-data HTTP vocabulary shared by the descriptor and the transports.
//!
//! # Design
//! `Method` and `ContentKind` are parsed from the loosely-typed
//! configuration strings rather than coerced, so a misconfigured request is
//! reported as a named construction error instead of silently mutating into
//! something else. `TransportState` is the snapshot handed to lifecycle
//! callbacks; it uses owned fields so it can be cloned freely across the
//! worker-thread boundary.

/// HTTP verb for a request. The set is fixed; anything outside it is
/// rejected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Head,
    Delete,
    Options,
    Trace,
    Connect,
}

impl Method {
    /// Parse an uppercase verb string. Returns `None` for anything outside
    /// the recognized set, lowercase spellings included.
    pub fn parse(s: &str) -> Option<Method> {
        match s {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "HEAD" => Some(Method::Head),
            "DELETE" => Some(Method::Delete),
            "OPTIONS" => Some(Method::Options),
            "TRACE" => Some(Method::Trace),
            "CONNECT" => Some(Method::Connect),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Head => "HEAD",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
        }
    }
}

/// Payload encoding strategy. Governs both the serialized body and the
/// `Content-Type` default header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    UrlEncoded,
    Json,
}

impl ContentKind {
    /// Parse the configuration spelling: `URLENCODED` or `JSON`.
    pub fn parse(s: &str) -> Option<ContentKind> {
        match s {
            "URLENCODED" => Some(ContentKind::UrlEncoded),
            "JSON" => Some(ContentKind::Json),
            _ => None,
        }
    }

    /// The `Content-Type` header value for this kind.
    pub fn content_type(self) -> &'static str {
        match self {
            ContentKind::UrlEncoded => "application/x-www-form-urlencoded",
            ContentKind::Json => "application/json",
        }
    }
}

/// Readiness of the underlying transport as seen by callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Opened but not yet transmitted; what `on_start` observes.
    Opened,
    /// Terminal: the exchange completed or gave up.
    Done,
}

/// Snapshot of the transport handed to lifecycle callbacks.
///
/// `status` stays `None` until the transport completes, and remains `None`
/// when the connection itself fails — the status-0 terminal state of the
/// platform primitive.
#[derive(Debug, Clone)]
pub struct TransportState {
    pub ready_state: ReadyState,
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl TransportState {
    /// The pre-transmission state.
    pub fn opened() -> Self {
        TransportState {
            ready_state: ReadyState::Opened,
            status: None,
            headers: Vec::new(),
            body: String::new(),
        }
    }
}
