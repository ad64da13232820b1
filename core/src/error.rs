//! Error types for the request dispatcher.
//!
//! # Design
//! Only pre-transmission problems are errors: a config that cannot become a
//! valid descriptor, or a URL the chosen transport refuses to open. A
//! completed exchange with a non-200 status is *not* an error — it is the
//! `on_error` callback branch, a normal outcome the caller classifies.

use std::fmt;

/// Errors raised while constructing a request or opening its transport.
#[derive(Debug)]
pub enum RequestError {
    /// The configuration had no `url`.
    MissingUrl,

    /// The configured method is not one of the eight recognized verbs.
    InvalidMethod(String),

    /// The configured content kind is neither `URLENCODED` nor `JSON`.
    InvalidContentType(String),

    /// The transport rejected the request before transmission started.
    Transport(TransportError),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::MissingUrl => write!(f, "a request requires a url"),
            RequestError::InvalidMethod(raw) => {
                write!(f, "invalid request method: {raw:?}")
            }
            RequestError::InvalidContentType(raw) => {
                write!(f, "invalid content kind: {raw:?}")
            }
            RequestError::Transport(e) => write!(f, "transport refused request: {e}"),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

/// Failures a concrete transport reports from `open`, before anything has
/// been written to the network. These surface synchronously out of `send`.
#[derive(Debug)]
pub enum TransportError {
    /// The URL could not be parsed.
    BadUrl(String),

    /// The URL parsed but this transport cannot speak to it, e.g. an https
    /// target handed to the plain-socket fallback.
    UnsupportedScheme(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::BadUrl(msg) => write!(f, "bad url: {msg}"),
            TransportError::UnsupportedScheme(scheme) => {
                write!(f, "unsupported scheme: {scheme}")
            }
        }
    }
}

impl std::error::Error for TransportError {}
