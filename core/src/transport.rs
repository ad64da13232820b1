//! Transport seam between the request descriptor and the network.
//!
//! # Design
//! Mirrors the platform split the dispatcher has to live with: a modern
//! primitive with the full interface (custom headers, deadline) and a
//! narrower legacy fallback. [`Capabilities::detect`] probes once per send
//! and [`acquire_transport`] picks one of exactly two implementations;
//! everything above this module sees only the [`Transport`] trait, so tests
//! substitute scripted implementations for the network.
//!
//! A failed connection is not an `Err` from `send` — it completes with
//! `status: None`, the status-0 terminal state, and classifies as the
//! caller's error branch. Only `open` returns errors, and those surface
//! synchronously before transmission.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, trace};
use ureq::http::Uri;

use crate::error::TransportError;
use crate::http::{Method, ReadyState, TransportState};

/// Terminal outcome of a blocking transmit.
#[derive(Debug)]
pub enum SendOutcome {
    /// The transport reached its terminal ready state. `status` is `None`
    /// when the connection itself failed.
    Completed(TransportState),

    /// The configured deadline elapsed before completion.
    TimedOut(TransportState),
}

/// The platform request primitive, reduced to the operations the
/// dispatcher needs.
///
/// Implemented by [`UreqTransport`], [`PlainTransport`], and scripted test
/// doubles. One transport serves one exchange; descriptors never share one.
pub trait Transport: Send {
    /// Parse and stage the target. Errors here surface synchronously from
    /// `Request::send`; nothing has touched the network yet.
    fn open(&mut self, method: Method, url: &str) -> Result<(), TransportError>;

    /// Deadline for the whole exchange. `None` leaves the platform default.
    fn set_timeout(&mut self, timeout: Option<Duration>);

    /// Stage a request header. The legacy transport ignores this.
    fn set_header(&mut self, name: &str, value: &str);

    /// Transmit `body` and block until a terminal outcome.
    fn send(&mut self, body: &str) -> SendOutcome;

    /// Current observable state.
    fn state(&self) -> TransportState;
}

/// What the platform offers, probed once per send.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// The full-interface transport is available.
    pub modern: bool,
}

impl Capabilities {
    /// Probe the platform. The modern transport is compiled in
    /// unconditionally, so this always reports it available; tests override
    /// the field to exercise the fallback selection.
    pub fn detect() -> Self {
        Capabilities { modern: true }
    }
}

/// Select one of the two concrete transports for this send.
pub fn acquire_transport(caps: Capabilities) -> Box<dyn Transport> {
    if caps.modern {
        trace!("transport: ureq");
        Box::new(UreqTransport::new())
    } else {
        trace!("transport: plain-socket fallback");
        Box::new(PlainTransport::new())
    }
}

fn done(status: Option<u16>, headers: Vec<(String, String)>, body: String) -> TransportState {
    TransportState {
        ready_state: ReadyState::Done,
        status,
        headers,
        body,
    }
}

/// Full-interface transport backed by a ureq agent: per-request headers
/// and a whole-exchange deadline.
pub struct UreqTransport {
    method: Method,
    uri: Option<Uri>,
    timeout: Option<Duration>,
    headers: Vec<(String, String)>,
    state: TransportState,
}

impl UreqTransport {
    pub fn new() -> Self {
        UreqTransport {
            method: Method::Get,
            uri: None,
            timeout: None,
            headers: Vec::new(),
            state: TransportState::opened(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn open(&mut self, method: Method, url: &str) -> Result<(), TransportError> {
        let uri: Uri = url
            .parse()
            .map_err(|e: ureq::http::uri::InvalidUri| TransportError::BadUrl(e.to_string()))?;
        self.method = method;
        self.uri = Some(uri);
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn send(&mut self, body: &str) -> SendOutcome {
        let Some(uri) = self.uri.clone() else {
            // open was never called; nothing to exchange.
            self.state = done(None, Vec::new(), String::new());
            return SendOutcome::Completed(self.state.clone());
        };

        // Statuses come back as data; the descriptor classifies them.
        let mut config = ureq::Agent::config_builder().http_status_as_error(false);
        if let Some(timeout) = self.timeout {
            config = config.timeout_global(Some(timeout));
        }
        let agent = config.build().new_agent();

        let mut builder = ureq::http::Request::builder().method(self.method.as_str()).uri(uri);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let request = match builder.body(body.as_bytes()) {
            Ok(request) => request,
            Err(e) => {
                debug!("request assembly failed: {e}");
                self.state = done(None, Vec::new(), String::new());
                return SendOutcome::Completed(self.state.clone());
            }
        };

        match agent.run(request) {
            Ok(mut response) => {
                let status = response.status().as_u16();
                let headers = response
                    .headers()
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.as_str().to_string(),
                            String::from_utf8_lossy(value.as_bytes()).into_owned(),
                        )
                    })
                    .collect();
                let body = response.body_mut().read_to_string().unwrap_or_default();
                self.state = done(Some(status), headers, body);
                SendOutcome::Completed(self.state.clone())
            }
            Err(e) if is_timeout(&e) => {
                debug!("request timed out: {e}");
                self.state = done(None, Vec::new(), String::new());
                SendOutcome::TimedOut(self.state.clone())
            }
            Err(e) => {
                debug!("transport failure: {e}");
                self.state = done(None, Vec::new(), String::new());
                SendOutcome::Completed(self.state.clone())
            }
        }
    }

    fn state(&self) -> TransportState {
        self.state.clone()
    }
}

fn is_timeout(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::Timeout(_) => true,
        ureq::Error::Io(io) => matches!(
            io.kind(),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        ),
        _ => false,
    }
}

/// Narrow fallback transport speaking HTTP/1.1 over a plain TCP socket.
///
/// Mirrors the legacy platform primitive: `set_header` is a no-op (no
/// custom header interface) and only plain `http` targets are accepted.
/// Deadlines map to socket connect/read/write timeouts.
pub struct PlainTransport {
    method: Method,
    target: Option<PlainTarget>,
    timeout: Option<Duration>,
    state: TransportState,
}

struct PlainTarget {
    host: String,
    port: u16,
    path: String,
}

impl PlainTransport {
    pub fn new() -> Self {
        PlainTransport {
            method: Method::Get,
            target: None,
            timeout: None,
            state: TransportState::opened(),
        }
    }

    fn exchange(&self, target: &PlainTarget, body: &str) -> io::Result<TransportState> {
        let mut stream = match self.timeout {
            Some(timeout) => {
                let addr = (target.host.as_str(), target.port)
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::NotFound, "host resolved to no address")
                    })?;
                TcpStream::connect_timeout(&addr, timeout)?
            }
            None => TcpStream::connect((target.host.as_str(), target.port))?,
        };
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;

        write!(
            stream,
            "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\nContent-Length: {}\r\n\r\n",
            self.method.as_str(),
            target.path,
            target.host,
            body.len()
        )?;
        stream.write_all(body.as_bytes())?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;

        let mut storage = [httparse::EMPTY_HEADER; 32];
        let mut parsed = httparse::Response::new(&mut storage);
        let consumed = match parsed.parse(&raw) {
            Ok(httparse::Status::Complete(n)) => n,
            Ok(httparse::Status::Partial) | Err(_) => {
                debug!("unparseable response head from {}", target.host);
                return Ok(done(None, Vec::new(), String::new()));
            }
        };

        let headers = parsed
            .headers
            .iter()
            .map(|h| {
                (
                    h.name.to_string(),
                    String::from_utf8_lossy(h.value).into_owned(),
                )
            })
            .collect();
        let body = String::from_utf8_lossy(&raw[consumed..]).into_owned();
        Ok(done(parsed.code, headers, body))
    }
}

impl Default for PlainTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for PlainTransport {
    fn open(&mut self, method: Method, url: &str) -> Result<(), TransportError> {
        let uri: Uri = url
            .parse()
            .map_err(|e: ureq::http::uri::InvalidUri| TransportError::BadUrl(e.to_string()))?;

        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(TransportError::UnsupportedScheme(other.to_string())),
            None => {
                return Err(TransportError::BadUrl(
                    "relative url has no host".to_string(),
                ))
            }
        }

        let host = uri
            .host()
            .ok_or_else(|| TransportError::BadUrl("missing host".to_string()))?
            .to_string();
        let port = uri.port_u16().unwrap_or(80);
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        self.method = method;
        self.target = Some(PlainTarget { host, port, path });
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn set_header(&mut self, _name: &str, _value: &str) {
        // Legacy primitive has no header interface.
    }

    fn send(&mut self, body: &str) -> SendOutcome {
        let Some(target) = self.target.take() else {
            self.state = done(None, Vec::new(), String::new());
            return SendOutcome::Completed(self.state.clone());
        };

        match self.exchange(&target, body) {
            Ok(state) => {
                self.state = state;
                SendOutcome::Completed(self.state.clone())
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                ) =>
            {
                debug!("plain transport timed out: {e}");
                self.state = done(None, Vec::new(), String::new());
                SendOutcome::TimedOut(self.state.clone())
            }
            Err(e) => {
                debug!("plain transport failure: {e}");
                self.state = done(None, Vec::new(), String::new());
                SendOutcome::Completed(self.state.clone())
            }
        }
    }

    fn state(&self) -> TransportState {
        self.state.clone()
    }
}
