//! HTTP transport surface
//!
//! Only what a connectivity probe needs: one GET, a status code and the body
//! bytes written into a caller-owned buffer.

use core::fmt;
use core::future::Future;

use embassy_time::Duration;

/// Outcome of a completed exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HttpResponse {
    pub status: u16,
    /// Bytes of body written into the caller's buffer
    pub body_len: usize,
}

impl HttpResponse {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport failures; HTTP status codes are not errors at this layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpError {
    /// No complete response within the timeout
    Timeout,
    /// DNS, socket or framing failure
    Transport,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "Request timeout"),
            Self::Transport => write!(f, "Transport error"),
        }
    }
}

impl core::error::Error for HttpError {}

pub trait HttpClient {
    /// Fetch `url`, writing the body into `body` (truncated to its length)
    fn get(
        &mut self,
        url: &str,
        timeout: Duration,
        body: &mut [u8],
    ) -> impl Future<Output = Result<HttpResponse, HttpError>>;
}

/// Scheme of a parsed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// `scheme://host[:port][/path]`, borrowed from the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpUrl<'a> {
    pub scheme: Scheme,
    pub host: &'a str,
    pub port: u16,
    /// Path and query, always starting with `/`
    pub path: &'a str,
}

impl<'a> HttpUrl<'a> {
    /// Split an absolute `http`/`https` URL; `None` for anything else
    pub fn parse(url: &'a str) -> Option<Self> {
        let (scheme, rest) = if let Some(rest) = url.strip_prefix("http://") {
            (Scheme::Http, rest)
        } else if let Some(rest) = url.strip_prefix("https://") {
            (Scheme::Https, rest)
        } else {
            return None;
        };

        let (authority, path) = match rest.find(['/', '?']) {
            Some(idx) if rest.as_bytes()[idx] == b'/' => (&rest[..idx], &rest[idx..]),
            Some(_) => return None,
            None => (rest, "/"),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().ok()?),
            None => (authority, scheme.default_port()),
        };
        if host.is_empty() {
            return None;
        }

        Some(Self {
            scheme,
            host,
            port,
            path,
        })
    }
}

/// Length of the response head including the blank line, once complete
pub fn head_len(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Status code from an `HTTP/1.x NNN reason` status line
pub fn parse_status_line(head: &[u8]) -> Option<u16> {
    let line_end = head.iter().position(|b| *b == b'\r')?;
    let line = core::str::from_utf8(&head[..line_end]).ok()?;
    let mut parts = line.splitn(3, ' ');
    if !parts.next()?.starts_with("HTTP/1.") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}
