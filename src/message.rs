//! Start-line types shared by the header model, parser, and serializer:
//! [`Version`], [`Method`], [`RequestLine`], and [`StatusLine`].
//!
//! `Method` is a closed enum plus `TryFrom<&[u8]>`; `RequestLine`/
//! `StatusLine` are thin value types over the header's canonical fields,
//! using this crate's closed `ErrorKind` taxonomy instead of `&'static str`
//! errors.

use std::convert::TryFrom;

use crate::error::{self, Result};

/// `HTTP-version`, restricted to the two versions this crate's scope covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Version::Http10 => b"HTTP/1.0",
            Version::Http11 => b"HTTP/1.1",
        }
    }
}

/// The HTTP request method. Extension methods (any token not in the
/// well-known set) are preserved verbatim rather than rejected, since
/// RFC 7230 defines `method = token` with no closed registry; only the
/// common methods get a dedicated variant, with an `Other` escape hatch
/// for the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
    Other(Vec<u8>),
}

impl Method {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Method::Get => b"GET",
            Method::Head => b"HEAD",
            Method::Post => b"POST",
            Method::Put => b"PUT",
            Method::Delete => b"DELETE",
            Method::Connect => b"CONNECT",
            Method::Options => b"OPTIONS",
            Method::Trace => b"TRACE",
            Method::Patch => b"PATCH",
            Method::Other(bytes) => bytes,
        }
    }

    /// Whether a response to a request with this method never carries a
    /// body, per RFC 7230 Section 3.3.
    pub fn response_never_has_body(&self) -> bool {
        matches!(self, Method::Head)
    }
}

impl TryFrom<&[u8]> for Method {
    type Error = crate::error::Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        if !crate::ascii::is_valid_token(value) {
            return Err(error::bad_start_line("method is not a valid token"));
        }
        Ok(match value {
            b"GET" => Method::Get,
            b"HEAD" => Method::Head,
            b"POST" => Method::Post,
            b"PUT" => Method::Put,
            b"DELETE" => Method::Delete,
            b"CONNECT" => Method::Connect,
            b"OPTIONS" => Method::Options,
            b"TRACE" => Method::Trace,
            b"PATCH" => Method::Patch,
            other => Method::Other(other.to_vec()),
        })
    }
}

/// A request-line's parsed parts: `method SP request-target SP
/// HTTP-version`. The target is kept opaque; no URL parsing happens here.
#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: Method,
    pub target: Vec<u8>,
    pub version: Version,
}

/// A status-line's parsed parts: `HTTP-version SP 3DIGIT SP reason-phrase`.
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub version: Version,
    pub status: u16,
    pub reason: Vec<u8>,
}

/// A start-line is either a request-line or a status-line, never both.
#[derive(Debug, Clone)]
pub enum StartLine {
    Request(RequestLine),
    Status(StatusLine),
}

impl StartLine {
    pub fn version(&self) -> Version {
        match self {
            StartLine::Request(r) => r.version,
            StartLine::Status(s) => s.version,
        }
    }
}

/// Whether a response to the given request method and status code is
/// required by RFC 7230 Section 3.3 to have no body, independent of any
/// framing header present. The caller informs the parser of the request
/// method up front, which is why the response parser takes an explicit
/// `Option<Method>` hint rather than inferring it.
pub fn response_has_no_body(method: Option<&Method>, status: u16) -> bool {
    if let Some(m) = method {
        if m.response_never_has_body() {
            return true;
        }
    }
    matches!(status, 100..=199 | 204 | 304)
}
