//! Error taxonomy shared by the header model, parser, and serializer.
//!
//! Per the design of this crate, all fallible operations other than "not
//! enough bytes yet" (which is a normal `Progress::NeedMore` return, not an
//! `Err`) resolve to one of the closed set of kinds below. Equality of the
//! kind is always sufficient to decide how to react; the optional `context`
//! string exists purely for diagnostics (log lines, `Display`), never for
//! control flow.

use std::fmt;

/// A closed taxonomy of everything that can go wrong in this crate.
///
/// Need-more is deliberately absent here; it is represented by
/// `Progress::NeedMore`, a normal return rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request-line or status-line did not match the grammar.
    BadStartLine,
    /// `HTTP-version` was not `HTTP/1.0` or `HTTP/1.1`.
    BadVersion,
    /// A header field did not match `field-name ":" OWS field-value OWS`.
    BadField,
    /// obs-fold appeared where it is not permitted (e.g. at the very start
    /// of a field value, with nothing preceding it on the same field).
    BadObsFold,
    /// A chunk-size line or trailer was malformed.
    BadChunk,
    /// A chunk extension was malformed.
    BadChunkExtension,
    /// `Content-Length` was non-numeric, had leading/trailing junk, appeared
    /// more than once with different values, or overflowed `2^63 - 1`.
    BadContentLength,
    /// `Transfer-Encoding` named an unknown coding, or `chunked` did not
    /// appear last.
    BadTransferEncoding,
    /// The header block (or a single field row) exceeded the configured
    /// size limit, or the field count exceeded its limit.
    HeaderLimit,
    /// The body exceeded a caller-configured ceiling.
    BodyLimit,
    /// A body was present where the framing forbids one (e.g.
    /// `Content-Length: 0` followed by body bytes), or the stream ended
    /// before a framed body finished.
    UnexpectedBody,
    /// The connection closed (or `commit_eof` arrived) before the body
    /// completed.
    EndOfStream,
    /// A content/transfer coding filter reported a decode or encode error.
    BadFilter,
    /// A body source produced more or fewer bytes than the declared
    /// `Content-Length` framing requires.
    BodyTooLong,
    BodyTooShort,
    /// The caller violated a documented precondition (e.g. `commit()` past
    /// the end of the region returned by `prepare()`). These are
    /// programmer errors, not wire errors.
    InvalidArgument,
    /// A mutation would overflow the 16-bit offset table or the 64 KiB
    /// header size limit.
    LengthError,
}

impl ErrorKind {
    /// Whether this kind leaves the owning state machine in a terminal
    /// error state (everything except the argument-precondition kind,
    /// which is a programmer error the caller is expected to have avoided).
    pub fn is_fatal(self) -> bool {
        true
    }
}

/// An error carrying an [`ErrorKind`] plus an optional static diagnostic
/// string. The string is never consulted by this crate's own logic; callers
/// should match on `kind()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    context: Option<&'static str>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context(kind: ErrorKind, context: &'static str) -> Self {
        Self {
            kind,
            context: Some(context),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn context(&self) -> Option<&'static str> {
        self.context
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.context {
            Some(c) => write!(f, "{:?}: {}", self.kind, c),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

macro_rules! kind_ctor {
    ($name:ident, $kind:ident) => {
        pub(crate) fn $name(context: &'static str) -> Error {
            Error::with_context(ErrorKind::$kind, context)
        }
    };
}

kind_ctor!(bad_start_line, BadStartLine);
kind_ctor!(bad_version, BadVersion);
kind_ctor!(bad_field, BadField);
kind_ctor!(bad_obs_fold, BadObsFold);
kind_ctor!(bad_chunk, BadChunk);
kind_ctor!(bad_chunk_extension, BadChunkExtension);
kind_ctor!(bad_content_length, BadContentLength);
kind_ctor!(bad_transfer_encoding, BadTransferEncoding);
kind_ctor!(header_limit, HeaderLimit);
kind_ctor!(body_limit, BodyLimit);
kind_ctor!(unexpected_body, UnexpectedBody);
kind_ctor!(end_of_stream, EndOfStream);
kind_ctor!(bad_filter, BadFilter);
kind_ctor!(body_too_long, BodyTooLong);
kind_ctor!(body_too_short, BodyTooShort);
kind_ctor!(invalid_argument, InvalidArgument);
kind_ctor!(length_error, LengthError);
