//! Incremental request/response parser.
//!
//! One synchronous, sans-I/O state machine driven by repeated
//! `prepare`/`commit`/`parse` calls, the same shape `chunked.rs` already
//! uses for the body grammar.
//!
//! State machine: `Header -> Body -> Complete`. `Header` covers both the
//! start-line and the field block: a single `FlatBuffer` scan for the blank
//! line terminating the header section is simpler and no less correct than
//! tracking "have we seen the start-line yet" as a separate state, since
//! nothing observable happens until the whole block is available anyway.
//! `Body` dispatches to identity, chunked, or close-delimited (eof) framing
//! once `Header` resolves.

use std::convert::TryFrom;

use crate::ascii;
use crate::chunked::ChunkedDecoder;
use crate::error::{self, Error, ErrorKind, Result};
use crate::filter::FilterChain;
use crate::buffer::FlatBuffer;
use crate::grammar::{self, Cursor};
use crate::header::Header;
use crate::limits::Limits;
use crate::message::{response_has_no_body, Method};
use crate::source::{Sink, VecSink, WriteProgress};

/// What progressed on the last [`Parser::parse`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More bytes are needed before any further progress can be made.
    NeedMore,
    /// The start-line and header block finished; `header()` is now valid.
    HeaderReady,
    /// Some body bytes were delivered to the sink.
    BodyProgress { bytes: usize },
    /// The message (header and body) is fully parsed.
    Complete,
}

/// Which half of the start-line grammar to parse, and (for responses) the
/// caller-supplied request method, since a response's no-body rules depend
/// on it (see [`crate::message::response_has_no_body`]).
#[derive(Debug, Clone)]
pub enum Mode {
    Request,
    Response { request_method: Option<Method> },
}

enum BodyState {
    None,
    Identity(u64),
    Chunked(ChunkedDecoder),
    Eof,
}

enum State {
    Header,
    Body,
    Complete,
    Failed(Error),
}

enum SinkTarget {
    Default(VecSink),
    Custom(Box<dyn Sink>),
}

impl SinkTarget {
    fn as_sink_mut(&mut self) -> &mut dyn Sink {
        match self {
            SinkTarget::Default(s) => s,
            SinkTarget::Custom(s) => s.as_mut(),
        }
    }
}

/// An incremental HTTP/1.x request or response parser.
///
/// Input arrives through `prepare`/`commit` (and `commit_eof` once the
/// transport has closed); `parse()` is called repeatedly until it returns
/// `Progress::Complete`. Body bytes are delivered to an attached [`Sink`]
/// (see [`Parser::attach_sink`]); if none is attached, a [`VecSink`] is used
/// and its contents are reachable through [`Parser::default_sink_data`].
pub struct Parser {
    mode: Mode,
    limits: Limits,
    input: FlatBuffer,
    state: State,
    header: Option<Header>,
    body: BodyState,
    sink: SinkTarget,
    filter_chain: Option<FilterChain>,
    eof: bool,
}

impl Parser {
    pub fn new(mode: Mode, limits: Limits) -> Self {
        Parser {
            mode,
            limits,
            input: FlatBuffer::new(limits.parse_buffer_capacity as usize),
            state: State::Header,
            header: None,
            body: BodyState::None,
            sink: SinkTarget::Default(VecSink::new()),
            filter_chain: None,
            eof: false,
        }
    }

    /// Routes body bytes to `sink` instead of the default `VecSink`. Must be
    /// called before the header finishes parsing to take effect for this
    /// message.
    pub fn attach_sink(&mut self, sink: Box<dyn Sink>) {
        self.sink = SinkTarget::Custom(sink);
    }

    /// Installs a content/transfer-coding filter chain that decoded body
    /// bytes are passed through, innermost filter first, before reaching the
    /// sink.
    pub fn attach_filter_chain(&mut self, chain: FilterChain) {
        self.filter_chain = Some(chain);
    }

    /// The accumulated contents of the default sink, when no custom sink was
    /// attached for this message.
    pub fn default_sink_data(&self) -> Option<&[u8]> {
        match &self.sink {
            SinkTarget::Default(s) => Some(&s.data),
            SinkTarget::Custom(_) => None,
        }
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Writable tail space for the next read from the transport.
    pub fn prepare(&mut self, n: usize) -> Result<&mut [u8]> {
        self.input.prepare(n)
    }

    /// Marks `n` bytes of the region returned by `prepare` as read.
    pub fn commit(&mut self, n: usize) {
        self.input.commit(n);
    }

    /// Signals that the transport will deliver no further bytes.
    pub fn commit_eof(&mut self) {
        self.eof = true;
    }

    /// Returns to `Header` state for the next message on the same
    /// connection, retaining the input buffer's allocation. Any bytes
    /// already committed but not yet consumed (pipelined request/response
    /// data) remain available to the next message.
    pub fn reset(&mut self) {
        self.state = State::Header;
        self.header = None;
        self.body = BodyState::None;
        self.sink = SinkTarget::Default(VecSink::new());
        self.filter_chain = None;
    }

    /// Drains and returns whatever bytes are sitting in the input buffer
    /// past what this parser has already consumed: on a response carrying
    /// `Upgrade`, or any other handoff where the caller knows body framing
    /// no longer applies, those bytes belong to the next protocol layer, not
    /// to this parser. After this call the input buffer is empty; nothing
    /// already handed back is delivered again by a later `parse()`.
    pub fn release_buffered_data(&mut self) -> Vec<u8> {
        let data = self.input.data().to_vec();
        self.input.consume(data.len());
        data
    }

    pub fn parse(&mut self) -> Result<Progress> {
        match &self.state {
            State::Failed(e) => Err(*e),
            State::Header => match self.try_parse_header()? {
                None => Ok(Progress::NeedMore),
                Some(()) => {
                    self.enter_body_phase();
                    Ok(Progress::HeaderReady)
                }
            },
            State::Body => self.pump_body(),
            State::Complete => Ok(Progress::Complete),
        }
    }

    fn try_parse_header(&mut self) -> Result<Option<()>> {
        let header_end = match find_double_crlf(self.input.data()) {
            Some(idx) => idx + 4,
            None => {
                if self.input.data().len() as u32 > self.limits.max_header_size {
                    let e = error::header_limit("header block exceeds max_header_size");
                    self.state = State::Failed(e);
                    return Err(e);
                }
                return Ok(None);
            }
        };
        // Copied out so `build_header` and the subsequent `self.state`
        // write below never need to reason about a borrow of `self.input`.
        let block: Vec<u8> = self.input.data()[..header_end - 2].to_vec();
        let header = match self.build_header(&block) {
            Ok(h) => h,
            Err(e) => {
                self.state = State::Failed(e);
                return Err(e);
            }
        };
        self.input.consume(header_end);
        self.header = Some(header);
        Ok(Some(()))
    }

    fn build_header(&self, block: &[u8]) -> Result<Header> {
        let Some(start_line_len) = find_crlf(block) else {
            return Err(error::bad_start_line("missing CRLF after start-line"));
        };
        let start_line = &block[..start_line_len];
        let field_block = &block[start_line_len + 2..];
        let fields = parse_fields(field_block)?;

        let mut header = match &self.mode {
            Mode::Request => {
                let mut c = Cursor::new(start_line);
                let method_bytes = grammar::token(&mut c).map_err(|_| error::bad_start_line("invalid method"))?;
                expect_sp(&mut c)?;
                let target = grammar::request_target(&mut c)?;
                expect_sp(&mut c)?;
                let version = grammar::version(&mut c)?;
                if !c.is_empty() {
                    return Err(error::bad_start_line("trailing bytes after HTTP-version"));
                }
                let method = Method::try_from(method_bytes)?;
                Header::new_request(method, target, version, self.limits)?
            }
            Mode::Response { .. } => {
                let mut c = Cursor::new(start_line);
                let version = grammar::version(&mut c)?;
                expect_sp(&mut c)?;
                let status = grammar::status_code(&mut c)?;
                expect_sp(&mut c)?;
                let reason = c.remaining();
                Header::new_response(version, status, reason, self.limits)?
            }
        };

        for (name, value) in &fields {
            header.append(name, value)?;
        }
        Ok(header)
    }

    fn enter_body_phase(&mut self) {
        let header = self.header.as_ref().expect("header set before body phase");
        let no_body = match &self.mode {
            Mode::Request => false,
            Mode::Response { request_method } => {
                response_has_no_body(request_method.as_ref(), status_of(header))
            }
        };
        self.body = if no_body {
            BodyState::None
        } else if header.has_chunked() {
            BodyState::Chunked(ChunkedDecoder::new(self.limits.max_field_count))
        } else if header.has_content_length() {
            BodyState::Identity(header.content_length().unwrap_or(0))
        } else {
            match &self.mode {
                Mode::Response { .. } => BodyState::Eof,
                Mode::Request => BodyState::Identity(0),
            }
        };
        self.state = State::Body;
    }

    fn pump_body(&mut self) -> Result<Progress> {
        match &mut self.body {
            BodyState::None => {
                self.state = State::Complete;
                Ok(Progress::Complete)
            }
            BodyState::Identity(remaining) => {
                if *remaining == 0 {
                    self.state = State::Complete;
                    return Ok(Progress::Complete);
                }
                let available = self.input.data().len() as u64;
                if available == 0 {
                    if self.eof {
                        let e = error::end_of_stream("stream ended before content-length body finished");
                        self.state = State::Failed(e);
                        return Err(e);
                    }
                    return Ok(Progress::NeedMore);
                }
                let n = (*remaining).min(available) as usize;
                let mut filtered = FilteredSink {
                    filter_chain: &mut self.filter_chain,
                    inner: self.sink.as_sink_mut(),
                };
                let written = filtered.on_write(&self.input.data()[..n], true)?.bytes_written;
                if written == 0 {
                    return Ok(Progress::NeedMore);
                }
                self.input.consume(written);
                *remaining -= written as u64;
                if *remaining == 0 {
                    self.state = State::Complete;
                    Ok(Progress::Complete)
                } else {
                    Ok(Progress::BodyProgress { bytes: written })
                }
            }
            BodyState::Chunked(decoder) => {
                let mut filtered = FilteredSink {
                    filter_chain: &mut self.filter_chain,
                    inner: self.sink.as_sink_mut(),
                };
                let decoded = decoder.decode(self.input.data(), &mut filtered);
                let progress = match decoded {
                    Ok(p) => p,
                    Err(e) => {
                        self.state = State::Failed(e);
                        return Err(e);
                    }
                };
                self.input.consume(progress.consumed);
                if progress.done {
                    self.state = State::Complete;
                    Ok(Progress::Complete)
                } else if progress.consumed == 0 {
                    if self.eof {
                        let e = error::end_of_stream("stream ended mid chunked body");
                        self.state = State::Failed(e);
                        Err(e)
                    } else {
                        Ok(Progress::NeedMore)
                    }
                } else {
                    Ok(Progress::BodyProgress { bytes: progress.consumed })
                }
            }
            BodyState::Eof => {
                if self.input.data().is_empty() {
                    if self.eof {
                        self.state = State::Complete;
                        return Ok(Progress::Complete);
                    }
                    return Ok(Progress::NeedMore);
                }
                let mut filtered = FilteredSink {
                    filter_chain: &mut self.filter_chain,
                    inner: self.sink.as_sink_mut(),
                };
                let written = filtered.on_write(self.input.data(), true)?.bytes_written;
                if written == 0 {
                    return Ok(Progress::NeedMore);
                }
                self.input.consume(written);
                Ok(Progress::BodyProgress { bytes: written })
            }
        }
    }
}

/// A [`Sink`] adapter that routes every write through a content/transfer
/// coding filter chain before forwarding to the real sink. Borrowing
/// `filter_chain` and `inner` as two plain references (rather than taking
/// `&mut Parser`) lets this be constructed and used from inside a
/// `match &mut self.body { ... }` arm alongside the otherwise-conflicting
/// borrow of `self.body`.
struct FilteredSink<'a> {
    filter_chain: &'a mut Option<FilterChain>,
    inner: &'a mut dyn Sink,
}

impl<'a> Sink for FilteredSink<'a> {
    fn on_write(&mut self, buf: &[u8], more: bool) -> Result<WriteProgress> {
        let bytes_written = write_body_bytes(self.filter_chain, self.inner, buf, more)?;
        Ok(WriteProgress { bytes_written })
    }
}

/// Routes decoded body bytes through `filter_chain` (innermost filter
/// first) before handing them to `sink`. Written as a free function over
/// borrowed pieces, not a `Parser` method, so callers can invoke it from
/// inside a `match &mut self.body { ... }` arm without fighting the
/// borrow checker over unrelated fields.
///
/// Returns the number of bytes of `buf` considered consumed. A filter
/// transforms byte counts, so once any filter in the chain is present this
/// either consumes all of `buf` (the common case: the sink accepted the
/// whole transformed payload) or none of it, rather than reporting a
/// partial count that would desynchronize the chain's internal state.
fn write_body_bytes(
    filter_chain: &mut Option<FilterChain>,
    sink: &mut dyn Sink,
    buf: &[u8],
    more: bool,
) -> Result<usize> {
    match filter_chain {
        None => Ok(sink.on_write(buf, more)?.bytes_written),
        Some(chain) => {
            let mut current = buf.to_vec();
            for filter in chain.iter_mut() {
                let mut produced = Vec::with_capacity(current.len() + 64);
                let mut pos = 0usize;
                loop {
                    let mut out = [0u8; 4096];
                    let progress = filter.process(&mut out, &current[pos..], more)?;
                    produced.extend_from_slice(&out[..progress.out_bytes]);
                    pos += progress.in_bytes;
                    if pos >= current.len() {
                        break;
                    }
                    if progress.in_bytes == 0 && progress.out_bytes == 0 {
                        return Err(error::bad_filter("filter made no progress"));
                    }
                }
                current = produced;
            }
            let written = sink.on_write(&current, more)?.bytes_written;
            Ok(if written == current.len() { buf.len() } else { 0 })
        }
    }
}

fn status_of(header: &Header) -> u16 {
    match header.start_line() {
        crate::message::StartLine::Status(s) => s.status,
        crate::message::StartLine::Request(_) => 0,
    }
}

fn expect_sp(c: &mut Cursor<'_>) -> Result<()> {
    if c.remaining().first() == Some(&b' ') {
        // Cursor has no public single-byte advance; re-derive via a token
        // boundary is overkill for one byte, so slice-compare and rebuild.
        let rest = &c.remaining()[1..];
        *c = Cursor::new(rest);
        // NOTE: this discards position tracking relative to the original
        // buffer, which is fine: callers only use `c` for further matching,
        // never for absolute offsets, once expect_sp returns.
        Ok(())
    } else {
        Err(error::bad_start_line("expected SP"))
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parses the field block (everything after the start-line's CRLF, up to
/// but excluding the final blank line) into ordered `(name, value)` pairs,
/// collapsing obs-fold continuation lines into the previous field's value.
fn parse_fields(buf: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut fields = Vec::new();
    let mut current: Option<(Vec<u8>, Vec<u8>)> = None;
    let mut pos = 0usize;
    while pos < buf.len() {
        let rest = &buf[pos..];
        let line_end = find_crlf(rest).ok_or_else(|| error::bad_field("field line missing CRLF"))?;
        let line = &rest[..line_end];
        pos += line_end + 2;
        if line.is_empty() {
            break;
        }
        if ascii::is_ows(line[0]) {
            match &mut current {
                Some((_, value)) => {
                    if value.is_empty() {
                        return Err(error::bad_obs_fold("obs-fold at the start of a field value"));
                    }
                    let mut c = Cursor::new(line);
                    grammar::ows(&mut c);
                    if c.remaining().is_empty() {
                        return Err(error::bad_field("obs-fold continuation is empty"));
                    }
                    // The CRLF just consumed is the fold's CR and LF octets;
                    // each becomes its own SP. The continuation line's
                    // leading OWS is part of the fold too but keeps its
                    // original SP/HTAB byte rather than being replaced.
                    value.extend_from_slice(b"  ");
                    value.extend_from_slice(line);
                }
                None => return Err(error::bad_obs_fold("obs-fold with no preceding field")),
            }
            continue;
        }
        if let Some(f) = current.take() {
            fields.push(f);
        }
        current = Some(parse_field_line(line)?);
    }
    if let Some(f) = current.take() {
        fields.push(f);
    }
    Ok(fields)
}

fn parse_field_line(line: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut c = Cursor::new(line);
    let name = grammar::token(&mut c).map_err(|_| error::bad_field("malformed field name"))?;
    if c.remaining().first() != Some(&b':') {
        return Err(error::bad_field("expected ':' after field name"));
    }
    let colon_pos = c.pos();
    let mut c2 = Cursor::new(&line[colon_pos + 1..]);
    grammar::ows(&mut c2);
    let value_start = colon_pos + 1 + c2.pos();
    let mut value_end = line.len();
    while value_end > value_start && ascii::is_ows(line[value_end - 1]) {
        value_end -= 1;
    }
    let value = &line[value_start..value_end];
    if !value.iter().all(|&b| ascii::is_field_vchar(b) || ascii::is_ows(b)) {
        return Err(error::bad_field("invalid byte in field value"));
    }
    Ok((name.to_vec(), value.to_vec()))
}
