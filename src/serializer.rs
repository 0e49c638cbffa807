//! The incremental serializer: emits a header followed by a body sourced
//! either from an in-memory buffer sequence or a pull-based [`Source`],
//! optionally framed into chunked transfer coding and passed through an
//! output [`FilterChain`], presenting the result as a sequence of buffers
//! the caller drains at its own pace via `prepare`/`consume`.
//!
//! Adapted to a synchronous, sans-I/O `prepare`/`consume` surface mirroring
//! [`crate::parser::Parser`]'s `prepare`/`commit`.

use bytes::Bytes;
use std::collections::VecDeque;

use crate::buffer::BufferQueue;
use crate::error::{self, Error, Result};
use crate::filter::FilterChain;
use crate::header::Header;
use crate::limits::Limits;
use crate::message::Version;
use crate::source::Source;

/// A body supplied up front to [`Serializer::start`]. Use
/// [`Serializer::start_stream`] instead when the body isn't known until
/// after the header has already gone out.
pub enum Body {
    /// A known sequence of buffers; eligible for the zero-copy output path
    /// when no filter chain is attached and the framing is identity.
    Buffers(Vec<Bytes>),
    /// A pull-based body of unknown total length.
    Source(Box<dyn Source>),
}

enum BodyKind {
    None,
    Buffers(VecDeque<Bytes>),
    Source(Box<dyn Source>),
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Identity,
    Chunked,
}

enum State {
    Idle,
    AwaitingContinue,
    BodyOut,
    Done,
    Failed(Error),
}

pub struct Serializer {
    state: State,
    header: Option<Header>,
    framing: Framing,
    body: BodyKind,
    filter_chain: Option<FilterChain>,
    output: BufferQueue,
    scratch_capacity: usize,
    identity_target: Option<u64>,
    identity_written: u64,
}

impl Serializer {
    pub fn new(limits: Limits) -> Self {
        Serializer {
            state: State::Idle,
            header: None,
            framing: Framing::Identity,
            body: BodyKind::None,
            filter_chain: None,
            output: BufferQueue::with_capacity(4),
            scratch_capacity: (limits.serializer_workspace_capacity as usize).max(256),
            identity_target: None,
            identity_written: 0,
        }
    }

    pub fn attach_filter_chain(&mut self, chain: FilterChain) {
        self.filter_chain = Some(chain);
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Prepares a message whose body is already fully known, either as an
    /// in-memory buffer sequence or a pull-based source.
    pub fn start(&mut self, mut header: Header, body: Option<Body>) -> Result<()> {
        decide_framing(&mut header, body.as_ref(), &mut self.framing, &mut self.identity_target)?;
        let body_kind = match body {
            None => BodyKind::None,
            Some(Body::Buffers(chunks)) => {
                BodyKind::Buffers(chunks.into_iter().filter(|b| !b.is_empty()).collect())
            }
            Some(Body::Source(source)) => BodyKind::Source(source),
        };
        self.begin(header, body_kind)
    }

    /// Prepares a message whose body will be written incrementally via
    /// [`Serializer::write_stream`] as it becomes available. Always framed
    /// as chunked, since the total length cannot be known up front.
    pub fn start_stream(&mut self, mut header: Header) -> Result<()> {
        if !header.has_chunked() {
            if header.has_content_length() {
                return Err(error::invalid_argument(
                    "start_stream requires chunked framing, not a fixed Content-Length",
                ));
            }
            if header.version() != Version::Http11 {
                return Err(error::invalid_argument(
                    "a streamed body without a known length requires HTTP/1.1 chunked framing",
                ));
            }
            header.set(b"Transfer-Encoding", b"chunked")?;
        }
        self.framing = Framing::Chunked;
        self.identity_target = None;
        self.begin(header, BodyKind::Stream)
    }

    fn begin(&mut self, header: Header, body: BodyKind) -> Result<()> {
        let awaiting_continue = header.has_expect_continue();
        self.output.push_back(Bytes::copy_from_slice(header.buffer()));
        self.header = Some(header);
        self.body = body;
        self.identity_written = 0;
        self.state = if awaiting_continue {
            State::AwaitingContinue
        } else {
            State::BodyOut
        };
        Ok(())
    }

    /// Resumes body emission after an `Expect: 100-continue` request has
    /// had its header drained and the caller has observed the peer's `100
    /// Continue` (or decided to proceed anyway).
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            State::AwaitingContinue => {
                self.state = State::BodyOut;
                Ok(())
            }
            _ => Err(error::invalid_argument("resume() called with no pending Expect: 100-continue")),
        }
    }

    /// Feeds the next slice of a streamed body started with
    /// [`Serializer::start_stream`]. `more = false` marks end of body and
    /// appends the chunked terminator.
    pub fn write_stream(&mut self, buf: &[u8], more: bool) -> Result<()> {
        if !matches!(self.body, BodyKind::Stream) {
            return Err(error::invalid_argument("write_stream called without a streamed body"));
        }
        if !matches!(self.state, State::BodyOut) {
            return Err(error::invalid_argument("write_stream called outside the body phase"));
        }
        let frames = frame_through(&mut self.filter_chain, self.scratch_capacity, buf, more, self.framing)?;
        for frame in frames {
            self.output.push_back(frame);
        }
        if !more {
            self.body = BodyKind::None;
        }
        Ok(())
    }

    /// The next contiguous segment of output ready for transmission. Pumps
    /// more body through framing/filters first if the output queue is
    /// currently empty and more is expected.
    pub fn prepare(&mut self) -> Result<&[u8]> {
        self.pump()?;
        Ok(self.output.front().unwrap_or(&[]))
    }

    /// Advances past `n` bytes the caller has transmitted from the front
    /// of the segment returned by `prepare`.
    pub fn consume(&mut self, n: usize) {
        self.output.consume(n);
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done) && self.output.is_empty()
    }

    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.header = None;
        self.framing = Framing::Identity;
        self.body = BodyKind::None;
        self.filter_chain = None;
        self.output = BufferQueue::with_capacity(4);
        self.identity_target = None;
        self.identity_written = 0;
    }

    fn pump(&mut self) -> Result<()> {
        loop {
            if !self.output.is_empty() {
                return Ok(());
            }
            match &self.state {
                State::Failed(e) => return Err(*e),
                State::Idle | State::AwaitingContinue | State::Done => return Ok(()),
                State::BodyOut => {}
            }
            let outcome = pump_body(
                &mut self.body,
                &mut self.filter_chain,
                self.scratch_capacity,
                self.framing,
                &mut self.identity_written,
                self.identity_target,
            );
            match outcome {
                Ok(PumpOutcome::Produced(frames)) => {
                    for frame in frames {
                        self.output.push_back(frame);
                    }
                }
                Ok(PumpOutcome::NeedMore) => return Ok(()),
                Ok(PumpOutcome::Done) => {
                    self.state = State::Done;
                    return Ok(());
                }
                Err(e) => {
                    self.state = State::Failed(e);
                    return Err(e);
                }
            }
        }
    }
}

/// Chooses identity vs. chunked framing and, when a body is supplied but
/// neither is already set on the header, writes the missing field in: a
/// measured `Content-Length` for a known-size buffer sequence, or
/// `Transfer-Encoding: chunked` for an unsized source (HTTP/1.1 only).
fn decide_framing(
    header: &mut Header,
    body: Option<&Body>,
    framing: &mut Framing,
    identity_target: &mut Option<u64>,
) -> Result<()> {
    if header.has_chunked() {
        *framing = Framing::Chunked;
        *identity_target = None;
        return Ok(());
    }
    if header.has_content_length() {
        *framing = Framing::Identity;
        *identity_target = header.content_length();
        return Ok(());
    }
    match body {
        None => {
            *framing = Framing::Identity;
            *identity_target = Some(0);
            Ok(())
        }
        Some(Body::Buffers(chunks)) => {
            let total: u64 = chunks.iter().map(|b| b.len() as u64).sum();
            header.set(b"Content-Length", total.to_string().as_bytes())?;
            *framing = Framing::Identity;
            *identity_target = Some(total);
            Ok(())
        }
        Some(Body::Source(_)) => {
            if header.version() == Version::Http11 {
                header.set(b"Transfer-Encoding", b"chunked")?;
                *framing = Framing::Chunked;
                *identity_target = None;
                Ok(())
            } else {
                Err(error::invalid_argument(
                    "a body of unknown length requires chunked framing (HTTP/1.1)",
                ))
            }
        }
    }
}

enum PumpOutcome {
    Produced(Vec<Bytes>),
    NeedMore,
    Done,
}

/// Pulls one step of body data out of `body`, validates it against the
/// measured `Content-Length` target where one applies, and returns it
/// already run through `frame_through`.
fn pump_body(
    body: &mut BodyKind,
    filter_chain: &mut Option<FilterChain>,
    scratch_capacity: usize,
    framing: Framing,
    identity_written: &mut u64,
    identity_target: Option<u64>,
) -> Result<PumpOutcome> {
    match body {
        BodyKind::None => Ok(PumpOutcome::Done),
        BodyKind::Stream => Ok(PumpOutcome::NeedMore),
        BodyKind::Buffers(queue) => match queue.pop_front() {
            Some(chunk) => {
                *identity_written += chunk.len() as u64;
                if matches!(framing, Framing::Identity) && filter_chain.is_none() {
                    Ok(PumpOutcome::Produced(vec![chunk]))
                } else {
                    let frames = frame_through(filter_chain, scratch_capacity, &chunk, true, framing)?;
                    Ok(PumpOutcome::Produced(frames))
                }
            }
            None => {
                check_identity_length(identity_written, identity_target)?;
                let frames = frame_through(filter_chain, scratch_capacity, &[], false, framing)?;
                *body = BodyKind::None;
                Ok(if frames.is_empty() {
                    PumpOutcome::Done
                } else {
                    PumpOutcome::Produced(frames)
                })
            }
        },
        BodyKind::Source(source) => {
            let mut buf = vec![0u8; scratch_capacity];
            let progress = source.on_read(&mut buf)?;
            *identity_written += progress.bytes as u64;
            let frames = frame_through(filter_chain, scratch_capacity, &buf[..progress.bytes], !progress.finished, framing)?;
            if progress.finished {
                check_identity_length(identity_written, identity_target)?;
                *body = BodyKind::None;
            }
            Ok(if frames.is_empty() {
                if progress.finished {
                    PumpOutcome::Done
                } else {
                    PumpOutcome::NeedMore
                }
            } else {
                PumpOutcome::Produced(frames)
            })
        }
    }
}

fn check_identity_length(written: &u64, target: Option<u64>) -> Result<()> {
    if let Some(target) = target {
        if *written > target {
            return Err(error::body_too_long("serialized body exceeds Content-Length"));
        }
        if *written < target {
            return Err(error::body_too_short("serialized body is shorter than Content-Length"));
        }
    }
    Ok(())
}

/// Runs `buf` through every filter in `filter_chain` in order (identity if
/// none is attached), then wraps the result per `framing`. `more = false`
/// both flushes any buffered filter state and, for chunked framing,
/// appends the `0 CRLF CRLF` terminator.
fn frame_through(
    filter_chain: &mut Option<FilterChain>,
    scratch_capacity: usize,
    buf: &[u8],
    more: bool,
    framing: Framing,
) -> Result<Vec<Bytes>> {
    let filtered = match filter_chain.as_mut() {
        Some(chain) => run_filters(chain, scratch_capacity, buf, more)?,
        None => buf.to_vec(),
    };

    let mut frames = Vec::new();
    match framing {
        Framing::Identity => {
            if !filtered.is_empty() {
                frames.push(Bytes::from(filtered));
            }
        }
        Framing::Chunked => {
            if !filtered.is_empty() {
                let mut frame = Vec::with_capacity(filtered.len() + 16);
                frame.extend_from_slice(format!("{:x}\r\n", filtered.len()).as_bytes());
                frame.extend_from_slice(&filtered);
                frame.extend_from_slice(b"\r\n");
                frames.push(Bytes::from(frame));
            }
            if !more {
                frames.push(Bytes::from_static(b"0\r\n\r\n"));
            }
        }
    }
    Ok(frames)
}

fn run_filters(chain: &mut FilterChain, scratch_capacity: usize, buf: &[u8], more: bool) -> Result<Vec<u8>> {
    let mut stage = buf.to_vec();
    for filter in chain.iter_mut() {
        let mut produced = Vec::with_capacity(stage.len());
        let mut in_pos = 0usize;
        loop {
            let mut out = vec![0u8; scratch_capacity];
            let progress = filter.process(&mut out, &stage[in_pos..], more)?;
            produced.extend_from_slice(&out[..progress.out_bytes]);
            in_pos += progress.in_bytes;
            if progress.in_bytes == 0 && progress.out_bytes == 0 {
                if in_pos < stage.len() || more {
                    return Err(error::bad_filter("filter made no progress"));
                }
                break;
            }
            if in_pos >= stage.len() && (!more || progress.finished) {
                break;
            }
        }
        stage = produced;
    }
    Ok(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use crate::message::Method;
    use crate::parser::{Mode, Parser, Progress};

    fn response_header(status: u16) -> Header {
        Header::new_response(Version::Http11, status, b"OK", Limits::default()).unwrap()
    }

    #[test]
    fn start_with_no_body_uses_identity_zero() {
        let mut s = Serializer::new(Limits::default());
        s.start(response_header(204), None).unwrap();
        let out = s.prepare().unwrap().to_vec();
        s.consume(out.len());
        assert!(s.is_done());
        assert!(std::str::from_utf8(&out).unwrap().contains("204 OK"));
    }

    #[test]
    fn start_with_buffers_sets_measured_content_length() {
        let mut s = Serializer::new(Limits::default());
        s.start(response_header(200), Some(Body::Buffers(vec![Bytes::from_static(b"hello")])))
            .unwrap();
        let mut drained = Vec::new();
        loop {
            let chunk = s.prepare().unwrap().to_vec();
            if chunk.is_empty() {
                break;
            }
            drained.extend_from_slice(&chunk);
            s.consume(chunk.len());
        }
        assert!(s.is_done());
        let text = String::from_utf8(drained).unwrap();
        assert!(text.contains("Content-Length: 5"));
        assert!(text.ends_with("hello"));
    }

    #[test]
    fn start_stream_frames_chunked() {
        let mut s = Serializer::new(Limits::default());
        s.start_stream(response_header(200)).unwrap();
        s.write_stream(b"abc", true).unwrap();
        s.write_stream(b"de", false).unwrap();
        let mut drained = Vec::new();
        loop {
            let chunk = s.prepare().unwrap().to_vec();
            if chunk.is_empty() {
                break;
            }
            drained.extend_from_slice(&chunk);
            s.consume(chunk.len());
        }
        assert!(s.is_done());
        let text = String::from_utf8(drained).unwrap();
        assert!(text.contains("Transfer-Encoding: chunked"));
        assert!(text.ends_with("3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n"));
    }

    #[test]
    fn expect_continue_withholds_body_until_resume() {
        let mut header = Header::new_request(Method::Post, b"/upload", Version::Http11, Limits::default()).unwrap();
        header.append(b"Expect", b"100-continue").unwrap();
        header.append(b"Content-Length", b"2").unwrap();
        let mut s = Serializer::new(Limits::default());
        s.start(header, Some(Body::Buffers(vec![Bytes::from_static(b"hi")]))).unwrap();
        let header_bytes = s.prepare().unwrap().to_vec();
        s.consume(header_bytes.len());
        assert_eq!(s.prepare().unwrap(), b"");
        assert!(!s.is_done());
        s.resume().unwrap();
        assert_eq!(s.prepare().unwrap(), b"hi");
    }

    #[test]
    fn round_trips_through_the_parser() {
        let mut header = Header::new_response(Version::Http11, 204, b"No Content", Limits::default()).unwrap();
        header.append(b"Connection", b"close").unwrap();
        let mut s = Serializer::new(Limits::default());
        s.start(header, None).unwrap();
        let mut wire = Vec::new();
        loop {
            let chunk = s.prepare().unwrap().to_vec();
            if chunk.is_empty() {
                break;
            }
            wire.extend_from_slice(&chunk);
            s.consume(chunk.len());
        }

        let mut p = Parser::new(Mode::Response { request_method: None }, Limits::default());
        p.prepare(wire.len()).unwrap().copy_from_slice(&wire);
        p.commit(wire.len());
        assert_eq!(p.parse().unwrap(), Progress::HeaderReady);
        assert_eq!(p.parse().unwrap(), Progress::Complete);
        let header = p.header().unwrap();
        assert_eq!(header.find(b"connection").unwrap().1, b"close");
    }
}
