//! Body pull/push contracts for the parser's body delivery and the
//! serializer's source pump.
//!
//! A body as a trait object driven by `read(&mut [u8]) -> Result<usize>` is
//! a common shape, usually async. This crate is sans-I/O and synchronous,
//! so the same shape becomes a plain synchronous trait with an explicit
//! `finished` flag rather than a zero-length read standing in for EOF: a
//! source must either fill the buffer entirely or set `finished = true`;
//! partial fills mid-stream are a contract violation.

use crate::error::Error;

/// The result of one `Source::on_read` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadProgress {
    pub bytes: usize,
    pub finished: bool,
}

/// A pull-based body source for the serializer.
pub trait Source {
    /// Fills `buf` with the next body bytes. Must either return
    /// `bytes == buf.len()` or set `finished = true`; returning fewer bytes
    /// than `buf.len()` with `finished = false` is a contract violation.
    fn on_read(&mut self, buf: &mut [u8]) -> Result<ReadProgress, Error>;
}

/// The result of one `Sink::on_write` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteProgress {
    pub bytes_written: usize,
}

/// A push-based body destination for the parser.
///
/// If `bytes_written < buf.len()`, the parser retains the unconsumed tail
/// and presents it again (possibly coalesced with newly arrived bytes) on
/// the next delivery, i.e. the sink exerts backpressure by accepting less
/// than the full buffer.
pub trait Sink {
    fn on_write(&mut self, buf: &[u8], more: bool) -> Result<WriteProgress, Error>;
}

/// A `Sink` that simply accumulates everything into a `Vec`, used by tests
/// and by callers that want the whole body materialized rather than
/// streamed.
#[derive(Default)]
pub struct VecSink {
    pub data: Vec<u8>,
}

impl VecSink {
    pub fn new() -> Self {
        VecSink { data: Vec::new() }
    }
}

impl Sink for VecSink {
    fn on_write(&mut self, buf: &[u8], _more: bool) -> Result<WriteProgress, Error> {
        self.data.extend_from_slice(buf);
        Ok(WriteProgress {
            bytes_written: buf.len(),
        })
    }
}

/// A `Source` that serves bytes from an in-memory slice, used by tests and
/// as the degenerate case of "body is an in-memory buffer sequence".
pub struct SliceSource<'a> {
    data: &'a [u8],
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource { data }
    }
}

impl<'a> Source for SliceSource<'a> {
    fn on_read(&mut self, buf: &mut [u8]) -> Result<ReadProgress, Error> {
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(ReadProgress {
            bytes: n,
            finished: self.data.is_empty(),
        })
    }
}
