//! The content/transfer-coding filter contract.
//!
//! Only the contract lives here, never a concrete codec: gzip and deflate
//! are the motivating examples of what a caller might plug in, but
//! implementing them is out of scope for this crate. This mirrors a split
//! seen elsewhere between a `Transform` contract and the concrete codecs
//! that implement it in a separate crate; those codec crates are path
//! dependencies with no registry equivalent and are not carried here.

use crate::error::Error;

/// The result of one `Filter::process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterProgress {
    /// Bytes written into `out`.
    pub out_bytes: usize,
    /// Bytes consumed from `in_`.
    pub in_bytes: usize,
    /// Whether the filter has emitted its last byte.
    pub finished: bool,
}

/// A stream transducer driven symmetrically by the parser (decoding) and
/// the serializer (encoding).
///
/// A conforming filter must make progress whenever `process` is called with
/// a nonempty `in_` or with `more = false`: returning `out_bytes == 0 &&
/// in_bytes == 0` in that situation is a contract violation and the driver
/// reports it as `ErrorKind::BadFilter`.
pub trait Filter {
    /// Consumes up to `in_.len()` bytes from `in_` and produces up to
    /// `out.len()` bytes into `out`. `more = false` signals that no further
    /// input will ever arrive (end-of-stream flush); the filter should drain
    /// any internal state it is holding back.
    fn process(&mut self, out: &mut [u8], in_: &[u8], more: bool) -> Result<FilterProgress, Error>;
}

/// An ordered sequence of filters applied as one logical stage, e.g.
/// `gzip` then `chunked` on the wire becomes a two-element chain processed
/// inner-to-outer. Owned by the parser/serializer's [`crate::workspace::Workspace`]
/// for the lifetime of a single message.
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        FilterChain { filters: Vec::new() }
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Filter>> {
        self.filters.iter_mut()
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

/// The identity filter: copies input to output unchanged. Used as the
/// chain's behavior when no coding is configured, and as a reference
/// implementation for testing the driver logic in `parser.rs`/
/// `serializer.rs` without a real codec.
pub struct IdentityFilter;

impl Filter for IdentityFilter {
    fn process(&mut self, out: &mut [u8], in_: &[u8], more: bool) -> Result<FilterProgress, Error> {
        let n = out.len().min(in_.len());
        out[..n].copy_from_slice(&in_[..n]);
        Ok(FilterProgress {
            out_bytes: n,
            in_bytes: n,
            finished: !more && n == in_.len(),
        })
    }
}
