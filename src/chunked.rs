//! Chunked transfer-coding codec.
//!
//! A single sans-I/O incremental decoder driven by repeated `decode()`
//! calls as bytes arrive, built on the grammar primitives in `grammar.rs`
//! rather than an async combinator-parser DSL.
//!
//! `chunked-body = *chunk last-chunk trailer-part CRLF`. Chunk extensions
//! are parsed and validated but semantically ignored. Trailer fields are
//! collected and exposed via [`ChunkedTail::trailers`]: most callers never
//! need trailers, but a toolkit that silently dropped them could not
//! support `Trailer`-aware callers at all.

use crate::ascii;
use crate::error::{self, Result};
use crate::grammar::{self, Cursor};
use crate::source::Sink;

/// Hard ceiling on a single chunk-size/chunk-ext or trailer line,
/// independent of header limits: chunked framing lines are never part of
/// the header block, but an unbounded line would still let a peer force
/// unbounded buffering.
const MAX_CHUNK_LINE: usize = 8192;

enum State {
    Size,
    Data(u64),
    DataCrlf,
    TrailerLine,
    Done,
}

/// Trailer fields collected after the last chunk (the `trailer-part`).
#[derive(Debug, Clone, Default)]
pub struct ChunkedTail {
    fields: Vec<(Vec<u8>, Vec<u8>)>,
}

impl ChunkedTail {
    pub fn trailers(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.fields
    }

    pub fn find(&self, name: &[u8]) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(n, _)| ascii::eq_ignore_ascii_case(n, name))
            .map(|(_, v)| v.as_slice())
    }
}

/// Result of one [`ChunkedDecoder::decode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkedProgress {
    /// Bytes consumed from the input passed to `decode`.
    pub consumed: usize,
    /// Whether the trailer-part's final CRLF has been consumed; the
    /// chunked body is complete and `trailers()` is now available.
    pub done: bool,
}

/// An incremental decoder for `chunked-body`. Call [`ChunkedDecoder::decode`]
/// repeatedly as bytes arrive; it consumes as much as it can from each call
/// and reports how far it got. Decoded body bytes are pushed to a
/// caller-supplied [`Sink`] as they are identified, rather than returned,
/// so the parser can route them through a content-coding
/// [`crate::filter::Filter`] first.
pub struct ChunkedDecoder {
    state: State,
    max_field_count: u32,
    tail: ChunkedTail,
}

impl ChunkedDecoder {
    pub fn new(max_field_count: u32) -> Self {
        ChunkedDecoder {
            state: State::Size,
            max_field_count,
            tail: ChunkedTail::default(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    pub fn trailers(&self) -> &ChunkedTail {
        &self.tail
    }

    /// Consumes as much of `input` as forms complete chunked-body
    /// structure, writing decoded body octets to `sink` as they are
    /// identified. Returns with `done = false` when `input` runs out
    /// mid-structure; the caller should call again once more bytes have
    /// arrived.
    pub fn decode(&mut self, input: &[u8], sink: &mut dyn Sink) -> Result<ChunkedProgress> {
        let mut pos = 0usize;
        loop {
            match self.state {
                State::Done => return Ok(ChunkedProgress { consumed: pos, done: true }),
                State::Size => {
                    let rest = &input[pos..];
                    let Some(line_end) = find_crlf(rest) else {
                        if rest.len() > MAX_CHUNK_LINE {
                            return Err(error::bad_chunk("chunk-size line too long"));
                        }
                        return Ok(ChunkedProgress { consumed: pos, done: false });
                    };
                    let size = parse_chunk_size_line(&rest[..line_end])?;
                    pos += line_end + 2;
                    self.state = if size == 0 { State::TrailerLine } else { State::Data(size) };
                }
                State::Data(remaining) => {
                    let available = (input.len() - pos) as u64;
                    if available == 0 {
                        return Ok(ChunkedProgress { consumed: pos, done: false });
                    }
                    let n = remaining.min(available) as usize;
                    let written = sink.on_write(&input[pos..pos + n], true)?.bytes_written;
                    if written == 0 {
                        return Ok(ChunkedProgress { consumed: pos, done: false });
                    }
                    pos += written;
                    let left = remaining - written as u64;
                    self.state = if left == 0 { State::DataCrlf } else { State::Data(left) };
                    if written < n {
                        return Ok(ChunkedProgress { consumed: pos, done: false });
                    }
                }
                State::DataCrlf => {
                    let rest = &input[pos..];
                    if rest.len() < 2 {
                        return Ok(ChunkedProgress { consumed: pos, done: false });
                    }
                    if &rest[..2] != b"\r\n" {
                        return Err(error::bad_chunk("expected CRLF after chunk-data"));
                    }
                    pos += 2;
                    self.state = State::Size;
                }
                State::TrailerLine => {
                    let rest = &input[pos..];
                    let Some(line_end) = find_crlf(rest) else {
                        if rest.len() > MAX_CHUNK_LINE {
                            return Err(error::bad_chunk("trailer line too long"));
                        }
                        return Ok(ChunkedProgress { consumed: pos, done: false });
                    };
                    let line = &rest[..line_end];
                    pos += line_end + 2;
                    if line.is_empty() {
                        self.state = State::Done;
                        return Ok(ChunkedProgress { consumed: pos, done: true });
                    }
                    if self.tail.fields.len() as u32 >= self.max_field_count {
                        return Err(error::header_limit("trailer field count exceeds max_field_count"));
                    }
                    let (name, value) = parse_trailer_line(line)?;
                    self.tail.fields.push((name.to_vec(), value.to_vec()));
                }
            }
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// `chunk-size [chunk-ext] = 1*HEXDIG *( ";" chunk-ext-name [ "=" ... ] )`.
/// Bounded to `2^63 - 1` to keep the running total representable as `u64`
/// alongside `Content-Length`.
fn parse_chunk_size_line(line: &[u8]) -> Result<u64> {
    let mut digit_count = 0usize;
    let mut value: u64 = 0;
    let mut overflowed = false;
    while digit_count < line.len() {
        let b = line[digit_count];
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => break,
        };
        match value.checked_mul(16).and_then(|v| v.checked_add(digit as u64)) {
            Some(v) if v < (1u64 << 63) => value = v,
            _ => overflowed = true,
        }
        digit_count += 1;
    }
    if digit_count == 0 {
        return Err(error::bad_chunk("expected chunk-size hex digits"));
    }
    if overflowed {
        return Err(error::bad_chunk("chunk-size overflows 2^63 - 1"));
    }
    if digit_count < line.len() {
        let mut c = Cursor::new(&line[digit_count..]);
        grammar::chunk_ext(&mut c)?;
        if !c.is_empty() {
            return Err(error::bad_chunk("trailing bytes after chunk extensions"));
        }
    }
    Ok(value)
}

fn parse_trailer_line(line: &[u8]) -> Result<(&[u8], &[u8])> {
    let mut c = Cursor::new(line);
    let name = grammar::token(&mut c).map_err(|_| error::bad_chunk("malformed trailer field name"))?;
    if c.remaining().first() != Some(&b':') {
        return Err(error::bad_chunk("expected ':' in trailer field"));
    }
    let colon_pos = c.pos();
    let mut c2 = Cursor::new(&line[colon_pos + 1..]);
    grammar::ows(&mut c2);
    let value_start = colon_pos + 1 + c2.pos();
    let mut value_end = line.len();
    while value_end > value_start && ascii::is_ows(line[value_end - 1]) {
        value_end -= 1;
    }
    if !line[value_start..value_end]
        .iter()
        .all(|&b| ascii::is_field_vchar(b) || ascii::is_ows(b))
    {
        return Err(error::bad_chunk("invalid byte in trailer field value"));
    }
    Ok((name, &line[value_start..value_end]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VecSink;

    fn decode_all(data: &[u8], max_fields: u32) -> (ChunkedDecoder, Vec<u8>, usize) {
        let mut decoder = ChunkedDecoder::new(max_fields);
        let mut sink = VecSink::new();
        let mut total = 0;
        loop {
            let progress = decoder.decode(&data[total..], &mut sink).unwrap();
            total += progress.consumed;
            if progress.done || progress.consumed == 0 {
                break;
            }
        }
        (decoder, sink.data, total)
    }

    #[test]
    fn decodes_single_chunk() {
        let (decoder, data, consumed) = decode_all(b"5\r\nhello\r\n0\r\n\r\n", 16);
        assert!(decoder.is_done());
        assert_eq!(data, b"hello");
        assert_eq!(consumed, b"5\r\nhello\r\n0\r\n\r\n".len());
    }

    #[test]
    fn decodes_multiple_chunks() {
        let (decoder, data, _) = decode_all(b"3\r\nfoo\r\n3\r\nbar\r\n0\r\n\r\n", 16);
        assert!(decoder.is_done());
        assert_eq!(data, b"foobar");
    }

    #[test]
    fn chunk_extension_ignored() {
        let (decoder, data, _) = decode_all(b"5;ext=1\r\nhello\r\n0\r\n\r\n", 16);
        assert!(decoder.is_done());
        assert_eq!(data, b"hello");
    }

    #[test]
    fn trailers_are_exposed() {
        let (decoder, _, _) = decode_all(b"0\r\nX-Checksum: abc123\r\n\r\n", 16);
        assert!(decoder.is_done());
        assert_eq!(decoder.trailers().find(b"x-checksum"), Some(&b"abc123"[..]));
    }

    #[test]
    fn split_across_feeds() {
        let mut decoder = ChunkedDecoder::new(16);
        let mut sink = VecSink::new();
        let whole: &[u8] = b"5\r\nhello\r\n0\r\n\r\n";
        let progress = decoder.decode(&whole[..3], &mut sink).unwrap();
        assert!(!progress.done);
        let consumed_so_far = progress.consumed;
        let progress = decoder.decode(&whole[consumed_so_far..], &mut sink).unwrap();
        assert!(progress.done);
        assert_eq!(sink.data, b"hello");
    }

    #[test]
    fn rejects_non_hex_chunk_size() {
        let mut decoder = ChunkedDecoder::new(16);
        let mut sink = VecSink::new();
        assert!(decoder.decode(b"zz\r\n", &mut sink).is_err());
    }

    #[test]
    fn zero_size_chunk_terminates_without_trailers() {
        let (decoder, data, _) = decode_all(b"0\r\n\r\n", 16);
        assert!(decoder.is_done());
        assert!(data.is_empty());
        assert!(decoder.trailers().trailers().is_empty());
    }
}
