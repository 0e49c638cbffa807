//! The header model: a single contiguous buffer holding the wire form of a
//! start-line and fields, plus a field index for lookup.
//!
//! A header owns a single contiguous byte buffer holding the wire form of
//! its start-line and fields, plus a reserved prefix region at the front
//! that a serializer can fill in place (e.g. chunked framing) without
//! shifting the rest of the buffer. The field-index is modeled as a typed
//! `Vec<FieldEntry>` alongside that buffer rather than packed byte-for-byte
//! into its tail. The externally observable contract (16-bit-bounded
//! offsets, O(1) lookup by well-known id, `buffer()` returning a single
//! contiguous slice of exactly the wire bytes for zero-copy transmission)
//! holds either way, and keeping the index typed keeps the
//! insert/shift/rebase arithmetic in one reviewable place instead of raw
//! pointer math into the same allocation. See `DESIGN.md` for the full
//! rationale.

use crate::ascii;
use crate::error::{self, Result};
use crate::field::Field;
use crate::grammar::{self, Cursor};
use crate::limits::Limits;
use crate::message::{Method, RequestLine, StartLine, StatusLine, Version};

#[derive(Debug, Clone, Copy)]
struct FieldEntry {
    field_id: Field,
    name_offset: u16,
    name_len: u16,
    value_offset: u16,
    value_len: u16,
}

/// A single contiguous header buffer: prefix region, start-line, fields,
/// terminal blank line. See the module docs.
pub struct Header {
    storage: Vec<u8>,
    prefix_capacity: usize,
    prefix_used: usize,
    /// Length of the used wire region, starting at `prefix_capacity`:
    /// start-line CRLF + fields CRLF* + terminal CRLF.
    front_len: usize,
    /// Length of just the start-line's own bytes (including its CRLF).
    start_line_len: usize,
    start_line: StartLine,
    entries: Vec<FieldEntry>,
    limits: Limits,

    content_length: Option<u64>,
    has_content_length: bool,
    has_chunked: bool,
    connection_close: bool,
    connection_keep_alive: bool,
    has_expect_continue: bool,
}

fn combine<'h>(values: impl Iterator<Item = (&'h [u8], &'h [u8])>) -> Option<Vec<u8>> {
    let mut result: Option<Vec<u8>> = None;
    for (_, value) in values {
        if value.is_empty() {
            continue;
        }
        match &mut result {
            None => result = Some(value.to_vec()),
            Some(buf) => {
                buf.push(b',');
                buf.extend_from_slice(value);
            }
        }
    }
    result
}

fn validate_target(target: &[u8]) -> Result<()> {
    if target.is_empty() || !target.iter().all(|&b| ascii::is_vchar(b)) {
        return Err(error::bad_start_line("invalid request-target"));
    }
    Ok(())
}

fn validate_reason(reason: &[u8]) -> Result<()> {
    if !reason
        .iter()
        .all(|&b| ascii::is_ows(b) || ascii::is_vchar(b) || ascii::is_obs_text(b))
    {
        return Err(error::bad_start_line("invalid reason-phrase"));
    }
    Ok(())
}

fn build_request_line(method: &Method, target: &[u8], version: Version) -> Result<Vec<u8>> {
    if let Method::Other(bytes) = method {
        if !ascii::is_valid_token(bytes) {
            return Err(error::bad_start_line("method is not a valid token"));
        }
    }
    validate_target(target)?;
    let mut line = Vec::with_capacity(method.as_bytes().len() + target.len() + 12);
    line.extend_from_slice(method.as_bytes());
    line.push(b' ');
    line.extend_from_slice(target);
    line.push(b' ');
    line.extend_from_slice(version.as_bytes());
    line.extend_from_slice(b"\r\n");
    Ok(line)
}

fn build_status_line(version: Version, status: u16, reason: &[u8]) -> Result<Vec<u8>> {
    if !(100..1000).contains(&status) {
        return Err(error::bad_start_line("status code must be 3 digits"));
    }
    validate_reason(reason)?;
    let mut line = Vec::with_capacity(8 + 1 + 3 + 1 + reason.len() + 2);
    line.extend_from_slice(version.as_bytes());
    line.push(b' ');
    line.extend_from_slice(format!("{:03}", status).as_bytes());
    line.push(b' ');
    line.extend_from_slice(reason);
    line.extend_from_slice(b"\r\n");
    Ok(line)
}

impl Header {
    pub fn new_request(method: Method, target: &[u8], version: Version, limits: Limits) -> Result<Self> {
        Self::new_request_with_prefix(method, target, version, limits, 0)
    }

    pub fn new_request_with_prefix(
        method: Method,
        target: &[u8],
        version: Version,
        limits: Limits,
        prefix_capacity: usize,
    ) -> Result<Self> {
        let line = build_request_line(&method, target, version)?;
        let start_line = StartLine::Request(RequestLine {
            method,
            target: target.to_vec(),
            version,
        });
        Self::new_with_start_line(line, start_line, limits, prefix_capacity)
    }

    pub fn new_response(version: Version, status: u16, reason: &[u8], limits: Limits) -> Result<Self> {
        Self::new_response_with_prefix(version, status, reason, limits, 0)
    }

    pub fn new_response_with_prefix(
        version: Version,
        status: u16,
        reason: &[u8],
        limits: Limits,
        prefix_capacity: usize,
    ) -> Result<Self> {
        let line = build_status_line(version, status, reason)?;
        let start_line = StartLine::Status(StatusLine {
            version,
            status,
            reason: reason.to_vec(),
        });
        Self::new_with_start_line(line, start_line, limits, prefix_capacity)
    }

    fn new_with_start_line(
        start_line_bytes: Vec<u8>,
        start_line: StartLine,
        limits: Limits,
        prefix_capacity: usize,
    ) -> Result<Self> {
        let hard_max = limits.max_header_size.min(65_535) as usize;
        let mut front = start_line_bytes.clone();
        front.extend_from_slice(b"\r\n");
        if front.len() > hard_max {
            return Err(error::header_limit("start line exceeds max_header_size"));
        }
        let cap = front.len().max(32);
        let mut storage = vec![0u8; prefix_capacity + cap];
        storage[prefix_capacity..prefix_capacity + front.len()].copy_from_slice(&front);
        Ok(Header {
            storage,
            prefix_capacity,
            prefix_used: 0,
            front_len: front.len(),
            start_line_len: start_line_bytes.len(),
            start_line,
            entries: Vec::new(),
            limits,
            content_length: None,
            has_content_length: false,
            has_chunked: false,
            connection_close: false,
            connection_keep_alive: false,
            has_expect_continue: false,
        })
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn start_line(&self) -> &StartLine {
        &self.start_line
    }

    pub fn version(&self) -> Version {
        self.start_line.version()
    }

    pub fn has_content_length(&self) -> bool {
        self.has_content_length
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn has_chunked(&self) -> bool {
        self.has_chunked
    }

    pub fn has_expect_continue(&self) -> bool {
        self.has_expect_continue
    }

    pub fn connection_close(&self) -> bool {
        self.connection_close
    }

    pub fn connection_keep_alive(&self) -> bool {
        self.connection_keep_alive
    }

    pub fn field_count(&self) -> usize {
        self.entries.len()
    }

    fn name_bytes(&self, e: &FieldEntry) -> &[u8] {
        let start = self.prefix_capacity + e.name_offset as usize;
        &self.storage[start..start + e.name_len as usize]
    }

    fn value_bytes(&self, e: &FieldEntry) -> &[u8] {
        let start = self.prefix_capacity + e.value_offset as usize;
        &self.storage[start..start + e.value_len as usize]
    }

    fn matches(&self, e: &FieldEntry, field_id: Field, name: &[u8]) -> bool {
        if field_id != Field::Other {
            e.field_id == field_id
        } else {
            e.field_id == Field::Other && ascii::eq_ignore_ascii_case(self.name_bytes(e), name)
        }
    }

    /// First matching field's (name, value), or `None`.
    pub fn find(&self, name: &[u8]) -> Option<(&[u8], &[u8])> {
        let field_id = Field::lookup(name);
        self.entries
            .iter()
            .find(|e| self.matches(e, field_id, name))
            .map(|e| (self.name_bytes(e), self.value_bytes(e)))
    }

    /// First field matching a well-known id, or `None`.
    pub fn find_by_id(&self, field_id: Field) -> Option<(&[u8], &[u8])> {
        self.entries
            .iter()
            .find(|e| e.field_id == field_id)
            .map(|e| (self.name_bytes(e), self.value_bytes(e)))
    }

    /// All matching fields' values, in header order.
    pub fn find_all<'h>(&'h self, name: &[u8]) -> impl Iterator<Item = (&'h [u8], &'h [u8])> + 'h {
        let field_id = Field::lookup(name);
        let name_owned = name.to_vec();
        self.entries
            .iter()
            .filter(move |e| {
                if field_id != Field::Other {
                    e.field_id == field_id
                } else {
                    e.field_id == Field::Other && ascii::eq_ignore_ascii_case(self.name_bytes(e), &name_owned)
                }
            })
            .map(move |e| (self.name_bytes(e), self.value_bytes(e)))
    }

    pub fn find_all_by_id<'h>(&'h self, field_id: Field) -> impl Iterator<Item = (&'h [u8], &'h [u8])> + 'h {
        self.entries
            .iter()
            .filter(move |e| e.field_id == field_id)
            .map(move |e| (self.name_bytes(e), self.value_bytes(e)))
    }

    pub fn count(&self, name: &[u8]) -> usize {
        self.find_all(name).count()
    }

    /// Joins every occurrence of `name` into one comma-separated value, in
    /// header order, skipping occurrences with an empty value. `None` if no
    /// occurrence contributed a non-empty value.
    pub fn combine_field_values(&self, name: &[u8]) -> Option<Vec<u8>> {
        combine(self.find_all(name))
    }

    /// Same as [`Header::combine_field_values`] but looked up by well-known
    /// [`Field`] id.
    pub fn combine_field_values_by_id(&self, field_id: Field) -> Option<Vec<u8>> {
        combine(self.find_all_by_id(field_id))
    }

    /// All fields in wire order.
    pub fn iter<'h>(&'h self) -> impl Iterator<Item = (&'h [u8], &'h [u8])> + 'h {
        self.entries.iter().map(move |e| (self.name_bytes(e), self.value_bytes(e)))
    }

    /// Self-contained semantic validity of a field value, independent of
    /// any other field already present. Used by both `append` (combined
    /// with a cross-entry check) and `set` (which needs no cross-entry
    /// check since it clears prior occurrences first).
    fn pre_validate_value(field_id: Field, value: &[u8]) -> Result<()> {
        match field_id {
            Field::ContentLength => {
                let mut c = Cursor::new(value);
                let d = grammar::digits(&mut c).map_err(|_| error::bad_content_length("non-numeric Content-Length"))?;
                if !c.is_empty() {
                    return Err(error::bad_content_length("trailing bytes after Content-Length digits"));
                }
                if d.overflowed || d.value >= (1u64 << 63) {
                    return Err(error::bad_content_length("Content-Length overflows 2^63 - 1"));
                }
            }
            Field::TransferEncoding => {
                let mut c = Cursor::new(value);
                let codings = grammar::list_rule(&mut c, 1, |c| grammar::token(c))
                    .map_err(|_| error::bad_transfer_encoding("malformed Transfer-Encoding"))?;
                for (i, coding) in codings.iter().enumerate() {
                    let is_chunked = ascii::eq_ignore_ascii_case(coding, b"chunked");
                    if is_chunked && i != codings.len() - 1 {
                        return Err(error::bad_transfer_encoding("chunked coding must appear last"));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Applies the effect of one already-validated field occurrence onto
    /// the derived-metadata bits. Never fails.
    fn apply_metadata_increment(&mut self, field_id: Field, value: &[u8]) {
        match field_id {
            Field::ContentLength => {
                if let Ok(d) = grammar::digits(&mut Cursor::new(value)) {
                    if !d.overflowed {
                        self.content_length = Some(d.value);
                        self.has_content_length = true;
                    }
                }
            }
            Field::TransferEncoding => {
                if let Ok(codings) = grammar::list_rule(&mut Cursor::new(value), 1, |c| grammar::token(c)) {
                    if let Some(last) = codings.last() {
                        if ascii::eq_ignore_ascii_case(last, b"chunked") {
                            self.has_chunked = true;
                        }
                    }
                }
            }
            Field::Connection => {
                if let Ok(tokens) = grammar::list_rule(&mut Cursor::new(value), 1, |c| grammar::token(c)) {
                    for t in tokens {
                        if ascii::eq_ignore_ascii_case(t, b"close") {
                            self.connection_close = true;
                        }
                        if ascii::eq_ignore_ascii_case(t, b"keep-alive") {
                            self.connection_keep_alive = true;
                        }
                    }
                }
            }
            Field::Expect => {
                if ascii::eq_ignore_ascii_case(value, b"100-continue") {
                    self.has_expect_continue = true;
                }
            }
            _ => {}
        }
    }

    /// If `Transfer-Encoding: chunked` is present, `Content-Length` is
    /// cleared regardless of which field arrived first.
    fn reconcile_framing(&mut self) {
        if self.has_chunked {
            self.has_content_length = false;
            self.content_length = None;
        }
    }

    fn recompute_metadata(&mut self) {
        self.content_length = None;
        self.has_content_length = false;
        self.has_chunked = false;
        self.connection_close = false;
        self.connection_keep_alive = false;
        self.has_expect_continue = false;
        let entries = self.entries.clone();
        for e in &entries {
            let value = self.value_bytes(e).to_vec();
            self.apply_metadata_increment(e.field_id, &value);
        }
        self.reconcile_framing();
    }

    /// Appends a new field occurrence at the end of the field block.
    /// An operation either completes or leaves the header bytewise
    /// unchanged; every check below runs before any byte of `storage` is
    /// touched.
    pub fn append(&mut self, name: &[u8], value: &[u8]) -> Result<()> {
        if !ascii::is_valid_token(name) {
            return Err(error::invalid_argument("field name must be a nonempty token"));
        }
        if !value.iter().all(|&b| ascii::is_field_vchar(b) || ascii::is_ows(b)) {
            return Err(error::invalid_argument("field value contains an invalid byte"));
        }
        if self.entries.len() >= self.limits.max_field_count as usize {
            return Err(error::header_limit("field count exceeds max_field_count"));
        }
        let field_id = Field::lookup(name);
        Self::pre_validate_value(field_id, value)?;
        if field_id == Field::ContentLength && self.has_content_length {
            let d = grammar::digits(&mut Cursor::new(value)).expect("validated by pre_validate_value");
            if self.content_length != Some(d.value) {
                return Err(error::bad_content_length("conflicting Content-Length values"));
            }
        }

        let mut line = Vec::with_capacity(name.len() + value.len() + 4);
        line.extend_from_slice(name);
        line.extend_from_slice(b": ");
        line.extend_from_slice(value);
        line.extend_from_slice(b"\r\n");

        let at = self.front_len - 2;
        self.splice_front(at, 0, &line)?;

        self.entries.push(FieldEntry {
            field_id,
            name_offset: at as u16,
            name_len: name.len() as u16,
            value_offset: (at + name.len() + 2) as u16,
            value_len: value.len() as u16,
        });
        self.apply_metadata_increment(field_id, value);
        self.reconcile_framing();
        Ok(())
    }

    /// Erases every field matching `name`, or only the first if `all` is
    /// false. Returns the number of fields removed.
    pub fn erase(&mut self, name: &[u8], all: bool) -> usize {
        let field_id = Field::lookup(name);
        let mut indices = Vec::new();
        for i in 0..self.entries.len() {
            if self.matches(&self.entries[i], field_id, name) {
                indices.push(i);
                if !all {
                    break;
                }
            }
        }
        self.erase_indices(&indices)
    }

    pub fn erase_by_id(&mut self, field_id: Field, all: bool) -> usize {
        let mut indices = Vec::new();
        for i in 0..self.entries.len() {
            if self.entries[i].field_id == field_id {
                indices.push(i);
                if !all {
                    break;
                }
            }
        }
        self.erase_indices(&indices)
    }

    fn erase_indices(&mut self, indices: &[usize]) -> usize {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        for &i in &sorted {
            let e = self.entries[i];
            let range_start = e.name_offset as usize;
            let range_end = e.value_offset as usize + e.value_len as usize + 2;
            let range_len = range_end - range_start;
            // Removing an existing, well-formed field can never grow the
            // buffer, so this cannot fail.
            self.splice_front(range_start, range_len, &[]).expect("erase cannot grow the buffer");
            self.entries.remove(i);
        }
        if !sorted.is_empty() {
            self.recompute_metadata();
        }
        sorted.len()
    }

    /// Erases every existing occurrence of `name` then appends exactly one
    /// with `value`. The semantic value check runs before any existing
    /// occurrence is removed.
    pub fn set(&mut self, name: &[u8], value: &[u8]) -> Result<()> {
        if !ascii::is_valid_token(name) {
            return Err(error::invalid_argument("field name must be a nonempty token"));
        }
        if !value.iter().all(|&b| ascii::is_field_vchar(b) || ascii::is_ows(b)) {
            return Err(error::invalid_argument("field value contains an invalid byte"));
        }
        let field_id = Field::lookup(name);
        Self::pre_validate_value(field_id, value)?;
        self.erase(name, true);
        self.append(name, value)
    }

    pub fn set_start_line_request(&mut self, method: Method, target: &[u8], version: Version) -> Result<()> {
        let bytes = build_request_line(&method, target, version)?;
        self.splice_front(0, self.start_line_len, &bytes)?;
        self.start_line_len = bytes.len();
        self.start_line = StartLine::Request(RequestLine {
            method,
            target: target.to_vec(),
            version,
        });
        Ok(())
    }

    pub fn set_start_line_response(&mut self, version: Version, status: u16, reason: &[u8]) -> Result<()> {
        let bytes = build_status_line(version, status, reason)?;
        self.splice_front(0, self.start_line_len, &bytes)?;
        self.start_line_len = bytes.len();
        self.start_line = StartLine::Status(StatusLine {
            version,
            status,
            reason: reason.to_vec(),
        });
        Ok(())
    }

    /// The full serialized wire form (start-line + fields + terminal
    /// blank line), ready for transmission.
    pub fn buffer(&self) -> &[u8] {
        &self.storage[self.prefix_capacity..self.prefix_capacity + self.front_len]
    }

    /// Reserved front capacity available to `write_prefix`.
    pub fn prefix_capacity(&self) -> usize {
        self.prefix_capacity
    }

    /// Writes `bytes` right-aligned into the reserved prefix region, so
    /// that `full_buffer()` presents them immediately before the
    /// start-line with no gap. Used by the serializer to prepend e.g.
    /// chunk framing without shifting the header.
    pub fn write_prefix(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.prefix_capacity {
            return Err(error::length_error("prefix exceeds reserved prefix capacity"));
        }
        let start = self.prefix_capacity - bytes.len();
        self.storage[start..self.prefix_capacity].copy_from_slice(bytes);
        self.prefix_used = bytes.len();
        Ok(())
    }

    pub fn clear_prefix(&mut self) {
        self.prefix_used = 0;
    }

    /// The prefix bytes (if any) followed by the wire form, as one
    /// contiguous slice.
    pub fn full_buffer(&self) -> &[u8] {
        let start = self.prefix_capacity - self.prefix_used;
        &self.storage[start..self.prefix_capacity + self.front_len]
    }

    fn ensure_front_capacity(&mut self, needed_front_len: usize) -> Result<()> {
        let hard_max = self.limits.max_header_size.min(65_535) as usize;
        if needed_front_len > hard_max {
            return Err(error::header_limit("header exceeds max_header_size"));
        }
        let current_capacity = self.storage.len() - self.prefix_capacity;
        if needed_front_len <= current_capacity {
            return Ok(());
        }
        let mut new_capacity = current_capacity.max(32);
        while new_capacity < needed_front_len {
            if new_capacity >= hard_max {
                return Err(error::header_limit("header exceeds max_header_size"));
            }
            new_capacity = (new_capacity * 2).min(hard_max);
        }
        let mut new_storage = vec![0u8; self.prefix_capacity + new_capacity];
        new_storage[..self.prefix_capacity].copy_from_slice(&self.storage[..self.prefix_capacity]);
        new_storage[self.prefix_capacity..self.prefix_capacity + self.front_len]
            .copy_from_slice(&self.storage[self.prefix_capacity..self.prefix_capacity + self.front_len]);
        self.storage = new_storage;
        Ok(())
    }

    /// Replaces `storage[base+at .. base+at+old_len]` (where `base` is
    /// `prefix_capacity`) with `new_bytes`, growing the buffer first if
    /// needed, and rebases every field-index entry positioned after the
    /// spliced region by the resulting length delta.
    fn splice_front(&mut self, at: usize, old_len: usize, new_bytes: &[u8]) -> Result<()> {
        let new_len = new_bytes.len();
        if new_len > old_len {
            self.ensure_front_capacity(self.front_len + (new_len - old_len))?;
        }
        let base = self.prefix_capacity;
        let tail_start = at + old_len;
        let tail_len = self.front_len - tail_start;
        if new_len != old_len {
            let mut tail = vec![0u8; tail_len];
            tail.copy_from_slice(&self.storage[base + tail_start..base + tail_start + tail_len]);
            self.storage[base + at..base + at + new_len].copy_from_slice(new_bytes);
            self.storage[base + at + new_len..base + at + new_len + tail_len].copy_from_slice(&tail);
        } else {
            self.storage[base + at..base + at + new_len].copy_from_slice(new_bytes);
        }
        let delta = new_len as isize - old_len as isize;
        self.front_len = (self.front_len as isize + delta) as usize;
        for entry in self.entries.iter_mut() {
            if entry.name_offset as usize >= tail_start {
                entry.name_offset = (entry.name_offset as isize + delta) as u16;
                entry.value_offset = (entry.value_offset as isize + delta) as u16;
            }
        }
        Ok(())
    }
}

/// A non-owning, read-only view over a [`Header`]. In Rust this is
/// naturally just a borrow; this wrapper gives callers a named type to pass
/// across boundaries that should not be able to mutate.
#[derive(Clone, Copy)]
pub struct HeaderView<'a> {
    header: &'a Header,
}

impl<'a> HeaderView<'a> {
    pub fn new(header: &'a Header) -> Self {
        HeaderView { header }
    }

    pub fn find(&self, name: &[u8]) -> Option<(&'a [u8], &'a [u8])> {
        self.header.find(name)
    }

    pub fn find_by_id(&self, field_id: Field) -> Option<(&'a [u8], &'a [u8])> {
        self.header.find_by_id(field_id)
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.header.buffer()
    }

    pub fn has_content_length(&self) -> bool {
        self.header.has_content_length()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header.content_length()
    }

    pub fn has_chunked(&self) -> bool {
        self.header.has_chunked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Method;

    fn limits() -> Limits {
        Limits::default()
    }

    #[test]
    fn append_and_find_roundtrip() {
        let mut h = Header::new_request(Method::Get, b"/", Version::Http11, limits()).unwrap();
        h.append(b"Host", b"example.com").unwrap();
        h.append(b"X-Custom", b"abc").unwrap();
        assert_eq!(h.find(b"host").unwrap().1, b"example.com");
        assert_eq!(h.find(b"HOST").unwrap().1, b"example.com");
        assert_eq!(h.find(b"x-custom").unwrap().1, b"abc");
        assert_eq!(h.field_count(), 2);
    }

    #[test]
    fn find_by_id_matches_find_by_name() {
        let mut h = Header::new_request(Method::Get, b"/", Version::Http11, limits()).unwrap();
        h.append(b"Content-Length", b"5").unwrap();
        assert_eq!(
            h.find_by_id(Field::ContentLength).unwrap().1,
            h.find(b"Content-Length").unwrap().1
        );
    }

    #[test]
    fn content_length_sets_derived_metadata() {
        let mut h = Header::new_request(Method::Post, b"/", Version::Http11, limits()).unwrap();
        h.append(b"Content-Length", b"42").unwrap();
        assert!(h.has_content_length());
        assert_eq!(h.content_length(), Some(42));
    }

    #[test]
    fn conflicting_content_length_rejected() {
        let mut h = Header::new_request(Method::Post, b"/", Version::Http11, limits()).unwrap();
        h.append(b"Content-Length", b"1").unwrap();
        assert!(h.append(b"Content-Length", b"2").is_err());
        assert!(h.append(b"Content-Length", b"1").is_ok());
    }

    #[test]
    fn content_length_overflow_rejected() {
        let mut h = Header::new_request(Method::Post, b"/", Version::Http11, limits()).unwrap();
        assert!(h.append(b"Content-Length", b"99999999999999999999999").is_err());
    }

    #[test]
    fn content_length_exactly_at_2_63_boundary() {
        let mut h = Header::new_request(Method::Post, b"/", Version::Http11, limits()).unwrap();
        h.append(b"Content-Length", b"9223372036854775807").unwrap();
        assert_eq!(h.content_length(), Some(9223372036854775807));

        let mut h2 = Header::new_request(Method::Post, b"/", Version::Http11, limits()).unwrap();
        assert!(h2.append(b"Content-Length", b"9223372036854775808").is_err());
    }

    #[test]
    fn chunked_clears_content_length_either_order() {
        let mut h = Header::new_request(Method::Post, b"/", Version::Http11, limits()).unwrap();
        h.append(b"Content-Length", b"5").unwrap();
        h.append(b"Transfer-Encoding", b"chunked").unwrap();
        assert!(h.has_chunked());
        assert!(!h.has_content_length());

        let mut h2 = Header::new_request(Method::Post, b"/", Version::Http11, limits()).unwrap();
        h2.append(b"Transfer-Encoding", b"chunked").unwrap();
        h2.append(b"Content-Length", b"5").unwrap();
        assert!(h2.has_chunked());
        assert!(!h2.has_content_length());
    }

    #[test]
    fn transfer_encoding_chunked_must_be_last() {
        let mut h = Header::new_request(Method::Post, b"/", Version::Http11, limits()).unwrap();
        assert!(h.append(b"Transfer-Encoding", b"chunked, gzip").is_err());
        assert!(h.append(b"Transfer-Encoding", b"gzip, chunked").is_ok());
    }

    #[test]
    fn erase_removes_field_and_shifts_tail() {
        let mut h = Header::new_request(Method::Get, b"/", Version::Http11, limits()).unwrap();
        h.append(b"A", b"1").unwrap();
        h.append(b"B", b"2").unwrap();
        h.append(b"C", b"3").unwrap();
        assert_eq!(h.erase(b"B", false), 1);
        assert_eq!(h.field_count(), 2);
        assert_eq!(h.find(b"A").unwrap().1, b"1");
        assert_eq!(h.find(b"C").unwrap().1, b"3");
        assert!(h.find(b"B").is_none());
    }

    #[test]
    fn erase_all_occurrences() {
        let mut h = Header::new_request(Method::Get, b"/", Version::Http11, limits()).unwrap();
        h.append(b"X-Dup", b"1").unwrap();
        h.append(b"X-Dup", b"2").unwrap();
        assert_eq!(h.erase(b"X-Dup", true), 2);
        assert_eq!(h.field_count(), 0);
    }

    #[test]
    fn set_replaces_all_prior_occurrences() {
        let mut h = Header::new_request(Method::Get, b"/", Version::Http11, limits()).unwrap();
        h.append(b"X-Dup", b"1").unwrap();
        h.append(b"X-Dup", b"2").unwrap();
        h.set(b"X-Dup", b"final").unwrap();
        assert_eq!(h.count(b"X-Dup"), 1);
        assert_eq!(h.find(b"X-Dup").unwrap().1, b"final");
    }

    #[test]
    fn invalid_field_name_rejected() {
        let mut h = Header::new_request(Method::Get, b"/", Version::Http11, limits()).unwrap();
        assert!(h.append(b"bad header", b"v").is_err());
        assert!(h.append(b"", b"v").is_err());
    }

    #[test]
    fn set_start_line_updates_offsets() {
        let mut h = Header::new_request(Method::Get, b"/", Version::Http11, limits()).unwrap();
        h.append(b"Host", b"example.com").unwrap();
        h.set_start_line_request(Method::Post, b"/a/much/longer/target/path", Version::Http11)
            .unwrap();
        assert_eq!(h.find(b"Host").unwrap().1, b"example.com");
        assert!(h.buffer().starts_with(b"POST /a/much/longer/target/path HTTP/1.1\r\n"));
    }

    #[test]
    fn field_count_limit_enforced() {
        let mut limits = limits();
        limits.max_field_count = 2;
        let mut h = Header::new_request(Method::Get, b"/", Version::Http11, limits).unwrap();
        h.append(b"A", b"1").unwrap();
        h.append(b"B", b"2").unwrap();
        assert!(h.append(b"C", b"3").is_err());
    }

    #[test]
    fn prefix_region_round_trips() {
        let mut h = Header::new_request_with_prefix(Method::Get, b"/", Version::Http11, limits(), 16).unwrap();
        h.write_prefix(b"5\r\n").unwrap();
        assert!(h.full_buffer().starts_with(b"5\r\nGET / HTTP/1.1\r\n"));
        assert!(h.buffer().starts_with(b"GET / HTTP/1.1\r\n"));
    }

    #[test]
    fn response_start_line_and_reason() {
        let h = Header::new_response(Version::Http11, 204, b"No Content", limits()).unwrap();
        assert!(h.buffer().starts_with(b"HTTP/1.1 204 No Content\r\n"));
    }

    #[test]
    fn combine_field_values_joins_in_header_order_skipping_empty() {
        let mut h = Header::new_request(Method::Get, b"/", Version::Http11, limits()).unwrap();
        h.append(b"x", b"1").unwrap();
        h.append(b"y", b"2").unwrap();
        h.append(b"x", b"").unwrap();
        h.append(b"x", b"3").unwrap();
        assert_eq!(h.combine_field_values(b"x").unwrap(), b"1,3");
        assert_eq!(h.combine_field_values(b"y").unwrap(), b"2");
        assert_eq!(h.combine_field_values(b"q"), None);
    }

    #[test]
    fn combine_field_values_by_id_matches_by_name() {
        let mut h = Header::new_request(Method::Post, b"/", Version::Http11, limits()).unwrap();
        h.append(b"Content-Length", b"5").unwrap();
        assert_eq!(
            h.combine_field_values_by_id(Field::ContentLength),
            h.combine_field_values(b"content-length")
        );
    }
}
