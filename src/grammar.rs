//! Single-pass grammar primitives for the RFC 7230 token, list, and
//! quoted-string productions.
//!
//! Each rule below is a pure function from a [`Cursor`] to `Result<T>` that
//! advances the cursor past what it consumed and leaves it untouched on
//! failure. None of these allocate; callers that need an owned copy of a
//! matched range do so themselves. Hand-rolled as a small library of
//! single-pass parsers rather than pulling in a combinator crate.

use crate::ascii;
use crate::error::{self, Result};

/// A cursor over a byte slice that rules advance as they match.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }
}

/// `token = 1*tchar`. Returns the matched byte range.
pub fn token<'a>(c: &mut Cursor<'a>) -> Result<&'a [u8]> {
    let start = c.pos();
    while c.peek().map(ascii::is_tchar).unwrap_or(false) {
        c.advance(1);
    }
    if c.pos() == start {
        return Err(error::bad_field("expected token"));
    }
    Ok(c.remaining_from(start))
}

impl<'a> Cursor<'a> {
    fn remaining_from(&self, start: usize) -> &'a [u8] {
        &self.buf[start..self.pos]
    }
}

/// `OWS = *(SP / HTAB)`. Always succeeds, possibly matching zero bytes.
pub fn ows(c: &mut Cursor<'_>) {
    while c.peek().map(ascii::is_ows).unwrap_or(false) {
        c.advance(1);
    }
}

/// `CRLF`.
pub fn crlf(c: &mut Cursor<'_>) -> Result<()> {
    if c.remaining().starts_with(b"\r\n") {
        c.advance(2);
        Ok(())
    } else {
        Err(error::bad_field("expected CRLF"))
    }
}

/// The result of matching a `quoted-string`: the raw range including the
/// surrounding DQUOTEs, plus the length the value would have once escapes
/// are removed, exposed separately so a caller can size an unescape buffer
/// without a second pass.
pub struct QuotedString<'a> {
    pub raw: &'a [u8],
    pub unescaped_size: usize,
}

/// `quoted-string = DQUOTE *( qdtext / quoted-pair ) DQUOTE`.
pub fn quoted_string<'a>(c: &mut Cursor<'a>) -> Result<QuotedString<'a>> {
    let start = c.pos();
    if c.peek() != Some(b'"') {
        return Err(error::bad_field("expected quoted-string"));
    }
    c.advance(1);
    let mut unescaped_size = 0usize;
    loop {
        match c.peek() {
            None => return Err(error::bad_field("unterminated quoted-string")),
            Some(b'"') => {
                c.advance(1);
                break;
            }
            Some(b'\\') => {
                c.advance(1);
                let escaped = c.peek().ok_or_else(|| error::bad_field("dangling quoted-pair"))?;
                if !ascii::is_vchar(escaped) && !ascii::is_ows(escaped) && !ascii::is_obs_text(escaped) {
                    return Err(error::bad_field("invalid quoted-pair"));
                }
                c.advance(1);
                unescaped_size += 1;
            }
            Some(b) if ascii::is_qdtext(b) => {
                c.advance(1);
                unescaped_size += 1;
            }
            Some(_) => return Err(error::bad_field("invalid quoted-string byte")),
        }
    }
    Ok(QuotedString {
        raw: c.remaining_from(start),
        unescaped_size,
    })
}

/// `1*DIGIT`, parsed as a `u64` with an overflow flag rather than a hard
/// error, so callers (e.g. `Content-Length`) can choose the precise
/// `ErrorKind` for the overflow case.
pub struct Digits {
    pub value: u64,
    pub overflowed: bool,
    pub digit_count: usize,
}

pub fn digits(c: &mut Cursor<'_>) -> Result<Digits> {
    let start = c.pos();
    let mut value: u64 = 0;
    let mut overflowed = false;
    while let Some(b) = c.peek() {
        if !b.is_ascii_digit() {
            break;
        }
        c.advance(1);
        let digit = (b - b'0') as u64;
        match value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
            Some(v) => value = v,
            None => overflowed = true,
        }
    }
    let digit_count = c.pos() - start;
    if digit_count == 0 {
        return Err(error::bad_field("expected digits"));
    }
    Ok(Digits {
        value,
        overflowed,
        digit_count,
    })
}

use crate::message::Version;

/// `HTTP-version = "HTTP/" DIGIT "." DIGIT`, restricted to the 1.0 and 1.1
/// versions this crate supports.
pub fn version(c: &mut Cursor<'_>) -> Result<Version> {
    let rest = c.remaining();
    if rest.starts_with(b"HTTP/1.1") {
        c.advance(8);
        Ok(Version::Http11)
    } else if rest.starts_with(b"HTTP/1.0") {
        c.advance(8);
        Ok(Version::Http10)
    } else {
        Err(error::bad_version("expected HTTP/1.0 or HTTP/1.1"))
    }
}

/// `status-code = 3DIGIT`.
pub fn status_code(c: &mut Cursor<'_>) -> Result<u16> {
    let rest = c.remaining();
    if rest.len() < 3 || !rest[..3].iter().all(|b| b.is_ascii_digit()) {
        return Err(error::bad_start_line("expected 3DIGIT status code"));
    }
    let value = (rest[0] - b'0') as u16 * 100 + (rest[1] - b'0') as u16 * 10 + (rest[2] - b'0') as u16;
    c.advance(3);
    Ok(value)
}

/// `request-target`: opaque bytes up to the next SP. The grammar layer does
/// not parse URLs; it only delimits the token, leaving interpretation to
/// the caller.
pub fn request_target<'a>(c: &mut Cursor<'a>) -> Result<&'a [u8]> {
    let start = c.pos();
    while let Some(b) = c.peek() {
        if b == b' ' {
            break;
        }
        if !ascii::is_vchar(b) {
            return Err(error::bad_start_line("invalid byte in request-target"));
        }
        c.advance(1);
    }
    if c.pos() == start {
        return Err(error::bad_start_line("empty request-target"));
    }
    Ok(c.remaining_from(start))
}

/// The RFC 7230 Section 7 legacy list rule: `#element => element *( OWS ","
/// OWS [ element ] )`, generalized over an inner rule `R`. Returns the
/// matched, non-empty elements in order; empty elements (runs of bare
/// commas) are skipped rather than yielded.
pub fn list_rule<'a, T>(
    c: &mut Cursor<'a>,
    min: usize,
    mut element: impl FnMut(&mut Cursor<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    loop {
        ows(c);
        let before_comma = c.pos();
        if c.peek() == Some(b',') {
            c.advance(1);
            continue;
        }
        let save = c.pos();
        match element(c) {
            Ok(value) => out.push(value),
            Err(_) if save == before_comma => {
                c.pos = save;
                break;
            }
            Err(e) => return Err(e),
        }
        ows(c);
        if c.peek() == Some(b',') {
            c.advance(1);
        } else {
            break;
        }
    }
    if out.len() < min {
        return Err(error::bad_field("list-rule below minimum element count"));
    }
    Ok(out)
}

/// `parameter = token "=" ( token / quoted-string )`.
pub enum ParameterValue<'a> {
    Token(&'a [u8]),
    Quoted(QuotedString<'a>),
}

pub struct Parameter<'a> {
    pub name: &'a [u8],
    pub value: ParameterValue<'a>,
}

pub fn parameter<'a>(c: &mut Cursor<'a>) -> Result<Parameter<'a>> {
    let name = token(c)?;
    if c.peek() != Some(b'=') {
        return Err(error::bad_field("expected '=' in parameter"));
    }
    c.advance(1);
    let value = if c.peek() == Some(b'"') {
        ParameterValue::Quoted(quoted_string(c)?)
    } else {
        ParameterValue::Token(token(c)?)
    };
    Ok(Parameter { name, value })
}

/// `media-type = type "/" subtype *( OWS ";" OWS parameter )`.
pub struct MediaType<'a> {
    pub kind: &'a [u8],
    pub subtype: &'a [u8],
    pub parameters: Vec<Parameter<'a>>,
}

pub fn media_type<'a>(c: &mut Cursor<'a>) -> Result<MediaType<'a>> {
    let kind = token(c)?;
    if c.peek() != Some(b'/') {
        return Err(error::bad_field("expected '/' in media-type"));
    }
    c.advance(1);
    let subtype = token(c)?;
    let mut parameters = Vec::new();
    loop {
        ows(c);
        if c.peek() != Some(b';') {
            break;
        }
        c.advance(1);
        ows(c);
        parameters.push(parameter(c)?);
    }
    Ok(MediaType {
        kind,
        subtype,
        parameters,
    })
}

/// `protocol = protocol-name ["/" protocol-version]`, as used in `Upgrade`.
pub struct UpgradeProtocol<'a> {
    pub name: &'a [u8],
    pub version: Option<&'a [u8]>,
}

pub fn upgrade_protocol<'a>(c: &mut Cursor<'a>) -> Result<UpgradeProtocol<'a>> {
    let name = token(c)?;
    let version = if c.peek() == Some(b'/') {
        c.advance(1);
        Some(token(c)?)
    } else {
        None
    };
    Ok(UpgradeProtocol { name, version })
}

/// A single `;token[=(token/quoted-string)]` chunk extension. Validated but
/// semantically ignored.
pub struct ChunkExt<'a> {
    pub name: &'a [u8],
    pub value: Option<ParameterValue<'a>>,
}

pub fn chunk_ext<'a>(c: &mut Cursor<'a>) -> Result<Vec<ChunkExt<'a>>> {
    let mut out = Vec::new();
    loop {
        if c.peek() != Some(b';') {
            break;
        }
        c.advance(1);
        let name = token(c).map_err(|_| error::bad_chunk_extension("expected token after ';'"))?;
        let value = if c.peek() == Some(b'=') {
            c.advance(1);
            Some(if c.peek() == Some(b'"') {
                ParameterValue::Quoted(
                    quoted_string(c).map_err(|_| error::bad_chunk_extension("bad quoted value"))?,
                )
            } else {
                ParameterValue::Token(
                    token(c).map_err(|_| error::bad_chunk_extension("bad token value"))?,
                )
            })
        } else {
            None
        };
        out.push(ChunkExt { name, value });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_matches_tchars_only() {
        let mut c = Cursor::new(b"foo-Bar123 ");
        assert_eq!(token(&mut c).unwrap(), b"foo-Bar123");
        assert_eq!(c.pos(), 10);
    }

    #[test]
    fn token_rejects_empty() {
        let mut c = Cursor::new(b" foo");
        assert!(token(&mut c).is_err());
    }

    #[test]
    fn digits_overflow_flag() {
        let mut c = Cursor::new(b"99999999999999999999999");
        let d = digits(&mut c).unwrap();
        assert!(d.overflowed);
    }

    #[test]
    fn digits_exact_max() {
        let mut c = Cursor::new(b"9223372036854775807");
        let d = digits(&mut c).unwrap();
        assert!(!d.overflowed);
        assert_eq!(d.value, 9223372036854775807);
    }

    #[test]
    fn version_parses_both() {
        let mut c = Cursor::new(b"HTTP/1.1\r\n");
        assert_eq!(version(&mut c).unwrap(), Version::Http11);
        let mut c = Cursor::new(b"HTTP/1.0\r\n");
        assert_eq!(version(&mut c).unwrap(), Version::Http10);
        let mut c = Cursor::new(b"HTTP/2.0\r\n");
        assert!(version(&mut c).is_err());
    }

    #[test]
    fn status_code_three_digits() {
        let mut c = Cursor::new(b"200 OK");
        assert_eq!(status_code(&mut c).unwrap(), 200);
        let mut c = Cursor::new(b"2 OK");
        assert!(status_code(&mut c).is_err());
    }

    #[test]
    fn list_rule_skips_empty_elements() {
        let mut c = Cursor::new(b"a, ,b ,, c");
        let out = list_rule(&mut c, 1, |c| token(c)).unwrap();
        assert_eq!(out, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
    }

    #[test]
    fn quoted_string_tracks_unescaped_size() {
        let mut c = Cursor::new(br#""a\"b" rest"#);
        let qs = quoted_string(&mut c).unwrap();
        assert_eq!(qs.raw, br#""a\"b""#);
        assert_eq!(qs.unescaped_size, 3);
    }

    #[test]
    fn chunk_ext_parses_multiple() {
        let mut c = Cursor::new(b";a=1;b=\"two\" rest");
        let exts = chunk_ext(&mut c).unwrap();
        assert_eq!(exts.len(), 2);
        assert_eq!(exts[0].name, b"a");
    }
}
