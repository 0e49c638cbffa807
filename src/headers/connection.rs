//! `Connection` header token parsing (RFC 7230 Section 6.1) and the
//! persistence decision in RFC 7230 Section 6.3, layered on top of
//! [`crate::header::Header`]'s generic field access.

use crate::ascii;
use crate::error::Result;
use crate::field::Field;
use crate::grammar::{self, Cursor};
use crate::header::Header;
use crate::message::Version;

const MAX_CONNECTION_OPTIONS: usize = 8;

const KEEP_ALIVE: &[u8] = b"keep-alive";
const CLOSE: &[u8] = b"close";

/// A single `connection-option` token. `Other` borrows from the header's own
/// storage rather than allocating, since these are read only for the
/// lifetime of the borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOption<'a> {
    KeepAlive,
    Close,
    Other(&'a [u8]),
}

/// Parses every `Connection` field present (RFC 7230 permits the field to
/// repeat; its value is a comma-separated list either way) into the ordered
/// set of `connection-option` tokens, capped at `MAX_CONNECTION_OPTIONS` to
/// bound a pathological peer sending an enormous list.
pub fn parse_connection(header: &Header) -> Result<Vec<ConnectionOption<'_>>> {
    let mut options = Vec::new();
    for (_, value) in header.find_all_by_id(Field::Connection) {
        if options.len() >= MAX_CONNECTION_OPTIONS {
            break;
        }
        let mut c = Cursor::new(value);
        let remaining_budget = MAX_CONNECTION_OPTIONS - options.len();
        let tokens = grammar::list_rule(&mut c, 1, grammar::token)?;
        for name in tokens.into_iter().take(remaining_budget) {
            options.push(if ascii::eq_ignore_ascii_case(name, KEEP_ALIVE) {
                ConnectionOption::KeepAlive
            } else if ascii::eq_ignore_ascii_case(name, CLOSE) {
                ConnectionOption::Close
            } else {
                ConnectionOption::Other(name)
            });
        }
    }
    Ok(options)
}

/// Whether a connection may persist after this message, per RFC 7230
/// Section 6.3: HTTP/1.1 defaults to persistent unless `close` is present;
/// HTTP/1.0 defaults to non-persistent unless `keep-alive` is present and
/// `close` is absent.
pub fn can_connection_persist(version: Version, header: &Header) -> Result<bool> {
    let options = parse_connection(header)?;
    let has_close = options.iter().any(|o| *o == ConnectionOption::Close);
    let has_keep_alive = options.iter().any(|o| *o == ConnectionOption::KeepAlive);

    if has_close {
        return Ok(false);
    }
    if version == Version::Http11 {
        return Ok(true);
    }
    Ok(has_keep_alive)
}

/// Sets the `Connection` header to `keep-alive` or `close`, replacing any
/// prior occurrence.
pub fn append_connection_header(header: &mut Header, persist_connection: bool) -> Result<()> {
    let value: &[u8] = if persist_connection { b"keep-alive" } else { b"close" };
    header.set(b"Connection", value)
}
