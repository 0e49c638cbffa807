use bytes::Bytes;

use httpwire::error::ErrorKind;
use httpwire::header::Header;
use httpwire::limits::Limits;
use httpwire::message::{Method, StartLine, Version};
use httpwire::parser::{Mode, Parser, Progress};
use httpwire::serializer::{Body, Serializer};

fn feed(parser: &mut Parser, bytes: &[u8]) {
    let buf = parser.prepare(bytes.len()).unwrap();
    buf.copy_from_slice(bytes);
    parser.commit(bytes.len());
}

fn drain_to_complete(parser: &mut Parser) {
    loop {
        match parser.parse().unwrap() {
            Progress::Complete => break,
            Progress::HeaderReady | Progress::BodyProgress { .. } | Progress::NeedMore => continue,
        }
    }
}

/// Scenario 1: a simple GET with one header field and no body.
#[test]
fn simple_get_request() {
    let mut p = Parser::new(Mode::Request, Limits::default());
    feed(&mut p, b"GET / HTTP/1.1\r\nHost: a\r\n\r\n");
    assert_eq!(p.parse().unwrap(), Progress::HeaderReady);
    assert_eq!(p.parse().unwrap(), Progress::Complete);

    let header = p.header().unwrap();
    match header.start_line() {
        StartLine::Request(r) => {
            assert_eq!(r.method, Method::Get);
            assert_eq!(r.target, b"/");
            assert_eq!(r.version, Version::Http11);
        }
        _ => panic!("expected a request-line"),
    }
    assert_eq!(header.find(b"host"), Some((&b"Host"[..], &b"a"[..])));
    assert_eq!(header.field_count(), 1);
}

/// Invariant 1: feeding the same syntactically valid message in any
/// fragmentation yields identical headers and body bytes.
#[test]
fn fragmentation_matrix_yields_identical_results() {
    let message: &[u8] =
        b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\nX-Tag: v\r\n\r\nhello world";

    let split_points: &[&[usize]] = &[
        &[],                       // all at once
        &[1],                      // split after first byte
        &[message.len() - 1],      // split before last byte
        &[20, 40, 55],             // a few interior points
    ];

    let mut results = Vec::new();
    for splits in split_points {
        let mut p = Parser::new(Mode::Response { request_method: None }, Limits::default());
        let mut pos = 0usize;
        let mut cuts: Vec<usize> = splits.to_vec();
        cuts.push(message.len());
        cuts.sort_unstable();
        for cut in cuts {
            feed(&mut p, &message[pos..cut]);
            pos = cut;
            loop {
                match p.parse().unwrap() {
                    Progress::NeedMore => break,
                    Progress::Complete => break,
                    _ => continue,
                }
            }
        }
        drain_to_complete(&mut p);
        let header = p.header().unwrap();
        let fields: Vec<(Vec<u8>, Vec<u8>)> =
            header.iter().map(|(n, v)| (n.to_vec(), v.to_vec())).collect();
        let body = p.default_sink_data().unwrap().to_vec();
        results.push((fields, body));
    }

    // Byte-at-a-time as the strictest fragmentation.
    {
        let mut p = Parser::new(Mode::Response { request_method: None }, Limits::default());
        for &b in message {
            feed(&mut p, &[b]);
            loop {
                match p.parse().unwrap() {
                    Progress::NeedMore => break,
                    Progress::Complete => break,
                    _ => continue,
                }
            }
        }
        drain_to_complete(&mut p);
        let header = p.header().unwrap();
        let fields: Vec<(Vec<u8>, Vec<u8>)> =
            header.iter().map(|(n, v)| (n.to_vec(), v.to_vec())).collect();
        let body = p.default_sink_data().unwrap().to_vec();
        results.push((fields, body));
    }

    for pair in results.windows(2) {
        assert_eq!(pair[0], pair[1]);
    }
}

/// Invariant 2: `parse(serialize(H))` reproduces the same start-line and
/// field multiset, in order, as the header built via the mutation API.
#[test]
fn mutation_api_round_trips_through_serialize_and_parse() {
    let mut header = Header::new_response(Version::Http11, 200, b"OK", Limits::default()).unwrap();
    header.append(b"X-A", b"1").unwrap();
    header.append(b"X-B", b"2").unwrap();
    header.append(b"X-A", b"3").unwrap();
    header.set(b"Content-Length", b"5").unwrap();

    let original_fields: Vec<(Vec<u8>, Vec<u8>)> =
        header.iter().map(|(n, v)| (n.to_vec(), v.to_vec())).collect();

    let mut s = Serializer::new(Limits::default());
    s.start(header, Some(Body::Buffers(vec![Bytes::from_static(b"hello")])))
        .unwrap();
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
    feed(&mut p, &wire);
    assert_eq!(p.parse().unwrap(), Progress::HeaderReady);
    assert_eq!(p.parse().unwrap(), Progress::BodyProgress { bytes: 5 });
    assert_eq!(p.parse().unwrap(), Progress::Complete);

    let reparsed = p.header().unwrap();
    let reparsed_fields: Vec<(Vec<u8>, Vec<u8>)> =
        reparsed.iter().map(|(n, v)| (n.to_vec(), v.to_vec())).collect();
    assert_eq!(reparsed_fields, original_fields);
    assert_eq!(p.default_sink_data().unwrap(), b"hello");
}

/// Boundary: a header block exactly at `max_header_size` is accepted; one
/// byte larger is rejected with `header_limit`.
#[test]
fn header_size_boundary() {
    // "GET / HTTP/1.1\r\n\r\n" with no fields is 18 bytes.
    let at_limit = Limits { max_header_size: 18, ..Limits::default() };
    assert!(Header::new_request(Method::Get, b"/", Version::Http11, at_limit).is_ok());

    let one_under = Limits { max_header_size: 17, ..Limits::default() };
    let err = Header::new_request(Method::Get, b"/", Version::Http11, one_under).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HeaderLimit);
}

/// Boundary: field count exactly at the limit is accepted; one more fails.
#[test]
fn field_count_boundary() {
    let limits = Limits { max_field_count: 2, ..Limits::default() };
    let mut h = Header::new_request(Method::Get, b"/", Version::Http11, limits).unwrap();
    h.append(b"A", b"1").unwrap();
    h.append(b"B", b"2").unwrap();
    assert_eq!(h.field_count(), 2);
    assert_eq!(h.append(b"C", b"3").unwrap_err().kind(), ErrorKind::HeaderLimit);
}

/// Boundary: chunk-size 0 followed by CRLF CRLF terminates cleanly, and
/// trailers are parsed when present.
#[test]
fn chunk_zero_size_terminates_and_parses_trailers() {
    let mut p = Parser::new(Mode::Response { request_method: None }, Limits::default());
    feed(
        &mut p,
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\nX-Trailer: done\r\n\r\n",
    );
    assert_eq!(p.parse().unwrap(), Progress::HeaderReady);
    loop {
        match p.parse().unwrap() {
            Progress::Complete => break,
            Progress::BodyProgress { .. } | Progress::NeedMore => continue,
            Progress::HeaderReady => unreachable!(),
        }
    }
    assert_eq!(p.default_sink_data().unwrap(), b"hello");
}

/// Conflicting framing: both Content-Length and chunked present; chunked
/// wins and no error is raised.
#[test]
fn conflicting_framing_prefers_chunked() {
    let mut p = Parser::new(Mode::Response { request_method: None }, Limits::default());
    feed(
        &mut p,
        b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n",
    );
    assert_eq!(p.parse().unwrap(), Progress::HeaderReady);
    assert!(p.header().unwrap().has_chunked());
    assert!(!p.header().unwrap().has_content_length());
    loop {
        match p.parse().unwrap() {
            Progress::Complete => break,
            Progress::BodyProgress { .. } | Progress::NeedMore => continue,
            Progress::HeaderReady => unreachable!(),
        }
    }
}

/// obs-fold collapse: the fold's CR and LF each become one SP, and the
/// continuation line's own leading SP is left untouched, for three spaces
/// between the two physical lines' content.
#[test]
fn obs_fold_collapses_cr_and_lf_to_individual_spaces() {
    let mut p = Parser::new(Mode::Request, Limits::default());
    feed(&mut p, b"GET / HTTP/1.1\r\nX: a\r\n b\r\n\r\n");
    assert_eq!(p.parse().unwrap(), Progress::HeaderReady);
    let header = p.header().unwrap();
    assert_eq!(header.find(b"x").unwrap().1, b"a   b");
}

/// A zero-length identity body leaves any trailing bytes in the stream
/// untouched, available to the next pipelined message rather than being
/// folded into this one.
#[test]
fn zero_length_content_length_leaves_trailing_bytes_for_next_message() {
    let mut p = Parser::new(Mode::Request, Limits::default());
    feed(
        &mut p,
        b"GET /first HTTP/1.1\r\nContent-Length: 0\r\n\r\nGET /second HTTP/1.1\r\nHost: a\r\n\r\n",
    );
    assert_eq!(p.parse().unwrap(), Progress::HeaderReady);
    assert_eq!(p.parse().unwrap(), Progress::Complete);
    p.reset();
    assert_eq!(p.parse().unwrap(), Progress::HeaderReady);
    match p.header().unwrap().start_line() {
        StartLine::Request(r) => assert_eq!(r.target, b"/second"),
        _ => panic!("expected a request-line"),
    }
}

/// The serializer's zero-copy path: an identity-framed buffer body with no
/// filter chain is handed to the output queue without copying.
#[test]
fn zero_copy_identity_send_points_into_the_caller_buffer() {
    let body = Bytes::from_static(b"zero-copy-payload");
    let body_ptr = body.as_ptr();

    let header = Header::new_response(Version::Http11, 200, b"OK", Limits::default()).unwrap();
    let mut s = Serializer::new(Limits::default());
    s.start(header, Some(Body::Buffers(vec![body.clone()]))).unwrap();

    // First segment is the header; consume it to reach the body segment.
    let header_len = s.prepare().unwrap().len();
    s.consume(header_len);

    let segment = s.prepare().unwrap();
    assert_eq!(segment, &body[..]);
    assert_eq!(segment.as_ptr(), body_ptr);
}
