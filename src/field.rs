//! The closed set of well-known HTTP field names.
//!
//! Lookup by well-known id is an O(1) enum compare; lookup by name resolves
//! to an id through a perfect hash map built at compile time by the `phf`
//! crate, the same technique a method registry might use for a closed set
//! of names. Names in the table are stored pre-lowercased; a candidate name
//! is folded on the fly with `ascii::lower_into` before the hash lookup.

use crate::ascii;

/// A well-known field identifier. `Other` represents any field name not in
/// this closed set; those are compared by case-insensitive byte equality
/// instead of by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u16)]
pub enum Field {
    Accept,
    AcceptCharset,
    AcceptEncoding,
    AcceptLanguage,
    AcceptRanges,
    AccessControlAllowCredentials,
    AccessControlAllowHeaders,
    AccessControlAllowMethods,
    AccessControlAllowOrigin,
    AccessControlExposeHeaders,
    AccessControlMaxAge,
    AccessControlRequestHeaders,
    AccessControlRequestMethod,
    Age,
    Allow,
    AltSvc,
    Authorization,
    CacheControl,
    Connection,
    ContentDisposition,
    ContentEncoding,
    ContentLanguage,
    ContentLength,
    ContentLocation,
    ContentRange,
    ContentType,
    Cookie,
    Date,
    Etag,
    Expect,
    Expires,
    Forwarded,
    From,
    Host,
    IfMatch,
    IfModifiedSince,
    IfNoneMatch,
    IfRange,
    IfUnmodifiedSince,
    LastModified,
    Location,
    Origin,
    Pragma,
    ProxyAuthenticate,
    ProxyAuthorization,
    Range,
    Referer,
    RetryAfter,
    SecWebSocketAccept,
    SecWebSocketKey,
    SecWebSocketProtocol,
    SecWebSocketVersion,
    Server,
    SetCookie,
    Te,
    Trailer,
    TransferEncoding,
    Upgrade,
    UserAgent,
    Vary,
    Via,
    WwwAuthenticate,
    XForwardedFor,
    XForwardedHost,
    XForwardedProto,
    /// Any field name outside the closed set above.
    Other,
}

impl Field {
    /// Canonical (mixed-case, wire-preferred) spelling, used only for
    /// fields the caller constructs by id rather than by literal bytes
    /// (e.g. `Header::append(Field::Host, ...)`).
    pub fn canonical_name(self) -> &'static str {
        match self {
            Field::Accept => "Accept",
            Field::AcceptCharset => "Accept-Charset",
            Field::AcceptEncoding => "Accept-Encoding",
            Field::AcceptLanguage => "Accept-Language",
            Field::AcceptRanges => "Accept-Ranges",
            Field::AccessControlAllowCredentials => "Access-Control-Allow-Credentials",
            Field::AccessControlAllowHeaders => "Access-Control-Allow-Headers",
            Field::AccessControlAllowMethods => "Access-Control-Allow-Methods",
            Field::AccessControlAllowOrigin => "Access-Control-Allow-Origin",
            Field::AccessControlExposeHeaders => "Access-Control-Expose-Headers",
            Field::AccessControlMaxAge => "Access-Control-Max-Age",
            Field::AccessControlRequestHeaders => "Access-Control-Request-Headers",
            Field::AccessControlRequestMethod => "Access-Control-Request-Method",
            Field::Age => "Age",
            Field::Allow => "Allow",
            Field::AltSvc => "Alt-Svc",
            Field::Authorization => "Authorization",
            Field::CacheControl => "Cache-Control",
            Field::Connection => "Connection",
            Field::ContentDisposition => "Content-Disposition",
            Field::ContentEncoding => "Content-Encoding",
            Field::ContentLanguage => "Content-Language",
            Field::ContentLength => "Content-Length",
            Field::ContentLocation => "Content-Location",
            Field::ContentRange => "Content-Range",
            Field::ContentType => "Content-Type",
            Field::Cookie => "Cookie",
            Field::Date => "Date",
            Field::Etag => "ETag",
            Field::Expect => "Expect",
            Field::Expires => "Expires",
            Field::Forwarded => "Forwarded",
            Field::From => "From",
            Field::Host => "Host",
            Field::IfMatch => "If-Match",
            Field::IfModifiedSince => "If-Modified-Since",
            Field::IfNoneMatch => "If-None-Match",
            Field::IfRange => "If-Range",
            Field::IfUnmodifiedSince => "If-Unmodified-Since",
            Field::LastModified => "Last-Modified",
            Field::Location => "Location",
            Field::Origin => "Origin",
            Field::Pragma => "Pragma",
            Field::ProxyAuthenticate => "Proxy-Authenticate",
            Field::ProxyAuthorization => "Proxy-Authorization",
            Field::Range => "Range",
            Field::Referer => "Referer",
            Field::RetryAfter => "Retry-After",
            Field::SecWebSocketAccept => "Sec-WebSocket-Accept",
            Field::SecWebSocketKey => "Sec-WebSocket-Key",
            Field::SecWebSocketProtocol => "Sec-WebSocket-Protocol",
            Field::SecWebSocketVersion => "Sec-WebSocket-Version",
            Field::Server => "Server",
            Field::SetCookie => "Set-Cookie",
            Field::Te => "TE",
            Field::Trailer => "Trailer",
            Field::TransferEncoding => "Transfer-Encoding",
            Field::Upgrade => "Upgrade",
            Field::UserAgent => "User-Agent",
            Field::Vary => "Vary",
            Field::Via => "Via",
            Field::WwwAuthenticate => "WWW-Authenticate",
            Field::XForwardedFor => "X-Forwarded-For",
            Field::XForwardedHost => "X-Forwarded-Host",
            Field::XForwardedProto => "X-Forwarded-Proto",
            Field::Other => "",
        }
    }

    /// Looks up the well-known id for `name`, or `Field::Other` if `name`
    /// is not in the closed set. `name` need not be lowercase.
    pub fn lookup(name: &[u8]) -> Field {
        // The longest canonical name above is under 40 bytes; known-field
        // names are always short, so a fixed stack buffer avoids a heap
        // allocation on the hot path.
        if name.len() > 40 {
            return Field::Other;
        }
        let mut buf = [0u8; 40];
        let lower = &mut buf[..name.len()];
        ascii::lower_into(name, lower);
        KNOWN_FIELDS
            .get(unsafe { std::str::from_utf8_unchecked(lower) })
            .copied()
            .unwrap_or(Field::Other)
    }
}

static KNOWN_FIELDS: phf::Map<&'static str, Field> = phf::phf_map! {
    "accept" => Field::Accept,
    "accept-charset" => Field::AcceptCharset,
    "accept-encoding" => Field::AcceptEncoding,
    "accept-language" => Field::AcceptLanguage,
    "accept-ranges" => Field::AcceptRanges,
    "access-control-allow-credentials" => Field::AccessControlAllowCredentials,
    "access-control-allow-headers" => Field::AccessControlAllowHeaders,
    "access-control-allow-methods" => Field::AccessControlAllowMethods,
    "access-control-allow-origin" => Field::AccessControlAllowOrigin,
    "access-control-expose-headers" => Field::AccessControlExposeHeaders,
    "access-control-max-age" => Field::AccessControlMaxAge,
    "access-control-request-headers" => Field::AccessControlRequestHeaders,
    "access-control-request-method" => Field::AccessControlRequestMethod,
    "age" => Field::Age,
    "allow" => Field::Allow,
    "alt-svc" => Field::AltSvc,
    "authorization" => Field::Authorization,
    "cache-control" => Field::CacheControl,
    "connection" => Field::Connection,
    "content-disposition" => Field::ContentDisposition,
    "content-encoding" => Field::ContentEncoding,
    "content-language" => Field::ContentLanguage,
    "content-length" => Field::ContentLength,
    "content-location" => Field::ContentLocation,
    "content-range" => Field::ContentRange,
    "content-type" => Field::ContentType,
    "cookie" => Field::Cookie,
    "date" => Field::Date,
    "etag" => Field::Etag,
    "expect" => Field::Expect,
    "expires" => Field::Expires,
    "forwarded" => Field::Forwarded,
    "from" => Field::From,
    "host" => Field::Host,
    "if-match" => Field::IfMatch,
    "if-modified-since" => Field::IfModifiedSince,
    "if-none-match" => Field::IfNoneMatch,
    "if-range" => Field::IfRange,
    "if-unmodified-since" => Field::IfUnmodifiedSince,
    "last-modified" => Field::LastModified,
    "location" => Field::Location,
    "origin" => Field::Origin,
    "pragma" => Field::Pragma,
    "proxy-authenticate" => Field::ProxyAuthenticate,
    "proxy-authorization" => Field::ProxyAuthorization,
    "range" => Field::Range,
    "referer" => Field::Referer,
    "retry-after" => Field::RetryAfter,
    "sec-websocket-accept" => Field::SecWebSocketAccept,
    "sec-websocket-key" => Field::SecWebSocketKey,
    "sec-websocket-protocol" => Field::SecWebSocketProtocol,
    "sec-websocket-version" => Field::SecWebSocketVersion,
    "server" => Field::Server,
    "set-cookie" => Field::SetCookie,
    "te" => Field::Te,
    "trailer" => Field::Trailer,
    "transfer-encoding" => Field::TransferEncoding,
    "upgrade" => Field::Upgrade,
    "user-agent" => Field::UserAgent,
    "vary" => Field::Vary,
    "via" => Field::Via,
    "www-authenticate" => Field::WwwAuthenticate,
    "x-forwarded-for" => Field::XForwardedFor,
    "x-forwarded-host" => Field::XForwardedHost,
    "x-forwarded-proto" => Field::XForwardedProto,
};
