//! HTTP/1.1 client codec.
//!
//! Requests are written in one pass with headers in the order and spelling
//! dictated by the client's profile. Responses are read into memory: the head
//! is parsed with `httparse` and the body is framed by `Content-Length`,
//! chunked transfer coding, or connection close.

use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};
use http::{Method, StatusCode, Version};

use crate::{
    header::{self, HeaderMap, HeaderName, HeaderValue, OrigHeaderMap},
    util::Escape,
    Error, Result,
};

pub(crate) const DEFAULT_MAX_HEADERS: usize = 100;
const MAX_HEAD_SIZE: usize = 64 * 1024;
const MAX_LINE_SIZE: usize = 4096;
const READ_CHUNK_SIZE: usize = 8192;
const AVERAGE_HEADER_SIZE: usize = 30;

/// What is needed to put a request head on the wire.
pub(crate) struct RequestHead<'a> {
    pub(crate) method: &'a Method,
    pub(crate) target: &'a str,
    pub(crate) headers: &'a HeaderMap,
    pub(crate) casing: &'a OrigHeaderMap,
    pub(crate) order: &'a OrigHeaderMap,
}

#[derive(Debug)]
pub(crate) struct ResponseHead {
    pub(crate) version: Version,
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    /// Header lines as received, with the server's spelling.
    pub(crate) entries: Vec<(String, HeaderValue)>,
}

#[derive(Debug)]
pub(crate) struct Message {
    pub(crate) head: ResponseHead,
    pub(crate) body: Bytes,
    /// Whether another request may be sent on the same connection.
    pub(crate) reusable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyLength {
    Empty,
    Known(u64),
    Chunked,
    CloseDelimited,
}

pub(crate) fn encode(head: &RequestHead<'_>, dst: &mut Vec<u8>) {
    dst.reserve(30 + head.headers.len() * AVERAGE_HEADER_SIZE);

    extend(dst, head.method.as_str().as_bytes());
    extend(dst, b" ");
    extend(dst, head.target.as_bytes());
    extend(dst, b" HTTP/1.1\r\n");

    head.order
        .sort_headers_for_each(head.casing, head.headers, |name, value| {
            extend(dst, name);
            // Wanted for servers that expect `X-Custom-Header:\r\n`
            if value.is_empty() {
                extend(dst, b":\r\n");
            } else {
                extend(dst, b": ");
                extend(dst, value.as_bytes());
                extend(dst, b"\r\n");
            }
        });

    extend(dst, b"\r\n");
}

/// Writes a full request, head and body, and flushes it.
pub(crate) fn write_request<W: Write>(
    io: &mut W,
    head: &RequestHead<'_>,
    body: Option<&[u8]>,
) -> Result<()> {
    let mut dst = Vec::new();
    encode(head, &mut dst);
    log::trace!(
        "h1: encode method={}, head={:?}, body={:?}",
        head.method,
        Escape::truncated(&dst, 1024),
        body.map(<[u8]>::len),
    );

    io.write_all(&dst).map_err(Error::io)?;
    if let Some(body) = body {
        io.write_all(body).map_err(Error::io)?;
    }
    io.flush().map_err(Error::io)
}

/// Reads one complete response to a request made with `method`.
pub(crate) fn read_response<R: Read>(io: &mut R, method: &Method) -> Result<Message> {
    let mut reader = Buffered::new(io);

    let head = loop {
        let head = reader.parse_head()?;
        match head.status.as_u16() {
            100 | 102..=199 => {
                log::trace!("h1: ignoring informational response: {}", head.status);
            }
            _ => break head,
        }
    };

    let length = decoder(&head, method)?;
    log::trace!("h1: response {} framed as {:?}", head.status, length);

    let body = match length {
        BodyLength::Empty => Bytes::new(),
        BodyLength::Known(len) => {
            let len = usize::try_from(len)
                .map_err(|_| Error::protocol("content-length is too large"))?;
            reader.take(len)?
        }
        BodyLength::Chunked => reader.chunked()?,
        BodyLength::CloseDelimited => reader.to_eof()?,
    };

    let mut reusable = length != BodyLength::CloseDelimited
        && head.status != StatusCode::SWITCHING_PROTOCOLS
        && keep_alive(&head);

    if reusable && !reader.buf.is_empty() {
        log::debug!(
            "h1: {} unexpected bytes after response, connection not reusable",
            reader.buf.len()
        );
        reusable = false;
    }

    Ok(Message {
        head,
        body,
        reusable,
    })
}

// According to https://tools.ietf.org/html/rfc7230#section-3.3.3
// 1. HEAD responses, and Status 1xx, 204, and 304 cannot have a body.
// 2. Transfer-Encoding: chunked has a chunked body.
// 3. If multiple differing Content-Length headers or invalid, close connection.
// 4. Content-Length header has a sized body.
// 5. Read till EOF.
fn decoder(head: &ResponseHead, method: &Method) -> Result<BodyLength> {
    match head.status.as_u16() {
        101 | 204 | 304 => return Ok(BodyLength::Empty),
        _ => (),
    }
    if *method == Method::HEAD {
        return Ok(BodyLength::Empty);
    }

    if head.headers.contains_key(header::TRANSFER_ENCODING) {
        return if head.version == Version::HTTP_10 {
            log::debug!("h1: HTTP/1.0 cannot have Transfer-Encoding header");
            Err(Error::protocol("unexpected transfer-encoding parsed"))
        } else if is_chunked(&head.headers) {
            Ok(BodyLength::Chunked)
        } else {
            log::trace!("h1: not chunked, read till eof");
            Ok(BodyLength::CloseDelimited)
        };
    }

    if head.headers.contains_key(header::CONTENT_LENGTH) {
        return match content_length_parse_all(&head.headers) {
            Some(0) => Ok(BodyLength::Empty),
            Some(len) => Ok(BodyLength::Known(len)),
            None => {
                log::debug!("h1: illegal Content-Length header");
                Err(Error::protocol("invalid content-length parsed"))
            }
        };
    }

    log::trace!("h1: neither Transfer-Encoding nor Content-Length");
    Ok(BodyLength::CloseDelimited)
}

/// Whether `chunked` is the final transfer coding.
fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::TRANSFER_ENCODING)
        .iter()
        .next_back()
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.rsplit(',').next())
        .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
}

/// Parses every `Content-Length` value; all of them must agree.
fn content_length_parse_all(headers: &HeaderMap) -> Option<u64> {
    let mut content_length: Option<u64> = None;
    for value in headers.get_all(header::CONTENT_LENGTH) {
        let value = value.to_str().ok()?;
        for part in value.split(',') {
            let n = part.trim().parse::<u64>().ok()?;
            match content_length {
                Some(prev) if prev != n => return None,
                _ => content_length = Some(n),
            }
        }
    }
    content_length
}

fn keep_alive(head: &ResponseHead) -> bool {
    let has_token = |token: &str| {
        head.headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    };

    match head.version {
        Version::HTTP_11 => !has_token("close"),
        Version::HTTP_10 => has_token("keep-alive"),
        _ => false,
    }
}

struct Buffered<'a, R> {
    io: &'a mut R,
    buf: BytesMut,
}

impl<'a, R: Read> Buffered<'a, R> {
    fn new(io: &'a mut R) -> Self {
        Buffered {
            io,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    /// Reads once from the connection, returning how many bytes arrived.
    fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.io.read(&mut chunk) {
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io(e)),
            }
        }
    }

    fn fill_or_incomplete(&mut self) -> Result<()> {
        if self.fill()? == 0 {
            return Err(Error::io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before message completed",
            )));
        }
        Ok(())
    }

    fn parse_head(&mut self) -> Result<ResponseHead> {
        loop {
            let parsed = {
                let mut headers = [httparse::EMPTY_HEADER; DEFAULT_MAX_HEADERS];
                let mut res = httparse::Response::new(&mut headers);
                match res.parse(&self.buf).map_err(Error::protocol)? {
                    httparse::Status::Complete(len) => {
                        log::trace!("h1: Response.parse Complete({len})");
                        Some((len, build_head(&res)?))
                    }
                    httparse::Status::Partial => None,
                }
            };

            match parsed {
                Some((len, head)) => {
                    let _ = self.buf.split_to(len);
                    return Ok(head);
                }
                None if self.buf.len() >= MAX_HEAD_SIZE => {
                    log::debug!("h1: max head size reached ({MAX_HEAD_SIZE})");
                    return Err(Error::protocol("message head is too large"));
                }
                None => self.fill_or_incomplete()?,
            }
        }
    }

    fn take(&mut self, len: usize) -> Result<Bytes> {
        while self.buf.len() < len {
            self.fill_or_incomplete()?;
        }
        Ok(self.buf.split_to(len).freeze())
    }

    /// A line without its CRLF.
    fn line(&mut self) -> Result<Bytes> {
        loop {
            if let Some(pos) = self.buf.windows(2).position(|w| w == b"\r\n") {
                let line = self.buf.split_to(pos + 2).freeze();
                return Ok(line.slice(..pos));
            }
            if self.buf.len() > MAX_LINE_SIZE {
                return Err(Error::protocol("chunk line is too long"));
            }
            self.fill_or_incomplete()?;
        }
    }

    fn chunked(&mut self) -> Result<Bytes> {
        let mut body = BytesMut::new();
        loop {
            let line = self.line()?;
            let size = chunk_size(&line)?;
            if size == 0 {
                break;
            }

            let data = self.take(size)?;
            body.extend_from_slice(&data);
            if &self.take(2)?[..] != b"\r\n" {
                return Err(Error::protocol("invalid chunk body CRLF"));
            }
        }

        // Trailers are read and dropped.
        loop {
            let trailer = self.line()?;
            if trailer.is_empty() {
                break;
            }
            log::trace!("h1: ignoring trailer {:?}", Escape::new(&trailer));
        }

        Ok(body.freeze())
    }

    fn to_eof(&mut self) -> Result<Bytes> {
        while self.fill()? > 0 {}
        Ok(self.buf.split().freeze())
    }
}

fn chunk_size(line: &[u8]) -> Result<usize> {
    let size = line.split(|&b| b == b';').next().unwrap_or_default();
    let size = std::str::from_utf8(size)
        .ok()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| usize::from_str_radix(s, 16).ok())
        .ok_or_else(|| Error::protocol("invalid chunk size line"))?;
    Ok(size)
}

fn build_head(res: &httparse::Response<'_, '_>) -> Result<ResponseHead> {
    let version = match res.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };
    let status = res
        .code
        .ok_or_else(|| Error::protocol("missing status code"))
        .and_then(|code| StatusCode::from_u16(code).map_err(Error::protocol))?;

    let mut headers = HeaderMap::with_capacity(res.headers.len());
    let mut entries = Vec::with_capacity(res.headers.len());
    for h in res.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes()).map_err(Error::protocol)?;
        let value = HeaderValue::from_bytes(h.value).map_err(Error::protocol)?;
        headers.append(name, value.clone());
        entries.push((h.name.to_owned(), value));
    }

    Ok(ResponseHead {
        version,
        status,
        headers,
        entries,
    })
}

#[inline]
fn extend(dst: &mut Vec<u8>, data: &[u8]) {
    dst.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn read(raw: &str, method: Method) -> Result<Message> {
        let mut io = Cursor::new(raw.as_bytes().to_vec());
        read_response(&mut io, &method)
    }

    #[test]
    fn encode_follows_order_and_casing() {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("ua"));
        headers.insert("host", HeaderValue::from_static("example.com"));
        headers.insert("x-empty", HeaderValue::from_static(""));

        let mut order = OrigHeaderMap::new();
        order.insert("Host");
        order.insert("User-Agent");

        let mut casing = OrigHeaderMap::new();
        casing.set("x-EMPTY");

        let mut dst = Vec::new();
        encode(
            &RequestHead {
                method: &Method::GET,
                target: "/path?q=1",
                headers: &headers,
                casing: &casing,
                order: &order,
            },
            &mut dst,
        );
        assert_eq!(
            String::from_utf8(dst).unwrap(),
            "GET /path?q=1 HTTP/1.1\r\nHost: example.com\r\nUser-Agent: ua\r\nx-EMPTY:\r\n\r\n"
        );
    }

    #[test]
    fn content_length_body() {
        let msg = read(
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nX-Server: Test\r\n\r\nhello",
            Method::GET,
        )
        .unwrap();
        assert_eq!(msg.head.status, StatusCode::OK);
        assert_eq!(msg.body, "hello");
        assert!(msg.reusable);
        assert_eq!(msg.head.entries[1].0, "X-Server");
    }

    #[test]
    fn chunked_body_with_extensions_and_trailers() {
        let msg = read(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
             5;ext=1\r\nhello\r\n6\r\n world\r\n0\r\nX-Trailer: t\r\n\r\n",
            Method::GET,
        )
        .unwrap();
        assert_eq!(msg.body, "hello world");
        assert!(msg.reusable);
    }

    #[test]
    fn truncated_bodies_are_protocol_errors() {
        let err = read("HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nhello", Method::GET)
            .unwrap_err();
        assert!(err.is_protocol(), "{err:?}");

        let err = read(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhel",
            Method::GET,
        )
        .unwrap_err();
        assert!(err.is_protocol(), "{err:?}");

        let err = read("HTTP/1.1 200 OK\r\nContent-Le", Method::GET).unwrap_err();
        assert!(err.is_protocol(), "{err:?}");
    }

    #[test]
    fn malformed_head_is_protocol_error() {
        let err = read("HTTP/1.1 abc OK\r\n\r\n", Method::GET).unwrap_err();
        assert!(err.is_protocol());

        let err = read(
            "HTTP/1.1 200 OK\r\nContent-Length: 3\r\nContent-Length: 4\r\n\r\nabcd",
            Method::GET,
        )
        .unwrap_err();
        assert!(err.is_protocol());

        let err = read(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n",
            Method::GET,
        )
        .unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn close_delimited_body() {
        let msg = read("HTTP/1.1 200 OK\r\n\r\nuntil close", Method::GET).unwrap();
        assert_eq!(msg.body, "until close");
        assert!(!msg.reusable);
    }

    #[test]
    fn bodiless_responses() {
        let msg = read("HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n", Method::HEAD).unwrap();
        assert!(msg.body.is_empty());
        assert!(msg.reusable);

        let msg = read("HTTP/1.1 204 No Content\r\n\r\n", Method::GET).unwrap();
        assert!(msg.body.is_empty());

        let msg = read("HTTP/1.1 304 Not Modified\r\nContent-Length: 9\r\n\r\n", Method::GET)
            .unwrap();
        assert!(msg.body.is_empty());
    }

    #[test]
    fn informational_responses_are_skipped() {
        let msg = read(
            "HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok",
            Method::POST,
        )
        .unwrap();
        assert_eq!(msg.head.status, StatusCode::CREATED);
        assert_eq!(msg.body, "ok");
    }

    #[test]
    fn keep_alive_rules() {
        let msg = read(
            "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 0\r\n\r\n",
            Method::GET,
        )
        .unwrap();
        assert!(!msg.reusable);

        let msg = read("HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n", Method::GET).unwrap();
        assert_eq!(msg.head.version, Version::HTTP_10);
        assert!(!msg.reusable);

        let msg = read(
            "HTTP/1.0 200 OK\r\nConnection: Keep-Alive\r\nContent-Length: 0\r\n\r\n",
            Method::GET,
        )
        .unwrap();
        assert!(msg.reusable);
    }

    #[test]
    fn trailing_garbage_prevents_reuse() {
        let msg = read(
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nokEXTRA",
            Method::GET,
        )
        .unwrap();
        assert_eq!(msg.body, "ok");
        assert!(!msg.reusable);
    }

    #[test]
    fn chunked_must_be_final_coding() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::TRANSFER_ENCODING,
            HeaderValue::from_static("gzip, chunked"),
        );
        assert!(is_chunked(&headers));

        headers.insert(
            header::TRANSFER_ENCODING,
            HeaderValue::from_static("chunked, gzip"),
        );
        assert!(!is_chunked(&headers));
    }
}
