//! Minimal HTTP/1.1 codec for messages carried inside the tunnel.
//!
//! Rules shared by all four directions:
//! - Only `GET`, `POST`, `PUT` and `DELETE` are accepted.
//! - Header names are canonicalized (`x-insurant-id` becomes `X-Insurant-Id`)
//!   and must match `[A-Za-z0-9_-]+`.
//! - `Transfer-Coding` and `TE` are rejected; there is no chunking in the tunnel.
//! - `Content-Length` is owned by the codec: caller-supplied values are
//!   dropped and the header is written after all others for non-empty bodies.
//! - Decoding accepts CRLF or bare LF line endings.
//!
//! A declared `Content-Length` that disagrees with the bytes present is logged
//! and tolerated: some peers omit or understate it on large responses and rely
//! on the outer transport's framing.

use crate::exchange::{HttpHeader, HttpRequest, HttpResponse};
use crate::{Error, Result};
use http::{Method, StatusCode, Uri};
use tracing::warn;

const HTTP_VERSION: &str = "HTTP/1.1";
const CRLF: &[u8] = b"\r\n";
const CONTENT_LENGTH: &str = "Content-Length";
const UNSUPPORTED_HEADERS: [&str; 2] = ["Transfer-Coding", "TE"];

/// Serialize a request: request line, headers, blank line, body.
pub fn encode_request(request: &HttpRequest) -> Result<Vec<u8>> {
    validate_method(&request.method)?;

    let target = request
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|t| !t.is_empty())
        .unwrap_or("/");

    let mut buf = Vec::with_capacity(256 + request.body.len());
    buf.extend_from_slice(request.method.as_str().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(target.as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(HTTP_VERSION.as_bytes());
    buf.extend_from_slice(CRLF);

    write_headers(&mut buf, &request.headers, request.body.len())?;
    buf.extend_from_slice(&request.body);
    Ok(buf)
}

/// Serialize a response: status line, headers, blank line, body.
pub fn encode_response(response: &HttpResponse) -> Result<Vec<u8>> {
    let status = StatusCode::from_u16(response.status)
        .map_err(|_| Error::Codec(format!("invalid status code {}", response.status)))?;

    let mut buf = Vec::with_capacity(256 + response.body.len());
    buf.extend_from_slice(HTTP_VERSION.as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(status.as_str().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(status.canonical_reason().unwrap_or("Unknown").as_bytes());
    buf.extend_from_slice(CRLF);

    write_headers(&mut buf, &response.headers, response.body.len())?;
    buf.extend_from_slice(&response.body);
    Ok(buf)
}

/// Parse a response. The returned headers include any `Content-Length` as received.
pub fn decode_response(data: &[u8]) -> Result<HttpResponse> {
    let mut lines = Lines::new(data);

    let status_line = lines.next_line()?;
    let status = parse_status_line(status_line)?;
    let (headers, content_length) = parse_headers(&mut lines)?;
    let body = lines.rest().to_vec();

    check_content_length(content_length, body.len());

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

/// Parse a request. `Content-Length` is consumed as framing and not returned.
pub fn decode_request(data: &[u8]) -> Result<HttpRequest> {
    let mut lines = Lines::new(data);

    let request_line = lines.next_line()?;
    let (method, uri) = parse_request_line(request_line)?;
    let (headers, content_length) = parse_headers(&mut lines)?;
    let body = lines.rest().to_vec();

    check_content_length(content_length, body.len());

    Ok(HttpRequest {
        method,
        uri,
        headers: headers
            .into_iter()
            .filter(|h| !h.name.eq_ignore_ascii_case(CONTENT_LENGTH))
            .collect(),
        body,
    })
}

/// Title-case each `-`-separated segment of a header name.
///
/// Only the first character of a segment is changed; the rest is kept.
pub fn canonicalize_header_name(name: &str) -> String {
    name.trim()
        .split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

fn validate_method(method: &Method) -> Result<()> {
    if [Method::GET, Method::POST, Method::PUT, Method::DELETE].contains(method) {
        Ok(())
    } else {
        Err(Error::Codec(format!("unsupported method: '{method}'")))
    }
}

fn validate_header(name: &str, value: &str) -> Result<()> {
    if UNSUPPORTED_HEADERS
        .iter()
        .any(|unsupported| unsupported.eq_ignore_ascii_case(name))
    {
        return Err(Error::Codec(format!("unsupported header: '{name}'")));
    }

    let valid_name = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !valid_name {
        return Err(Error::Codec(format!("invalid header name: '{name}'")));
    }

    if value.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(Error::Codec(format!("line break in value of header '{name}'")));
    }
    Ok(())
}

fn write_headers(buf: &mut Vec<u8>, headers: &[HttpHeader], body_len: usize) -> Result<()> {
    for header in headers {
        let name = canonicalize_header_name(&header.name);
        validate_header(&name, &header.value)?;
        if name.eq_ignore_ascii_case(CONTENT_LENGTH) {
            continue;
        }

        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(header.value.as_bytes());
        buf.extend_from_slice(CRLF);
    }

    if body_len > 0 {
        buf.extend_from_slice(format!("{CONTENT_LENGTH}: {body_len}").as_bytes());
        buf.extend_from_slice(CRLF);
    }

    buf.extend_from_slice(CRLF);
    Ok(())
}

fn parse_status_line(line: &str) -> Result<u16> {
    let mut parts = line.splitn(3, ' ');
    let (Some(version), Some(code), Some(_reason)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::Codec(format!("invalid status line: '{line}'")));
    };

    if !version.starts_with("HTTP/1.") {
        return Err(Error::Codec(format!("unsupported HTTP version: '{version}'")));
    }

    code.parse::<u16>()
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .map(|c| c.as_u16())
        .ok_or_else(|| Error::Codec(format!("invalid status code in status line: '{line}'")))
}

fn parse_request_line(line: &str) -> Result<(Method, Uri)> {
    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::Codec(format!("invalid request line: '{line}'")));
    };

    if version != HTTP_VERSION {
        return Err(Error::Codec(format!("unsupported HTTP version: '{version}'")));
    }

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| Error::Codec(format!("unsupported method: '{method}'")))?;
    validate_method(&method)?;

    if !target.starts_with('/') {
        return Err(Error::Codec(format!(
            "request target must be origin-form: '{target}'"
        )));
    }
    let uri = target
        .parse::<Uri>()
        .map_err(|e| Error::Codec(format!("invalid request target '{target}': {e}")))?;
    Ok((method, uri))
}

fn parse_headers(lines: &mut Lines<'_>) -> Result<(Vec<HttpHeader>, Option<usize>)> {
    let mut headers = Vec::new();
    let mut content_length = None;

    loop {
        let line = lines.next_line()?;
        if line.is_empty() {
            return Ok((headers, content_length));
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Codec(format!("invalid header line: '{line}'")))?;
        let name = canonicalize_header_name(name);
        let value = value.trim();
        validate_header(&name, value)?;

        if name.eq_ignore_ascii_case(CONTENT_LENGTH) {
            if content_length.is_some() {
                return Err(Error::Codec("Content-Length set more than once".into()));
            }
            let length = value
                .parse::<usize>()
                .map_err(|_| Error::Codec(format!("invalid Content-Length: '{value}'")))?;
            content_length = Some(length);
        }

        headers.push(HttpHeader::new(name, value));
    }
}

fn check_content_length(declared: Option<usize>, actual: usize) {
    let declared = declared.unwrap_or(0);
    if declared != actual {
        warn!(
            declared,
            actual, "Content-Length does not match body length; accepting body as received"
        );
    }
}

/// Line reader over raw bytes that leaves the body untouched.
struct Lines<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lines<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Next line without its terminator. The head must be terminated by a blank line.
    fn next_line(&mut self) -> Result<&'a str> {
        let remaining = &self.data[self.pos..];
        let end = remaining
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| Error::Codec("unterminated HTTP header section".into()))?;

        self.pos += end + 1;
        let line = remaining[..end].strip_suffix(b"\r").unwrap_or(&remaining[..end]);
        std::str::from_utf8(line).map_err(|_| Error::Codec("header line is not UTF-8".into()))
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}
