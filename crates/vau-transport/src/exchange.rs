//! Plain HTTP request/response records and the [`HttpClient`] seam.
//!
//! The same types describe outer requests (sent to the untrusted HTTP
//! endpoint) and inner requests (carried through the tunnel).

use crate::Result;
use http::{Method, Uri};

/// One header field. Names keep their original spelling; lookups ignore case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: String,
}

impl HttpHeader {
    /// Create a header.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Target URI.
    pub uri: Uri,
    /// Header fields in order.
    pub headers: Vec<HttpHeader>,
    /// Body bytes; empty for none.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Request without headers or body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HttpHeader::new(name, value));
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of the header named `name`, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Header fields in order.
    pub headers: Vec<HttpHeader>,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Response with the given status and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HttpHeader::new(name, value));
        self
    }

    /// First value of the header named `name`, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [HttpHeader], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Blocking request/response exchange.
///
/// Implemented by outer transports (e.g. `ReqwestHttpClient`), by the
/// tunnelled [`crate::VauHttpClient`] and by wrappers around either.
pub trait HttpClient: Send + Sync {
    /// Perform one exchange.
    fn call(&self, request: HttpRequest) -> Result<HttpResponse>;
}

impl<T: HttpClient + ?Sized> HttpClient for std::sync::Arc<T> {
    fn call(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).call(request)
    }
}
