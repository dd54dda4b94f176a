//! Blocking outer transport backed by `reqwest`.

use crate::exchange::{HttpClient, HttpHeader, HttpRequest, HttpResponse};
use crate::{Error, Result};
use std::time::Duration;
use tracing::trace;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`HttpClient`] using a blocking `reqwest` client with rustls.
pub struct ReqwestHttpClient {
    client: reqwest::blocking::Client,
}

impl ReqwestHttpClient {
    /// Client with [`DEFAULT_CONNECT_TIMEOUT`].
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Client with a custom connect timeout.
    pub fn with_connect_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap a preconfigured client.
    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl HttpClient for ReqwestHttpClient {
    fn call(&self, request: HttpRequest) -> Result<HttpResponse> {
        trace!(method = %request.method, uri = %request.uri, "Outer request");

        let mut builder = self
            .client
            .request(request.method.clone(), request.uri.to_string());
        for header in &request.headers {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }

        let response = builder
            .body(request.body)
            .send()
            .map_err(|e| Error::Io(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| HttpHeader::new(name.as_str(), v))
            })
            .collect();
        let body = response.bytes().map_err(|e| Error::Io(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Uri};

    #[test]
    fn test_connection_refused_is_io_error() {
        let client = ReqwestHttpClient::with_connect_timeout(Duration::from_millis(500)).unwrap();
        let request = HttpRequest::new(Method::POST, Uri::from_static("http://127.0.0.1:1/VAU"));
        assert!(matches!(client.call(request), Err(Error::Io(_))));
    }
}
