//! [`HttpClient`] wrappers: fixed header injection and TLS downgrade.

use crate::exchange::{HttpClient, HttpHeader, HttpRequest, HttpResponse};
use crate::{Error, Result};
use http::uri::Scheme;
use http::Uri;

/// Adds fixed headers to every request.
///
/// Decorator headers come first. Caller headers with the same name
/// (ignoring case) are dropped.
pub struct HeaderDecoratorHttpClient<C> {
    inner: C,
    headers: Vec<HttpHeader>,
}

impl<C: HttpClient> HeaderDecoratorHttpClient<C> {
    /// Wrap `inner`, injecting `headers`.
    pub fn new(inner: C, headers: Vec<HttpHeader>) -> Self {
        Self { inner, headers }
    }
}

impl<C: HttpClient> HttpClient for HeaderDecoratorHttpClient<C> {
    fn call(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        let caller = std::mem::take(&mut request.headers);
        request.headers = self.headers.clone();
        request.headers.extend(caller.into_iter().filter(|h| {
            !self
                .headers
                .iter()
                .any(|d| d.name.eq_ignore_ascii_case(&h.name))
        }));
        self.inner.call(request)
    }
}

/// Rewrites `https://host[:443]/path` to `http://host/path`.
///
/// For deployments where the outer TLS is terminated in front of the
/// endpoint. Plain `http` passes through; any other port is refused.
pub struct DowngradeHttpClient<C> {
    inner: C,
}

impl<C: HttpClient> DowngradeHttpClient<C> {
    /// Wrap `inner`.
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: HttpClient> HttpClient for DowngradeHttpClient<C> {
    fn call(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        request.uri = downgrade(&request.uri)?;
        self.inner.call(request)
    }
}

fn downgrade(uri: &Uri) -> Result<Uri> {
    match uri.scheme() {
        Some(scheme) if *scheme == Scheme::HTTP => Ok(uri.clone()),
        Some(scheme) if *scheme == Scheme::HTTPS => {
            let host = uri
                .host()
                .ok_or_else(|| Error::UnsupportedUri(format!("'{uri}' has no host")))?;
            if !matches!(uri.port_u16(), None | Some(443)) {
                return Err(Error::UnsupportedUri(format!(
                    "cannot downgrade '{uri}': only port 443 is supported"
                )));
            }

            let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
            Uri::builder()
                .scheme(Scheme::HTTP)
                .authority(host)
                .path_and_query(path)
                .build()
                .map_err(|e| Error::UnsupportedUri(e.to_string()))
        }
        _ => Err(Error::UnsupportedUri(format!(
            "cannot downgrade '{uri}': unsupported scheme"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl HttpClient for &Recorder {
        fn call(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(HttpResponse::new(200, Vec::new()))
        }
    }

    #[test]
    fn test_decorator_replaces_caller_headers() {
        let recorder = Recorder::default();
        let client = HeaderDecoratorHttpClient::new(
            &recorder,
            vec![
                HttpHeader::new("x-insurantid", "Z123456789"),
                HttpHeader::new("x-useragent", "ACME0001/1.0"),
            ],
        );

        let request = HttpRequest::new(Method::GET, Uri::from_static("/epa/status"))
            .with_header("X-Insurantid", "spoofed")
            .with_header("Accept", "application/json");
        client.call(request).unwrap();

        let seen = recorder.seen.lock().unwrap();
        let headers: Vec<_> = seen[0]
            .headers
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
            .collect();
        assert_eq!(
            headers,
            [
                ("x-insurantid", "Z123456789"),
                ("x-useragent", "ACME0001/1.0"),
                ("Accept", "application/json"),
            ]
        );
    }

    #[test]
    fn test_downgrade() {
        let cases = [
            ("https://vau.example/VAU", "http://vau.example/VAU"),
            ("https://vau.example:443/VAU/cid?x=1", "http://vau.example/VAU/cid?x=1"),
            ("http://vau.example:8080/VAU", "http://vau.example:8080/VAU"),
            ("https://vau.example", "http://vau.example/"),
        ];
        for (input, expected) in cases {
            let uri = downgrade(&input.parse().unwrap()).unwrap();
            assert_eq!(uri.to_string(), expected, "{input}");
        }
    }

    #[test]
    fn test_downgrade_rejects_other_ports_and_schemes() {
        for input in ["https://vau.example:8443/VAU", "ftp://vau.example/VAU", "/VAU"] {
            assert!(
                matches!(downgrade(&input.parse().unwrap()), Err(Error::UnsupportedUri(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn test_downgrade_client_forwards_rewritten_uri() {
        let recorder = Recorder::default();
        let client = DowngradeHttpClient::new(&recorder);
        client
            .call(HttpRequest::new(
                Method::POST,
                Uri::from_static("https://vau.example/VAU"),
            ))
            .unwrap();
        assert_eq!(
            recorder.seen.lock().unwrap()[0].uri.to_string(),
            "http://vau.example/VAU"
        );
    }
}
