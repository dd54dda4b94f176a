//! End-to-end tests of the outer HTTP binding against an in-process endpoint:
//! connection id validation, outer status handling and tunnelled inner HTTP.

mod test_helpers;

use http::{Method, Uri};
use std::sync::Arc;
use test_helpers::*;
use vau_core::trust::PinnedSignerValidator;
use vau_crypto::signature::Es256KeyPair;
use vau_transport::{
    ConnectorBuilder, DowngradeHttpClient, Error, ErrorKind, HeaderDecoratorHttpClient,
    HttpClient, HttpHeader, HttpRequest, HttpResponse, VauHttpClient,
};

#[test]
fn test_connect_and_tunnel_request() {
    init_tracing();
    let endpoint = Arc::new(MemoryEndpoint::new());
    let client = VauHttpClient::new(connect(&endpoint));

    let request = HttpRequest::new(
        Method::POST,
        Uri::from_static("https://vau.example/epa/authz/v1/send_authcode_sc"),
    )
    .with_header("content-type", "application/json")
    .with_header("Content-Length", "999")
    .with_body(br#"{"authorizationCode":"abc"}"#.to_vec());

    let response = client.call(request).unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.header("x-method"), Some("POST"));
    assert_eq!(
        response.header("x-path"),
        Some("/epa/authz/v1/send_authcode_sc")
    );
    assert_eq!(response.header("content-length"), Some("27"));
    assert_eq!(response.body, br#"{"authorizationCode":"abc"}"#);

    let inner = endpoint.inner_requests.lock().unwrap();
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0].header("Content-Type"), Some("application/json"));
    assert_eq!(inner[0].header("content-length"), None);
    assert_eq!(inner[0].uri.path(), "/epa/authz/v1/send_authcode_sc");
}

#[test]
fn test_handshake_requests() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let tunnel = connect(&endpoint);

    let outer = endpoint.outer_requests.lock().unwrap();
    assert_eq!(outer.len(), 2);
    assert_eq!(outer[0].uri.to_string(), "https://vau.example/VAU");
    assert_eq!(outer[1].uri.to_string(), "https://vau.example/VAU/session-1");
    assert_eq!(tunnel.uri(), &outer[1].uri);

    for request in outer.iter() {
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.header("content-type"), Some("application/cbor"));
        assert_eq!(
            request.header("x-useragent"),
            Some("TEST1234567890AB/2.1.12-45")
        );
    }
}

#[test]
fn test_frames_carry_user_agent_and_octet_stream() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let client = VauHttpClient::new(connect(&endpoint));

    client
        .call(HttpRequest::new(Method::GET, Uri::from_static("/epa/status")))
        .unwrap();

    let outer = endpoint.outer_requests.lock().unwrap();
    let frame_request = &outer[2];
    assert_eq!(frame_request.uri.path(), "/VAU/session-1");
    assert_eq!(
        frame_request.header("content-type"),
        Some("application/octet-stream")
    );
    assert_eq!(
        frame_request.header("x-useragent"),
        Some("TEST1234567890AB/2.1.12-45")
    );
    assert_eq!(frame_request.body[0], 1, "request direction");
    assert_eq!(&frame_request.body[1..9], &1u64.to_be_bytes());
}

#[test]
fn test_sequential_requests() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let client = VauHttpClient::new(connect(&endpoint));

    for i in 0..10 {
        let body = vec![i as u8; i * 100];
        let request = HttpRequest::new(Method::PUT, Uri::from_static("/documents/1"))
            .with_body(body.clone());
        let response = client.call(request).unwrap();
        assert_eq!(response.body, body);
    }
    assert_eq!(endpoint.inner_requests.lock().unwrap().len(), 10);
}

#[test]
fn test_missing_connection_id_aborts_before_m3() {
    let endpoint = Arc::new(MemoryEndpoint::new().with_cid_mode(CidMode::Missing));
    let result = connector(&endpoint).connect(&Uri::from_static(BASE_URI));

    assert!(matches!(result, Err(Error::InvalidConnectionId(_))));
    assert_eq!(endpoint.outer_request_count(), 1);
}

#[test]
fn test_overlong_connection_id_aborts_before_m3() {
    let cid = format!("/{}", "a".repeat(200));
    let endpoint = Arc::new(MemoryEndpoint::new().with_cid_mode(CidMode::Fixed(cid)));
    let err = connector(&endpoint)
        .connect(&Uri::from_static(BASE_URI))
        .err()
        .unwrap();

    assert!(matches!(err, Error::InvalidConnectionId(_)));
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(endpoint.outer_request_count(), 1);
}

#[test]
fn test_connection_id_with_illegal_characters_aborts_before_m3() {
    for cid in ["/VAU/../admin", "VAU/no-leading-slash", "/VAU/a b"] {
        let endpoint =
            Arc::new(MemoryEndpoint::new().with_cid_mode(CidMode::Fixed(cid.to_owned())));
        let result = connector(&endpoint).connect(&Uri::from_static(BASE_URI));

        assert!(
            matches!(result, Err(Error::InvalidConnectionId(_))),
            "{cid}"
        );
        assert_eq!(endpoint.outer_request_count(), 1, "{cid}");
    }
}

#[test]
fn test_connection_id_header_matched_ignoring_case() {
    let endpoint = Arc::new(MemoryEndpoint::new().with_cid_mode(CidMode::IssueLowercase));
    let tunnel = connect(&endpoint);
    assert_eq!(tunnel.uri().path(), "/VAU/session-1");
}

#[test]
fn test_non_200_on_m1_is_bad_status() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    endpoint.fail_with(503);

    let err = connector(&endpoint)
        .connect(&Uri::from_static(BASE_URI))
        .err()
        .unwrap();
    match &err {
        Error::BadStatus {
            method,
            uri,
            status,
        } => {
            assert_eq!(method, "POST");
            assert_eq!(uri, "https://vau.example/VAU");
            assert_eq!(*status, 503);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[test]
fn test_non_200_on_frame_fails_tunnel() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let mut tunnel = connect(&endpoint);
    endpoint.fail_with(500);

    assert!(matches!(
        tunnel.send(b"GET / HTTP/1.1\r\n\r\n"),
        Err(Error::BadStatus { status: 500, .. })
    ));
    assert!(tunnel.is_failed());
    assert!(matches!(
        tunnel.send(b"GET / HTTP/1.1\r\n\r\n"),
        Err(Error::Protocol(vau_core::Error::SessionFailed))
    ));
}

#[test]
fn test_receive_without_send_fails() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let mut tunnel = connect(&endpoint);
    assert!(tunnel.receive().is_err());
    assert!(tunnel.is_failed());
}

#[test]
fn test_untrusted_signer_aborts_before_m3() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let impostor = Es256KeyPair::generate_with_rng(&mut rand::rngs::OsRng);
    let connector = ConnectorBuilder::new()
        .outer_client(endpoint.clone())
        .trust_validator(Arc::new(PinnedSignerValidator::new(
            impostor.public_key().to_vec(),
        )))
        .clock(clock_valid)
        .build()
        .unwrap();

    let err = connector
        .connect(&Uri::from_static(BASE_URI))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Trust);
    assert_eq!(endpoint.outer_request_count(), 1);
}

#[test]
fn test_expired_bundle_aborts_before_m3() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let connector = ConnectorBuilder::new()
        .outer_client(endpoint.clone())
        .trust_validator(endpoint.validator())
        .clock(clock_expired)
        .build()
        .unwrap();

    let err = connector
        .connect(&Uri::from_static(BASE_URI))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::Protocol(vau_core::Error::BundleExpired { .. })
    ));
    assert_eq!(endpoint.outer_request_count(), 1);
}

#[test]
fn test_decorated_inner_headers() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let client = HeaderDecoratorHttpClient::new(
        VauHttpClient::new(connect(&endpoint)),
        vec![
            HttpHeader::new("x-insurantid", "Z123456789"),
            HttpHeader::new("x-useragent", "TEST1234567890AB/2.1.12-45"),
        ],
    );

    let request = HttpRequest::new(Method::GET, Uri::from_static("/epa/basic/api/v1/ps/patients"))
        .with_header("X-Insurantid", "other");
    client.call(request).unwrap();

    let inner = endpoint.inner_requests.lock().unwrap();
    let names: Vec<_> = inner[0]
        .headers
        .iter()
        .map(|h| (h.name.as_str(), h.value.as_str()))
        .collect();
    assert_eq!(
        names,
        [
            ("X-Insurantid", "Z123456789"),
            ("X-Useragent", "TEST1234567890AB/2.1.12-45"),
        ]
    );
}

#[test]
fn test_downgraded_outer_transport() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let connector = ConnectorBuilder::new()
        .outer_client(Arc::new(DowngradeHttpClient::new(endpoint.clone())))
        .trust_validator(endpoint.validator())
        .clock(clock_valid)
        .build()
        .unwrap();

    let client = VauHttpClient::new(
        connector
            .connect(&Uri::from_static("https://vau.example:443"))
            .unwrap(),
    );
    client
        .call(HttpRequest::new(Method::DELETE, Uri::from_static("/documents/7")))
        .unwrap();

    for request in endpoint.outer_requests.lock().unwrap().iter() {
        assert_eq!(request.uri.scheme_str(), Some("http"));
        assert_eq!(request.uri.port_u16(), None);
    }
}

#[test]
fn test_inner_error_status_is_returned() {
    let endpoint = Arc::new(
        MemoryEndpoint::new()
            .with_handler(Box::new(|_| HttpResponse::new(404, b"no such record".to_vec()))),
    );
    let client = VauHttpClient::new(connect(&endpoint));

    let response = client
        .call(HttpRequest::new(Method::GET, Uri::from_static("/missing")))
        .unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.body, b"no such record");
    assert!(!client.is_failed());
}

#[test]
fn test_unsupported_inner_method_is_not_sent() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let client = VauHttpClient::new(connect(&endpoint));

    let result = client.call(HttpRequest::new(Method::PATCH, Uri::from_static("/x")));
    assert!(matches!(result, Err(Error::Codec(_))));
    assert_eq!(endpoint.outer_request_count(), 2);
    assert!(!client.is_failed());
}
