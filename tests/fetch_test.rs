//! End-to-end fetches against local TLS servers.

mod common;

use std::time::{Duration, Instant};
use tlsplain::cipher::{BulkCipher, KeyExchange, Strength, UNKNOWN};
use tlsplain::{classify, fetch_with, CipherSuite, FetchError, FetchOptions};

fn options() -> FetchOptions {
    FetchOptions::default().with_timeout(Duration::from_secs(5))
}

#[test]
fn test_self_signed_host_is_described_but_not_verified() {
    let (cert, key) = common::self_signed("localhost");
    // the verified attempt is rejected, the unverified one succeeds
    let port = common::spawn_tls_server(cert, key, "ECDHE-RSA-AES128-GCM-SHA256", 2);

    let description = fetch_with(&format!("127.0.0.1:{}", port), &options()).unwrap();

    assert!(!description.verified());
    assert_eq!(description.host, format!("127.0.0.1:{}", port));
    assert_eq!(description.subject.common_name.as_deref(), Some("localhost"));
    assert_eq!(description.subject.organization.as_deref(), Some("tlsplain tests"));
    assert_eq!(description.protocol, "TLSv1.2");
    assert_eq!(
        description.negotiated_cipher,
        "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"
    );

    let expected = classify(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256);
    assert_eq!(description.cipher, expected);
    let profile = description.cipher.profile.unwrap();
    assert_eq!(profile.key_exchange, KeyExchange::EcdheRsa);
    assert_eq!(profile.bulk_cipher, BulkCipher::AesGcm);
    assert_eq!(profile.strength, Strength::Bits128);
    assert_eq!(description.cipher.forward_secrecy(), Some(true));
}

#[test]
fn test_rsa_key_exchange_without_forward_secrecy() {
    let (cert, key) = common::self_signed("localhost");
    let port = common::spawn_tls_server(cert, key, "AES256-SHA", 2);

    let description = fetch_with(&format!("127.0.0.1:{}", port), &options()).unwrap();

    assert!(!description.verified());
    assert_eq!(description.cipher.suite, CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA);
    assert_eq!(description.cipher.forward_secrecy(), Some(false));
    assert_eq!(
        description.cipher.strength_note,
        "The server uses very strong cryptography."
    );
}

#[test]
fn test_tls13_capable_server_negotiates_classifiable_suite() {
    let (cert, key) = common::self_signed("localhost");
    let port = common::spawn_modern_tls_server(cert, key, 2);

    let description = fetch_with(&format!("127.0.0.1:{}", port), &options()).unwrap();

    assert_eq!(description.protocol, "TLSv1.2");
    assert!(description.cipher.is_known(), "{}", description.negotiated_cipher);
    assert_eq!(description.cipher.forward_secrecy(), Some(true));
    assert_ne!(description.cipher.key_exchange_note, UNKNOWN);
    assert_ne!(description.cipher.strength_note, UNKNOWN);
}

#[test]
fn test_trickling_server_cannot_outlast_deadline() {
    let port = common::spawn_trickle_server(Duration::from_millis(300), 2);
    let options = FetchOptions::default()
        .with_timeout(Duration::from_secs(30))
        .with_deadline(Instant::now() + Duration::from_secs(2));

    let started = Instant::now();
    let result = fetch_with(&format!("127.0.0.1:{}", port), &options);
    let elapsed = started.elapsed();

    match result {
        Err(FetchError::Timeout { .. }) => {}
        Err(other) => panic!("expected Timeout, got {:?}", other),
        Ok(description) => panic!("expected an error, got {:?}", description.host),
    }
    assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
}

#[test]
fn test_trickling_server_is_bounded_by_timeout_per_attempt() {
    let port = common::spawn_trickle_server(Duration::from_millis(200), 2);
    let options = FetchOptions::default().with_timeout(Duration::from_secs(1));

    let started = Instant::now();
    let result = fetch_with(&format!("127.0.0.1:{}", port), &options);
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(FetchError::Timeout { .. })));
    // one limit for each of the two attempts
    assert!(elapsed < Duration::from_secs(4), "took {:?}", elapsed);
}

#[test]
fn test_no_listener_yields_error() {
    let port = common::closed_port();

    let result = fetch_with(&format!("127.0.0.1:{}", port), &options());

    match result {
        Err(err @ FetchError::HostUnreachable { .. }) => assert!(err.is_unreachable()),
        Err(other) => panic!("expected HostUnreachable, got {:?}", other),
        Ok(description) => panic!("expected an error, got {:?}", description.host),
    }
}

#[test]
fn test_plaintext_service_fails_handshake() {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    std::thread::spawn(move || {
        for stream in listener.incoming().take(2).flatten() {
            let mut stream = stream;
            let mut buf = [0u8; 512];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n");
        }
    });

    match fetch_with(&format!("127.0.0.1:{}", port), &options()) {
        Err(FetchError::HandshakeFailed { address, .. }) => {
            assert_eq!(address, format!("127.0.0.1:{}", port))
        }
        Err(other) => panic!("expected HandshakeFailed, got {:?}", other),
        Ok(description) => panic!("expected an error, got {:?}", description.host),
    }
}

#[test]
fn test_invalid_host_is_rejected_before_dialing() {
    match fetch_with("example.com:https", &options()) {
        Err(FetchError::InvalidHost { input, .. }) => assert_eq!(input, "example.com:https"),
        Err(other) => panic!("expected InvalidHost, got {:?}", other),
        Ok(description) => panic!("expected an error, got {:?}", description.host),
    }
}

#[test]
fn test_past_deadline_times_out() {
    let port = common::closed_port();
    let options = options().with_deadline(Instant::now());

    match fetch_with(&format!("127.0.0.1:{}", port), &options) {
        Err(FetchError::Timeout { .. }) => {}
        Err(other) => panic!("expected Timeout, got {:?}", other),
        Ok(description) => panic!("expected an error, got {:?}", description.host),
    }
}
