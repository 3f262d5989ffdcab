//! A host whose certificate is in the trust store is reported as verified.
//!
//! Kept in its own test binary because it points OpenSSL's default trust
//! store at a temporary file for the whole process.

mod common;

use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tlsplain::{fetch_with, FetchOptions};

#[test]
fn test_trusted_certificate_is_verified() {
    let (cert, key) = common::self_signed("localhost");

    let mut trust_store = NamedTempFile::new().unwrap();
    trust_store.write_all(&cert.to_pem().unwrap()).unwrap();
    trust_store.flush().unwrap();
    std::env::set_var("SSL_CERT_FILE", trust_store.path());

    // only the verified attempt is needed
    let port = common::spawn_tls_server(cert, key, "ECDHE-RSA-AES256-GCM-SHA384", 1);
    let options = FetchOptions::default().with_timeout(Duration::from_secs(5));

    let description = fetch_with(&format!("127.0.0.1:{}", port), &options).unwrap();

    assert!(description.verified());
    assert_eq!(description.subject.to_string(), "localhost");
    assert_eq!(
        description.cipher.suite,
        tlsplain::CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
    );
}
