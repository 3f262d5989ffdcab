//! Plain-language TLS assessment of a single host.
//!
//! [`fetch`] performs one TLS handshake against a host (two if the first one
//! cannot be verified), reads the leaf certificate, decides whether it chains
//! to a trusted root and explains the negotiated cipher suite through
//! [`classify`].
//!
//! ```no_run
//! let description = tlsplain::fetch("example.com")?;
//! println!("{} verified: {}", description.subject, description.verified());
//! println!("{}", description.cipher.forward_secrecy_note);
//! # Ok::<(), tlsplain::FetchError>(())
//! ```

pub mod cipher;
pub mod config;
pub mod error;

pub use cipher::{classify, CipherDescription, CipherSuite};
pub use error::FetchError;

use openssl::nid::Nid;
use openssl::ssl::{
    HandshakeError, SslConnector, SslMethod, SslRef, SslStream, SslVerifyMode, SslVersion,
};
use openssl::x509::{X509NameRef, X509Ref, X509VerifyResult};
use serde::Serialize;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Port dialed when the host does not name one.
pub const DEFAULT_PORT: u16 = 443;

/// Default bound on DNS resolution and on each handshake attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A normalized `host:port` pair ready to be dialed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Host name or IP literal, without IPv6 brackets
    pub host: String,
    pub port: u16,
}

impl Target {
    /// Parses user input into a target, appending [`DEFAULT_PORT`] when the
    /// input names no port.
    ///
    /// Accepts `host`, `host:port`, IPv6 literals with or without brackets and
    /// URLs such as `https://example.com:8443/path`.
    pub fn parse(input: &str) -> Result<Target, FetchError> {
        let invalid = |reason: &str| FetchError::InvalidHost {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("host is empty"));
        }

        let (host, port) = if trimmed.contains("://") {
            let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
            let host = url.host_str().ok_or_else(|| invalid("URL has no host"))?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            (host.to_string(), url.port().unwrap_or(DEFAULT_PORT))
        } else if let Some(rest) = trimmed.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
            let port = match after {
                "" => DEFAULT_PORT,
                _ => {
                    let port = after
                        .strip_prefix(':')
                        .ok_or_else(|| invalid("unexpected text after IPv6 literal"))?;
                    parse_port(port).ok_or_else(|| invalid("invalid port"))?
                }
            };
            (host.to_string(), port)
        } else if trimmed.parse::<Ipv6Addr>().is_ok() {
            (trimmed.to_string(), DEFAULT_PORT)
        } else {
            match trimmed.rsplit_once(':') {
                // unbracketed IPv6 with a port, or a stray colon
                Some((host, _)) if host.contains(':') => {
                    return Err(invalid("IPv6 addresses with a port must be bracketed"))
                }
                Some((host, port)) => (
                    host.to_string(),
                    parse_port(port).ok_or_else(|| invalid("invalid port"))?,
                ),
                None => (trimmed.to_string(), DEFAULT_PORT),
            }
        };

        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        if host.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(invalid("host contains invalid characters"));
        }

        Ok(Target { host, port })
    }
}

fn parse_port(port: &str) -> Option<u16> {
    port.parse::<u16>().ok().filter(|p| *p != 0)
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Limits applied to a single [`fetch_with`] call.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Bound on DNS resolution and on each handshake attempt
    pub timeout: Duration,
    /// Point in time by which the whole call returns
    pub deadline: Option<Instant>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            timeout: DEFAULT_TIMEOUT,
            deadline: None,
        }
    }
}

impl FetchOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Absolute limit for a step starting now: `timeout` from now, or the
    /// deadline if that comes first.
    fn step_limit(&self, operation: &str) -> Result<Instant, FetchError> {
        let now = Instant::now();
        let limit = match self.deadline {
            Some(deadline) => deadline.min(now + self.timeout),
            None => now + self.timeout,
        };
        if limit <= now {
            return Err(timed_out(operation));
        }
        Ok(limit)
    }
}

fn timed_out(operation: &str) -> FetchError {
    FetchError::Timeout {
        operation: operation.to_string(),
    }
}

/// Time left until `limit`, `None` once it has passed.
fn remaining(limit: Instant) -> Option<Duration> {
    let left = limit.saturating_duration_since(Instant::now());
    if left.is_zero() {
        None
    } else {
        Some(left)
    }
}

/// Distinguished name of the certificate subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectName {
    pub common_name: Option<String>,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
    pub locality: Option<String>,
    pub state_or_province: Option<String>,
    pub country: Option<String>,
}

impl SubjectName {
    fn from_x509_name(name: &X509NameRef) -> SubjectName {
        let entry = |nid: Nid| {
            name.entries_by_nid(nid)
                .next()
                .and_then(|e| e.data().as_utf8().ok())
                .map(|s| s.to_string())
        };
        SubjectName {
            common_name: entry(Nid::COMMONNAME),
            organization: entry(Nid::ORGANIZATIONNAME),
            organizational_unit: entry(Nid::ORGANIZATIONALUNITNAME),
            locality: entry(Nid::LOCALITYNAME),
            state_or_province: entry(Nid::STATEORPROVINCENAME),
            country: entry(Nid::COUNTRYNAME),
        }
    }
}

impl fmt::Display for SubjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.common_name.as_deref().unwrap_or("None"))
    }
}

/// Assessment of a host's leaf certificate and negotiated cipher suite.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateDescription {
    /// The `host:port` that was dialed
    pub host: String,
    pub subject: SubjectName,
    /// Negotiated protocol version, e.g. `TLSv1.2`
    pub protocol: String,
    /// Cipher suite name as reported by the TLS library
    pub negotiated_cipher: String,
    pub cipher: CipherDescription,
    verified: bool,
}

impl CertificateDescription {
    /// True only if the certificate chained to a trusted root on the first,
    /// verifying handshake and the served leaf is the verified chain's leaf.
    pub fn verified(&self) -> bool {
        self.verified
    }
}

/// Checks a certificate using [`FetchOptions::default`].
pub fn fetch(host: &str) -> Result<CertificateDescription, FetchError> {
    fetch_with(host, &FetchOptions::default())
}

/// Connects to `host`, first with certificate verification and, if that
/// fails for any reason, once more without it, then describes what the
/// server presented.
pub fn fetch_with(host: &str, options: &FetchOptions) -> Result<CertificateDescription, FetchError> {
    let target = Target::parse(host)?;
    let addrs = resolve(&target, options)?;

    let handshake = handshake(&target, &addrs, options)?;
    let description = describe(&target, &handshake)?;
    debug!(
        host = %target,
        verified = description.verified,
        cipher = %description.cipher.suite,
        "certificate described"
    );
    Ok(description)
}

const RESOLVING: &str = "resolving host";

/// Resolves on a helper thread so a stuck resolver cannot outlive the limit.
fn resolve(target: &Target, options: &FetchOptions) -> Result<Vec<SocketAddr>, FetchError> {
    let limit = options.step_limit(RESOLVING)?;
    let unreachable = |source: io::Error| FetchError::HostUnreachable {
        address: target.to_string(),
        source,
    };

    let (sender, receiver) = mpsc::channel();
    let host = target.host.clone();
    let port = target.port;
    thread::spawn(move || {
        let resolved = (host.as_str(), port)
            .to_socket_addrs()
            .map(|addrs| addrs.collect::<Vec<SocketAddr>>());
        let _ = sender.send(resolved);
    });

    let wait = remaining(limit).ok_or_else(|| timed_out(RESOLVING))?;
    let addrs = match receiver.recv_timeout(wait) {
        Ok(resolved) => resolved.map_err(unreachable)?,
        Err(RecvTimeoutError::Timeout) => return Err(timed_out(RESOLVING)),
        Err(RecvTimeoutError::Disconnected) => {
            return Err(unreachable(io::Error::new(
                io::ErrorKind::Other,
                "resolver thread exited",
            )))
        }
    };
    if addrs.is_empty() {
        return Err(unreachable(io::Error::new(
            io::ErrorKind::NotFound,
            "no addresses found for host",
        )));
    }
    Ok(addrs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrustPolicy {
    /// System trust store and hostname verification
    Strict,
    /// Any certificate is accepted
    Permissive,
}

/// Outcome of the two-attempt handshake, tagged with the policy that won.
enum Handshake {
    Strict(Connection),
    Permissive(Connection),
}

fn handshake(
    target: &Target,
    addrs: &[SocketAddr],
    options: &FetchOptions,
) -> Result<Handshake, FetchError> {
    match connect(target, addrs, options, TrustPolicy::Strict) {
        Ok(conn) => Ok(Handshake::Strict(conn)),
        Err(err) => {
            debug!(host = %target, error = %err, "verified handshake failed, retrying without verification");
            connect(target, addrs, options, TrustPolicy::Permissive).map(Handshake::Permissive)
        }
    }
}

/// An established TLS session. Sends close_notify and closes the socket when
/// dropped.
struct Connection {
    stream: SslStream<DeadlineStream>,
}

impl Connection {
    fn ssl(&self) -> &SslRef {
        self.stream.ssl()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.stream.shutdown();
    }
}

/// A TCP stream that refuses to block past `limit`. The socket timeout is
/// reset to the time left before every read and write, so a peer trickling
/// bytes cannot stretch the handshake.
#[derive(Debug)]
struct DeadlineStream {
    inner: TcpStream,
    limit: Instant,
}

impl DeadlineStream {
    fn time_left(&self) -> io::Result<Duration> {
        remaining(self.limit)
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "attempt time limit reached"))
    }
}

impl Read for DeadlineStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.time_left()?;
        self.inner.set_read_timeout(Some(left))?;
        self.inner.read(buf)
    }
}

impl Write for DeadlineStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let left = self.time_left()?;
        self.inner.set_write_timeout(Some(left))?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn connect(
    target: &Target,
    addrs: &[SocketAddr],
    options: &FetchOptions,
    policy: TrustPolicy,
) -> Result<Connection, FetchError> {
    let operation = match policy {
        TrustPolicy::Strict => "verified handshake",
        TrustPolicy::Permissive => "unverified handshake",
    };
    let limit = options.step_limit(operation)?;
    let tcp = dial(target, addrs, limit, operation)?;

    let mut builder = SslConnector::builder(SslMethod::tls())?;
    // TLS 1.3 suites do not name their key exchange and cannot be classified
    builder.set_max_proto_version(Some(SslVersion::TLS1_2))?;
    if policy == TrustPolicy::Permissive {
        builder.set_verify(SslVerifyMode::NONE);
    }
    let connector = builder.build();
    let config = connector
        .configure()?
        .verify_hostname(policy == TrustPolicy::Strict);

    debug!(host = %target, ?policy, "starting TLS handshake");
    let mut attempt = config.connect(&target.host, DeadlineStream { inner: tcp, limit });
    loop {
        match attempt {
            Ok(stream) => return Ok(Connection { stream }),
            // the socket timeout fired before the limit; go round again
            Err(HandshakeError::WouldBlock(mid)) if remaining(limit).is_some() => {
                attempt = mid.handshake();
            }
            Err(_) if remaining(limit).is_none() => return Err(timed_out(operation)),
            Err(e) => {
                return Err(FetchError::HandshakeFailed {
                    address: target.to_string(),
                    details: e.to_string(),
                })
            }
        }
    }
}

fn dial(
    target: &Target,
    addrs: &[SocketAddr],
    limit: Instant,
    operation: &str,
) -> Result<TcpStream, FetchError> {
    let mut last_error = None;
    for addr in addrs {
        let left = remaining(limit).ok_or_else(|| timed_out(operation))?;
        match TcpStream::connect_timeout(addr, left) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(host = %target, %addr, error = %e, "TCP connect failed");
                last_error = Some(e);
            }
        }
    }
    Err(FetchError::HostUnreachable {
        address: target.to_string(),
        source: last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no addresses to connect to")
        }),
    })
}

fn describe(target: &Target, handshake: &Handshake) -> Result<CertificateDescription, FetchError> {
    let (conn, policy) = match handshake {
        Handshake::Strict(conn) => (conn, TrustPolicy::Strict),
        Handshake::Permissive(conn) => (conn, TrustPolicy::Permissive),
    };
    let ssl = conn.ssl();

    let leaf = ssl
        .peer_certificate()
        .ok_or_else(|| FetchError::NoPeerCertificate {
            address: target.to_string(),
        })?;

    let verified = match policy {
        TrustPolicy::Strict => chain_verified(ssl, &leaf)?,
        TrustPolicy::Permissive => false,
    };

    let (suite, negotiated_cipher) = match ssl.current_cipher() {
        Some(c) => (
            CipherSuite::from_bytes(c.protocol_id()),
            c.standard_name().unwrap_or(c.name()).to_string(),
        ),
        None => (CipherSuite(0), "unknown".to_string()),
    };

    Ok(CertificateDescription {
        host: target.to_string(),
        subject: SubjectName::from_x509_name(leaf.subject_name()),
        protocol: ssl.version_str().to_string(),
        negotiated_cipher,
        cipher: classify(suite),
        verified,
    })
}

/// The served leaf must be byte-identical to the leaf of a verified chain.
fn chain_verified(ssl: &SslRef, leaf: &X509Ref) -> Result<bool, FetchError> {
    if ssl.verify_result() != X509VerifyResult::OK {
        return Ok(false);
    }
    let leaf_der = leaf.to_der()?;
    let chain_leaves = ssl
        .verified_chain()
        .into_iter()
        .filter_map(|chain| chain.iter().next())
        .map(|cert| cert.to_der())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(leaf_matches_verified_chain(&leaf_der, &chain_leaves))
}

fn leaf_matches_verified_chain<B: AsRef<[u8]>>(leaf: &[u8], chain_leaves: &[B]) -> bool {
    chain_leaves.iter().any(|chain_leaf| chain_leaf.as_ref() == leaf)
}
