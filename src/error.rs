//! Error types for certificate fetching.
//!
//! Every way a [`fetch`](crate::fetch) can fail is folded into [`FetchError`].
//! The underlying cause is kept for operator logs; front-ends should show end
//! users a generic notice instead of this text.

use std::fmt;
use std::io;

/// Error returned when a host's certificate could not be assessed.
#[derive(Debug)]
pub enum FetchError {
    /// The host string could not be turned into a dialable target
    InvalidHost {
        /// The input as given by the caller
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// DNS resolution or TCP connection failed before any handshake completed
    HostUnreachable {
        /// The `host:port` target
        address: String,
        /// The underlying I/O error
        source: io::Error,
    },

    /// Neither the verified nor the unverified handshake succeeded
    HandshakeFailed {
        /// The `host:port` target
        address: String,
        /// Details from the TLS library
        details: String,
    },

    /// The handshake completed but the server presented no certificate
    NoPeerCertificate {
        /// The `host:port` target
        address: String,
    },

    /// The caller's deadline expired
    Timeout {
        /// Which step was about to run
        operation: String,
    },

    /// Building the local TLS context failed
    OpenSsl {
        /// The underlying OpenSSL error stack
        details: String,
    },
}

impl FetchError {
    /// True for failures that happened before a TLS session existed.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::HostUnreachable { .. } | Self::Timeout { .. } | Self::InvalidHost { .. }
        )
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHost { input, reason } => {
                write!(f, "Invalid host '{}': {}", input, reason)
            }
            Self::HostUnreachable { address, source } => {
                write!(f, "Host unreachable: {} ({})", address, source)
            }
            Self::HandshakeFailed { address, details } => {
                write!(f, "TLS handshake with {} failed: {}", address, details)
            }
            Self::NoPeerCertificate { address } => {
                write!(f, "No certificate presented by {}", address)
            }
            Self::Timeout { operation } => {
                write!(f, "Deadline expired before {}", operation)
            }
            Self::OpenSsl { details } => {
                write!(f, "OpenSSL error: {}", details)
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::HostUnreachable { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<openssl::error::ErrorStack> for FetchError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::OpenSsl {
            details: e.to_string(),
        }
    }
}
