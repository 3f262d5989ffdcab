//! Cipher suite classification.
//!
//! Maps a negotiated TLS cipher suite to four plain-language verdicts: the key
//! exchange and signature scheme, forward secrecy, the bulk data cipher and the
//! effective strength. Every known suite is described by a [`SuiteProfile`]
//! tuple and each verdict is looked up from that tuple's own axis, so adding a
//! suite is a single table row.
//!
//! Classification is total: suites missing from the table get the
//! [`UNKNOWN`] marker on all four axes.

use serde::{Serialize, Serializer};
use std::fmt;
use strum_macros::{Display, EnumIter};

/// Marker used on every axis when a suite is not in the table.
pub const UNKNOWN: &str = "We couldn't figure out the encryption used by the server.";

const NO_FORWARD_SECRECY: &str = "The server doesn't support forward secrecy. This is bad.";
const FORWARD_SECRECY: &str = "The server does support forward secrecy. This is good!";

const RSA_NOTE: &str = "The server uses a key exchange and signature cipher (RSA) that many cryptographers suspect will be broken in the not-so-distant future. However, this cipher is prevalent in TLS certificates.";
const ECC_NOTE: &str =
    "The server uses the preferred key exchange and signature cipher (ECDHE / ECDSA).";
const HYBRID_NOTE: &str = "This server uses the preferred key exchange cipher (ECDHE) but uses a signature cipher (RSA) that many cryptographers suspect will be broken in the not-so-distant future.";

const RC4_NOTE: &str = "The server uses a data security cipher that protects against certain attacks, but is thought to be otherwise weak (RC4).";
const TRIPLE_DES_NOTE: &str = "The server uses an outdated data security cipher (3DES).";
const AES_CBC_NOTE: &str = "The server uses a standard and accepted data security cipher (AES-CBC). However, it may be vulnerable to certain attacks.";
const AES_GCM_NOTE: &str = "The server uses a standard and accepted data security cipher (AES-GCM). It uses a theoretically better (and potentially more fragile) method for securing data. This is the best choice at this time.";

const STRENGTH_128: &str = "The server uses strong cryptography.";
const STRENGTH_256: &str = "The server uses very strong cryptography.";
const STRENGTH_WEAK: &str = "The server uses potentially weak cryptography.";

/// A TLS cipher suite identifier, the two-byte IANA code point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    pub const TLS_RSA_WITH_RC4_128_SHA: CipherSuite = CipherSuite(0x0005);
    pub const TLS_RSA_WITH_3DES_EDE_CBC_SHA: CipherSuite = CipherSuite(0x000a);
    pub const TLS_RSA_WITH_AES_128_CBC_SHA: CipherSuite = CipherSuite(0x002f);
    pub const TLS_RSA_WITH_AES_256_CBC_SHA: CipherSuite = CipherSuite(0x0035);
    pub const TLS_RSA_WITH_AES_128_GCM_SHA256: CipherSuite = CipherSuite(0x009c);
    pub const TLS_RSA_WITH_AES_256_GCM_SHA384: CipherSuite = CipherSuite(0x009d);
    pub const TLS_ECDHE_ECDSA_WITH_RC4_128_SHA: CipherSuite = CipherSuite(0xc007);
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA: CipherSuite = CipherSuite(0xc009);
    pub const TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA: CipherSuite = CipherSuite(0xc00a);
    pub const TLS_ECDHE_RSA_WITH_RC4_128_SHA: CipherSuite = CipherSuite(0xc011);
    pub const TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA: CipherSuite = CipherSuite(0xc012);
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA: CipherSuite = CipherSuite(0xc013);
    pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA: CipherSuite = CipherSuite(0xc014);
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256: CipherSuite = CipherSuite(0xc02b);
    pub const TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384: CipherSuite = CipherSuite(0xc02c);
    pub const TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: CipherSuite = CipherSuite(0xc02f);
    pub const TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: CipherSuite = CipherSuite(0xc030);

    /// Builds a suite from the two code point bytes as they appear on the wire.
    pub fn from_bytes(bytes: [u8; 2]) -> CipherSuite {
        CipherSuite(u16::from_be_bytes(bytes))
    }

    /// IANA name of the suite, if it is one we classify.
    pub fn name(&self) -> Option<&'static str> {
        lookup(*self).map(|entry| entry.name)
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04X}", self.0),
        }
    }
}

impl Serialize for CipherSuite {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Key exchange and signature family of a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize)]
pub enum KeyExchange {
    #[strum(serialize = "RSA")]
    Rsa,
    #[strum(serialize = "ECDHE-ECDSA")]
    EcdheEcdsa,
    #[strum(serialize = "ECDHE-RSA")]
    EcdheRsa,
}

impl KeyExchange {
    /// Ephemeral key exchanges keep past sessions safe if the server key leaks.
    pub fn forward_secrecy(&self) -> bool {
        match self {
            KeyExchange::Rsa => false,
            KeyExchange::EcdheEcdsa | KeyExchange::EcdheRsa => true,
        }
    }

    fn note(&self) -> &'static str {
        match self {
            KeyExchange::Rsa => RSA_NOTE,
            KeyExchange::EcdheEcdsa => ECC_NOTE,
            KeyExchange::EcdheRsa => HYBRID_NOTE,
        }
    }

    fn forward_secrecy_note(&self) -> &'static str {
        if self.forward_secrecy() {
            FORWARD_SECRECY
        } else {
            NO_FORWARD_SECRECY
        }
    }
}

/// Bulk symmetric cipher family of a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize)]
pub enum BulkCipher {
    #[strum(serialize = "RC4")]
    Rc4,
    #[strum(serialize = "3DES")]
    TripleDes,
    #[strum(serialize = "AES-CBC")]
    AesCbc,
    #[strum(serialize = "AES-GCM")]
    AesGcm,
}

impl BulkCipher {
    fn note(&self) -> &'static str {
        match self {
            BulkCipher::Rc4 => RC4_NOTE,
            BulkCipher::TripleDes => TRIPLE_DES_NOTE,
            BulkCipher::AesCbc => AES_CBC_NOTE,
            BulkCipher::AesGcm => AES_GCM_NOTE,
        }
    }
}

/// Effective strength bucket of a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize)]
pub enum Strength {
    #[strum(serialize = "weak")]
    Weak,
    #[strum(serialize = "128-bit")]
    Bits128,
    #[strum(serialize = "256-bit")]
    Bits256,
}

impl Strength {
    /// Nominal key size in bits; weak suites report 0.
    pub fn bits(&self) -> u16 {
        match self {
            Strength::Weak => 0,
            Strength::Bits128 => 128,
            Strength::Bits256 => 256,
        }
    }

    fn note(&self) -> &'static str {
        match self {
            Strength::Weak => STRENGTH_WEAK,
            Strength::Bits128 => STRENGTH_128,
            Strength::Bits256 => STRENGTH_256,
        }
    }
}

/// The classification tuple of a known suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuiteProfile {
    pub key_exchange: KeyExchange,
    pub bulk_cipher: BulkCipher,
    pub strength: Strength,
}

struct SuiteEntry {
    suite: CipherSuite,
    name: &'static str,
    profile: SuiteProfile,
}

macro_rules! suite {
    ($id:ident, $kx:ident, $bulk:ident, $strength:ident) => {
        SuiteEntry {
            suite: CipherSuite::$id,
            name: stringify!($id),
            profile: SuiteProfile {
                key_exchange: KeyExchange::$kx,
                bulk_cipher: BulkCipher::$bulk,
                strength: Strength::$strength,
            },
        }
    };
}

// 3DES is rated weak regardless of key exchange.
static SUITES: &[SuiteEntry] = &[
    suite!(TLS_RSA_WITH_RC4_128_SHA, Rsa, Rc4, Bits128),
    suite!(TLS_RSA_WITH_3DES_EDE_CBC_SHA, Rsa, TripleDes, Weak),
    suite!(TLS_RSA_WITH_AES_128_CBC_SHA, Rsa, AesCbc, Bits128),
    suite!(TLS_RSA_WITH_AES_256_CBC_SHA, Rsa, AesCbc, Bits256),
    suite!(TLS_RSA_WITH_AES_128_GCM_SHA256, Rsa, AesGcm, Bits128),
    suite!(TLS_RSA_WITH_AES_256_GCM_SHA384, Rsa, AesGcm, Bits256),
    suite!(TLS_ECDHE_ECDSA_WITH_RC4_128_SHA, EcdheEcdsa, Rc4, Bits128),
    suite!(TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA, EcdheEcdsa, AesCbc, Bits128),
    suite!(TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA, EcdheEcdsa, AesCbc, Bits256),
    suite!(TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256, EcdheEcdsa, AesGcm, Bits128),
    suite!(TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384, EcdheEcdsa, AesGcm, Bits256),
    suite!(TLS_ECDHE_RSA_WITH_RC4_128_SHA, EcdheRsa, Rc4, Bits128),
    suite!(TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA, EcdheRsa, TripleDes, Weak),
    suite!(TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA, EcdheRsa, AesCbc, Bits128),
    suite!(TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA, EcdheRsa, AesCbc, Bits256),
    suite!(TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256, EcdheRsa, AesGcm, Bits128),
    suite!(TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384, EcdheRsa, AesGcm, Bits256),
];

fn lookup(suite: CipherSuite) -> Option<&'static SuiteEntry> {
    SUITES.iter().find(|entry| entry.suite == suite)
}

/// Iterates over every suite the classifier knows about.
pub fn known_suites() -> impl Iterator<Item = CipherSuite> {
    SUITES.iter().map(|entry| entry.suite)
}

/// Plain-language description of a negotiated cipher suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CipherDescription {
    pub suite: CipherSuite,
    pub profile: Option<SuiteProfile>,
    pub key_exchange_note: &'static str,
    pub forward_secrecy_note: &'static str,
    pub symmetric_cipher_note: &'static str,
    pub strength_note: &'static str,
}

impl CipherDescription {
    fn unknown(suite: CipherSuite) -> CipherDescription {
        CipherDescription {
            suite,
            profile: None,
            key_exchange_note: UNKNOWN,
            forward_secrecy_note: UNKNOWN,
            symmetric_cipher_note: UNKNOWN,
            strength_note: UNKNOWN,
        }
    }

    /// Whether the suite provides forward secrecy, `None` if unclassified.
    pub fn forward_secrecy(&self) -> Option<bool> {
        self.profile.map(|p| p.key_exchange.forward_secrecy())
    }

    pub fn is_known(&self) -> bool {
        self.profile.is_some()
    }
}

/// Classifies a cipher suite. Never fails.
pub fn classify(suite: CipherSuite) -> CipherDescription {
    match lookup(suite) {
        Some(entry) => {
            let p = entry.profile;
            CipherDescription {
                suite,
                profile: Some(p),
                key_exchange_note: p.key_exchange.note(),
                forward_secrecy_note: p.key_exchange.forward_secrecy_note(),
                symmetric_cipher_note: p.bulk_cipher.note(),
                strength_note: p.strength.note(),
            }
        }
        None => CipherDescription::unknown(suite),
    }
}
