//! Certification Declaration signing keys.
//!
//! CDs are signed by the CSA. The signer is identified in the CMS envelope
//! only by its Subject Key Identifier, so verification needs a table from
//! key identifier to public key. [`CsaCdKeysTrustStore`] starts with the
//! well-known CSA keys, including the development test key, and accepts
//! additional keys at runtime.

use dac_crypto::{P256PublicKey, P256_PUBLIC_KEY_LENGTH};
use tracing::{debug, warn};

use crate::error::VerifyError;
use crate::x509::MatterCertificate;

/// Length of a Subject Key Identifier.
pub const KEY_IDENTIFIER_LEN: usize = 20;

/// Key identifier of the CSA test CD signing key.
pub const TEST_CD_KID: [u8; KEY_IDENTIFIER_LEN] = WELL_KNOWN_CD_KEYS[0].kid;

/// Source of CD signing keys.
pub trait CdKeysTrustStore: Send + Sync {
    /// Public key for `kid`, if trusted.
    fn lookup(&self, kid: &[u8]) -> Option<P256PublicKey>;

    /// Whether `kid` names the development test key.
    fn is_test_key(&self, kid: &[u8]) -> bool;
}

struct WellKnownCdKey {
    label: &'static str,
    kid: [u8; KEY_IDENTIFIER_LEN],
    public_key: [u8; P256_PUBLIC_KEY_LENGTH],
    test_key: bool,
}

const WELL_KNOWN_CD_KEYS: [WellKnownCdKey; 6] = [
    WellKnownCdKey {
        label: "Matter Test CD Signing Authority",
        kid: [
            0x62, 0xfa, 0x82, 0x33, 0x59, 0xac, 0xfa, 0xa9, 0x96, 0x3e, 0x1c, 0xfa,
            0x14, 0x0a, 0xdd, 0xf5, 0x04, 0xf3, 0x71, 0x60,
        ],
        public_key: [
            0x04, 0x3c, 0x39, 0x89, 0x22, 0x45, 0x2b, 0x55, 0xca, 0xf3, 0x89, 0xc2,
            0x5b, 0xd1, 0xbc, 0xa4, 0x65, 0x69, 0x52, 0xcc, 0xb9, 0x0e, 0x88, 0x69,
            0x24, 0x9a, 0xd8, 0x47, 0x46, 0x53, 0x01, 0x4c, 0xbf, 0x95, 0xd6, 0x87,
            0x96, 0x5e, 0x03, 0x6b, 0x52, 0x1c, 0x51, 0x03, 0x7e, 0x6b, 0x8c, 0xed,
            0xef, 0xca, 0x1e, 0xb4, 0x40, 0x46, 0x69, 0x4f, 0xa0, 0x88, 0x82, 0xee,
            0xd6, 0x51, 0x9d, 0xec, 0xba,
        ],
        test_key: true,
    },
    WellKnownCdKey {
        label: "CSA CD Signing Key 001",
        kid: [
            0xfe, 0x34, 0x3f, 0x95, 0x99, 0x47, 0x76, 0x3b, 0x61, 0xee, 0x45, 0x39,
            0x13, 0x13, 0x38, 0x49, 0x4f, 0xe6, 0x7d, 0x8e,
        ],
        public_key: [
            0x04, 0xcd, 0xee, 0xe9, 0x3e, 0x44, 0xf8, 0xb7, 0x2b, 0xe3, 0xd1, 0xa9,
            0xc0, 0x7e, 0x21, 0x96, 0x8b, 0x9a, 0xff, 0xf3, 0xb4, 0x03, 0xf0, 0x5e,
            0x16, 0x69, 0xd7, 0xb1, 0xe5, 0xca, 0xee, 0x6f, 0xc7, 0x71, 0x4b, 0x42,
            0xe7, 0xe2, 0x36, 0x95, 0xe9, 0x2c, 0xd7, 0x63, 0x54, 0x73, 0xa2, 0x80,
            0xae, 0x68, 0x8f, 0x37, 0xbb, 0x94, 0x89, 0xe1, 0x16, 0x29, 0xb9, 0xb9,
            0x4f, 0xf7, 0xb0, 0x99, 0x29,
        ],
        test_key: false,
    },
    WellKnownCdKey {
        label: "CSA CD Signing Key 002",
        kid: [
            0xdd, 0x04, 0xdb, 0x58, 0x5b, 0x21, 0x4c, 0x1c, 0x58, 0x15, 0x87, 0xe6,
            0x56, 0x8d, 0xf4, 0x87, 0xb6, 0xdd, 0xc7, 0x01,
        ],
        public_key: [
            0x04, 0x03, 0x19, 0x37, 0xe8, 0xf9, 0x42, 0x51, 0x04, 0x5d, 0xf2, 0x74,
            0x57, 0xbb, 0x46, 0x25, 0x3e, 0xe3, 0x75, 0x4e, 0x8c, 0x12, 0xae, 0x28,
            0x55, 0x7d, 0x80, 0x27, 0xb9, 0xd4, 0xc3, 0x56, 0xd9, 0x1b, 0x40, 0x8c,
            0xff, 0x32, 0x27, 0x50, 0x17, 0xb2, 0x5f, 0x8c, 0x8b, 0xa2, 0x05, 0x16,
            0xd5, 0xc8, 0x3a, 0xf2, 0xb7, 0x24, 0x12, 0x80, 0x13, 0xdf, 0xcc, 0x8f,
            0x95, 0xd2, 0x00, 0xa9, 0x0b,
        ],
        test_key: false,
    },
    WellKnownCdKey {
        label: "CSA CD Signing Key 003",
        kid: [
            0x47, 0x10, 0x35, 0xe7, 0xc0, 0x4e, 0xaa, 0xa8, 0xbe, 0x7c, 0x4d, 0x4c,
            0x13, 0xe3, 0xe4, 0xc2, 0x09, 0x95, 0xa8, 0x4b,
        ],
        public_key: [
            0x04, 0x9f, 0x57, 0x5c, 0xd5, 0xfd, 0xb7, 0x52, 0x1f, 0x10, 0xa4, 0xdf,
            0x31, 0xf0, 0x73, 0x91, 0x2b, 0x61, 0x47, 0x28, 0xf2, 0xd3, 0x7f, 0x5b,
            0x6b, 0x96, 0xbc, 0x2c, 0xbf, 0x7c, 0x0b, 0x11, 0x96, 0x90, 0x57, 0x7d,
            0x55, 0x5d, 0x21, 0xa0, 0x96, 0x60, 0xa8, 0xb0, 0x82, 0xa3, 0x39, 0xea,
            0x53, 0x0f, 0x7a, 0x81, 0x2d, 0x86, 0x93, 0xb5, 0x6f, 0xd7, 0x64, 0x18,
            0x5f, 0xab, 0xcd, 0x32, 0xf5,
        ],
        test_key: false,
    },
    WellKnownCdKey {
        label: "CSA CD Signing Key 004",
        kid: [
            0xf6, 0x86, 0x03, 0xa3, 0x69, 0x2e, 0x98, 0x10, 0x72, 0x41, 0x9e, 0xa1,
            0xe1, 0xab, 0x38, 0x54, 0xbd, 0x77, 0x95, 0xd3,
        ],
        public_key: [
            0x04, 0x7c, 0xfc, 0x8d, 0x88, 0x10, 0xa8, 0x9c, 0xf4, 0xfa, 0x19, 0x17,
            0x78, 0xf2, 0xaf, 0xec, 0x78, 0xf8, 0x51, 0x7a, 0x97, 0xa3, 0xe5, 0x7f,
            0xc2, 0x13, 0xba, 0xd8, 0x88, 0xe3, 0x61, 0x1e, 0x74, 0xff, 0xb6, 0x84,
            0xbd, 0xeb, 0xa8, 0xa6, 0x8b, 0x25, 0x23, 0x4a, 0x5c, 0x35, 0x8f, 0x37,
            0x3b, 0xab, 0x9b, 0x6d, 0x30, 0x4e, 0x13, 0x06, 0xdd, 0x76, 0x20, 0xa5,
            0x28, 0xd1, 0x16, 0x1c, 0x0b,
        ],
        test_key: false,
    },
    WellKnownCdKey {
        label: "CSA CD Signing Key 005",
        kid: [
            0x63, 0x7f, 0x26, 0x34, 0xad, 0x62, 0xea, 0xfe, 0x6a, 0xf6, 0x62, 0xef,
            0xb9, 0x6f, 0x6f, 0xd2, 0xfc, 0xbf, 0xfc, 0x2f,
        ],
        public_key: [
            0x04, 0x43, 0x8a, 0x52, 0xc6, 0x62, 0xa2, 0xa6, 0xd7, 0x26, 0x47, 0xf9,
            0x5e, 0xb7, 0x53, 0x13, 0x6e, 0xe4, 0xae, 0x0f, 0xdb, 0x3a, 0xa9, 0xc1,
            0x69, 0x31, 0x42, 0x6b, 0x3d, 0x08, 0x67, 0xf9, 0x10, 0x3a, 0xe7, 0xd7,
            0xa1, 0xb8, 0x87, 0xe9, 0xf8, 0x13, 0xa6, 0xf2, 0x6f, 0x76, 0xbb, 0xcd,
            0xa9, 0x35, 0x93, 0x78, 0x7c, 0x12, 0x77, 0x8c, 0xa8, 0xf2, 0x97, 0x5d,
            0xc4, 0x5a, 0x20, 0x42, 0xf9,
        ],
        test_key: false,
    },
];

#[derive(Debug, Clone)]
struct TrustedCdKey {
    kid: [u8; KEY_IDENTIFIER_LEN],
    public_key: [u8; P256_PUBLIC_KEY_LENGTH],
}

/// CD key store seeded with the CSA keys.
#[derive(Debug, Clone)]
pub struct CsaCdKeysTrustStore {
    keys: Vec<TrustedCdKey>,
}

impl CsaCdKeysTrustStore {
    /// Store holding the test key and the five official CSA keys.
    #[must_use]
    pub fn new() -> Self {
        let keys = WELL_KNOWN_CD_KEYS
            .iter()
            .map(|k| {
                debug!(label = k.label, kid = %hex::encode(k.kid), "Loaded CD signing key");
                TrustedCdKey {
                    kid: k.kid,
                    public_key: k.public_key,
                }
            })
            .collect();
        Self { keys }
    }

    /// Trust an additional signing key.
    ///
    /// A key already present under `kid` is replaced.
    pub fn add_trusted_key(
        &mut self,
        kid: &[u8],
        public_key: &P256PublicKey,
    ) -> Result<(), VerifyError> {
        let kid: [u8; KEY_IDENTIFIER_LEN] = kid.try_into().map_err(|_| {
            VerifyError::invalid_argument(format!(
                "key identifier must be {KEY_IDENTIFIER_LEN} bytes, got {}",
                kid.len()
            ))
        })?;

        let entry = TrustedCdKey {
            kid,
            public_key: public_key.to_uncompressed_bytes(),
        };
        match self.keys.iter_mut().find(|k| k.kid == kid) {
            Some(existing) => *existing = entry,
            None => self.keys.push(entry),
        }
        debug!(kid = %hex::encode(kid), "Added trusted CD signing key");
        Ok(())
    }

    /// Trust the key of a CD signing certificate, indexed by its SKID.
    pub fn add_trusted_key_from_certificate(&mut self, der: &[u8]) -> Result<(), VerifyError> {
        let cert = MatterCertificate::from_der(der)?;
        let kid = cert
            .subject_key_id()
            .ok_or_else(|| VerifyError::certificate("CD signing certificate lacks SKID"))?;
        let public_key = cert.public_key()?;
        self.add_trusted_key(&kid, &public_key)
    }

    /// Number of trusted keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are trusted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for CsaCdKeysTrustStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CdKeysTrustStore for CsaCdKeysTrustStore {
    fn lookup(&self, kid: &[u8]) -> Option<P256PublicKey> {
        let entry = self.keys.iter().find(|k| k.kid.as_slice() == kid)?;
        match P256PublicKey::from_sec1_bytes(&entry.public_key) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(kid = %hex::encode(kid), error = %e, "Stored CD signing key is unusable");
                None
            },
        }
    }

    fn is_test_key(&self, kid: &[u8]) -> bool {
        WELL_KNOWN_CD_KEYS
            .iter()
            .any(|k| k.test_key && k.kid.as_slice() == kid)
    }
}
