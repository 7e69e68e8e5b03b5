//! Configuration for the attestation verifier.

use serde::{Deserialize, Serialize};

/// Maximum attestation response length accepted from a device.
pub const DEFAULT_MAX_ATTESTATION_ELEMENTS_LEN: usize = 900;

/// How certificate validity windows are enforced during chain validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateValidityPolicy {
    /// Reject certificates outside their `notBefore`/`notAfter` window.
    #[default]
    Enforce,
    /// Skip expiry checks (devices without a trusted clock, test rigs).
    IgnoreExpiry,
}

/// Configuration for the default device attestation verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Accept Certification Declarations signed with the CSA test key.
    pub allow_test_cd_signing_key: bool,
    /// Certificate validity enforcement.
    pub validity_policy: CertificateValidityPolicy,
    /// Refuse to register verifiers that lack a real revocation check.
    pub require_revocation_check: bool,
    /// Upper bound on the attestation elements buffer.
    pub max_attestation_elements_len: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            allow_test_cd_signing_key: false,
            validity_policy: CertificateValidityPolicy::Enforce,
            require_revocation_check: false,
            max_attestation_elements_len: DEFAULT_MAX_ATTESTATION_ELEMENTS_LEN,
        }
    }
}

impl VerifierConfig {
    /// Development profile: test CD key allowed, expiry ignored.
    #[must_use]
    pub fn development() -> Self {
        Self {
            allow_test_cd_signing_key: true,
            validity_policy: CertificateValidityPolicy::IgnoreExpiry,
            ..Self::default()
        }
    }
}
