//! Error types for verification operations.
//!
//! [`VerifyError`] covers structural and argument failures (malformed TLV,
//! unparsable certificates, trust-store I/O) plus cryptographic errors
//! forwarded from [`dac_crypto`]. It is separate from
//! [`AttestationVerificationResult`](crate::AttestationVerificationResult),
//! which carries the verdict about *why* a device failed attestation.

use thiserror::Error;

/// Errors that can occur during verification.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Malformed Matter TLV input.
    #[error("TLV error: {reason}")]
    Tlv {
        /// What was wrong with the encoding.
        reason: String,
    },

    /// Attestation or NOCSR elements did not match the expected structure.
    #[error("Malformed elements: {reason}")]
    MalformedElements {
        /// What was wrong.
        reason: String,
    },

    /// CMS envelope could not be parsed.
    #[error("CMS error: {reason}")]
    Cms {
        /// Reason for failure.
        reason: String,
    },

    /// Certificate could not be parsed or lacks a required field.
    #[error("Certificate error: {reason}")]
    Certificate {
        /// Reason for failure.
        reason: String,
    },

    /// Caller supplied an unusable argument.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Reason the argument is invalid.
        reason: String,
    },

    /// CSR nonce in the NOCSR elements differs from the one sent.
    #[error("CSR nonce mismatch")]
    CsrNonceMismatch,

    /// The operation is not provided by this verifier.
    #[error("Operation not implemented by this verifier")]
    NotImplemented,

    /// Configuration requires a revocation check the verifier does not provide.
    #[error("Verifier does not implement a revocation check")]
    RevocationCheckMissing,

    /// Revocation source failed.
    #[error("Revocation source error: {message}")]
    Revocation {
        /// Error message.
        message: String,
    },

    /// I/O error while loading trust material.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cryptographic error.
    #[error("Crypto error: {0}")]
    CryptoError(#[from] dac_crypto::CryptoError),
}

impl VerifyError {
    /// Create a TLV error.
    #[must_use]
    pub fn tlv(reason: impl Into<String>) -> Self {
        Self::Tlv {
            reason: reason.into(),
        }
    }

    /// Create a malformed-elements error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedElements {
            reason: reason.into(),
        }
    }

    /// Create a CMS error.
    #[must_use]
    pub fn cms(reason: impl Into<String>) -> Self {
        Self::Cms {
            reason: reason.into(),
        }
    }

    /// Create a certificate error.
    #[must_use]
    pub fn certificate(reason: impl Into<String>) -> Self {
        Self::Certificate {
            reason: reason.into(),
        }
    }

    /// Create an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a revocation-source error.
    #[must_use]
    pub fn revocation(message: impl Into<String>) -> Self {
        Self::Revocation {
            message: message.into(),
        }
    }
}
