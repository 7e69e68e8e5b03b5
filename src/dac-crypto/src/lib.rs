//! # dac-crypto
//!
//! Trusted crypto boundary for device attestation verification.
//!
//! The attestation core only ever needs two primitives:
//!
//! - a **SHA-256 hash stream** ([`HashSha256Stream`]) with
//!   `begin` / `add_data` / `finish`, producing a 32-byte digest
//! - **ECDSA P-256 hash-signature verification**
//!   ([`P256PublicKey::verify_hash_signature`])
//!
//! ```text
//! digest    = SHA-256(attestation_elements || attestation_challenge)
//! verified  = ECDSA_P256_Verify(dac_public_key, digest, signature)
//! ```
//!
//! Errors are reported as [`CryptoError`] and are meant to be propagated
//! verbatim by callers.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod ecdsa;
mod error;
mod hash;

pub use ecdsa::{
    P256PublicKey, P256Signature, P256Signer, P256_ECDSA_SIGNATURE_LENGTH_RAW,
    P256_PUBLIC_KEY_LENGTH,
};
pub use error::CryptoError;
pub use hash::{sha256, HashSha256Stream, SHA256_HASH_LENGTH};

/// Constant-time byte comparison.
///
/// Compares two byte slices in constant time to prevent timing attacks.
/// Returns `true` if the slices are equal, `false` otherwise.
///
/// # Security
///
/// Use this for nonce and digest comparisons.
///
/// The length check still returns early; length is not secret for any
/// value compared during attestation.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;

    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
