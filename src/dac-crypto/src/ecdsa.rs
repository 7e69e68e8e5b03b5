//! ECDSA P-256 signature operations.
//!
//! Device attestation keys, PAI/PAA issuer keys and Certification Declaration
//! signing keys are all P-256 (secp256r1). Signatures cross this boundary in
//! raw `r || s` form; X.509 and CMS carry them DER-encoded, which
//! [`P256Signature::from_der`] converts.

use std::fmt;

use p256::ecdsa::{
    signature::hazmat::{PrehashSigner, PrehashVerifier},
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use rand_core::OsRng;

use crate::error::CryptoError;
use crate::hash::SHA256_HASH_LENGTH;

/// Length of an uncompressed SEC1 P-256 public key (`0x04 || X || Y`).
pub const P256_PUBLIC_KEY_LENGTH: usize = 65;

/// Length of a raw `r || s` P-256 ECDSA signature.
pub const P256_ECDSA_SIGNATURE_LENGTH_RAW: usize = 64;

/// Raw ECDSA P-256 signature (`r || s`, 64 bytes).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct P256Signature {
    bytes: [u8; P256_ECDSA_SIGNATURE_LENGTH_RAW],
}

impl P256Signature {
    /// Wrap a raw `r || s` signature.
    ///
    /// # Errors
    ///
    /// Returns error if the slice is not exactly 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; P256_ECDSA_SIGNATURE_LENGTH_RAW] = bytes.try_into().map_err(|_| {
            CryptoError::invalid_signature(format!(
                "expected {P256_ECDSA_SIGNATURE_LENGTH_RAW} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    /// Convert a DER `SEQUENCE { INTEGER r, INTEGER s }` signature to raw form.
    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let sig =
            Signature::from_der(der).map_err(|e| CryptoError::invalid_signature(e.to_string()))?;
        let mut bytes = [0u8; P256_ECDSA_SIGNATURE_LENGTH_RAW];
        bytes.copy_from_slice(&sig.to_bytes());
        Ok(Self { bytes })
    }

    /// DER `SEQUENCE { INTEGER r, INTEGER s }` encoding.
    pub fn to_der(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(self.to_ecdsa()?.to_der().as_bytes().to_vec())
    }

    /// Raw `r || s` bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; P256_ECDSA_SIGNATURE_LENGTH_RAW] {
        &self.bytes
    }

    fn to_ecdsa(self) -> Result<Signature, CryptoError> {
        Signature::from_slice(&self.bytes).map_err(|e| CryptoError::invalid_signature(e.to_string()))
    }
}

impl fmt::Debug for P256Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P256Signature({})", hex::encode(self.bytes))
    }
}

/// P-256 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct P256PublicKey {
    verifying_key: VerifyingKey,
}

impl P256PublicKey {
    /// Parse a SEC1-encoded point (compressed or uncompressed).
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not a valid point on the curve.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let verifying_key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| CryptoError::invalid_public_key(e.to_string()))?;
        Ok(Self { verifying_key })
    }

    /// Uncompressed SEC1 encoding (`0x04 || X || Y`).
    #[must_use]
    pub fn to_uncompressed_bytes(&self) -> [u8; P256_PUBLIC_KEY_LENGTH] {
        let encoded = self.verifying_key.to_encoded_point(false);
        let mut out = [0u8; P256_PUBLIC_KEY_LENGTH];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Verify a raw signature over an already computed SHA-256 digest.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::InvalidDigestLength`] if `digest` is not 32 bytes
    /// - [`CryptoError::InvalidSignature`] if `signature` is not a valid `r || s` pair
    /// - [`CryptoError::VerificationFailed`] if the signature does not match
    pub fn verify_hash_signature(&self, digest: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        if digest.len() != SHA256_HASH_LENGTH {
            return Err(CryptoError::InvalidDigestLength {
                expected: SHA256_HASH_LENGTH,
                actual: digest.len(),
            });
        }
        let sig = P256Signature::from_slice(signature)?.to_ecdsa()?;

        self.verifying_key
            .verify_prehash(digest, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }

    /// Verify a raw ECDSA-SHA256 signature over a message.
    pub fn verify_message_signature(
        &self,
        message: &[u8],
        signature: &P256Signature,
    ) -> Result<(), CryptoError> {
        let sig = signature.to_ecdsa()?;

        self.verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for P256PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P256PublicKey({})",
            hex::encode(self.to_uncompressed_bytes())
        )
    }
}

/// ECDSA P-256 signer.
///
/// Verification never needs a private key; this exists for provisioning
/// tooling and for producing attestation fixtures.
pub struct P256Signer {
    signing_key: SigningKey,
}

impl P256Signer {
    /// Create a new signer with a random key.
    #[must_use]
    pub fn random() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Create a signer from a 32-byte big-endian private scalar.
    ///
    /// # Errors
    ///
    /// Returns error if the key bytes are invalid.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| CryptoError::invalid_private_key(e.to_string()))?;

        Ok(Self { signing_key })
    }

    /// Public half of this key.
    #[must_use]
    pub fn public_key(&self) -> P256PublicKey {
        P256PublicKey {
            verifying_key: *self.signing_key.verifying_key(),
        }
    }

    /// Sign a message with ECDSA-SHA256 (RFC 6979 deterministic nonce).
    pub fn sign(&self, message: &[u8]) -> Result<P256Signature, CryptoError> {
        let signature: Signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| CryptoError::signing_failed(e.to_string()))?;
        P256Signature::from_slice(&signature.to_bytes())
    }

    /// Sign an already computed SHA-256 digest.
    pub fn sign_hash(&self, digest: &[u8]) -> Result<P256Signature, CryptoError> {
        if digest.len() != SHA256_HASH_LENGTH {
            return Err(CryptoError::InvalidDigestLength {
                expected: SHA256_HASH_LENGTH,
                actual: digest.len(),
            });
        }
        let signature: Signature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|e| CryptoError::signing_failed(e.to_string()))?;
        P256Signature::from_slice(&signature.to_bytes())
    }
}
