//! Attestation signature validation.
//!
//! ```text
//! digest = SHA-256(attestation_elements || attestation_challenge)
//! ok     = ECDSA-P256-Verify(dac_public_key, digest, signature)
//! ```

use dac_crypto::{CryptoError, HashSha256Stream, P256PublicKey};

/// Check `signature` over `elements || challenge` with the DAC public key.
///
/// Both inputs go through a single running hash so neither is copied.
/// Crypto errors are returned unchanged; mapping them onto a verification
/// result is the caller's decision.
pub fn validate_attestation_signature(
    public_key: &P256PublicKey,
    attestation_elements: &[u8],
    attestation_challenge: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    let mut stream = HashSha256Stream::new();
    stream.begin()?;
    stream.add_data(attestation_elements)?;
    stream.add_data(attestation_challenge)?;
    let digest = stream.finish()?;

    public_key.verify_hash_signature(&digest, signature)
}
