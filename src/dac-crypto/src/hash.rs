//! Streaming SHA-256.

use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Length of a SHA-256 digest in bytes.
pub const SHA256_HASH_LENGTH: usize = 32;

/// Incremental SHA-256 context with an explicit `begin` / `add_data` / `finish`
/// lifecycle.
///
/// Multiple `add_data` calls hash the concatenation of their inputs, so
/// `add_data(a); add_data(b)` equals a single hash over `a || b`.
#[derive(Debug, Default)]
pub struct HashSha256Stream {
    state: Option<Sha256>,
}

impl HashSha256Stream {
    /// Create an idle stream. Call [`begin`](Self::begin) before adding data.
    #[must_use]
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Start (or restart) the running hash.
    pub fn begin(&mut self) -> Result<(), CryptoError> {
        self.state = Some(Sha256::new());
        Ok(())
    }

    /// Feed more bytes into the running hash.
    pub fn add_data(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        let hasher = self
            .state
            .as_mut()
            .ok_or(CryptoError::HashStreamNotStarted)?;
        hasher.update(data);
        Ok(())
    }

    /// Finalize the running hash and return the digest.
    ///
    /// The stream returns to the idle state.
    pub fn finish(&mut self) -> Result<[u8; SHA256_HASH_LENGTH], CryptoError> {
        let hasher = self.state.take().ok_or(CryptoError::HashStreamNotStarted)?;
        Ok(hasher.finalize().into())
    }

    /// Whether `begin` has been called without a matching `finish`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }
}

/// One-shot SHA-256.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; SHA256_HASH_LENGTH] {
    Sha256::digest(data).into()
}
