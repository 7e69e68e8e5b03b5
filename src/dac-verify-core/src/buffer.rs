//! Exactly-sized owned byte buffers.

use tracing::warn;

/// Owned copy of a byte span.
///
/// Allocation is fallible: when the copy cannot be reserved the buffer is
/// left empty and a warning is logged, so callers always get a usable value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedBuffer {
    bytes: Vec<u8>,
}

impl OwnedBuffer {
    /// Copy `source` into a new buffer of exactly `source.len()` bytes.
    #[must_use]
    pub fn copy_from(source: &[u8]) -> Self {
        let mut bytes = Vec::new();
        if let Err(e) = bytes.try_reserve_exact(source.len()) {
            warn!(len = source.len(), error = %e, "Failed to allocate buffer copy");
            return Self::default();
        }
        bytes.extend_from_slice(source);
        Self { bytes }
    }

    /// Borrow the contents.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bytes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for OwnedBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
