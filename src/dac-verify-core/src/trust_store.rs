//! Product Attestation Authority trust store.
//!
//! PAAs are looked up by Subject Key Identifier, which a PAI references
//! through its Authority Key Identifier.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::cd_keys::KEY_IDENTIFIER_LEN;
use crate::error::VerifyError;
use crate::x509::MatterCertificate;

/// Largest certificate file accepted by [`ArrayAttestationTrustStore::from_directory`].
pub const MAX_CERTIFICATE_FILE_LEN: u64 = 600;

/// Source of trusted PAA certificates.
pub trait AttestationTrustStore: Send + Sync {
    /// PAA certificate whose SKID equals `skid`.
    fn get_product_attestation_authority_cert(&self, skid: &[u8]) -> Option<&MatterCertificate>;
}

/// In-memory PAA store.
#[derive(Debug, Clone, Default)]
pub struct ArrayAttestationTrustStore {
    entries: Vec<([u8; KEY_IDENTIFIER_LEN], MatterCertificate)>,
}

impl ArrayAttestationTrustStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from DER certificates. Fails on the first certificate
    /// that cannot be parsed or has no SKID.
    pub fn from_certs<I, D>(certs: I) -> Result<Self, VerifyError>
    where
        I: IntoIterator<Item = D>,
        D: AsRef<[u8]>,
    {
        let mut store = Self::new();
        for der in certs {
            store.add_der(der.as_ref())?;
        }
        Ok(store)
    }

    /// Load every `*.der` file in `dir`.
    ///
    /// Files with another extension, files above
    /// [`MAX_CERTIFICATE_FILE_LEN`] and files that do not parse as a
    /// certificate with a SKID are skipped with a warning. Failure to read the
    /// directory itself is an error.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self, VerifyError> {
        let dir = dir.as_ref();
        let mut store = Self::new();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("der") {
                debug!(path = %path.display(), "Skipping non-DER file");
                continue;
            }

            let len = match fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot stat PAA file");
                    continue;
                },
            };
            if len > MAX_CERTIFICATE_FILE_LEN {
                warn!(path = %path.display(), len, "PAA file too large, skipping");
                continue;
            }

            let der = match fs::read(&path) {
                Ok(der) => der,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot read PAA file");
                    continue;
                },
            };
            if let Err(e) = store.add_der(&der) {
                warn!(path = %path.display(), error = %e, "Skipping unusable PAA file");
            }
        }

        info!(dir = %dir.display(), count = store.len(), "PAA trust store loaded");
        Ok(store)
    }

    /// Add one DER certificate. A certificate with an already known SKID
    /// replaces the previous one.
    pub fn add_der(&mut self, der: &[u8]) -> Result<(), VerifyError> {
        let cert = MatterCertificate::from_der(der)?;
        let skid = cert
            .subject_key_id()
            .ok_or_else(|| VerifyError::certificate("PAA has no subject key identifier"))?;

        debug!(skid = %hex::encode(skid), vid = ?cert.vendor_id().ok().flatten(), "Adding PAA");
        match self.entries.iter_mut().find(|(known, _)| *known == skid) {
            Some(slot) => slot.1 = cert,
            None => self.entries.push((skid, cert)),
        }
        Ok(())
    }

    /// Number of PAAs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AttestationTrustStore for ArrayAttestationTrustStore {
    fn get_product_attestation_authority_cert(&self, skid: &[u8]) -> Option<&MatterCertificate> {
        self.entries
            .iter()
            .find(|(known, _)| known.as_slice() == skid)
            .map(|(_, cert)| cert)
    }
}
