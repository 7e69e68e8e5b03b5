//! DAC chain revocation checking.
//!
//! A [`DacRevocationDelegate`] answers whether the DAC or PAI of an attestation
//! attempt has been revoked. Certificates are identified the way revocation
//! lists identify them: by the issuer's key identifier and the serial number.
//!
//! ## Revocation sources
//!
//! 1. **Embedded set**: [`InMemoryRevocationSet`], filled by the integrator
//! 2. **Custom**: any `DacRevocationDelegate` implementation (DCL mirror,
//!    vendor service)

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cd_keys::KEY_IDENTIFIER_LEN;
use crate::error::VerifyError;
use crate::result::AttestationVerificationResult;
use crate::x509::MatterCertificate;

/// Identity of one certificate in a revocation query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationSubject {
    /// Certificate DER.
    pub der: Vec<u8>,
    /// Serial number bytes as encoded.
    pub serial_number: Vec<u8>,
    /// Authority Key Identifier, if the certificate carries one.
    pub issuer_key_id: Option<[u8; KEY_IDENTIFIER_LEN]>,
}

impl RevocationSubject {
    fn from_certificate(cert: &MatterCertificate) -> Self {
        Self {
            der: cert.der().to_vec(),
            serial_number: cert.serial_number().to_vec(),
            issuer_key_id: cert.authority_key_id(),
        }
    }
}

/// Owned input to a revocation check, safe to move into a spawned task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationQuery {
    /// Device Attestation Certificate.
    pub dac: RevocationSubject,
    /// Product Attestation Intermediate.
    pub pai: RevocationSubject,
}

impl RevocationQuery {
    /// Build a query from DER certificates.
    pub fn from_der(dac_der: &[u8], pai_der: &[u8]) -> Result<Self, VerifyError> {
        let dac = MatterCertificate::from_der(dac_der)?;
        let pai = MatterCertificate::from_der(pai_der)?;
        Ok(Self {
            dac: RevocationSubject::from_certificate(&dac),
            pai: RevocationSubject::from_certificate(&pai),
        })
    }
}

/// Revocation verdict for a DAC chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationStatus {
    /// Neither certificate is revoked.
    NotRevoked,
    /// Only the DAC is revoked.
    DacRevoked,
    /// Only the PAI is revoked.
    PaiRevoked,
    /// Both certificates are revoked.
    PaiAndDacRevoked,
}

impl RevocationStatus {
    /// Combine per-certificate findings.
    #[must_use]
    pub fn from_flags(dac_revoked: bool, pai_revoked: bool) -> Self {
        match (dac_revoked, pai_revoked) {
            (false, false) => Self::NotRevoked,
            (true, false) => Self::DacRevoked,
            (false, true) => Self::PaiRevoked,
            (true, true) => Self::PaiAndDacRevoked,
        }
    }

    /// Taxonomy value reported to the commissioner.
    #[must_use]
    pub fn to_result(self) -> AttestationVerificationResult {
        match self {
            Self::NotRevoked => AttestationVerificationResult::Success,
            Self::DacRevoked => AttestationVerificationResult::DacRevoked,
            Self::PaiRevoked => AttestationVerificationResult::PaiRevoked,
            Self::PaiAndDacRevoked => AttestationVerificationResult::PaiAndDacRevoked,
        }
    }
}

/// Source of revocation information.
#[async_trait]
pub trait DacRevocationDelegate: Send + Sync {
    /// Check the DAC and PAI in `query`.
    ///
    /// An `Err` means the source could not answer; callers treat it as a
    /// failed check, never as "not revoked".
    async fn check_for_revoked_dac_chain(
        &self,
        query: &RevocationQuery,
    ) -> Result<RevocationStatus, VerifyError>;
}

/// Revoked certificates keyed by issuer key identifier and serial number.
#[derive(Debug, Default)]
pub struct InMemoryRevocationSet {
    revoked: RwLock<HashSet<([u8; KEY_IDENTIFIER_LEN], Vec<u8>)>>,
}

impl InMemoryRevocationSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the certificate issued by `issuer_key_id` with `serial_number` as
    /// revoked.
    pub fn revoke(&self, issuer_key_id: [u8; KEY_IDENTIFIER_LEN], serial_number: &[u8]) {
        let mut set = self.revoked.write().unwrap_or_else(PoisonError::into_inner);
        set.insert((issuer_key_id, serial_number.to_vec()));
        debug!(
            issuer = %hex::encode(issuer_key_id),
            serial = %hex::encode(serial_number),
            "Certificate revoked"
        );
    }

    /// Revoke a certificate given its DER.
    pub fn revoke_certificate(&self, der: &[u8]) -> Result<(), VerifyError> {
        let cert = MatterCertificate::from_der(der)?;
        let issuer = cert.authority_key_id().ok_or_else(|| {
            VerifyError::certificate("cannot revoke a certificate without authority key identifier")
        })?;
        self.revoke(issuer, cert.serial_number());
        Ok(())
    }

    /// Number of revoked certificates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.revoked.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is revoked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_revoked(&self, subject: &RevocationSubject) -> Result<bool, VerifyError> {
        let Some(issuer) = subject.issuer_key_id else {
            warn!("Certificate without authority key identifier, cannot match revocation entries");
            return Err(VerifyError::revocation(
                "certificate has no authority key identifier",
            ));
        };
        Ok(self
            .revoked
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(issuer, subject.serial_number.clone())))
    }
}

#[async_trait]
impl DacRevocationDelegate for InMemoryRevocationSet {
    async fn check_for_revoked_dac_chain(
        &self,
        query: &RevocationQuery,
    ) -> Result<RevocationStatus, VerifyError> {
        Ok(RevocationStatus::from_flags(
            self.is_revoked(&query.dac)?,
            self.is_revoked(&query.pai)?,
        ))
    }
}
