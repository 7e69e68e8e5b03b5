//! Revocation checks through the default verifier.

use std::sync::Arc;

use dac_verify_core::{
    AttestationVerificationResult, DacRevocationDelegate, DeviceAttestationVerifier,
    InMemoryRevocationSet, RevocationQuery, RevocationStatus, VerifyError,
};

use crate::support::{verifier, Fixture, DAC_FFF1_8000, PAI_FFF1};

struct FailingSource;

#[async_trait::async_trait]
impl DacRevocationDelegate for FailingSource {
    async fn check_for_revoked_dac_chain(
        &self,
        _query: &RevocationQuery,
    ) -> Result<RevocationStatus, VerifyError> {
        Err(VerifyError::Revocation {
            message: "source unreachable".to_string(),
        })
    }
}

#[tokio::test]
async fn unrevoked_chain_passes() {
    let set = Arc::new(InMemoryRevocationSet::new());
    let verifier = verifier().with_revocation_delegate(set);
    let fixture = Fixture::new();

    let result = verifier.check_revocation(&fixture.info()).await;
    assert_eq!(result, Some(AttestationVerificationResult::Success));
}

#[tokio::test]
async fn revoked_dac_is_reported() {
    let set = Arc::new(InMemoryRevocationSet::new());
    set.revoke_certificate(DAC_FFF1_8000).unwrap();
    let verifier = verifier().with_revocation_delegate(set);
    let fixture = Fixture::new();

    let result = verifier.check_revocation(&fixture.info()).await;
    assert_eq!(result, Some(AttestationVerificationResult::DacRevoked));
}

#[tokio::test]
async fn revoked_pai_and_dac_are_reported_together() {
    let set = Arc::new(InMemoryRevocationSet::new());
    set.revoke_certificate(DAC_FFF1_8000).unwrap();
    set.revoke_certificate(PAI_FFF1).unwrap();
    let verifier = verifier().with_revocation_delegate(set);
    let fixture = Fixture::new();

    let result = verifier.check_revocation(&fixture.info()).await;
    assert_eq!(result, Some(AttestationVerificationResult::PaiAndDacRevoked));
}

#[tokio::test]
async fn failing_source_is_internal_error() {
    let verifier = verifier().with_revocation_delegate(Arc::new(FailingSource));
    let fixture = Fixture::new();

    let result = verifier.check_revocation(&fixture.info()).await;
    assert_eq!(result, Some(AttestationVerificationResult::InternalError));
}

#[test]
fn delegate_without_runtime_is_internal_error() {
    let verifier = verifier().with_revocation_delegate(Arc::new(InMemoryRevocationSet::new()));
    let fixture = Fixture::new();

    let mut handle = verifier.check_revocation(&fixture.info());
    assert_eq!(
        handle.try_result(),
        Some(AttestationVerificationResult::InternalError)
    );
}
