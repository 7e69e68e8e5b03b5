//! Process-wide verifier registry and the fail-closed revocation default.

use std::process::Command;
use std::sync::Arc;

use dac_verify_core::{
    get_device_attestation_verifier, global_with_config, set_device_attestation_verifier,
    AttestationVerificationResult, DeviceAttestationVerifier, InMemoryRevocationSet,
    UnimplementedDacVerifier, VerifierConfig, VerifyError,
};

use crate::support::{verifier, Fixture};

const ABORT_CHILD_ENV: &str = "DAC_VERIFY_REVOCATION_ABORT_CHILD";
const STRICT_CHILD_ENV: &str = "DAC_VERIFY_STRICT_GLOBAL_CHILD";

#[test]
fn global_registry_lifecycle() {
    let initial = get_device_attestation_verifier();
    assert!(!initial.implements_revocation_check());
    assert_eq!(
        initial.validate_certification_declaration_signature(b"anything"),
        Err(AttestationVerificationResult::NotImplemented)
    );

    let installed: Arc<dyn DeviceAttestationVerifier> = Arc::new(verifier());
    set_device_attestation_verifier(Some(Arc::clone(&installed)));
    assert!(Arc::ptr_eq(&get_device_attestation_verifier(), &installed));

    set_device_attestation_verifier(None);
    let active = get_device_attestation_verifier();
    assert!(Arc::ptr_eq(&active, &installed));

    let fixture = Fixture::new();
    let mut handle = active.verify_attestation(&fixture.info());
    assert_eq!(
        handle.try_result(),
        Some(AttestationVerificationResult::Success)
    );
}

/// The default revocation check terminates the process. The test re-runs
/// itself in a child process and expects it to die abnormally.
#[test]
fn default_revocation_check_aborts() {
    if std::env::var_os(ABORT_CHILD_ENV).is_some() {
        let fixture = Fixture::new();
        let _handle = UnimplementedDacVerifier.check_revocation(&fixture.info());
        // Reaching this point means the process was not terminated.
        std::process::exit(0);
    }

    let exe = std::env::current_exe().unwrap();
    let status = Command::new(exe)
        .args([
            "--exact",
            "registry::default_revocation_check_aborts",
            "--test-threads=1",
            "--nocapture",
        ])
        .env(ABORT_CHILD_ENV, "1")
        .status()
        .unwrap();

    assert!(!status.success(), "child exited normally: {status:?}");
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(status.signal(), Some(6), "expected SIGABRT: {status:?}");
    }
}

#[test]
fn global_context_keeps_default_config() {
    assert!(global_with_config(&VerifierConfig::default()).is_ok());
}

/// A strict process-wide context must be set up before first use, so this
/// runs in a fresh child process.
#[test]
fn strict_global_context_refuses_verifier_without_revocation() {
    if std::env::var_os(STRICT_CHILD_ENV).is_some() {
        let strict = VerifierConfig {
            require_revocation_check: true,
            ..VerifierConfig::default()
        };
        let ctx = global_with_config(&strict).unwrap();

        assert!(matches!(
            ctx.try_set_verifier(Arc::new(verifier())),
            Err(VerifyError::RevocationCheckMissing)
        ));
        let with_delegate =
            verifier().with_revocation_delegate(Arc::new(InMemoryRevocationSet::new()));
        ctx.try_set_verifier(Arc::new(with_delegate)).unwrap();
        assert!(get_device_attestation_verifier().implements_revocation_check());

        assert!(matches!(
            global_with_config(&VerifierConfig::default()),
            Err(VerifyError::InvalidArgument { .. })
        ));
        return;
    }

    let exe = std::env::current_exe().unwrap();
    let status = Command::new(exe)
        .args([
            "--exact",
            "registry::strict_global_context_refuses_verifier_without_revocation",
            "--test-threads=1",
        ])
        .env(STRICT_CHILD_ENV, "1")
        .status()
        .unwrap();

    assert!(status.success(), "child failed: {status:?}");
}
