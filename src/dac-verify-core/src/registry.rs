//! Holder for the active device attestation verifier.
//!
//! A [`VerifierContext`] always has a verifier: it starts with
//! [`UnimplementedDacVerifier`] and is expected to be configured once at
//! startup, then read many times. [`global`] provides a process-wide context
//! for call sites that cannot be handed one.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{info, warn};

use crate::config::VerifierConfig;
use crate::error::VerifyError;
use crate::verifier::{DeviceAttestationVerifier, UnimplementedDacVerifier};

/// Owner of the active verifier.
pub struct VerifierContext {
    verifier: RwLock<Arc<dyn DeviceAttestationVerifier>>,
    require_revocation_check: bool,
}

impl VerifierContext {
    /// Context holding the unimplemented placeholder.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&VerifierConfig::default())
    }

    /// Context honouring `config.require_revocation_check`.
    #[must_use]
    pub fn with_config(config: &VerifierConfig) -> Self {
        Self {
            verifier: RwLock::new(Arc::new(UnimplementedDacVerifier)),
            require_revocation_check: config.require_revocation_check,
        }
    }

    /// The active verifier. Never empty.
    pub fn device_attestation_verifier(&self) -> Arc<dyn DeviceAttestationVerifier> {
        let guard = self.verifier.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Replace the active verifier. `None` leaves the current one in place.
    ///
    /// A verifier without a revocation check is accepted with a warning; use
    /// [`try_set_verifier`](Self::try_set_verifier) to refuse it.
    pub fn set_device_attestation_verifier(
        &self,
        verifier: Option<Arc<dyn DeviceAttestationVerifier>>,
    ) {
        let Some(verifier) = verifier else {
            return;
        };
        if !verifier.implements_revocation_check() {
            warn!("Installed verifier has no revocation check");
        }
        self.install(verifier);
    }

    /// Replace the active verifier, refusing one without a revocation check
    /// when the context was configured to require it.
    pub fn try_set_verifier(
        &self,
        verifier: Arc<dyn DeviceAttestationVerifier>,
    ) -> Result<(), VerifyError> {
        if self.require_revocation_check && !verifier.implements_revocation_check() {
            return Err(VerifyError::RevocationCheckMissing);
        }
        self.install(verifier);
        Ok(())
    }

    fn install(&self, verifier: Arc<dyn DeviceAttestationVerifier>) {
        let mut guard = self.verifier.write().unwrap_or_else(PoisonError::into_inner);
        *guard = verifier;
        info!("Device attestation verifier installed");
    }
}

impl Default for VerifierContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VerifierContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierContext")
            .field("require_revocation_check", &self.require_revocation_check)
            .finish_non_exhaustive()
    }
}

static GLOBAL_CONTEXT: OnceLock<VerifierContext> = OnceLock::new();

/// Process-wide context, created on first use with the default config
/// unless [`global_with_config`] ran first.
pub fn global() -> &'static VerifierContext {
    GLOBAL_CONTEXT.get_or_init(VerifierContext::new)
}

/// Process-wide context created from `config`.
///
/// Must run before the first [`global`] use to take effect. Fails when the
/// context already exists with a different `require_revocation_check`.
pub fn global_with_config(
    config: &VerifierConfig,
) -> Result<&'static VerifierContext, VerifyError> {
    let ctx = GLOBAL_CONTEXT.get_or_init(|| VerifierContext::with_config(config));
    if ctx.require_revocation_check != config.require_revocation_check {
        warn!(
            active = ctx.require_revocation_check,
            requested = config.require_revocation_check,
            "Process-wide verifier context already initialised"
        );
        return Err(VerifyError::invalid_argument(
            "process-wide verifier context already initialised with another config",
        ));
    }
    Ok(ctx)
}

/// Active verifier of the process-wide context.
pub fn get_device_attestation_verifier() -> Arc<dyn DeviceAttestationVerifier> {
    global().device_attestation_verifier()
}

/// Replace the verifier of the process-wide context. `None` is ignored.
pub fn set_device_attestation_verifier(verifier: Option<Arc<dyn DeviceAttestationVerifier>>) {
    global().set_device_attestation_verifier(verifier);
}
