//! Single-shot completion for asynchronous verification.
//!
//! A [`VerificationCompleter`] is consumed by [`complete`](VerificationCompleter::complete),
//! so a result can be delivered at most once. The matching
//! [`VerificationHandle`] resolves to `None` if the completer is dropped
//! without being used. Dropping the handle abandons interest in the result.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::debug;

use crate::result::AttestationVerificationResult;

/// Create a connected completer/handle pair.
#[must_use]
pub fn verification_channel() -> (VerificationCompleter, VerificationHandle) {
    let (tx, rx) = oneshot::channel();
    (VerificationCompleter { tx }, VerificationHandle { rx })
}

/// Sending half, handed to the verifier.
#[derive(Debug)]
pub struct VerificationCompleter {
    tx: oneshot::Sender<AttestationVerificationResult>,
}

impl VerificationCompleter {
    /// Deliver the verdict.
    pub fn complete(self, result: AttestationVerificationResult) {
        if self.tx.send(result).is_err() {
            debug!(%result, "Verification result dropped, caller no longer waiting");
        }
    }

    /// Whether the receiving handle has been dropped.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half, awaited by the caller.
#[derive(Debug)]
pub struct VerificationHandle {
    rx: oneshot::Receiver<AttestationVerificationResult>,
}

impl VerificationHandle {
    /// Result if already delivered, without waiting.
    pub fn try_result(&mut self) -> Option<AttestationVerificationResult> {
        self.rx.try_recv().ok()
    }
}

impl Future for VerificationHandle {
    type Output = Option<AttestationVerificationResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}
