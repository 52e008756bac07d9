//! Collaborator interfaces the ledger consumes.
//!
//! Each external dependency is a narrow trait so the ledger can run against
//! real verifiers and custody in production and deterministic doubles in
//! tests. All calls are synchronous; an `Err` aborts the enclosing ledger
//! operation before any ledger state changes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    Address, IdentityCredential, LedgerEvent, PaymentEvidence, Result, TransferLeg,
    VerifiedIdentity, VerifiedPayment,
};

/// Verifies identity credentials (account registration proofs).
pub trait IdentityProofVerifier: Send + Sync {
    /// Check `credential` and return the identity it proves.
    ///
    /// # Errors
    /// `ProofRejected` if the proof does not verify.
    fn verify(&self, credential: &IdentityCredential) -> Result<VerifiedIdentity>;
}

/// Verifies off-chain payment evidence.
pub trait PaymentEvidenceVerifier: Send + Sync {
    /// Check `evidence` and return the payment facts it proves.
    ///
    /// # Errors
    /// `ProofRejected` if the proof does not verify.
    fn verify(&self, evidence: &PaymentEvidence) -> Result<VerifiedPayment>;
}

/// Moves escrowed value in and out of ledger custody.
pub trait ValueTransfer: Send {
    /// Pull `amount` from `from` into custody.
    fn collect(&mut self, from: Address, amount: Decimal) -> Result<()>;

    /// Pay every leg out of custody, or none of them.
    fn disburse(&mut self, legs: &[TransferLeg]) -> Result<()>;
}

/// Receives lifecycle events. Delivery is best effort.
pub trait NotificationSink: Send {
    fn emit(&mut self, event: &LedgerEvent);
}

/// Time source for expiry and cooldown checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Writes every event to the `tracing` pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn emit(&mut self, event: &LedgerEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => tracing::info!(event = event.name(), %payload, "ledger event"),
            Err(err) => tracing::warn!(event = event.name(), %err, "unserializable ledger event"),
        }
    }
}
