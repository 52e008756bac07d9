//! Deterministic collaborator doubles. **Never use in production.**
//!
//! Enabled by the `test-helpers` feature so downstream crates can share
//! them in their own test suites.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{
    Address, Clock, DestinationTag, IdentityClaim, IdentityCredential, IdentityProofVerifier,
    LedgerEvent, NotificationSink, PaymentEvidence, PaymentEvidenceVerifier, RampError, Result,
    VerifiedIdentity, VerifiedPayment,
};

/// Proof bytes that the static verifiers refuse.
pub const REJECTED_PROOF: &[u8] = b"reject";

impl Address {
    /// A random non-zero address.
    pub fn random() -> Self {
        let mut bytes: [u8; 20] = rand::random();
        bytes[0] |= 1;
        Self(bytes)
    }
}

/// Accepts every credential whose proof is not [`REJECTED_PROOF`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticIdentityVerifier;

impl IdentityProofVerifier for StaticIdentityVerifier {
    fn verify(&self, credential: &IdentityCredential) -> Result<VerifiedIdentity> {
        if credential.proof == REJECTED_PROOF {
            return Err(RampError::ProofRejected {
                reason: "static verifier rejected credential".into(),
            });
        }
        Ok(VerifiedIdentity::from_claim(&credential.claim))
    }
}

/// Accepts every payment whose proof is not [`REJECTED_PROOF`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPaymentVerifier;

impl PaymentEvidenceVerifier for StaticPaymentVerifier {
    fn verify(&self, evidence: &PaymentEvidence) -> Result<VerifiedPayment> {
        if evidence.proof == REJECTED_PROOF {
            return Err(RampError::ProofRejected {
                reason: "static verifier rejected evidence".into(),
            });
        }
        Ok(evidence.claim.clone())
    }
}

/// Build a credential that the static verifier accepts.
pub fn credential(caller: Address, account_id: &str) -> IdentityCredential {
    IdentityCredential {
        claim: IdentityClaim {
            caller,
            account_id: account_id.to_string(),
            destination_tag: None,
        },
        proof: b"ok".to_vec(),
    }
}

/// Build an off-ramper credential carrying a destination tag.
pub fn off_ramper_credential(caller: Address, account_id: &str, tag: &str) -> IdentityCredential {
    let mut cred = credential(caller, account_id);
    cred.claim.destination_tag = Some(DestinationTag::new(tag));
    cred
}

/// Collects emitted events; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<LedgerEvent>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of everything emitted so far, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(LedgerEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl NotificationSink for RecordingSink {
    fn emit(&mut self, event: &LedgerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Manually advanced clock; clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// A clock frozen at a fixed, round instant.
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::at(start)
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_addresses_are_non_zero_and_distinct() {
        let a = Address::random();
        let b = Address::random();
        assert!(!a.is_zero());
        assert_ne!(a, b);
    }

    #[test]
    fn static_identity_verifier_rejects_marker() {
        let mut cred = credential(Address::random(), "alice");
        assert!(StaticIdentityVerifier.verify(&cred).is_ok());
        cred.proof = REJECTED_PROOF.to_vec();
        let err = StaticIdentityVerifier.verify(&cred).unwrap_err();
        assert!(matches!(err, RampError::ProofRejected { .. }));
    }

    #[test]
    fn manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        let t0 = clock.now();
        handle.advance_secs(10);
        assert_eq!(clock.now(), t0 + Duration::seconds(10));
    }

    #[test]
    fn recording_sink_shared_between_clones() {
        let sink = RecordingSink::new();
        let mut writer = sink.clone();
        writer.emit(&LedgerEvent::Paused);
        assert_eq!(sink.names(), vec!["PAUSED"]);
        sink.clear();
        assert!(sink.events().is_empty());
    }
}
