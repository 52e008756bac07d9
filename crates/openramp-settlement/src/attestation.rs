//! Ed25519 attestation verifiers.
//!
//! A trusted notary observes the off-chain platform and signs the canonical
//! claim payload ([`IdentityClaim::signing_payload`] or
//! [`PaymentClaim::signing_payload`]). The proof attached to a credential or
//! evidence is the raw 64-byte signature.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use openramp_types::{
    IdentityClaim, IdentityCredential, IdentityProofVerifier, PaymentClaim, PaymentEvidence,
    PaymentEvidenceVerifier, RampError, Result, VerifiedIdentity, VerifiedPayment,
};

/// Accepts identity credentials signed by the notary key.
#[derive(Debug, Clone)]
pub struct Ed25519IdentityVerifier {
    notary: VerifyingKey,
}

impl Ed25519IdentityVerifier {
    #[must_use]
    pub fn new(notary: VerifyingKey) -> Self {
        Self { notary }
    }
}

impl IdentityProofVerifier for Ed25519IdentityVerifier {
    fn verify(&self, credential: &IdentityCredential) -> Result<VerifiedIdentity> {
        check_signature(
            &self.notary,
            &credential.claim.signing_payload(),
            &credential.proof,
        )?;
        Ok(VerifiedIdentity::from_claim(&credential.claim))
    }
}

/// Accepts payment evidence signed by the notary key.
#[derive(Debug, Clone)]
pub struct Ed25519PaymentVerifier {
    notary: VerifyingKey,
}

impl Ed25519PaymentVerifier {
    #[must_use]
    pub fn new(notary: VerifyingKey) -> Self {
        Self { notary }
    }
}

impl PaymentEvidenceVerifier for Ed25519PaymentVerifier {
    fn verify(&self, evidence: &PaymentEvidence) -> Result<VerifiedPayment> {
        check_signature(
            &self.notary,
            &evidence.claim.signing_payload(),
            &evidence.proof,
        )?;
        Ok(evidence.claim.clone())
    }
}

/// Notary side: sign an identity claim into a credential.
#[must_use]
pub fn attest_identity(notary: &SigningKey, claim: IdentityClaim) -> IdentityCredential {
    let proof = notary.sign(&claim.signing_payload()).to_bytes().to_vec();
    IdentityCredential { claim, proof }
}

/// Notary side: sign a payment claim into settlement evidence.
#[must_use]
pub fn attest_payment(notary: &SigningKey, claim: PaymentClaim) -> PaymentEvidence {
    let proof = notary.sign(&claim.signing_payload()).to_bytes().to_vec();
    PaymentEvidence { claim, proof }
}

fn check_signature(notary: &VerifyingKey, payload: &[u8], proof: &[u8]) -> Result<()> {
    let bytes: [u8; 64] = proof.try_into().map_err(|_| RampError::ProofRejected {
        reason: format!("signature must be 64 bytes, got {}", proof.len()),
    })?;
    let signature = Signature::from_bytes(&bytes);
    notary
        .verify(payload, &signature)
        .map_err(|_| RampError::ProofRejected {
            reason: "notary signature verification failed".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use openramp_types::{Address, DestinationTag, IdentityHash, IntentHash};
    use rust_decimal::Decimal;

    fn notary() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn identity_claim() -> IdentityClaim {
        IdentityClaim {
            caller: Address([1u8; 20]),
            account_id: "alice".into(),
            destination_tag: None,
        }
    }

    fn payment_claim() -> PaymentClaim {
        PaymentClaim {
            payer_identity: IdentityHash::from_account_id("alice"),
            payee_destination_tag: DestinationTag::new("jdoe1234"),
            currency: "USD".into(),
            paid_amount: Decimal::new(50, 0),
            payment_timestamp: Utc::now(),
            intent_hash: IntentHash([4u8; 32]),
            payment_id: "tx-1".into(),
        }
    }

    #[test]
    fn signed_identity_verifies() {
        let key = notary();
        let verifier = Ed25519IdentityVerifier::new(key.verifying_key());
        let cred = attest_identity(&key, identity_claim());
        let verified = verifier.verify(&cred).unwrap();
        assert_eq!(verified.identity, IdentityHash::from_account_id("alice"));
        assert_eq!(verified.caller, Address([1u8; 20]));
    }

    #[test]
    fn tampered_identity_claim_rejected() {
        let key = notary();
        let verifier = Ed25519IdentityVerifier::new(key.verifying_key());
        let mut cred = attest_identity(&key, identity_claim());
        cred.claim.account_id = "mallory".into();
        let err = verifier.verify(&cred).unwrap_err();
        assert!(matches!(err, RampError::ProofRejected { .. }));
    }

    #[test]
    fn foreign_notary_rejected() {
        let verifier = Ed25519IdentityVerifier::new(notary().verifying_key());
        let other = SigningKey::from_bytes(&[8u8; 32]);
        let cred = attest_identity(&other, identity_claim());
        assert!(verifier.verify(&cred).is_err());
    }

    #[test]
    fn short_proof_rejected() {
        let verifier = Ed25519PaymentVerifier::new(notary().verifying_key());
        let evidence = PaymentEvidence {
            claim: payment_claim(),
            proof: vec![0u8; 32],
        };
        let err = verifier.verify(&evidence).unwrap_err();
        assert!(matches!(err, RampError::ProofRejected { .. }));
    }

    #[test]
    fn payment_amount_is_signed() {
        let key = notary();
        let verifier = Ed25519PaymentVerifier::new(key.verifying_key());
        let mut evidence = attest_payment(&key, payment_claim());
        assert_eq!(verifier.verify(&evidence).unwrap(), evidence.claim);

        evidence.claim.paid_amount = Decimal::new(500, 0);
        assert!(verifier.verify(&evidence).is_err());
    }
}
