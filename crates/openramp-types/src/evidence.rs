//! Inputs and outputs of the external verifiers.
//!
//! The ledger never parses platform data itself. An [`IdentityCredential`]
//! or [`PaymentEvidence`] carries public claims plus an opaque proof; a
//! verifier checks the proof and hands back the claims it vouches for.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Address, Currency, DestinationTag, IdentityHash, IntentHash};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Public claims of an identity credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    /// Address the credential was issued to.
    pub caller: Address,
    /// Platform account id (hashed before it enters the ledger).
    pub account_id: String,
    /// Payment destination owned by the account, for off-ramper registration.
    pub destination_tag: Option<DestinationTag>,
}

impl IdentityClaim {
    /// Canonical bytes an attester signs.
    ///
    /// Format: `"openramp:identity-claim:v1:" || caller(20) || len(account_id) || account_id || tag?`
    #[must_use]
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(128);
        payload.extend_from_slice(b"openramp:identity-claim:v1:");
        payload.extend_from_slice(self.caller.as_bytes());
        push_str(&mut payload, &self.account_id);
        match &self.destination_tag {
            Some(tag) => {
                payload.push(1);
                push_str(&mut payload, tag.as_str());
            }
            None => payload.push(0),
        }
        payload
    }
}

/// An identity credential submitted for registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCredential {
    pub claim: IdentityClaim,
    /// Opaque proof material (signature, SNARK, notarization...).
    pub proof: Vec<u8>,
}

/// What an identity verifier vouches for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub identity: IdentityHash,
    pub caller: Address,
    pub destination_tag: Option<DestinationTag>,
}

impl VerifiedIdentity {
    /// The verified view of a claim.
    #[must_use]
    pub fn from_claim(claim: &IdentityClaim) -> Self {
        Self {
            identity: IdentityHash::from_account_id(&claim.account_id),
            caller: claim.caller,
            destination_tag: claim.destination_tag.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Payment
// ---------------------------------------------------------------------------

/// Public claims extracted from an off-chain payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentClaim {
    /// Identity that made the payment.
    pub payer_identity: IdentityHash,
    /// Destination the payment was sent to.
    pub payee_destination_tag: DestinationTag,
    pub currency: Currency,
    /// Off-chain amount paid.
    pub paid_amount: Decimal,
    pub payment_timestamp: DateTime<Utc>,
    /// Intent the payer committed to in the payment memo.
    pub intent_hash: IntentHash,
    /// Platform transfer id; nullified once used.
    pub payment_id: String,
}

impl PaymentClaim {
    /// Canonical bytes an attester signs.
    #[must_use]
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(256);
        payload.extend_from_slice(b"openramp:payment-claim:v1:");
        payload.extend_from_slice(self.payer_identity.as_bytes());
        push_str(&mut payload, self.payee_destination_tag.as_str());
        push_str(&mut payload, &self.currency);
        push_str(&mut payload, &self.paid_amount.normalize().to_string());
        payload.extend_from_slice(&self.payment_timestamp.timestamp().to_le_bytes());
        payload.extend_from_slice(self.intent_hash.as_bytes());
        push_str(&mut payload, &self.payment_id);
        payload
    }

    /// Nullifier for this payment: once recorded, the same off-chain
    /// transfer can never settle another intent.
    #[must_use]
    pub fn nullifier(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"openramp:nullifier:v1:");
        hasher.update(self.payment_id.as_bytes());
        hasher.finalize().into()
    }
}

/// Payment evidence submitted for settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvidence {
    pub claim: PaymentClaim,
    pub proof: Vec<u8>,
}

/// What a payment verifier vouches for.
pub type VerifiedPayment = PaymentClaim;

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

/// One leg of a custody disbursement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLeg {
    pub to: Address,
    pub amount: Decimal,
}

fn push_str(payload: &mut Vec<u8>, value: &str) {
    let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
    payload.extend_from_slice(&len.to_le_bytes());
    payload.extend_from_slice(value.as_bytes());
}
