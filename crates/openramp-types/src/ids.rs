//! Identifiers used throughout OpenRamp.
//!
//! Callers are identified by a 20-byte [`Address`]; off-chain payment
//! identities by a 32-byte [`IdentityHash`]. Deposits are numbered
//! sequentially and intents are content-addressed by [`IntentHash`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// On-ledger caller identity (an account address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Never a valid payout destination.
    pub const ZERO: Self = Self([0u8; 20]);

    #[must_use]
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// IdentityHash
// ---------------------------------------------------------------------------

/// Hash of an off-chain payment identity (e.g. a payment-platform profile id).
///
/// The raw account id never enters the ledger; only this digest does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct IdentityHash(pub [u8; 32]);

impl IdentityHash {
    /// Derive the identity hash for a platform account id.
    #[must_use]
    pub fn from_account_id(account_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"openramp:identity:v1:");
        hasher.update(account_id.as_bytes());
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// DepositId
// ---------------------------------------------------------------------------

/// Sequential deposit identifier, assigned from the ledger's deposit counter.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct DepositId(pub u64);

impl DepositId {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for DepositId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deposit:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// IntentHash
// ---------------------------------------------------------------------------

/// Content-derived identifier of an intent.
///
/// Payment evidence embeds this hash so a verified payment can be tied back
/// to exactly one reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct IntentHash(pub [u8; 32]);

impl IntentHash {
    /// Derive the hash for a new intent.
    ///
    /// `nonce` is the ledger's monotonically increasing intent counter, so two
    /// intents signaled by the same identity on the same deposit in the same
    /// second still get distinct hashes.
    #[must_use]
    pub fn derive(
        identity: &IdentityHash,
        deposit_id: DepositId,
        created_at: DateTime<Utc>,
        nonce: u64,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"openramp:intent:v1:");
        hasher.update(identity.0);
        hasher.update(deposit_id.0.to_le_bytes());
        hasher.update(created_at.timestamp().to_le_bytes());
        hasher.update(nonce.to_le_bytes());
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for IntentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intent:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// DestinationTag / Currency
// ---------------------------------------------------------------------------

/// Off-chain payment destination (the handle or account the depositor
/// expects to be paid at, e.g. `"jdoe1234"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DestinationTag(pub String);

impl DestinationTag {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type alias for off-chain currency codes (e.g., "EUR", "USD", "INR").
pub type Currency = String;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
