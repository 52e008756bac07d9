//! Intent model: a time-bounded reservation of a deposit's liquidity.
//!
//! ## Lifecycle
//!
//! ```text
//!              settle / release
//!   signal ──▶ LIVE ───────────────▶ (deleted, value paid out)
//!               │
//!               ├── cancel ────────▶ (deleted, liquidity returned)
//!               │
//!               └── expire + touched ▶ (pruned, liquidity returned)
//! ```
//!
//! Expiry is not stored: an intent is expired once
//! `now >= created_at + intent_expiration_period`. Nothing happens at that
//! moment; the intent merely becomes eligible for pruning by the next
//! operation that touches its deposit.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, DepositId, IdentityHash, IntentHash};

/// A live reservation against a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub hash: IntentHash,
    /// Identity that owns the reservation (the authorization key).
    pub on_ramper_identity: IdentityHash,
    /// Address that signaled the intent.
    pub on_ramper: Address,
    /// Deposit the liquidity is reserved against.
    pub deposit_id: DepositId,
    /// Where the escrowed value goes on settlement.
    pub destination: Address,
    /// Reserved amount in escrow units.
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Intent {
    /// The instant this intent becomes prunable. A period reaching past the
    /// representable calendar never expires.
    #[must_use]
    pub fn expires_at(&self, period: Duration) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(period)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Pruning predicate. Pure: depends only on the intent, `now` and the
    /// configured period.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, period: Duration) -> bool {
        now >= self.expires_at(period)
    }
}

/// Why an intent left the ledger without being paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PruneReason {
    /// Reclaimed lazily after its expiration period elapsed.
    Expired,
    /// Cancelled explicitly by its on-ramper.
    Cancelled,
}

impl std::fmt::Display for PruneReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "EXPIRED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// An intent paired with its on-ramper identity, for batch lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentWithIdentity {
    pub intent_hash: IntentHash,
    pub on_ramper_identity: IdentityHash,
    pub intent: Intent,
}

/// Dummy intent for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Intent {
    pub fn dummy(deposit_id: DepositId, amount: Decimal, created_at: DateTime<Utc>) -> Self {
        let identity = IdentityHash::from_account_id("dummy-on-ramper");
        Self {
            hash: IntentHash::derive(&identity, deposit_id, created_at, rand::random()),
            on_ramper_identity: identity,
            on_ramper: Address([2u8; 20]),
            deposit_id,
            destination: Address([3u8; 20]),
            amount,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_boundary_is_inclusive() {
        let t = Utc::now();
        let period = Duration::seconds(100);
        let intent = Intent::dummy(DepositId(0), Decimal::new(50, 0), t);
        assert!(!intent.is_expired(t + Duration::seconds(99), period));
        assert!(intent.is_expired(t + Duration::seconds(100), period));
        assert!(intent.is_expired(t + Duration::seconds(101), period));
    }

    #[test]
    fn is_expired_is_pure() {
        let t = Utc::now();
        let intent = Intent::dummy(DepositId(0), Decimal::ONE, t);
        let later = t + Duration::days(2);
        assert_eq!(
            intent.is_expired(later, Duration::days(1)),
            intent.is_expired(later, Duration::days(1))
        );
    }

    #[test]
    fn unrepresentable_expiry_never_expires() {
        let t = Utc::now();
        let intent = Intent::dummy(DepositId(0), Decimal::ONE, t);
        let period = Duration::seconds(i64::MAX / 1000);
        assert_eq!(intent.expires_at(period), DateTime::<Utc>::MAX_UTC);
        assert!(!intent.is_expired(t + Duration::days(365 * 1000), period));
    }

    #[test]
    fn prune_reason_display() {
        assert_eq!(PruneReason::Expired.to_string(), "EXPIRED");
        assert_eq!(PruneReason::Cancelled.to_string(), "CANCELLED");
    }

    #[test]
    fn serde_roundtrip() {
        let intent = Intent::dummy(DepositId(3), Decimal::new(125, 1), Utc::now());
        let json = serde_json::to_string(&intent).unwrap();
        let back: Intent = serde_json::from_str(&json).unwrap();
        assert_eq!(intent, back);
    }
}
