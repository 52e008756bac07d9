//! Payment nullifiers: each off-chain payment settles at most one intent.
//!
//! The registry is unbounded. A spent nullifier is never evicted.

use std::collections::HashSet;
use std::fmt;

use openramp_types::{PaymentClaim, RampError, Result};

/// SHA-256 commitment to an off-chain payment id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nullifier(pub [u8; 32]);

impl Nullifier {
    #[must_use]
    pub fn of(payment: &PaymentClaim) -> Self {
        Self(payment.nullifier())
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nullifier:{}", hex::encode(&self.0[..8]))
    }
}

/// Set of spent payment nullifiers.
#[derive(Debug, Default)]
pub struct NullifierRegistry {
    spent: HashSet<Nullifier>,
}

impl NullifierRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns [`RampError::EvidenceReplayed`] if `nullifier` is spent.
    pub fn check(&self, nullifier: &Nullifier) -> Result<()> {
        if self.spent.contains(nullifier) {
            return Err(RampError::EvidenceReplayed);
        }
        Ok(())
    }

    /// Mark `nullifier` spent.
    ///
    /// # Errors
    /// Returns [`RampError::EvidenceReplayed`] if it already was.
    pub fn spend(&mut self, nullifier: Nullifier) -> Result<()> {
        if !self.spent.insert(nullifier) {
            return Err(RampError::EvidenceReplayed);
        }
        Ok(())
    }

    #[must_use]
    pub fn is_spent(&self, nullifier: &Nullifier) -> bool {
        self.spent.contains(nullifier)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.spent.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}
