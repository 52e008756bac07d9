//! In-memory custody book.
//!
//! Tracks per-address balances of the escrowed asset plus the amount held in
//! ledger custody. All mutations are atomic: either the full operation
//! succeeds or every balance is unchanged.

use std::collections::HashMap;

use openramp_types::{Address, RampError, Result, TransferLeg, ValueTransfer};
use rust_decimal::Decimal;

/// Balances of the escrowed asset, inside and outside ledger custody.
///
/// This is the reference [`ValueTransfer`] implementation: deposits are
/// collected from an address's balance into custody, and settlements and
/// withdrawals are disbursed from custody back to addresses.
#[derive(Debug, Default)]
pub struct CustodyBook {
    /// Per-address balances outside custody.
    balances: HashMap<Address, Decimal>,
    /// Value currently held by the ledger.
    custody: Decimal,
    #[cfg(any(test, feature = "test-helpers"))]
    fail_next: Option<String>,
}

impl CustodyBook {
    /// Create a new empty custody book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fund an address from outside the system (increases its balance).
    pub fn credit(&mut self, owner: Address, amount: Decimal) {
        *self.balances.entry(owner).or_default() += amount;
    }

    /// Balance of an address outside custody.
    #[must_use]
    pub fn balance(&self, owner: Address) -> Decimal {
        self.balances.get(&owner).copied().unwrap_or(Decimal::ZERO)
    }

    /// Value held in ledger custody.
    #[must_use]
    pub fn custody_balance(&self) -> Decimal {
        self.custody
    }

    /// Total supply (every address plus custody).
    #[must_use]
    pub fn total_supply(&self) -> Decimal {
        self.balances.values().copied().sum::<Decimal>() + self.custody
    }

    /// Make the next disbursement abort with `reason`.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn fail_next_disbursement(&mut self, reason: impl Into<String>) {
        self.fail_next = Some(reason.into());
    }
}

impl ValueTransfer for CustodyBook {
    fn collect(&mut self, from: Address, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(RampError::TransferFailed {
                reason: format!("cannot collect non-positive amount {amount}"),
            });
        }
        let available = self.balance(from);
        if available < amount {
            return Err(RampError::TransferFailed {
                reason: format!("{from} holds {available}, cannot collect {amount}"),
            });
        }
        *self.balances.entry(from).or_default() -= amount;
        self.custody += amount;
        Ok(())
    }

    fn disburse(&mut self, legs: &[TransferLeg]) -> Result<()> {
        #[cfg(any(test, feature = "test-helpers"))]
        if let Some(reason) = self.fail_next.take() {
            return Err(RampError::TransferFailed { reason });
        }

        // Validate every leg before moving anything.
        let mut total = Decimal::ZERO;
        for leg in legs {
            if leg.to.is_zero() {
                return Err(RampError::TransferFailed {
                    reason: "cannot disburse to the zero address".into(),
                });
            }
            if leg.amount < Decimal::ZERO {
                return Err(RampError::TransferFailed {
                    reason: format!("negative leg amount {}", leg.amount),
                });
            }
            total += leg.amount;
        }
        if total > self.custody {
            return Err(RampError::TransferFailed {
                reason: format!("custody holds {}, cannot disburse {total}", self.custody),
            });
        }

        for leg in legs {
            *self.balances.entry(leg.to).or_default() += leg.amount;
        }
        self.custody -= total;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address([n; 20])
    }

    #[test]
    fn credit_increases_balance() {
        let mut book = CustodyBook::new();
        book.credit(addr(1), Decimal::new(1000, 0));
        assert_eq!(book.balance(addr(1)), Decimal::new(1000, 0));
        assert_eq!(book.custody_balance(), Decimal::ZERO);
    }

    #[test]
    fn collect_moves_into_custody() {
        let mut book = CustodyBook::new();
        book.credit(addr(1), Decimal::new(1000, 0));
        book.collect(addr(1), Decimal::new(400, 0)).unwrap();
        assert_eq!(book.balance(addr(1)), Decimal::new(600, 0));
        assert_eq!(book.custody_balance(), Decimal::new(400, 0));
    }

    #[test]
    fn collect_insufficient_fails() {
        let mut book = CustodyBook::new();
        book.credit(addr(1), Decimal::new(100, 0));
        let err = book.collect(addr(1), Decimal::new(200, 0)).unwrap_err();
        assert!(matches!(err, RampError::TransferFailed { .. }));
        // Balance unchanged
        assert_eq!(book.balance(addr(1)), Decimal::new(100, 0));
        assert_eq!(book.custody_balance(), Decimal::ZERO);
    }

    #[test]
    fn disburse_pays_every_leg() {
        let mut book = CustodyBook::new();
        book.credit(addr(1), Decimal::new(100, 0));
        book.collect(addr(1), Decimal::new(100, 0)).unwrap();
        book.disburse(&[
            TransferLeg {
                to: addr(2),
                amount: Decimal::new(495, 1),
            },
            TransferLeg {
                to: addr(3),
                amount: Decimal::new(5, 1),
            },
        ])
        .unwrap();
        assert_eq!(book.balance(addr(2)), Decimal::new(495, 1));
        assert_eq!(book.balance(addr(3)), Decimal::new(5, 1));
        assert_eq!(book.custody_balance(), Decimal::new(50, 0));
    }

    #[test]
    fn disburse_is_all_or_nothing() {
        let mut book = CustodyBook::new();
        book.credit(addr(1), Decimal::new(10, 0));
        book.collect(addr(1), Decimal::new(10, 0)).unwrap();
        let err = book
            .disburse(&[
                TransferLeg {
                    to: addr(2),
                    amount: Decimal::new(5, 0),
                },
                TransferLeg {
                    to: Address::ZERO,
                    amount: Decimal::new(1, 0),
                },
            ])
            .unwrap_err();
        assert!(matches!(err, RampError::TransferFailed { .. }));
        assert_eq!(book.balance(addr(2)), Decimal::ZERO);
        assert_eq!(book.custody_balance(), Decimal::new(10, 0));
    }

    #[test]
    fn disburse_more_than_custody_fails() {
        let mut book = CustodyBook::new();
        let err = book
            .disburse(&[TransferLeg {
                to: addr(2),
                amount: Decimal::ONE,
            }])
            .unwrap_err();
        assert!(matches!(err, RampError::TransferFailed { .. }));
    }

    #[test]
    fn injected_failure_fires_once() {
        let mut book = CustodyBook::new();
        book.fail_next_disbursement("rail down");
        assert!(book.disburse(&[]).is_err());
        assert!(book.disburse(&[]).is_ok());
    }

    #[test]
    fn total_supply_is_conserved() {
        let mut book = CustodyBook::new();
        book.credit(addr(1), Decimal::new(1000, 0));
        book.credit(addr(2), Decimal::new(500, 0));
        book.collect(addr(1), Decimal::new(300, 0)).unwrap();
        book.disburse(&[TransferLeg {
            to: addr(2),
            amount: Decimal::new(100, 0),
        }])
        .unwrap();
        assert_eq!(book.total_supply(), Decimal::new(1500, 0));
    }
}
