//! Deposit model: escrowed value offered for on-ramping.
//!
//! A deposit tracks two liquidity counters:
//! - `remaining_deposits`: free liquidity new intents can reserve
//! - `outstanding_intent_amount`: liquidity reserved by live intents
//!
//! Conservation invariant, at every observable point:
//! ```text
//! remaining_deposits + outstanding_intent_amount <= deposit_amount
//! outstanding_intent_amount == Σ amount(intent) for intent in intent_hashes
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{
    Address, Currency, DepositId, DestinationTag, IdentityHash, IntentHash, RampError, Result,
    constants::{AMOUNT_PRECISION, CONVERSION_PRECISION},
};

/// Parameters of a new deposit, as supplied by the depositor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    /// Where the on-ramper must send the off-chain payment.
    pub destination_tag: DestinationTag,
    /// Currency the off-chain payment must be made in.
    pub currency: Currency,
    /// Escrowed amount.
    pub deposit_amount: Decimal,
    /// Off-chain amount the depositor wants for the whole deposit.
    pub receive_amount: Decimal,
}

/// An escrowed deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: DepositId,
    /// Address that funded the deposit and receives withdrawals.
    pub depositor: Address,
    /// Identity of the depositor; no caller sharing it may reserve here.
    pub depositor_identity: IdentityHash,
    pub destination_tag: DestinationTag,
    pub currency: Currency,
    /// Amount originally escrowed.
    pub deposit_amount: Decimal,
    /// Liquidity not reserved by any intent.
    pub remaining_deposits: Decimal,
    /// Liquidity reserved by live intents.
    pub outstanding_intent_amount: Decimal,
    /// Escrow units paid per off-chain unit received.
    pub conversion_rate: Decimal,
    /// Live intents against this deposit, in creation order.
    pub intent_hashes: Vec<IntentHash>,
    pub created_at: DateTime<Utc>,
}

impl Deposit {
    /// Whether the deposit holds no liquidity at all and can be deleted.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.remaining_deposits.is_zero() && self.outstanding_intent_amount.is_zero()
    }

    /// Reserve `amount` for a new intent (remaining → outstanding).
    ///
    /// # Errors
    /// Returns `InsufficientLiquidity` if `remaining_deposits < amount`.
    pub fn reserve(&mut self, hash: IntentHash, amount: Decimal) -> Result<()> {
        if self.remaining_deposits < amount {
            return Err(RampError::InsufficientLiquidity {
                needed: amount,
                available: self.remaining_deposits,
            });
        }
        self.remaining_deposits -= amount;
        self.outstanding_intent_amount += amount;
        self.intent_hashes.push(hash);
        Ok(())
    }

    /// Return a reservation to free liquidity (outstanding → remaining).
    /// Used by cancellation and pruning.
    pub fn release(&mut self, hash: &IntentHash, amount: Decimal) -> Result<()> {
        self.detach(hash, amount)?;
        self.remaining_deposits += amount;
        Ok(())
    }

    /// Consume a reservation on settlement. The amount left the deposit's
    /// free liquidity when the intent was signaled, so nothing returns to it.
    pub fn consume(&mut self, hash: &IntentHash, amount: Decimal) -> Result<()> {
        self.detach(hash, amount)
    }

    fn detach(&mut self, hash: &IntentHash, amount: Decimal) -> Result<()> {
        let position = self
            .intent_hashes
            .iter()
            .position(|h| h == hash)
            .ok_or_else(|| RampError::InvariantViolation {
                reason: format!("{hash} is not listed on {}", self.id),
            })?;
        if self.outstanding_intent_amount < amount {
            return Err(RampError::InvariantViolation {
                reason: format!(
                    "{}: outstanding {} < intent amount {amount}",
                    self.id, self.outstanding_intent_amount
                ),
            });
        }
        self.intent_hashes.remove(position);
        self.outstanding_intent_amount -= amount;
        Ok(())
    }

    /// Off-chain payment converted into escrow units at this deposit's rate,
    /// truncated to the asset precision so rounding never favours the payer.
    ///
    /// # Errors
    /// Returns `InvalidParameter` if the product overflows.
    pub fn convert_payment(&self, paid_amount: Decimal) -> Result<Decimal> {
        let converted = paid_amount
            .checked_mul(self.conversion_rate)
            .ok_or_else(|| RampError::InvalidParameter {
                reason: format!(
                    "paid amount {paid_amount} overflows at rate {}",
                    self.conversion_rate
                ),
            })?;
        Ok(converted
            .round_dp_with_strategy(CONVERSION_PRECISION, RoundingStrategy::MidpointNearestEven)
            .round_dp_with_strategy(AMOUNT_PRECISION, RoundingStrategy::ToZero))
    }

    /// Check the counter half of the conservation invariant.
    pub fn check_counters(&self) -> Result<()> {
        if self.remaining_deposits < Decimal::ZERO || self.outstanding_intent_amount < Decimal::ZERO
        {
            return Err(RampError::InvariantViolation {
                reason: format!("{}: negative liquidity counter", self.id),
            });
        }
        if self.remaining_deposits + self.outstanding_intent_amount > self.deposit_amount {
            return Err(RampError::InvariantViolation {
                reason: format!(
                    "{}: remaining {} + outstanding {} > deposited {}",
                    self.id,
                    self.remaining_deposits,
                    self.outstanding_intent_amount,
                    self.deposit_amount
                ),
            });
        }
        Ok(())
    }
}

/// Compute a deposit's conversion rate.
///
/// # Errors
/// Returns `NonPositiveAmount` if `receive_amount <= 0`.
pub fn conversion_rate(deposit_amount: Decimal, receive_amount: Decimal) -> Result<Decimal> {
    if receive_amount <= Decimal::ZERO {
        return Err(RampError::NonPositiveAmount {
            field: "receive amount",
        });
    }
    deposit_amount
        .checked_div(receive_amount)
        .ok_or_else(|| RampError::InvalidParameter {
            reason: format!("conversion rate {deposit_amount}/{receive_amount} overflows"),
        })
}

/// A deposit together with the liquidity it could offer right now.
///
/// `available_liquidity` counts expired intents as free even though they have
/// not been pruned yet; producing this view never mutates the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositView {
    pub deposit: Deposit,
    pub available_liquidity: Decimal,
}

/// Dummy deposit for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Deposit {
    /// A fresh deposit of `amount` with a 1:1 conversion rate.
    pub fn dummy(id: DepositId, depositor: Address, amount: Decimal) -> Self {
        Self {
            id,
            depositor,
            depositor_identity: IdentityHash::from_account_id("dummy-depositor"),
            destination_tag: DestinationTag::new("dummy-tag"),
            currency: "USD".to_string(),
            deposit_amount: amount,
            remaining_deposits: amount,
            outstanding_intent_amount: Decimal::ZERO,
            conversion_rate: Decimal::ONE,
            intent_hashes: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
