//! Intent manager: liquidity reservations and lazy pruning.
//!
//! An identity holds at most one live intent anywhere in the ledger. Expired
//! intents are never swept in the background: whichever operation next needs
//! their deposit's liquidity plans a prune, checks it is sufficient, and only
//! then applies it together with its own change.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use openramp_types::{
    Address, Deposit, DepositId, IdentityHash, Intent, IntentHash, IntentWithIdentity,
    RampConfig, RampError, Result,
};
use rust_decimal::Decimal;

use crate::denylist::DenylistGuard;
use crate::deposits::DepositLedger;
use crate::registry::AccountRegistry;

/// Expired intents selected for removal from one deposit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrunePlan {
    /// In the deposit's intent order.
    pub hashes: Vec<IntentHash>,
    /// Sum of the selected intents' amounts.
    pub reclaimed: Decimal,
}

impl PrunePlan {
    #[must_use]
    pub fn contains(&self, hash: &IntentHash) -> bool {
        self.hashes.contains(hash)
    }
}

/// Arguments of [`IntentManager::signal_intent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalRequest {
    pub caller: Address,
    pub deposit_id: DepositId,
    pub amount: Decimal,
    /// Receiver of the escrowed value on settlement.
    pub destination: Address,
}

/// A committed intent plus whatever was pruned to make room for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalOutcome {
    pub intent: Intent,
    pub pruned: Vec<Intent>,
}

/// Live intents, keyed by hash, plus the identity → intent pointer.
#[derive(Debug, Default)]
pub struct IntentManager {
    intents: HashMap<IntentHash, Intent>,
    by_identity: HashMap<IdentityHash, IntentHash>,
    intent_nonce: u64,
}

impl IntentManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve liquidity on a deposit for the caller's identity.
    ///
    /// Checks, in order: caller registered; amount positive and within the
    /// on-ramp ceiling; destination non-zero; deposit exists; caller is not
    /// the depositor; access lists; liquidity (pruning expired intents if
    /// needed); no other live intent for the identity. Nothing mutates until
    /// every check has passed.
    pub fn signal_intent(
        &mut self,
        deposits: &mut DepositLedger,
        registry: &AccountRegistry,
        guard: &DenylistGuard,
        config: &RampConfig,
        request: SignalRequest,
        now: DateTime<Utc>,
    ) -> Result<SignalOutcome> {
        let SignalRequest {
            caller,
            deposit_id,
            amount,
            destination,
        } = request;
        let identity = registry.require_identity(caller)?;

        if amount <= Decimal::ZERO {
            return Err(RampError::NonPositiveAmount { field: "amount" });
        }
        if let Some(maximum) = config.max_on_ramp_amount {
            if amount > maximum {
                return Err(RampError::AboveMaxOnRamp { amount, maximum });
            }
        }
        if destination.is_zero() {
            return Err(RampError::ZeroAddress {
                field: "destination",
            });
        }

        let deposit = deposits
            .get(deposit_id)
            .ok_or(RampError::DepositNotFound(deposit_id))?;
        if deposit.depositor_identity == identity {
            return Err(RampError::SelfReservation);
        }
        guard.check(&deposit.depositor_identity, &identity)?;

        let plan = if deposit.remaining_deposits < amount {
            let plan = self.plan_prune(
                deposit,
                now,
                config.intent_expiration_period(),
                Some(amount),
            )?;
            let available = deposit.remaining_deposits + plan.reclaimed;
            if available < amount {
                return Err(RampError::InsufficientLiquidity {
                    needed: amount,
                    available,
                });
            }
            plan
        } else {
            PrunePlan::default()
        };

        if let Some(existing) = self.by_identity.get(&identity) {
            if !plan.contains(existing) {
                return Err(RampError::IntentStillOutstanding(*existing));
            }
        }

        let deposit = deposits
            .get_mut(deposit_id)
            .ok_or(RampError::DepositNotFound(deposit_id))?;
        let pruned = self.apply_prune(deposit, &plan.hashes)?;

        let hash = IntentHash::derive(&identity, deposit_id, now, self.intent_nonce);
        self.intent_nonce += 1;
        deposit.reserve(hash, amount)?;
        let intent = Intent {
            hash,
            on_ramper_identity: identity,
            on_ramper: caller,
            deposit_id,
            destination,
            amount,
            created_at: now,
        };
        self.intents.insert(hash, intent.clone());
        self.by_identity.insert(identity, hash);

        tracing::info!(
            intent = %hash,
            deposit_id = %deposit_id,
            on_ramper = %identity,
            %amount,
            pruned = pruned.len(),
            "intent signaled"
        );
        Ok(SignalOutcome { intent, pruned })
    }

    /// Cancel a live intent and return its liquidity to the deposit.
    ///
    /// Any caller bound to the intent's identity may cancel it.
    pub fn cancel_intent(
        &mut self,
        deposits: &mut DepositLedger,
        registry: &AccountRegistry,
        caller: Address,
        hash: IntentHash,
    ) -> Result<Intent> {
        let intent = self
            .intents
            .get(&hash)
            .ok_or(RampError::IntentNotFound(hash))?;
        if registry.identity_of(caller) != Some(intent.on_ramper_identity) {
            return Err(RampError::NotOnRamper);
        }
        let deposit = deposits
            .get_mut(intent.deposit_id)
            .ok_or_else(|| missing_deposit(intent))?;
        deposit.release(&hash, intent.amount)?;

        let intent = self.detach(&hash).ok_or(RampError::IntentNotFound(hash))?;
        tracing::info!(intent = %hash, deposit_id = %intent.deposit_id, "intent cancelled");
        Ok(intent)
    }

    /// Select expired intents of `deposit`, in its intent order.
    ///
    /// With `needed`, selection stops as soon as the deposit's free liquidity
    /// plus the reclaimed amount covers it. Never mutates.
    pub fn plan_prune(
        &self,
        deposit: &Deposit,
        now: DateTime<Utc>,
        period: Duration,
        needed: Option<Decimal>,
    ) -> Result<PrunePlan> {
        let mut plan = PrunePlan::default();
        for hash in &deposit.intent_hashes {
            if needed.is_some_and(|n| deposit.remaining_deposits + plan.reclaimed >= n) {
                break;
            }
            let intent = self
                .intents
                .get(hash)
                .ok_or_else(|| RampError::InvariantViolation {
                    reason: format!("{} lists unknown {hash}", deposit.id),
                })?;
            if intent.is_expired(now, period) {
                plan.hashes.push(*hash);
                plan.reclaimed += intent.amount;
            }
        }
        Ok(plan)
    }

    /// Remove the planned intents and return their liquidity to `deposit`.
    pub fn apply_prune(
        &mut self,
        deposit: &mut Deposit,
        hashes: &[IntentHash],
    ) -> Result<Vec<Intent>> {
        let mut pruned = Vec::with_capacity(hashes.len());
        for hash in hashes {
            let amount = self
                .intents
                .get(hash)
                .map(|intent| intent.amount)
                .ok_or(RampError::IntentNotFound(*hash))?;
            deposit.release(hash, amount)?;
            if let Some(intent) = self.detach(hash) {
                tracing::debug!(intent = %hash, deposit_id = %deposit.id, "intent pruned");
                pruned.push(intent);
            }
        }
        Ok(pruned)
    }

    /// Sum of the expired intents on `deposit`.
    #[must_use]
    pub fn reclaimable(&self, deposit: &Deposit, now: DateTime<Utc>, period: Duration) -> Decimal {
        deposit
            .intent_hashes
            .iter()
            .filter_map(|hash| self.intents.get(hash))
            .filter(|intent| intent.is_expired(now, period))
            .map(|intent| intent.amount)
            .sum()
    }

    /// Remove an intent and its identity pointer without touching any
    /// deposit. The caller owns the deposit-side bookkeeping.
    pub fn detach(&mut self, hash: &IntentHash) -> Option<Intent> {
        let intent = self.intents.remove(hash)?;
        if self.by_identity.get(&intent.on_ramper_identity) == Some(hash) {
            self.by_identity.remove(&intent.on_ramper_identity);
        }
        Some(intent)
    }

    #[must_use]
    pub fn get(&self, hash: &IntentHash) -> Option<&Intent> {
        self.intents.get(hash)
    }

    /// The live intent of `identity`, if any.
    #[must_use]
    pub fn current_intent_of(&self, identity: &IdentityHash) -> Option<&Intent> {
        self.by_identity
            .get(identity)
            .and_then(|hash| self.intents.get(hash))
    }

    /// Look up several intents; unknown hashes are skipped.
    #[must_use]
    pub fn intents_with_identity(&self, hashes: &[IntentHash]) -> Vec<IntentWithIdentity> {
        hashes
            .iter()
            .filter_map(|hash| self.intents.get(hash))
            .map(|intent| IntentWithIdentity {
                intent_hash: intent.hash,
                on_ramper_identity: intent.on_ramper_identity,
                intent: intent.clone(),
            })
            .collect()
    }

    /// Every live intent, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Intent> {
        self.intents.values()
    }

    /// Identity → intent pointers.
    pub fn identity_pointers(&self) -> impl Iterator<Item = (&IdentityHash, &IntentHash)> {
        self.by_identity.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

fn missing_deposit(intent: &Intent) -> RampError {
    RampError::InvariantViolation {
        reason: format!("{} points at missing {}", intent.hash, intent.deposit_id),
    }
}
