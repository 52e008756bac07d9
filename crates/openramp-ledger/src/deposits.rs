//! Deposit ledger: escrowed value and its liquidity counters.
//!
//! The ledger owns every open [`Deposit`] plus the depositor-identity index.
//! Creation pulls value into custody before anything is stored; withdrawal
//! prunes expired intents, pays out in a single transfer, and only then
//! commits. A failed transfer leaves the ledger exactly as it was.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use openramp_types::{
    Address, Deposit, DepositId, DepositRequest, DepositView, IdentityHash, Intent, RampConfig,
    RampError, Result, TransferLeg, ValueTransfer, conversion_rate,
};
use rust_decimal::Decimal;

use crate::intents::IntentManager;
use crate::registry::AccountRegistry;

/// Payout of one deposit inside a withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub deposit_id: DepositId,
    pub amount: Decimal,
    /// Whether the deposit was deleted afterwards.
    pub closed: bool,
}

/// Everything a committed withdrawal changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithdrawOutcome {
    pub withdrawals: Vec<Withdrawal>,
    /// Expired intents reclaimed on the way.
    pub pruned: Vec<Intent>,
    /// Sum paid to the depositor.
    pub total: Decimal,
}

/// Open deposits, keyed by id, plus the depositor index.
#[derive(Debug, Default)]
pub struct DepositLedger {
    deposits: BTreeMap<DepositId, Deposit>,
    by_depositor: HashMap<IdentityHash, Vec<DepositId>>,
    deposit_counter: DepositId,
}

impl DepositLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Escrow a new deposit funded by `caller`.
    ///
    /// Validation runs in this order: caller registered, destination tag,
    /// minimum amount, receive amount, open-deposit limit. Value is then
    /// collected into custody; if that fails nothing is stored.
    pub fn create_deposit(
        &mut self,
        config: &RampConfig,
        registry: &AccountRegistry,
        custody: &mut dyn ValueTransfer,
        caller: Address,
        request: DepositRequest,
        now: DateTime<Utc>,
    ) -> Result<&Deposit> {
        let identity = registry.require_identity(caller)?;

        match registry.destination_tag_of(&identity) {
            Some(bound) if *bound != request.destination_tag => {
                return Err(RampError::DestinationTagNotRegistered);
            }
            None if config.require_registered_destination => {
                return Err(RampError::DestinationTagNotRegistered);
            }
            _ => {}
        }

        if request.deposit_amount < config.min_deposit_amount {
            return Err(RampError::BelowMinimumDeposit {
                amount: request.deposit_amount,
                minimum: config.min_deposit_amount,
            });
        }
        let rate = conversion_rate(request.deposit_amount, request.receive_amount)?;

        let open = self.by_depositor.get(&identity).map_or(0, Vec::len);
        if open >= config.max_deposits_per_account {
            return Err(RampError::DepositLimitReached {
                max: config.max_deposits_per_account,
            });
        }

        custody.collect(caller, request.deposit_amount)?;

        let id = self.deposit_counter;
        self.deposit_counter = id.next();
        let deposit = Deposit {
            id,
            depositor: caller,
            depositor_identity: identity,
            destination_tag: request.destination_tag,
            currency: request.currency,
            deposit_amount: request.deposit_amount,
            remaining_deposits: request.deposit_amount,
            outstanding_intent_amount: Decimal::ZERO,
            conversion_rate: rate,
            intent_hashes: Vec::new(),
            created_at: now,
        };
        tracing::info!(
            deposit_id = %id,
            depositor = %caller,
            amount = %deposit.deposit_amount,
            conversion_rate = %rate,
            "deposit received"
        );
        self.by_depositor.entry(identity).or_default().push(id);
        Ok(self.deposits.entry(id).or_insert(deposit))
    }

    /// Withdraw the free liquidity of every deposit in `ids` back to `caller`.
    ///
    /// Every id is checked before anything moves. Expired intents on those
    /// deposits are pruned first so their liquidity is returned too. The
    /// total leaves custody in one transfer; drained deposits are deleted.
    pub fn withdraw(
        &mut self,
        intents: &mut IntentManager,
        custody: &mut dyn ValueTransfer,
        caller: Address,
        ids: &[DepositId],
        now: DateTime<Utc>,
        period: Duration,
    ) -> Result<WithdrawOutcome> {
        let mut unique: Vec<DepositId> = Vec::with_capacity(ids.len());
        for id in ids {
            let deposit = self.get(*id).ok_or(RampError::DepositNotFound(*id))?;
            if deposit.depositor != caller {
                return Err(RampError::NotDepositor(*id));
            }
            if !unique.contains(id) {
                unique.push(*id);
            }
        }

        // Plan: nothing below mutates until the transfer succeeds.
        let mut plans = Vec::with_capacity(unique.len());
        let mut total = Decimal::ZERO;
        for id in &unique {
            let deposit = self.get(*id).ok_or(RampError::DepositNotFound(*id))?;
            let plan = intents.plan_prune(deposit, now, period, None)?;
            let payout = deposit.remaining_deposits + plan.reclaimed;
            total += payout;
            plans.push((*id, plan, payout));
        }

        if total > Decimal::ZERO {
            custody.disburse(&[TransferLeg {
                to: caller,
                amount: total,
            }])?;
        }

        let mut outcome = WithdrawOutcome {
            total,
            ..WithdrawOutcome::default()
        };
        for (id, plan, payout) in plans {
            let deposit = self.get_mut(id).ok_or(RampError::DepositNotFound(id))?;
            let pruned = intents.apply_prune(deposit, &plan.hashes)?;
            deposit.remaining_deposits = Decimal::ZERO;
            let closed = deposit.is_drained();
            if closed {
                self.close(id);
            }
            tracing::info!(deposit_id = %id, amount = %payout, closed, "deposit withdrawn");
            outcome.pruned.extend(pruned);
            outcome.withdrawals.push(Withdrawal {
                deposit_id: id,
                amount: payout,
                closed,
            });
        }
        Ok(outcome)
    }

    #[must_use]
    pub fn get(&self, id: DepositId) -> Option<&Deposit> {
        self.deposits.get(&id)
    }

    /// Mutable access for the intent and settlement paths.
    pub fn get_mut(&mut self, id: DepositId) -> Option<&mut Deposit> {
        self.deposits.get_mut(&id)
    }

    /// Delete a deposit and its index entry.
    pub fn close(&mut self, id: DepositId) -> Option<Deposit> {
        let deposit = self.deposits.remove(&id)?;
        if let Some(ids) = self.by_depositor.get_mut(&deposit.depositor_identity) {
            ids.retain(|d| *d != id);
            if ids.is_empty() {
                self.by_depositor.remove(&deposit.depositor_identity);
            }
        }
        tracing::debug!(deposit_id = %id, "deposit closed");
        Some(deposit)
    }

    /// Open deposit ids of `identity`, in creation order.
    #[must_use]
    pub fn deposit_ids_of(&self, identity: &IdentityHash) -> &[DepositId] {
        self.by_depositor.get(identity).map_or(&[], Vec::as_slice)
    }

    /// Open deposits of `identity`, annotated with their available liquidity.
    #[must_use]
    pub fn account_deposits(
        &self,
        intents: &IntentManager,
        identity: &IdentityHash,
        now: DateTime<Utc>,
        period: Duration,
    ) -> Vec<DepositView> {
        self.deposits_from_ids(intents, self.deposit_ids_of(identity), now, period)
    }

    /// Views of the given deposits; unknown ids are skipped.
    #[must_use]
    pub fn deposits_from_ids(
        &self,
        intents: &IntentManager,
        ids: &[DepositId],
        now: DateTime<Utc>,
        period: Duration,
    ) -> Vec<DepositView> {
        ids.iter()
            .filter_map(|id| self.get(*id))
            .map(|deposit| DepositView {
                available_liquidity: deposit.remaining_deposits
                    + intents.reclaimable(deposit, now, period),
                deposit: deposit.clone(),
            })
            .collect()
    }

    /// Every open deposit, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Deposit> {
        self.deposits.values()
    }

    /// Id the next deposit will receive.
    #[must_use]
    pub fn deposit_counter(&self) -> DepositId {
        self.deposit_counter
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deposits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::CustodyBook;
    use crate::denylist::DenylistGuard;
    use crate::intents::SignalRequest;
    use openramp_types::DestinationTag;
    use openramp_types::testing::{StaticIdentityVerifier, credential, off_ramper_credential};

    fn d(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    struct Fixture {
        config: RampConfig,
        registry: AccountRegistry,
        custody: CustodyBook,
        ledger: DepositLedger,
        intents: IntentManager,
        depositor: Address,
    }

    fn fixture() -> Fixture {
        let mut registry = AccountRegistry::new(Box::new(StaticIdentityVerifier));
        let depositor = Address::random();
        registry
            .register(depositor, &credential(depositor, "depositor"))
            .unwrap();
        let mut custody = CustodyBook::new();
        custody.credit(depositor, d(10_000));
        Fixture {
            config: RampConfig::with_owner(Address::random()),
            registry,
            custody,
            ledger: DepositLedger::new(),
            intents: IntentManager::new(),
            depositor,
        }
    }

    fn request(amount: i64) -> DepositRequest {
        DepositRequest {
            destination_tag: DestinationTag::new("jdoe1234"),
            currency: "USD".into(),
            deposit_amount: d(amount),
            receive_amount: d(amount),
        }
    }

    impl Fixture {
        fn deposit(&mut self, amount: i64) -> Result<DepositId> {
            self.ledger
                .create_deposit(
                    &self.config,
                    &self.registry,
                    &mut self.custody,
                    self.depositor,
                    request(amount),
                    t0(),
                )
                .map(|deposit| deposit.id)
        }

        fn on_ramper(&mut self, name: &str) -> Address {
            let caller = Address::random();
            self.registry
                .register(caller, &credential(caller, name))
                .unwrap();
            caller
        }

        fn signal(&mut self, caller: Address, id: DepositId, amount: i64, now: DateTime<Utc>) {
            self.intents
                .signal_intent(
                    &mut self.ledger,
                    &self.registry,
                    &DenylistGuard::new(),
                    &self.config,
                    SignalRequest {
                        caller,
                        deposit_id: id,
                        amount: d(amount),
                        destination: caller,
                    },
                    now,
                )
                .unwrap();
        }
    }

    #[test]
    fn create_deposit_collects_and_indexes() {
        let mut f = fixture();
        let id = f.deposit(100).unwrap();
        assert_eq!(id, DepositId(0));
        assert_eq!(f.ledger.deposit_counter(), DepositId(1));
        assert_eq!(f.custody.custody_balance(), d(100));
        assert_eq!(f.custody.balance(f.depositor), d(9_900));

        let deposit = f.ledger.get(id).unwrap();
        assert_eq!(deposit.remaining_deposits, d(100));
        assert_eq!(deposit.outstanding_intent_amount, Decimal::ZERO);
        assert_eq!(deposit.conversion_rate, Decimal::ONE);
        let identity = f.registry.identity_of(f.depositor).unwrap();
        assert_eq!(f.ledger.deposit_ids_of(&identity), &[id]);
    }

    #[test]
    fn create_deposit_validation_order() {
        let mut f = fixture();

        let stranger = Address::random();
        let err = f
            .ledger
            .create_deposit(
                &f.config,
                &f.registry,
                &mut f.custody,
                stranger,
                request(100),
                t0(),
            )
            .unwrap_err();
        assert!(matches!(err, RampError::NotRegistered(_)));

        assert!(matches!(
            f.deposit(19).unwrap_err(),
            RampError::BelowMinimumDeposit { .. }
        ));

        let mut req = request(100);
        req.receive_amount = Decimal::ZERO;
        let err = f
            .ledger
            .create_deposit(
                &f.config,
                &f.registry,
                &mut f.custody,
                f.depositor,
                req,
                t0(),
            )
            .unwrap_err();
        assert!(matches!(err, RampError::NonPositiveAmount { .. }));
        assert!(f.ledger.is_empty());
        assert_eq!(f.custody.custody_balance(), Decimal::ZERO);
    }

    #[test]
    fn deposit_limit_per_identity() {
        let mut f = fixture();
        f.config.max_deposits_per_account = 2;
        f.deposit(20).unwrap();
        f.deposit(20).unwrap();
        assert!(matches!(
            f.deposit(20).unwrap_err(),
            RampError::DepositLimitReached { max: 2 }
        ));
    }

    #[test]
    fn bound_destination_tag_must_match() {
        let mut f = fixture();
        let depositor = f.depositor;
        f.registry
            .register_off_ramper(depositor, &off_ramper_credential(depositor, "depositor", "other"))
            .unwrap();
        assert!(matches!(
            f.deposit(100).unwrap_err(),
            RampError::DestinationTagNotRegistered
        ));
    }

    #[test]
    fn registered_destination_can_be_required() {
        let mut f = fixture();
        f.config.require_registered_destination = true;
        assert!(matches!(
            f.deposit(100).unwrap_err(),
            RampError::DestinationTagNotRegistered
        ));
        let depositor = f.depositor;
        f.registry
            .register_off_ramper(
                depositor,
                &off_ramper_credential(depositor, "depositor", "jdoe1234"),
            )
            .unwrap();
        assert!(f.deposit(100).is_ok());
    }

    #[test]
    fn failed_collection_stores_nothing() {
        let mut f = fixture();
        let err = f.deposit(20_000).unwrap_err();
        assert!(matches!(err, RampError::TransferFailed { .. }));
        assert!(f.ledger.is_empty());
        assert_eq!(f.ledger.deposit_counter(), DepositId(0));
    }

    #[test]
    fn withdraw_untouched_deposit_closes_it() {
        let mut f = fixture();
        let id = f.deposit(100).unwrap();
        let out = f
            .ledger
            .withdraw(
                &mut f.intents,
                &mut f.custody,
                f.depositor,
                &[id],
                t0(),
                f.config.intent_expiration_period(),
            )
            .unwrap();
        assert_eq!(out.total, d(100));
        assert!(out.withdrawals[0].closed);
        assert!(f.ledger.get(id).is_none());
        assert_eq!(f.custody.balance(f.depositor), d(10_000));
        let identity = f.registry.identity_of(f.depositor).unwrap();
        assert!(f.ledger.deposit_ids_of(&identity).is_empty());
    }

    #[test]
    fn withdraw_keeps_deposit_with_live_intent() {
        let mut f = fixture();
        let id = f.deposit(100).unwrap();
        let alice = f.on_ramper("alice");
        f.signal(alice, id, 40, t0());

        let period = f.config.intent_expiration_period();
        let out = f
            .ledger
            .withdraw(&mut f.intents, &mut f.custody, f.depositor, &[id], t0(), period)
            .unwrap();
        assert_eq!(out.total, d(60));
        assert!(!out.withdrawals[0].closed);
        let deposit = f.ledger.get(id).unwrap();
        assert_eq!(deposit.remaining_deposits, Decimal::ZERO);
        assert_eq!(deposit.outstanding_intent_amount, d(40));

        // Once the intent expires a second withdrawal reclaims it.
        let later = t0() + period;
        let out = f
            .ledger
            .withdraw(&mut f.intents, &mut f.custody, f.depositor, &[id], later, period)
            .unwrap();
        assert_eq!(out.total, d(40));
        assert_eq!(out.pruned.len(), 1);
        assert!(out.withdrawals[0].closed);
        assert!(f.ledger.get(id).is_none());
        assert!(f.intents.is_empty());
    }

    #[test]
    fn withdraw_checks_every_id_first() {
        let mut f = fixture();
        let id = f.deposit(100).unwrap();
        let period = f.config.intent_expiration_period();

        let err = f
            .ledger
            .withdraw(
                &mut f.intents,
                &mut f.custody,
                f.depositor,
                &[id, DepositId(99)],
                t0(),
                period,
            )
            .unwrap_err();
        assert!(matches!(err, RampError::DepositNotFound(DepositId(99))));

        let err = f
            .ledger
            .withdraw(&mut f.intents, &mut f.custody, Address::random(), &[id], t0(), period)
            .unwrap_err();
        assert!(matches!(err, RampError::NotDepositor(_)));
        assert_eq!(f.ledger.get(id).unwrap().remaining_deposits, d(100));
    }

    #[test]
    fn failed_payout_leaves_ledger_untouched() {
        let mut f = fixture();
        let id = f.deposit(100).unwrap();
        f.custody.fail_next_disbursement("rail down");
        let period = f.config.intent_expiration_period();
        let err = f
            .ledger
            .withdraw(&mut f.intents, &mut f.custody, f.depositor, &[id], t0(), period)
            .unwrap_err();
        assert!(matches!(err, RampError::TransferFailed { .. }));
        assert_eq!(f.ledger.get(id).unwrap().remaining_deposits, d(100));
        assert_eq!(f.custody.custody_balance(), d(100));
    }

    #[test]
    fn views_count_expired_intents_without_pruning() {
        let mut f = fixture();
        let id = f.deposit(100).unwrap();
        let alice = f.on_ramper("alice");
        f.signal(alice, id, 30, t0());
        let period = f.config.intent_expiration_period();
        let identity = f.registry.identity_of(f.depositor).unwrap();

        let views = f.ledger.account_deposits(&f.intents, &identity, t0(), period);
        assert_eq!(views[0].available_liquidity, d(70));

        let views = f
            .ledger
            .account_deposits(&f.intents, &identity, t0() + period, period);
        assert_eq!(views[0].available_liquidity, d(100));
        // Nothing was pruned.
        assert_eq!(f.ledger.get(id).unwrap().outstanding_intent_amount, d(30));

        let views = f
            .ledger
            .deposits_from_ids(&f.intents, &[DepositId(42), id], t0(), period);
        assert_eq!(views.len(), 1);
    }
}
