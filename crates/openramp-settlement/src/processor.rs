//! Proof-gated settlement.
//!
//! Settling an intent:
//! 1. Verify the payment evidence and resolve the intent it names
//! 2. Check the payment nullifier is unspent and authorize the caller
//!    (on-ramper or depositor)
//! 3. Match the payment against the intent and its deposit
//! 4. Enforce the on-ramper cooldown
//! 5. Pay `amount - fee` to the intent destination and `fee` to the fee
//!    recipient in one custody disbursement
//! 6. Spend the nullifier, consume the reservation, close a drained deposit
//!
//! Steps 1-4 and the deposit bookkeeping are computed before the transfer.
//! If the transfer fails the ledger is untouched.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use openramp_ledger::{AccountRegistry, DepositLedger, IntentManager};
use openramp_types::{
    Address, Deposit, IdentityHash, Intent, IntentHash, PaymentEvidence, PaymentEvidenceVerifier,
    RampConfig, RampError, Result, TransferLeg, ValueTransfer, VerifiedPayment,
    constants::AMOUNT_PRECISION,
};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::nullifier::{Nullifier, NullifierRegistry};

/// Who triggered a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    /// The intent's on-ramper, with payment evidence. Subject to cooldown.
    OnRamper,
    /// The deposit's depositor. Exempt from cooldown.
    Depositor,
}

/// A committed settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub intent: Intent,
    /// Paid to the intent destination.
    pub net_amount: Decimal,
    /// Paid to the fee recipient.
    pub fee: Decimal,
    pub initiator: Initiator,
    pub depositor: Address,
    /// Whether the deposit was drained and deleted.
    pub deposit_closed: bool,
}

/// Ledger state a settlement reads and writes.
pub struct LedgerParts<'a> {
    pub config: &'a RampConfig,
    pub registry: &'a AccountRegistry,
    pub deposits: &'a mut DepositLedger,
    pub intents: &'a mut IntentManager,
    pub custody: &'a mut dyn ValueTransfer,
}

/// Verifies payment evidence and settles intents against it.
pub struct SettlementProcessor {
    verifier: Box<dyn PaymentEvidenceVerifier>,
    nullifiers: NullifierRegistry,
    last_settle: HashMap<IdentityHash, DateTime<Utc>>,
}

impl SettlementProcessor {
    #[must_use]
    pub fn new(verifier: Box<dyn PaymentEvidenceVerifier>) -> Self {
        Self {
            verifier,
            nullifiers: NullifierRegistry::new(),
            last_settle: HashMap::new(),
        }
    }

    /// Swap the evidence verifier. Spent nullifiers and cooldowns are kept.
    pub fn set_verifier(&mut self, verifier: Box<dyn PaymentEvidenceVerifier>) {
        self.verifier = verifier;
    }

    /// Settle the intent named by `evidence`.
    ///
    /// # Errors
    /// - `ProofRejected` if the verifier refuses the evidence
    /// - `IntentNotFound` if the intent no longer exists
    /// - `EvidenceReplayed` if the payment already settled another intent
    /// - `NotSettlementParty` if `caller` is neither on-ramper nor depositor
    /// - `PayerMismatch`, `WrongCurrency`, `PayeeMismatch`,
    ///   `PaymentNotEnough`, `PaymentPredatesIntent` for a mismatched payment
    /// - `InvalidParameter` if the paid amount cannot be converted
    /// - `CooldownActive` if the on-ramper settled too recently
    /// - `TransferFailed` if the payout fails
    pub fn settle(
        &mut self,
        parts: LedgerParts<'_>,
        caller: Address,
        evidence: &PaymentEvidence,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        self.try_settle(parts, caller, evidence, now)
            .inspect_err(|err| {
                tracing::warn!(
                    %caller,
                    intent = %evidence.claim.intent_hash,
                    kind = %err.kind(),
                    %err,
                    "settlement rejected"
                );
            })
    }

    fn try_settle(
        &mut self,
        parts: LedgerParts<'_>,
        caller: Address,
        evidence: &PaymentEvidence,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let payment = self.verifier.verify(evidence)?;
        let intent = parts
            .intents
            .get(&payment.intent_hash)
            .ok_or(RampError::IntentNotFound(payment.intent_hash))?
            .clone();
        let nullifier = Nullifier::of(&payment);
        self.nullifiers.check(&nullifier)?;
        let deposit = deposit_of(parts.deposits, &intent)?;

        let initiator = if parts.registry.identity_of(caller) == Some(intent.on_ramper_identity) {
            Initiator::OnRamper
        } else if caller == deposit.depositor {
            Initiator::Depositor
        } else {
            return Err(RampError::NotSettlementParty);
        };

        check_payment(&payment, &intent, deposit)?;

        if initiator == Initiator::OnRamper {
            if let Some(last) = self.last_settle.get(&intent.on_ramper_identity) {
                let retry_at = last
                    .checked_add_signed(parts.config.on_ramp_cooldown_period())
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                if now < retry_at {
                    return Err(RampError::CooldownActive { retry_at });
                }
            }
        }

        self.finalize(parts, intent, initiator, Some(nullifier), now)
    }

    /// Depositor-initiated release of an intent without payment evidence.
    ///
    /// # Errors
    /// - `IntentNotFound` if the intent does not exist
    /// - `NotDepositor` if `caller` did not fund the deposit
    /// - `TransferFailed` if the payout fails
    pub fn release_to_on_ramper(
        &mut self,
        parts: LedgerParts<'_>,
        caller: Address,
        hash: IntentHash,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let intent = parts
            .intents
            .get(&hash)
            .ok_or(RampError::IntentNotFound(hash))?
            .clone();
        let deposit = deposit_of(parts.deposits, &intent)?;
        if deposit.depositor != caller {
            return Err(RampError::NotDepositor(intent.deposit_id));
        }
        self.finalize(parts, intent, Initiator::Depositor, None, now)
    }

    fn finalize(
        &mut self,
        parts: LedgerParts<'_>,
        intent: Intent,
        initiator: Initiator,
        nullifier: Option<Nullifier>,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let fee = settlement_fee(intent.amount, parts.config.sustainability_fee);
        let net_amount = intent.amount - fee;

        // Stage the deposit change so a bookkeeping error surfaces before
        // value moves.
        let mut staged = deposit_of(parts.deposits, &intent)?.clone();
        staged.consume(&intent.hash, intent.amount)?;
        let deposit_closed = staged.is_drained();
        let depositor = staged.depositor;

        let mut legs = vec![TransferLeg {
            to: intent.destination,
            amount: net_amount,
        }];
        if fee > Decimal::ZERO {
            legs.push(TransferLeg {
                to: parts.config.fee_recipient,
                amount: fee,
            });
        }
        parts.custody.disburse(&legs)?;

        if let Some(nullifier) = nullifier {
            self.nullifiers.spend(nullifier)?;
        }
        parts.intents.detach(&intent.hash);
        if deposit_closed {
            parts.deposits.close(intent.deposit_id);
        } else if let Some(deposit) = parts.deposits.get_mut(intent.deposit_id) {
            *deposit = staged;
        }
        self.last_settle.insert(intent.on_ramper_identity, now);

        tracing::info!(
            intent = %intent.hash,
            deposit_id = %intent.deposit_id,
            destination = %intent.destination,
            net = %net_amount,
            %fee,
            ?initiator,
            deposit_closed,
            "intent fulfilled"
        );
        Ok(Settlement {
            intent,
            net_amount,
            fee,
            initiator,
            depositor,
            deposit_closed,
        })
    }

    /// When `identity` last had an intent settled.
    #[must_use]
    pub fn last_settle_of(&self, identity: &IdentityHash) -> Option<DateTime<Utc>> {
        self.last_settle.get(identity).copied()
    }

    #[must_use]
    pub fn nullifiers(&self) -> &NullifierRegistry {
        &self.nullifiers
    }
}

/// Protocol fee on a settled amount, truncated to the asset precision.
#[must_use]
pub fn settlement_fee(amount: Decimal, rate: Decimal) -> Decimal {
    (amount * rate).round_dp_with_strategy(AMOUNT_PRECISION, RoundingStrategy::ToZero)
}

fn deposit_of<'a>(deposits: &'a DepositLedger, intent: &Intent) -> Result<&'a Deposit> {
    deposits
        .get(intent.deposit_id)
        .ok_or_else(|| RampError::InvariantViolation {
            reason: format!("{} points at missing {}", intent.hash, intent.deposit_id),
        })
}

fn check_payment(payment: &VerifiedPayment, intent: &Intent, deposit: &Deposit) -> Result<()> {
    if payment.payer_identity != intent.on_ramper_identity {
        return Err(RampError::PayerMismatch);
    }
    if payment.currency != deposit.currency {
        return Err(RampError::WrongCurrency {
            expected: deposit.currency.clone(),
            actual: payment.currency.clone(),
        });
    }
    if payment.payee_destination_tag != deposit.destination_tag {
        return Err(RampError::PayeeMismatch);
    }
    let covered = deposit.convert_payment(payment.paid_amount)?;
    if covered < intent.amount {
        return Err(RampError::PaymentNotEnough {
            covered,
            required: intent.amount,
        });
    }
    if payment.payment_timestamp < intent.created_at {
        return Err(RampError::PaymentPredatesIntent);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use openramp_ledger::{CustodyBook, DenylistGuard, SignalRequest};
    use openramp_types::testing::{REJECTED_PROOF, StaticIdentityVerifier, StaticPaymentVerifier, credential};
    use openramp_types::{DepositId, DepositRequest, DestinationTag, PaymentClaim};

    fn d(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    struct Fixture {
        config: RampConfig,
        registry: AccountRegistry,
        deposits: DepositLedger,
        intents: IntentManager,
        custody: CustodyBook,
        processor: SettlementProcessor,
        depositor: Address,
        on_ramper: Address,
        destination: Address,
    }

    impl Fixture {
        fn new(fee: Decimal) -> Self {
            let mut config = RampConfig::with_owner(Address::random());
            config.sustainability_fee = fee;
            let mut registry = AccountRegistry::new(Box::new(StaticIdentityVerifier));
            let depositor = Address::random();
            let on_ramper = Address::random();
            registry
                .register(depositor, &credential(depositor, "depositor"))
                .unwrap();
            registry
                .register(on_ramper, &credential(on_ramper, "alice"))
                .unwrap();
            let mut custody = CustodyBook::new();
            custody.credit(depositor, d(1_000));
            Self {
                config,
                registry,
                deposits: DepositLedger::new(),
                intents: IntentManager::new(),
                custody,
                processor: SettlementProcessor::new(Box::new(StaticPaymentVerifier)),
                depositor,
                on_ramper,
                destination: Address::random(),
            }
        }

        fn deposit(&mut self, amount: i64) -> DepositId {
            self.deposits
                .create_deposit(
                    &self.config,
                    &self.registry,
                    &mut self.custody,
                    self.depositor,
                    DepositRequest {
                        destination_tag: DestinationTag::new("jdoe1234"),
                        currency: "USD".into(),
                        deposit_amount: d(amount),
                        receive_amount: d(amount),
                    },
                    t0(),
                )
                .unwrap()
                .id
        }

        fn signal(&mut self, deposit_id: DepositId, amount: i64) -> Intent {
            self.intents
                .signal_intent(
                    &mut self.deposits,
                    &self.registry,
                    &DenylistGuard::new(),
                    &self.config,
                    SignalRequest {
                        caller: self.on_ramper,
                        deposit_id,
                        amount: d(amount),
                        destination: self.destination,
                    },
                    t0(),
                )
                .unwrap()
                .intent
        }

        fn evidence(&self, intent: &Intent, paid: i64) -> PaymentEvidence {
            PaymentEvidence {
                claim: PaymentClaim {
                    payer_identity: intent.on_ramper_identity,
                    payee_destination_tag: DestinationTag::new("jdoe1234"),
                    currency: "USD".into(),
                    paid_amount: d(paid),
                    payment_timestamp: t0() + Duration::seconds(5),
                    intent_hash: intent.hash,
                    payment_id: format!("tx-{}", intent.hash),
                },
                proof: b"ok".to_vec(),
            }
        }

        fn settle(
            &mut self,
            caller: Address,
            evidence: &PaymentEvidence,
            now: DateTime<Utc>,
        ) -> Result<Settlement> {
            self.processor.settle(
                LedgerParts {
                    config: &self.config,
                    registry: &self.registry,
                    deposits: &mut self.deposits,
                    intents: &mut self.intents,
                    custody: &mut self.custody,
                },
                caller,
                evidence,
                now,
            )
        }
    }

    #[test]
    fn fee_is_truncated() {
        assert_eq!(settlement_fee(d(50), Decimal::new(1, 2)), Decimal::new(5, 1));
        assert_eq!(
            settlement_fee(Decimal::new(1_234_567, 6), Decimal::new(1, 3)),
            Decimal::new(1234, 6)
        );
        assert_eq!(settlement_fee(d(50), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn settle_pays_destination_and_fee() {
        let mut f = Fixture::new(Decimal::new(1, 2));
        let id = f.deposit(100);
        let intent = f.signal(id, 50);
        let evidence = f.evidence(&intent, 50);

        let s = f.settle(f.on_ramper, &evidence, t0() + Duration::seconds(10)).unwrap();
        assert_eq!(s.net_amount, Decimal::new(495, 1));
        assert_eq!(s.fee, Decimal::new(5, 1));
        assert_eq!(s.initiator, Initiator::OnRamper);
        assert!(!s.deposit_closed);
        assert_eq!(f.custody.balance(f.destination), Decimal::new(495, 1));
        assert_eq!(f.custody.balance(f.config.fee_recipient), Decimal::new(5, 1));

        let deposit = f.deposits.get(id).unwrap();
        assert_eq!(deposit.remaining_deposits, d(50));
        assert_eq!(deposit.outstanding_intent_amount, Decimal::ZERO);
        assert!(f.intents.get(&intent.hash).is_none());
        assert!(f.processor.nullifiers().is_spent(&Nullifier::of(&evidence.claim)));
    }

    #[test]
    fn settling_last_liquidity_closes_deposit() {
        let mut f = Fixture::new(Decimal::ZERO);
        let id = f.deposit(100);
        let intent = f.signal(id, 100);
        let evidence = f.evidence(&intent, 100);
        let s = f.settle(f.on_ramper, &evidence, t0()).unwrap();
        assert!(s.deposit_closed);
        assert!(f.deposits.get(id).is_none());
        assert_eq!(f.custody.custody_balance(), Decimal::ZERO);
    }

    #[test]
    fn second_settlement_of_same_intent_conflicts() {
        let mut f = Fixture::new(Decimal::ZERO);
        let id = f.deposit(100);
        let intent = f.signal(id, 10);
        let evidence = f.evidence(&intent, 10);
        f.settle(f.on_ramper, &evidence, t0()).unwrap();

        let err = f.settle(f.on_ramper, &evidence, t0()).unwrap_err();
        assert!(matches!(err, RampError::IntentNotFound(_)));
    }

    #[test]
    fn payment_cannot_settle_two_intents() {
        let mut f = Fixture::new(Decimal::ZERO);
        let id = f.deposit(100);
        let first = f.signal(id, 10);
        let evidence = f.evidence(&first, 10);
        f.settle(f.depositor, &evidence, t0()).unwrap();

        let second = f.signal(id, 10);
        let mut reused = f.evidence(&second, 10);
        reused.claim.payment_id = evidence.claim.payment_id.clone();
        let err = f.settle(f.depositor, &reused, t0()).unwrap_err();
        assert!(matches!(err, RampError::EvidenceReplayed));
        assert!(f.intents.get(&second.hash).is_some());
    }

    #[test]
    fn payment_mismatches_rejected() {
        let mut f = Fixture::new(Decimal::ZERO);
        let id = f.deposit(100);
        let intent = f.signal(id, 50);
        let now = t0() + Duration::seconds(10);

        let mut e = f.evidence(&intent, 49);
        assert!(matches!(
            f.settle(f.on_ramper, &e, now).unwrap_err(),
            RampError::PaymentNotEnough { .. }
        ));

        e = f.evidence(&intent, 50);
        e.claim.currency = "EUR".into();
        assert!(matches!(
            f.settle(f.on_ramper, &e, now).unwrap_err(),
            RampError::WrongCurrency { .. }
        ));

        e = f.evidence(&intent, 50);
        e.claim.payee_destination_tag = DestinationTag::new("someone-else");
        assert!(matches!(
            f.settle(f.on_ramper, &e, now).unwrap_err(),
            RampError::PayeeMismatch
        ));

        e = f.evidence(&intent, 50);
        e.claim.payer_identity = IdentityHash::from_account_id("bob");
        assert!(matches!(
            f.settle(f.on_ramper, &e, now).unwrap_err(),
            RampError::PayerMismatch
        ));

        e = f.evidence(&intent, 50);
        e.claim.payment_timestamp = t0() - Duration::seconds(1);
        assert!(matches!(
            f.settle(f.on_ramper, &e, now).unwrap_err(),
            RampError::PaymentPredatesIntent
        ));

        e = f.evidence(&intent, 50);
        e.proof = REJECTED_PROOF.to_vec();
        assert!(matches!(
            f.settle(f.on_ramper, &e, now).unwrap_err(),
            RampError::ProofRejected { .. }
        ));

        // Nothing moved.
        assert!(f.intents.get(&intent.hash).is_some());
        assert_eq!(f.custody.custody_balance(), d(100));
        assert!(f.processor.nullifiers().is_empty());
    }

    #[test]
    fn stranger_cannot_settle() {
        let mut f = Fixture::new(Decimal::ZERO);
        let id = f.deposit(100);
        let intent = f.signal(id, 50);
        let evidence = f.evidence(&intent, 50);
        assert!(matches!(
            f.settle(Address::random(), &evidence, t0()).unwrap_err(),
            RampError::NotSettlementParty
        ));
    }

    #[test]
    fn cooldown_applies_to_on_ramper_only() {
        let mut f = Fixture::new(Decimal::ZERO);
        let id = f.deposit(100);
        let first = f.signal(id, 10);
        let e1 = f.evidence(&first, 10);
        f.settle(f.on_ramper, &e1, t0()).unwrap();

        let second = f.signal(id, 10);
        let e2 = f.evidence(&second, 10);
        let err = f
            .settle(f.on_ramper, &e2, t0() + Duration::seconds(179))
            .unwrap_err();
        let cooldown = f.config.on_ramp_cooldown_period();
        assert!(matches!(err, RampError::CooldownActive { retry_at } if retry_at == t0() + cooldown));
        assert!(err.is_retryable());

        // The depositor is exempt.
        let s = f
            .settle(f.depositor, &e2, t0() + Duration::seconds(1))
            .unwrap();
        assert_eq!(s.initiator, Initiator::Depositor);
    }

    #[test]
    fn cooldown_elapses() {
        let mut f = Fixture::new(Decimal::ZERO);
        let id = f.deposit(100);
        let first = f.signal(id, 10);
        let e1 = f.evidence(&first, 10);
        f.settle(f.on_ramper, &e1, t0()).unwrap();

        let second = f.signal(id, 10);
        let e2 = f.evidence(&second, 10);
        let at = t0() + f.config.on_ramp_cooldown_period();
        assert!(f.settle(f.on_ramper, &e2, at).is_ok());
        let identity = f.registry.identity_of(f.on_ramper).unwrap();
        assert_eq!(f.processor.last_settle_of(&identity), Some(at));
    }

    #[test]
    fn unconvertible_payment_is_rejected_without_change() {
        let mut f = Fixture::new(Decimal::ZERO);
        let id = f.deposit(100);
        let intent = f.signal(id, 50);
        if let Some(deposit) = f.deposits.get_mut(id) {
            deposit.conversion_rate = Decimal::TWO;
        }
        let mut e = f.evidence(&intent, 50);
        e.claim.paid_amount = Decimal::MAX;

        let err = f.settle(f.on_ramper, &e, t0()).unwrap_err();
        assert!(matches!(err, RampError::InvalidParameter { .. }));
        assert!(f.intents.get(&intent.hash).is_some());
        assert_eq!(f.custody.custody_balance(), d(100));
        assert!(f.processor.nullifiers().is_empty());
    }

    #[test]
    fn unrepresentable_cooldown_blocks_instead_of_overflowing() {
        let mut f = Fixture::new(Decimal::ZERO);
        f.config.on_ramp_cooldown_secs = u64::MAX;
        let id = f.deposit(100);
        let first = f.signal(id, 10);
        let e1 = f.evidence(&first, 10);
        f.settle(f.on_ramper, &e1, t0()).unwrap();

        let second = f.signal(id, 10);
        let e2 = f.evidence(&second, 10);
        let err = f
            .settle(f.on_ramper, &e2, t0() + Duration::days(1))
            .unwrap_err();
        assert!(matches!(err, RampError::CooldownActive { .. }));
        assert!(f.intents.get(&second.hash).is_some());
    }

    #[test]
    fn failed_transfer_leaves_everything_untouched() {
        let mut f = Fixture::new(Decimal::new(1, 2));
        let id = f.deposit(100);
        let intent = f.signal(id, 50);
        let evidence = f.evidence(&intent, 50);
        let before = f.deposits.get(id).unwrap().clone();

        f.custody.fail_next_disbursement("bank offline");
        let err = f.settle(f.on_ramper, &evidence, t0()).unwrap_err();
        assert!(matches!(err, RampError::TransferFailed { .. }));
        assert_eq!(f.deposits.get(id).unwrap(), &before);
        assert!(f.intents.get(&intent.hash).is_some());
        assert!(f.processor.nullifiers().is_empty());
        let identity = f.registry.identity_of(f.on_ramper).unwrap();
        assert!(f.processor.last_settle_of(&identity).is_none());

        // The same evidence succeeds once the rail is back.
        assert!(f.settle(f.on_ramper, &evidence, t0()).is_ok());
    }

    #[test]
    fn release_is_depositor_only() {
        let mut f = Fixture::new(Decimal::ZERO);
        let id = f.deposit(100);
        let intent = f.signal(id, 40);

        let parts = LedgerParts {
            config: &f.config,
            registry: &f.registry,
            deposits: &mut f.deposits,
            intents: &mut f.intents,
            custody: &mut f.custody,
        };
        let err = f
            .processor
            .release_to_on_ramper(parts, f.on_ramper, intent.hash, t0())
            .unwrap_err();
        assert!(matches!(err, RampError::NotDepositor(_)));

        let parts = LedgerParts {
            config: &f.config,
            registry: &f.registry,
            deposits: &mut f.deposits,
            intents: &mut f.intents,
            custody: &mut f.custody,
        };
        let s = f
            .processor
            .release_to_on_ramper(parts, f.depositor, intent.hash, t0())
            .unwrap();
        assert_eq!(s.initiator, Initiator::Depositor);
        assert_eq!(f.custody.balance(f.destination), d(40));
        assert_eq!(f.deposits.get(id).unwrap().remaining_deposits, d(60));
    }
}
