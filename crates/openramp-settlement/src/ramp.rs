//! The `Ramp` facade: one authoritative store, one entry point per operation.
//!
//! Every public `&mut self` method is a complete transaction: the pause
//! switch is checked first, every validation and plan runs before the first
//! mutation, the custody transfer happens before the ledger commits, and
//! events are emitted only after the commit. Any error leaves the store as
//! it was.
//!
//! Administrative calls are owner-gated and stay available while paused.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use openramp_ledger::{
    AccountRegistry, CustodyBook, DenylistGuard, DepositLedger, IntentManager, PauseSwitch,
    SignalRequest,
};
use openramp_types::{
    Address, Clock, Deposit, DepositId, DepositRequest, DepositView, DestinationTag,
    IdentityCredential, IdentityHash, IdentityProofVerifier, Intent, IntentHash,
    IntentWithIdentity, LedgerEvent, NotificationSink, PaymentClaim, PaymentEvidence,
    PaymentEvidenceVerifier, PruneReason, RampConfig, RampError, Result, SystemClock, TracingSink,
    ValueTransfer, check_cooldown, check_expiration, check_fee, check_fee_recipient,
    check_max_on_ramp, check_min_deposit,
};
use rust_decimal::Decimal;

use crate::audit::{AuditReport, LiquidityAudit};
use crate::nullifier::Nullifier;
use crate::processor::{LedgerParts, Settlement, SettlementProcessor};

/// An escrow ramp ledger.
pub struct Ramp<V: ValueTransfer = CustodyBook> {
    config: RampConfig,
    pause: PauseSwitch,
    registry: AccountRegistry,
    guard: DenylistGuard,
    deposits: DepositLedger,
    intents: IntentManager,
    processor: SettlementProcessor,
    custody: V,
    notifier: Box<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl<V: ValueTransfer> Ramp<V> {
    /// Build a ledger over `custody`.
    ///
    /// Events go to [`TracingSink`] and time comes from [`SystemClock`]
    /// unless replaced with [`with_notifier`](Self::with_notifier) and
    /// [`with_clock`](Self::with_clock).
    ///
    /// # Errors
    /// Returns the first bound violated by `config`.
    pub fn new(
        config: RampConfig,
        identity_verifier: Box<dyn IdentityProofVerifier>,
        payment_verifier: Box<dyn PaymentEvidenceVerifier>,
        custody: V,
    ) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            engine = openramp_types::constants::ENGINE_NAME,
            version = openramp_types::constants::VERSION,
            owner = %config.owner,
            "ramp ledger initialized"
        );
        Ok(Self {
            config,
            pause: PauseSwitch::new(),
            registry: AccountRegistry::new(identity_verifier),
            guard: DenylistGuard::new(),
            deposits: DepositLedger::new(),
            intents: IntentManager::new(),
            processor: SettlementProcessor::new(payment_verifier),
            custody,
            notifier: Box::new(TracingSink),
            clock: Arc::new(SystemClock),
        })
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    /// Bind `caller` to the identity proven by `credential`.
    pub fn register(
        &mut self,
        caller: Address,
        credential: &IdentityCredential,
    ) -> Result<IdentityHash> {
        self.pause.check()?;
        let registration = self.registry.register(caller, credential)?;
        if registration.newly_bound {
            self.emit(LedgerEvent::AccountRegistered {
                caller,
                identity: registration.identity,
            });
        }
        Ok(registration.identity)
    }

    /// Bind the destination tag carried by `credential` to the caller's identity.
    pub fn register_off_ramper(
        &mut self,
        caller: Address,
        credential: &IdentityCredential,
    ) -> Result<DestinationTag> {
        self.pause.check()?;
        let (identity, tag) = self.registry.register_off_ramper(caller, credential)?;
        self.emit(LedgerEvent::DestinationTagBound {
            identity,
            destination_tag: tag.clone(),
        });
        Ok(tag)
    }

    // -----------------------------------------------------------------------
    // Deposits
    // -----------------------------------------------------------------------

    /// Escrow a new deposit funded by `caller`.
    pub fn create_deposit(&mut self, caller: Address, request: DepositRequest) -> Result<DepositId> {
        self.pause.check()?;
        let now = self.clock.now();
        let deposit = self.deposits.create_deposit(
            &self.config,
            &self.registry,
            &mut self.custody,
            caller,
            request,
            now,
        )?;
        let event = LedgerEvent::DepositReceived {
            deposit_id: deposit.id,
            depositor: deposit.depositor,
            amount: deposit.deposit_amount,
            conversion_rate: deposit.conversion_rate,
        };
        let id = deposit.id;
        self.emit(event);
        Ok(id)
    }

    /// Return the free liquidity of `ids` to `caller`. Returns the total paid.
    pub fn withdraw_deposit(&mut self, caller: Address, ids: &[DepositId]) -> Result<Decimal> {
        self.pause.check()?;
        let now = self.clock.now();
        let period = self.config.intent_expiration_period();
        let outcome = self.deposits.withdraw(
            &mut self.intents,
            &mut self.custody,
            caller,
            ids,
            now,
            period,
        )?;

        for intent in &outcome.pruned {
            self.emit_pruned(intent, PruneReason::Expired);
        }
        for withdrawal in &outcome.withdrawals {
            if withdrawal.amount > Decimal::ZERO {
                self.emit(LedgerEvent::DepositWithdrawn {
                    deposit_id: withdrawal.deposit_id,
                    depositor: caller,
                    amount: withdrawal.amount,
                });
            }
            if withdrawal.closed {
                self.emit(LedgerEvent::DepositClosed {
                    deposit_id: withdrawal.deposit_id,
                    depositor: caller,
                });
            }
        }
        Ok(outcome.total)
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Reserve `amount` of a deposit's liquidity for the caller's identity.
    pub fn signal_intent(
        &mut self,
        caller: Address,
        deposit_id: DepositId,
        amount: Decimal,
        destination: Address,
    ) -> Result<IntentHash> {
        self.pause.check()?;
        let now = self.clock.now();
        let outcome = self.intents.signal_intent(
            &mut self.deposits,
            &self.registry,
            &self.guard,
            &self.config,
            SignalRequest {
                caller,
                deposit_id,
                amount,
                destination,
            },
            now,
        )?;

        for intent in &outcome.pruned {
            self.emit_pruned(intent, PruneReason::Expired);
        }
        let intent = outcome.intent;
        self.emit(LedgerEvent::IntentSignaled {
            intent_hash: intent.hash,
            deposit_id: intent.deposit_id,
            on_ramper_identity: intent.on_ramper_identity,
            destination: intent.destination,
            amount: intent.amount,
            created_at: intent.created_at,
        });
        Ok(intent.hash)
    }

    /// Cancel the caller's intent and return its liquidity to the deposit.
    pub fn cancel_intent(&mut self, caller: Address, hash: IntentHash) -> Result<()> {
        self.pause.check()?;
        let intent = self
            .intents
            .cancel_intent(&mut self.deposits, &self.registry, caller, hash)?;
        self.emit_pruned(&intent, PruneReason::Cancelled);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// Settle an intent against verified payment evidence.
    pub fn settle(&mut self, caller: Address, evidence: &PaymentEvidence) -> Result<Settlement> {
        self.pause.check()?;
        let now = self.clock.now();
        let parts = LedgerParts {
            config: &self.config,
            registry: &self.registry,
            deposits: &mut self.deposits,
            intents: &mut self.intents,
            custody: &mut self.custody,
        };
        let settlement = self.processor.settle(parts, caller, evidence, now)?;
        self.emit_settlement(&settlement);
        Ok(settlement)
    }

    /// Depositor-initiated payout of an intent without payment evidence.
    pub fn release_to_on_ramper(&mut self, caller: Address, hash: IntentHash) -> Result<Settlement> {
        self.pause.check()?;
        let now = self.clock.now();
        let parts = LedgerParts {
            config: &self.config,
            registry: &self.registry,
            deposits: &mut self.deposits,
            intents: &mut self.intents,
            custody: &mut self.custody,
        };
        let settlement = self
            .processor
            .release_to_on_ramper(parts, caller, hash, now)?;
        self.emit_settlement(&settlement);
        Ok(settlement)
    }

    // -----------------------------------------------------------------------
    // Access lists (keyed by the caller's identity as depositor)
    // -----------------------------------------------------------------------

    pub fn add_to_denylist(&mut self, caller: Address, identity: IdentityHash) -> Result<()> {
        self.pause.check()?;
        let depositor_identity = self.registry.require_identity(caller)?;
        self.guard.add_to_denylist(depositor_identity, identity)?;
        self.emit(LedgerEvent::UserDenied {
            depositor_identity,
            identity,
        });
        Ok(())
    }

    pub fn remove_from_denylist(&mut self, caller: Address, identity: IdentityHash) -> Result<()> {
        self.pause.check()?;
        let depositor_identity = self.registry.require_identity(caller)?;
        self.guard.remove_from_denylist(depositor_identity, identity)?;
        self.emit(LedgerEvent::UserUndenied {
            depositor_identity,
            identity,
        });
        Ok(())
    }

    /// Accept intents only from allowlisted identities from now on.
    pub fn enable_allowlist(&mut self, caller: Address) -> Result<()> {
        self.pause.check()?;
        let depositor_identity = self.registry.require_identity(caller)?;
        self.guard.enable_allowlist(depositor_identity)?;
        self.emit(LedgerEvent::AllowlistEnabled { depositor_identity });
        Ok(())
    }

    pub fn add_to_allowlist(&mut self, caller: Address, identities: &[IdentityHash]) -> Result<()> {
        self.pause.check()?;
        let depositor_identity = self.registry.require_identity(caller)?;
        self.guard.add_to_allowlist(depositor_identity, identities)?;
        for identity in identities {
            self.emit(LedgerEvent::UserAllowed {
                depositor_identity,
                identity: *identity,
            });
        }
        Ok(())
    }

    pub fn remove_from_allowlist(
        &mut self,
        caller: Address,
        identities: &[IdentityHash],
    ) -> Result<()> {
        self.pause.check()?;
        let depositor_identity = self.registry.require_identity(caller)?;
        self.guard
            .remove_from_allowlist(depositor_identity, identities)?;
        for identity in identities {
            self.emit(LedgerEvent::UserDisallowed {
                depositor_identity,
                identity: *identity,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Administration (owner only)
    // -----------------------------------------------------------------------

    pub fn set_min_deposit_amount(&mut self, caller: Address, amount: Decimal) -> Result<()> {
        self.require_owner(caller)?;
        check_min_deposit(amount)?;
        self.config.min_deposit_amount = amount;
        self.parameter_updated("min_deposit_amount", amount);
        Ok(())
    }

    pub fn set_max_on_ramp_amount(&mut self, caller: Address, amount: Decimal) -> Result<()> {
        self.require_owner(caller)?;
        check_max_on_ramp(amount)?;
        self.config.max_on_ramp_amount = Some(amount);
        self.parameter_updated("max_on_ramp_amount", amount);
        Ok(())
    }

    pub fn set_intent_expiration_period(&mut self, caller: Address, secs: u64) -> Result<()> {
        self.require_owner(caller)?;
        check_expiration(secs)?;
        self.config.intent_expiration_secs = secs;
        self.parameter_updated("intent_expiration_secs", secs);
        Ok(())
    }

    /// Zero disables the cooldown.
    pub fn set_on_ramp_cooldown_period(&mut self, caller: Address, secs: u64) -> Result<()> {
        self.require_owner(caller)?;
        check_cooldown(secs)?;
        self.config.on_ramp_cooldown_secs = secs;
        self.parameter_updated("on_ramp_cooldown_secs", secs);
        Ok(())
    }

    pub fn set_sustainability_fee(&mut self, caller: Address, fee: Decimal) -> Result<()> {
        self.require_owner(caller)?;
        check_fee(fee)?;
        self.config.sustainability_fee = fee;
        self.parameter_updated("sustainability_fee", fee);
        Ok(())
    }

    pub fn set_fee_recipient(&mut self, caller: Address, recipient: Address) -> Result<()> {
        self.require_owner(caller)?;
        check_fee_recipient(recipient)?;
        self.config.fee_recipient = recipient;
        self.parameter_updated("fee_recipient", recipient);
        Ok(())
    }

    pub fn set_identity_verifier(
        &mut self,
        caller: Address,
        verifier: Box<dyn IdentityProofVerifier>,
    ) -> Result<()> {
        self.require_owner(caller)?;
        self.registry.set_verifier(verifier);
        self.parameter_updated("identity_verifier", "replaced");
        Ok(())
    }

    pub fn set_payment_verifier(
        &mut self,
        caller: Address,
        verifier: Box<dyn PaymentEvidenceVerifier>,
    ) -> Result<()> {
        self.require_owner(caller)?;
        self.processor.set_verifier(verifier);
        self.parameter_updated("payment_verifier", "replaced");
        Ok(())
    }

    pub fn pause(&mut self, caller: Address) -> Result<()> {
        self.require_owner(caller)?;
        if self.pause.pause() {
            tracing::warn!(%caller, "ramp paused");
            self.emit(LedgerEvent::Paused);
        }
        Ok(())
    }

    pub fn unpause(&mut self, caller: Address) -> Result<()> {
        self.require_owner(caller)?;
        if self.pause.unpause() {
            tracing::info!(%caller, "ramp unpaused");
            self.emit(LedgerEvent::Unpaused);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &RampConfig {
        &self.config
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub fn identity_of(&self, caller: Address) -> Option<IdentityHash> {
        self.registry.identity_of(caller)
    }

    #[must_use]
    pub fn is_registered(&self, caller: Address) -> bool {
        self.registry.is_registered(caller)
    }

    #[must_use]
    pub fn destination_tag_of(&self, identity: &IdentityHash) -> Option<&DestinationTag> {
        self.registry.destination_tag_of(identity)
    }

    #[must_use]
    pub fn deposit(&self, id: DepositId) -> Option<&Deposit> {
        self.deposits.get(id)
    }

    /// Open deposits of the caller's identity with their available liquidity.
    #[must_use]
    pub fn account_deposits(&self, caller: Address) -> Vec<DepositView> {
        let Some(identity) = self.registry.identity_of(caller) else {
            return Vec::new();
        };
        self.deposits
            .account_deposits(&self.intents, &identity, self.clock.now(), self.period())
    }

    #[must_use]
    pub fn deposits_from_ids(&self, ids: &[DepositId]) -> Vec<DepositView> {
        self.deposits
            .deposits_from_ids(&self.intents, ids, self.clock.now(), self.period())
    }

    #[must_use]
    pub fn intent(&self, hash: &IntentHash) -> Option<&Intent> {
        self.intents.get(hash)
    }

    /// The live intent of the caller's identity.
    #[must_use]
    pub fn current_intent_of(&self, caller: Address) -> Option<&Intent> {
        let identity = self.registry.identity_of(caller)?;
        self.intents.current_intent_of(&identity)
    }

    #[must_use]
    pub fn intents_with_identity(&self, hashes: &[IntentHash]) -> Vec<IntentWithIdentity> {
        self.intents.intents_with_identity(hashes)
    }

    /// Whether the intent has passed its expiry, pruned or not.
    #[must_use]
    pub fn is_intent_expired(&self, intent: &Intent) -> bool {
        intent.is_expired(self.clock.now(), self.period())
    }

    /// Identities denied by the depositor identity of `depositor`.
    #[must_use]
    pub fn denied_users(&self, depositor: Address) -> Vec<IdentityHash> {
        self.registry
            .identity_of(depositor)
            .map(|identity| self.guard.denied_users(&identity))
            .unwrap_or_default()
    }

    /// Identities allowlisted by the depositor identity of `depositor`.
    #[must_use]
    pub fn allowed_users(&self, depositor: Address) -> Vec<IdentityHash> {
        self.registry
            .identity_of(depositor)
            .map(|identity| self.guard.allowed_users(&identity))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn last_settle_of(&self, identity: &IdentityHash) -> Option<DateTime<Utc>> {
        self.processor.last_settle_of(identity)
    }

    /// Whether the payment has already settled an intent.
    #[must_use]
    pub fn is_payment_nullified(&self, payment: &PaymentClaim) -> bool {
        self.processor
            .nullifiers()
            .is_spent(&Nullifier::of(payment))
    }

    #[must_use]
    pub fn custody(&self) -> &V {
        &self.custody
    }

    /// Direct access to the transfer backend, e.g. to fund accounts.
    pub fn custody_mut(&mut self) -> &mut V {
        &mut self.custody
    }

    /// Conservation audit of the ledger alone.
    pub fn audit_ledger(&self) -> Result<AuditReport> {
        LiquidityAudit::check(&self.deposits, &self.intents, None)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn period(&self) -> Duration {
        self.config.intent_expiration_period()
    }

    fn require_owner(&self, caller: Address) -> Result<()> {
        if caller != self.config.owner {
            return Err(RampError::NotOwner);
        }
        Ok(())
    }

    fn parameter_updated(&mut self, name: &'static str, value: impl ToString) {
        let value = value.to_string();
        tracing::info!(parameter = name, %value, "parameter updated");
        self.emit(LedgerEvent::ParameterUpdated { name, value });
    }

    fn emit_pruned(&mut self, intent: &Intent, reason: PruneReason) {
        self.emit(LedgerEvent::IntentPruned {
            intent_hash: intent.hash,
            deposit_id: intent.deposit_id,
            reason,
        });
    }

    fn emit_settlement(&mut self, settlement: &Settlement) {
        let intent = &settlement.intent;
        self.emit(LedgerEvent::IntentFulfilled {
            intent_hash: intent.hash,
            deposit_id: intent.deposit_id,
            on_ramper: intent.on_ramper,
            destination: intent.destination,
            amount: settlement.net_amount,
            fee: settlement.fee,
        });
        if settlement.deposit_closed {
            self.emit(LedgerEvent::DepositClosed {
                deposit_id: intent.deposit_id,
                depositor: settlement.depositor,
            });
        }
    }

    fn emit(&mut self, event: LedgerEvent) {
        self.notifier.emit(&event);
    }
}

impl Ramp<CustodyBook> {
    /// Conservation audit including the custody balance.
    pub fn audit(&self) -> Result<AuditReport> {
        LiquidityAudit::check(
            &self.deposits,
            &self.intents,
            Some(self.custody.custody_balance()),
        )
    }
}
