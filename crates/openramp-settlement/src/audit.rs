//! Liquidity conservation audit.
//!
//! Invariants checked over the whole ledger:
//! ```text
//! ∀ deposit: remaining + outstanding <= deposit_amount
//! ∀ deposit: outstanding == Σ amount(intent) for intent in intent_hashes
//! ∀ intent:  its deposit exists and lists it exactly once
//! ∀ identity: at most one live intent, and the pointer names it
//! custody == Σ (remaining + outstanding)
//! ```
//!
//! Any violation means value was created or lost; the ledger must be halted.

use std::collections::HashMap;

use openramp_ledger::{DepositLedger, IntentManager};
use openramp_types::{IdentityHash, RampError, Result};
use rust_decimal::Decimal;
use serde::Serialize;

/// Totals observed by a successful audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub deposits: usize,
    pub intents: usize,
    pub remaining_total: Decimal,
    pub outstanding_total: Decimal,
    /// Custody balance, when one was supplied.
    pub custody: Option<Decimal>,
}

impl AuditReport {
    /// Value the ledger owes to depositors and on-rampers.
    #[must_use]
    pub fn liabilities(&self) -> Decimal {
        self.remaining_total + self.outstanding_total
    }

    /// # Errors
    /// Returns `Serialization` if the report cannot be encoded.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Stateless conservation checker.
pub struct LiquidityAudit;

impl LiquidityAudit {
    /// Check every invariant. `custody` is the value actually held in
    /// custody, if the transfer backend can report it.
    ///
    /// # Errors
    /// Returns [`RampError::InvariantViolation`] naming the first broken
    /// invariant.
    pub fn check(
        deposits: &DepositLedger,
        intents: &IntentManager,
        custody: Option<Decimal>,
    ) -> Result<AuditReport> {
        let mut report = AuditReport {
            custody,
            ..AuditReport::default()
        };

        for deposit in deposits.iter() {
            deposit.check_counters()?;
            let mut listed = Decimal::ZERO;
            for hash in &deposit.intent_hashes {
                let intent = intents.get(hash).ok_or_else(|| violation(format!(
                    "{} lists unknown {hash}",
                    deposit.id
                )))?;
                if intent.deposit_id != deposit.id {
                    return Err(violation(format!(
                        "{hash} belongs to {} but is listed on {}",
                        intent.deposit_id, deposit.id
                    )));
                }
                listed += intent.amount;
            }
            if listed != deposit.outstanding_intent_amount {
                return Err(violation(format!(
                    "{}: outstanding {} != listed intents {listed}",
                    deposit.id, deposit.outstanding_intent_amount
                )));
            }
            report.deposits += 1;
            report.remaining_total += deposit.remaining_deposits;
            report.outstanding_total += deposit.outstanding_intent_amount;
        }

        let mut per_identity: HashMap<IdentityHash, usize> = HashMap::new();
        for intent in intents.iter() {
            let deposit = deposits
                .get(intent.deposit_id)
                .ok_or_else(|| violation(format!("{} points at missing {}", intent.hash, intent.deposit_id)))?;
            let occurrences = deposit
                .intent_hashes
                .iter()
                .filter(|h| **h == intent.hash)
                .count();
            if occurrences != 1 {
                return Err(violation(format!(
                    "{} listed {occurrences} times on {}",
                    intent.hash, deposit.id
                )));
            }
            *per_identity.entry(intent.on_ramper_identity).or_default() += 1;
            report.intents += 1;
        }

        if let Some((identity, count)) = per_identity.iter().find(|(_, count)| **count > 1) {
            return Err(violation(format!("{identity} holds {count} live intents")));
        }
        let mut pointers = 0;
        for (identity, hash) in intents.identity_pointers() {
            match intents.get(hash) {
                Some(intent) if intent.on_ramper_identity == *identity => pointers += 1,
                _ => {
                    return Err(violation(format!(
                        "pointer of {identity} names dead or foreign {hash}"
                    )));
                }
            }
        }
        if pointers != report.intents {
            return Err(violation(format!(
                "{} live intents but {pointers} identity pointers",
                report.intents
            )));
        }

        if let Some(held) = custody {
            if held != report.liabilities() {
                return Err(violation(format!(
                    "custody holds {held}, ledger owes {}",
                    report.liabilities()
                )));
            }
        }

        tracing::debug!(
            deposits = report.deposits,
            intents = report.intents,
            remaining = %report.remaining_total,
            outstanding = %report.outstanding_total,
            "liquidity audit passed"
        );
        Ok(report)
    }
}

fn violation(reason: String) -> RampError {
    tracing::error!(%reason, "liquidity invariant violated");
    RampError::InvariantViolation { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use openramp_ledger::{AccountRegistry, CustodyBook, DenylistGuard, SignalRequest};
    use openramp_types::testing::{StaticIdentityVerifier, credential};
    use openramp_types::{Address, DepositRequest, DestinationTag, RampConfig};

    fn d(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn empty_ledger_passes() {
        let report =
            LiquidityAudit::check(&DepositLedger::new(), &IntentManager::new(), Some(Decimal::ZERO))
                .unwrap();
        assert_eq!(report, AuditReport {
            custody: Some(Decimal::ZERO),
            ..AuditReport::default()
        });
    }

    #[test]
    fn live_ledger_balances_custody() {
        let config = RampConfig::with_owner(Address::random());
        let mut registry = AccountRegistry::new(Box::new(StaticIdentityVerifier));
        let depositor = Address::random();
        let alice = Address::random();
        registry
            .register(depositor, &credential(depositor, "depositor"))
            .unwrap();
        registry.register(alice, &credential(alice, "alice")).unwrap();
        let mut custody = CustodyBook::new();
        custody.credit(depositor, d(500));

        let mut deposits = DepositLedger::new();
        let mut intents = IntentManager::new();
        let id = deposits
            .create_deposit(
                &config,
                &registry,
                &mut custody,
                depositor,
                DepositRequest {
                    destination_tag: DestinationTag::new("tag"),
                    currency: "USD".into(),
                    deposit_amount: d(300),
                    receive_amount: d(300),
                },
                t0(),
            )
            .unwrap()
            .id;
        intents
            .signal_intent(
                &mut deposits,
                &registry,
                &DenylistGuard::new(),
                &config,
                SignalRequest {
                    caller: alice,
                    deposit_id: id,
                    amount: d(120),
                    destination: alice,
                },
                t0(),
            )
            .unwrap();

        let report =
            LiquidityAudit::check(&deposits, &intents, Some(custody.custody_balance())).unwrap();
        assert_eq!(report.deposits, 1);
        assert_eq!(report.intents, 1);
        assert_eq!(report.remaining_total, d(180));
        assert_eq!(report.outstanding_total, d(120));
        assert_eq!(report.liabilities(), d(300));
        assert!(report.to_json().unwrap().contains("\"intents\":1"));

        // Custody out of step with the ledger.
        let err = LiquidityAudit::check(&deposits, &intents, Some(d(299))).unwrap_err();
        assert!(matches!(err, RampError::InvariantViolation { .. }));

        // A counter drifting from its intents.
        if let Some(deposit) = deposits.get_mut(id) {
            deposit.outstanding_intent_amount = d(100);
        }
        let err = LiquidityAudit::check(&deposits, &intents, None).unwrap_err();
        assert!(matches!(err, RampError::InvariantViolation { .. }));
    }
}
