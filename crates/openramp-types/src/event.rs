//! Lifecycle notifications emitted by the ledger.
//!
//! Events are best effort: sinks observe them after the state change is
//! committed, and nothing in the ledger depends on their delivery.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{Address, DepositId, DestinationTag, IdentityHash, IntentHash, PruneReason};

/// A ledger lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LedgerEvent {
    AccountRegistered {
        caller: Address,
        identity: IdentityHash,
    },
    DestinationTagBound {
        identity: IdentityHash,
        destination_tag: DestinationTag,
    },
    DepositReceived {
        deposit_id: DepositId,
        depositor: Address,
        amount: Decimal,
        conversion_rate: Decimal,
    },
    DepositWithdrawn {
        deposit_id: DepositId,
        depositor: Address,
        amount: Decimal,
    },
    DepositClosed {
        deposit_id: DepositId,
        depositor: Address,
    },
    IntentSignaled {
        intent_hash: IntentHash,
        deposit_id: DepositId,
        on_ramper_identity: IdentityHash,
        destination: Address,
        amount: Decimal,
        created_at: DateTime<Utc>,
    },
    IntentPruned {
        intent_hash: IntentHash,
        deposit_id: DepositId,
        reason: PruneReason,
    },
    IntentFulfilled {
        intent_hash: IntentHash,
        deposit_id: DepositId,
        on_ramper: Address,
        destination: Address,
        amount: Decimal,
        fee: Decimal,
    },
    UserDenied {
        depositor_identity: IdentityHash,
        identity: IdentityHash,
    },
    UserUndenied {
        depositor_identity: IdentityHash,
        identity: IdentityHash,
    },
    AllowlistEnabled {
        depositor_identity: IdentityHash,
    },
    UserAllowed {
        depositor_identity: IdentityHash,
        identity: IdentityHash,
    },
    UserDisallowed {
        depositor_identity: IdentityHash,
        identity: IdentityHash,
    },
    ParameterUpdated {
        name: &'static str,
        value: String,
    },
    Paused,
    Unpaused,
}

impl LedgerEvent {
    /// Stable SCREAMING_CASE name, used as the log message for each event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AccountRegistered { .. } => "ACCOUNT_REGISTERED",
            Self::DestinationTagBound { .. } => "DESTINATION_TAG_BOUND",
            Self::DepositReceived { .. } => "DEPOSIT_RECEIVED",
            Self::DepositWithdrawn { .. } => "DEPOSIT_WITHDRAWN",
            Self::DepositClosed { .. } => "DEPOSIT_CLOSED",
            Self::IntentSignaled { .. } => "INTENT_SIGNALED",
            Self::IntentPruned { .. } => "INTENT_PRUNED",
            Self::IntentFulfilled { .. } => "INTENT_FULFILLED",
            Self::UserDenied { .. } => "USER_DENIED",
            Self::UserUndenied { .. } => "USER_UNDENIED",
            Self::AllowlistEnabled { .. } => "ALLOWLIST_ENABLED",
            Self::UserAllowed { .. } => "USER_ALLOWED",
            Self::UserDisallowed { .. } => "USER_DISALLOWED",
            Self::ParameterUpdated { .. } => "PARAMETER_UPDATED",
            Self::Paused => "PAUSED",
            Self::Unpaused => "UNPAUSED",
        }
    }
}

impl std::fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
