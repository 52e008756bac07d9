//! Error types for the OpenRamp escrow ledger.
//!
//! All errors use the `OR_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by kind:
//! - 1xx: Validation (malformed input, rejected before touching state)
//! - 2xx: Authorization (wrong caller, unregistered, denylisted)
//! - 3xx: State conflict (missing deposit/intent, duplicate intent)
//! - 4xx: Liquidity
//! - 5xx: Proof rejected by an external verifier
//! - 6xx: Cooldown (the only retryable kind)
//! - 7xx: Paused
//! - 8xx: Value transfer failures
//! - 9xx: General / internal errors

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{Address, DepositId, IdentityHash, IntentHash};

/// Coarse classification of a [`RampError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Authorization,
    StateConflict,
    Liquidity,
    ProofRejected,
    Cooldown,
    Paused,
    Transfer,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::StateConflict => write!(f, "STATE_CONFLICT"),
            Self::Liquidity => write!(f, "LIQUIDITY"),
            Self::ProofRejected => write!(f, "PROOF_REJECTED"),
            Self::Cooldown => write!(f, "COOLDOWN"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Transfer => write!(f, "TRANSFER"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Central error enum for all OpenRamp operations.
#[derive(Debug, Error)]
pub enum RampError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// An amount was zero or negative where a positive value is required.
    #[error("OR_ERR_100: {field} must be greater than 0")]
    NonPositiveAmount { field: &'static str },

    /// The zero address was supplied where a real address is required.
    #[error("OR_ERR_101: {field} cannot be the zero address")]
    ZeroAddress { field: &'static str },

    /// Deposit smaller than the configured minimum.
    #[error("OR_ERR_102: Deposit amount {amount} is below the minimum {minimum}")]
    BelowMinimumDeposit { amount: Decimal, minimum: Decimal },

    /// Intent larger than the configured on-ramp ceiling.
    #[error("OR_ERR_103: Signaled amount {amount} exceeds the max on-ramp amount {maximum}")]
    AboveMaxOnRamp { amount: Decimal, maximum: Decimal },

    /// The payment evidence was in a different currency than the deposit.
    #[error("OR_ERR_104: Wrong currency sent: expected {expected}, got {actual}")]
    WrongCurrency { expected: String, actual: String },

    /// The payment evidence names a different payee than the deposit.
    #[error("OR_ERR_105: Payee destination tag does not match the deposit")]
    PayeeMismatch,

    /// The payment evidence names a different payer than the intent.
    #[error("OR_ERR_106: Payer identity does not match the intent")]
    PayerMismatch,

    /// The converted payment does not cover the reserved amount.
    #[error("OR_ERR_107: Payment was not enough: covers {covered}, need {required}")]
    PaymentNotEnough { covered: Decimal, required: Decimal },

    /// The payment is dated before the intent was created.
    #[error("OR_ERR_108: Intent was not created before the payment was sent")]
    PaymentPredatesIntent,

    /// A credential that must carry a destination tag did not.
    #[error("OR_ERR_109: Credential does not carry a destination tag")]
    MissingDestinationTag,

    /// An administrative parameter is out of bounds.
    #[error("OR_ERR_110: Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    /// Sustainability fee above the hard maximum.
    #[error("OR_ERR_111: Fee {fee} cannot be greater than max fee {maximum}")]
    FeeAboveMaximum { fee: Decimal, maximum: Decimal },

    // =================================================================
    // Authorization Errors (2xx)
    // =================================================================
    /// The caller has no registered identity.
    #[error("OR_ERR_200: Caller must be registered user: {0}")]
    NotRegistered(Address),

    /// The caller is already bound to a different identity.
    #[error("OR_ERR_201: Account {caller} already associated with identity {existing}")]
    AlreadyRegistered {
        caller: Address,
        existing: IdentityHash,
    },

    /// The credential was issued for a different caller.
    #[error("OR_ERR_202: Caller must be the address specified in the credential")]
    CredentialCallerMismatch,

    /// The credential names a different identity than the caller's.
    #[error("OR_ERR_203: Credential identity does not match the registered identity")]
    IdentityMismatch,

    /// The destination tag is not the one bound to the depositor's identity.
    #[error("OR_ERR_204: Destination tag does not match the registered destination tag")]
    DestinationTagNotRegistered,

    /// Caller is not the depositor of the deposit.
    #[error("OR_ERR_205: Sender must be the depositor of {0}")]
    NotDepositor(DepositId),

    /// The depositor tried to reserve against their own deposit.
    #[error("OR_ERR_206: Sender cannot be the depositor")]
    SelfReservation,

    /// The depositor's access lists refuse this identity.
    #[error("OR_ERR_207: On-ramper {0} not allowed by depositor's access lists")]
    OnRamperNotAllowed(IdentityHash),

    /// Caller's identity is not the intent's on-ramper identity.
    #[error("OR_ERR_208: Sender must be the on-ramper")]
    NotOnRamper,

    /// Caller is neither the on-ramper nor the depositor of the intent.
    #[error("OR_ERR_209: Caller must be the on-ramper or the depositor")]
    NotSettlementParty,

    /// Owner-gated administrative call from another address.
    #[error("OR_ERR_210: Caller is not the owner")]
    NotOwner,

    // =================================================================
    // State Conflict Errors (3xx)
    // =================================================================
    /// The deposit does not exist (never created, withdrawn, or drained).
    #[error("OR_ERR_300: Deposit does not exist: {0}")]
    DepositNotFound(DepositId),

    /// The intent does not exist (never created, settled, cancelled, or pruned).
    #[error("OR_ERR_301: Intent does not exist: {0}")]
    IntentNotFound(IntentHash),

    /// The identity already holds a live intent somewhere in the ledger.
    #[error("OR_ERR_302: Intent still outstanding: {0}")]
    IntentStillOutstanding(IntentHash),

    /// The depositor already has the maximum number of open deposits.
    #[error("OR_ERR_303: Maximum deposit amount reached ({max} open deposits)")]
    DepositLimitReached { max: usize },

    /// The identity is already on the list being added to.
    #[error("OR_ERR_304: User {0} already on {1}")]
    AlreadyListed(IdentityHash, &'static str),

    /// The identity is not on the list being removed from.
    #[error("OR_ERR_305: User {0} not on {1}")]
    NotListed(IdentityHash, &'static str),

    /// The identity already has a destination tag bound.
    #[error("OR_ERR_306: Identity {0} already associated with a destination tag")]
    DestinationTagAlreadyBound(IdentityHash),

    /// Enabling an allowlist that is already enabled.
    #[error("OR_ERR_307: Allow list already enabled")]
    AllowlistAlreadyEnabled,

    // =================================================================
    // Liquidity Errors (4xx)
    // =================================================================
    /// Not enough liquidity, even after reclaiming expired intents.
    #[error("OR_ERR_400: Not enough liquidity: need {needed}, available {available}")]
    InsufficientLiquidity { needed: Decimal, available: Decimal },

    // =================================================================
    // Proof Errors (5xx)
    // =================================================================
    /// An external verifier rejected the credential or evidence.
    #[error("OR_ERR_500: Proof rejected: {reason}")]
    ProofRejected { reason: String },

    /// The off-chain payment was already used to settle an intent.
    #[error("OR_ERR_501: Payment evidence already used")]
    EvidenceReplayed,

    // =================================================================
    // Cooldown Errors (6xx)
    // =================================================================
    /// The identity settled too recently. Retry at `retry_at`.
    #[error("OR_ERR_600: On-ramp cool down period not elapsed, retry at {retry_at}")]
    CooldownActive { retry_at: DateTime<Utc> },

    // =================================================================
    // Pause (7xx)
    // =================================================================
    /// The ledger is paused; all mutating entry points are refused.
    #[error("OR_ERR_700: Ledger is paused")]
    Paused,

    // =================================================================
    // Transfer Errors (8xx)
    // =================================================================
    /// The value-transfer collaborator aborted.
    #[error("OR_ERR_800: Value transfer failed: {reason}")]
    TransferFailed { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// A ledger invariant does not hold. Critical safety alert.
    #[error("OR_ERR_900: Invariant violation: {reason}")]
    InvariantViolation { reason: String },

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("OR_ERR_901: Configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error.
    #[error("OR_ERR_902: Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("OR_ERR_903: I/O error: {0}")]
    Io(String),
}

impl RampError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NonPositiveAmount { .. }
            | Self::ZeroAddress { .. }
            | Self::BelowMinimumDeposit { .. }
            | Self::AboveMaxOnRamp { .. }
            | Self::WrongCurrency { .. }
            | Self::PayeeMismatch
            | Self::PayerMismatch
            | Self::PaymentNotEnough { .. }
            | Self::PaymentPredatesIntent
            | Self::MissingDestinationTag
            | Self::InvalidParameter { .. }
            | Self::FeeAboveMaximum { .. } => ErrorKind::Validation,

            Self::NotRegistered(_)
            | Self::AlreadyRegistered { .. }
            | Self::CredentialCallerMismatch
            | Self::IdentityMismatch
            | Self::DestinationTagNotRegistered
            | Self::NotDepositor(_)
            | Self::SelfReservation
            | Self::OnRamperNotAllowed(_)
            | Self::NotOnRamper
            | Self::NotSettlementParty
            | Self::NotOwner => ErrorKind::Authorization,

            Self::DepositNotFound(_)
            | Self::IntentNotFound(_)
            | Self::IntentStillOutstanding(_)
            | Self::DepositLimitReached { .. }
            | Self::AlreadyListed(..)
            | Self::NotListed(..)
            | Self::DestinationTagAlreadyBound(_)
            | Self::AllowlistAlreadyEnabled => ErrorKind::StateConflict,

            Self::InsufficientLiquidity { .. } => ErrorKind::Liquidity,

            Self::ProofRejected { .. } | Self::EvidenceReplayed => ErrorKind::ProofRejected,

            Self::CooldownActive { .. } => ErrorKind::Cooldown,

            Self::Paused => ErrorKind::Paused,

            Self::TransferFailed { .. } => ErrorKind::Transfer,

            Self::InvariantViolation { .. }
            | Self::Configuration(_)
            | Self::Serialization(_)
            | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether the same call may succeed later without changing its input.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Cooldown
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, RampError>;

impl From<std::io::Error> for RampError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RampError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
