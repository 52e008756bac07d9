//! # openramp-settlement
//!
//! **Settlement plane** of the OpenRamp escrow ledger: proof-gated payouts,
//! payment nullifiers, conservation audit, and the [`Ramp`] facade that
//! owns every component.
//!
//! ## Settlement flow
//!
//! ```text
//! evidence ──▶ verify ──▶ intent live? ──▶ nullifier unspent? ──▶ payment matches?
//!                                                                     │
//!            commit ◀── custody disburse ◀── cooldown ◀───────────────┘
//!   (nullify, consume, close drained deposit, emit IntentFulfilled)
//! ```
//!
//! A depositor may also release an intent to its on-ramper without evidence
//! ([`Ramp::release_to_on_ramper`]); the payout and commit steps are shared.
//!
//! ## Verifiers
//!
//! [`Ed25519IdentityVerifier`] and [`Ed25519PaymentVerifier`] accept claims
//! signed by a trusted notary key. Any other proof system plugs in through
//! the collaborator traits in `openramp-types`.

pub mod attestation;
pub mod audit;
pub mod nullifier;
pub mod processor;
pub mod ramp;

pub use attestation::{
    Ed25519IdentityVerifier, Ed25519PaymentVerifier, attest_identity, attest_payment,
};
pub use audit::{AuditReport, LiquidityAudit};
pub use nullifier::{Nullifier, NullifierRegistry};
pub use processor::{Initiator, LedgerParts, Settlement, SettlementProcessor, settlement_fee};
pub use ramp::Ramp;
