//! # openramp-types
//!
//! Shared types, errors, and configuration for the **OpenRamp** escrow ledger.
//!
//! This crate is the leaf dependency of the workspace. Every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`IdentityHash`], [`DepositId`], [`IntentHash`], [`DestinationTag`]
//! - **Deposit model**: [`Deposit`], [`DepositRequest`], [`DepositView`]
//! - **Intent model**: [`Intent`], [`PruneReason`], [`IntentWithIdentity`]
//! - **Verifier I/O**: [`IdentityCredential`], [`PaymentEvidence`], [`PaymentClaim`], [`TransferLeg`]
//! - **Events**: [`LedgerEvent`]
//! - **Collaborators**: [`IdentityProofVerifier`], [`PaymentEvidenceVerifier`], [`ValueTransfer`], [`NotificationSink`], [`Clock`]
//! - **Configuration**: [`RampConfig`]
//! - **Errors**: [`RampError`] with `OR_ERR_` prefix codes, [`ErrorKind`]
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod deposit;
pub mod error;
pub mod event;
pub mod evidence;
pub mod ids;
pub mod intent;
pub mod traits;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

// Re-export all primary types at crate root for ergonomic imports:
//   use openramp_types::{Deposit, Intent, RampError, ...};

pub use config::*;
pub use deposit::*;
pub use error::*;
pub use event::*;
pub use evidence::*;
pub use ids::*;
pub use intent::*;
pub use traits::*;

// Constants are accessed via `openramp_types::constants::FOO`
// (not re-exported to avoid name collisions).
