//! # openramp-ledger
//!
//! State components of the **OpenRamp** escrow ledger:
//!
//! - [`AccountRegistry`]: caller → identity bindings and destination tags
//! - [`DenylistGuard`]: per-depositor denylists and opt-in allowlists
//! - [`DepositLedger`]: escrowed deposits, liquidity counters, withdrawals
//! - [`IntentManager`]: liquidity reservations and lazy expiry pruning
//! - [`CustodyBook`]: in-memory [`ValueTransfer`](openramp_types::ValueTransfer) custody
//! - [`PauseSwitch`]: emergency stop for every mutating call
//!
//! ## Deposit ↔ intent bookkeeping
//!
//! ```text
//!            signal                    settle / release
//! remaining ────────▶ outstanding ────────────────────▶ paid out
//!     ▲                   │
//!     └───────────────────┘
//!       cancel / prune
//! ```
//!
//! Components never call each other on their own; each operation receives
//! the components it needs, plans first, and commits only after every check
//! (and the custody transfer, where one is involved) has succeeded.

pub mod custody;
pub mod denylist;
pub mod deposits;
pub mod intents;
pub mod pause;
pub mod registry;

pub use custody::CustodyBook;
pub use denylist::DenylistGuard;
pub use deposits::{DepositLedger, WithdrawOutcome, Withdrawal};
pub use intents::{IntentManager, PrunePlan, SignalOutcome, SignalRequest};
pub use pause::PauseSwitch;
pub use registry::{AccountRegistry, Registration};
