//! # Vault Contracts
//!
//! The contracts the execution host runs:
//!
//! - **Vault**: custody ledger. Principals deposit value, withdraw their
//!   own funds, and grant revocable, bounded allowances that let a spender
//!   withdraw on their behalf.
//! - **Counter**: a shared counter with per-user tallies and a paid
//!   increment whose proceeds only the owner can collect.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow: `checked_add` and
//!    `checked_sub` everywhere.
//! 2. State is decremented before value leaves. The host's transfer hook
//!    may re-enter a contract, and it must find the books already updated.
//! 3. A failed call leaves no trace. Vault calls snapshot and restore.
//! 4. Every state and event type is serializable (serde) so the host can
//!    persist it between calls.

pub mod counter;
pub mod depositor_set;
pub mod vault;

pub use counter::{Counter, CounterError, CounterEvent, CounterState};
pub use depositor_set::DepositorSet;
pub use vault::{Vault, VaultConfig, VaultError, VaultEvent, VaultState};
