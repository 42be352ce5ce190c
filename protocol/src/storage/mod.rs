//! # Storage Module
//!
//! Persistence for committed ledger state.
//!
//! ## Architecture
//!
//! ```text
//! db.rs   sled-backed snapshots, event log and metadata trees
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! committed call ─▶ events    ─┐
//!                ─▶ snapshots ─┴▶ LedgerDb::commit (one transaction)
//! ```
//!
//! The snapshot is authoritative. The event log is an audit trail and is
//! never replayed to rebuild state.
//!
//! ## Design Decisions
//!
//! 1. **Bincode for on-disk serialization.** Compact, fast, deterministic.
//!    JSON is for scripts, receipts and debugging; bincode is for storage.
//!
//! 2. **Big-endian sequence keys.** sled iterates keys in byte order, so
//!    big-endian `u64` keys read the log back in commit order.

pub mod db;

pub use db::{DbError, DbResult, LedgerDb, SnapshotSet};
