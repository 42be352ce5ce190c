// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vault Protocol: Core Library
//!
//! The shared vocabulary of the vault ledger and the hosts that run it:
//! who a principal is, how value is counted, how a contract asks its host
//! to move value out, and where committed state lives between calls.
//!
//! ## Architecture
//!
//! - **identity**: 20-byte principal addresses, hex on the wire, derivable
//!   from human-readable labels.
//! - **amount**: integer value units (wei, 18 decimals) and decimal
//!   parsing/formatting. No floating point.
//! - **host**: the execution-host seam. Call context and the transfer hook
//!   through which a recipient may re-enter a contract.
//! - **storage**: snapshots and an append-only event log over sled.
//! - **config**: protocol constants.
//!
//! ## Design Philosophy
//!
//! 1. Value is an integer, and every credit is checked.
//! 2. Contracts never move value themselves; hosts do.
//! 3. If it touches money, it has tests. Plural.

pub mod amount;
pub mod config;
pub mod host;
pub mod identity;
pub mod storage;
