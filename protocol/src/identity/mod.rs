//! # Identity Module
//!
//! Every principal that holds value or is granted an allowance is named by
//! an [`Address`]: 20 opaque bytes, shown as `0x`-prefixed lowercase hex.
//!
//! Addresses are authenticated by the execution host, not by the contracts.
//! For local use the host can derive one from a label (`"alice"`) by hashing
//! it with BLAKE3, so scripts stay readable while identities stay fixed-size.

pub mod address;

pub use address::{Address, AddressError, ADDRESS_LENGTH};
