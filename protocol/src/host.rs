//! # Execution Host Seam
//!
//! Contracts never move value themselves. They are invoked by an execution
//! host that authenticates the caller, attaches value to the call, and
//! carries out outbound transfers on the contract's behalf.
//!
//! ```text
//!            CallContext { caller, value }
//!   host ─────────────────────────────────▶ contract
//!     ▲                                        │
//!     │  TransferHost::transfer(ledger, to, n) │
//!     └────────────────────────────────────────┘
//!              (recipient code may run here
//!               and call back into the ledger)
//! ```
//!
//! The transfer hook receives `&mut L`: exclusive access to the very
//! ledger that is mid-call. A recipient's callback re-enters the ledger
//! through it, so the ledger must have finished its own updates first.

use thiserror::Error;

use crate::amount::Wei;
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the execution host.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// The recipient (or the host itself) refused the transfer.
    #[error("transfer of {amount} to {to} rejected: {reason}")]
    TransferRejected {
        /// Intended recipient.
        to: Address,
        /// Amount that was being sent.
        amount: Wei,
        /// Why it was refused.
        reason: String,
    },

    /// An account cannot cover the value it tried to attach or send.
    #[error("insufficient funds in {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// The account that came up short.
        account: Address,
        /// What it holds.
        available: Wei,
        /// What was asked of it.
        requested: Wei,
    },

    /// Crediting an account would overflow.
    #[error("balance overflow crediting {0}")]
    Overflow(Address),
}

// ---------------------------------------------------------------------------
// Call context
// ---------------------------------------------------------------------------

/// Who is calling, and what value rides along with the call.
///
/// The host guarantees that `caller` is authenticated and that `value` has
/// already been moved into the contract's custody when the call starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Authenticated caller identity.
    pub caller: Address,
    /// Value attached to the call, in wei.
    pub value: Wei,
}

impl CallContext {
    /// A call with no attached value.
    pub fn new(caller: Address) -> Self {
        Self { caller, value: 0 }
    }

    /// A call carrying `value` wei.
    pub fn with_value(caller: Address, value: Wei) -> Self {
        Self { caller, value }
    }
}

// ---------------------------------------------------------------------------
// Transfer hook
// ---------------------------------------------------------------------------

/// Outbound value transfers, performed by the host on behalf of ledger `L`.
pub trait TransferHost<L: ?Sized> {
    /// Send `amount` wei from the ledger's custody to `to`.
    ///
    /// Implementations may call back into `ledger` (that is what a
    /// reentrant recipient does). Returning an error aborts the calling
    /// operation, which then rolls back every effect it applied.
    fn transfer(&mut self, ledger: &mut L, to: &Address, amount: Wei) -> Result<(), HostError>;
}

/// A host that accepts every transfer and forgets about it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl<L: ?Sized> TransferHost<L> for NullHost {
    fn transfer(&mut self, _ledger: &mut L, to: &Address, amount: Wei) -> Result<(), HostError> {
        tracing::trace!(%to, amount, "null host transfer");
        Ok(())
    }
}

/// Any `FnMut(&mut L, &Address, Wei)` closure works as a host, which keeps
/// one-off hosts in tests short.
impl<L: ?Sized, F> TransferHost<L> for F
where
    F: FnMut(&mut L, &Address, Wei) -> Result<(), HostError>,
{
    fn transfer(&mut self, ledger: &mut L, to: &Address, amount: Wei) -> Result<(), HostError> {
        self(ledger, to, amount)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
