//! # Counter Contract
//!
//! A shared counter with per-user tallies. Anyone can increment, decrement
//! (never below zero) or reset it. A paid increment costs a fixed price;
//! the proceeds accumulate in the contract until its owner withdraws them.
//!
//! Proceeds follow the same ordering as vault withdrawals: zeroed first,
//! transferred second. A failed transfer puts the whole counter back the
//! way it was before the withdrawal, including anything the recipient did
//! from inside the transfer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use vault_protocol::amount::Wei;
use vault_protocol::host::{CallContext, HostError, TransferHost};
use vault_protocol::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during counter operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CounterError {
    /// Decrementing would take the count below zero.
    #[error("count cannot be negative")]
    CountNegative,

    /// Incrementing would overflow the count or a tally.
    #[error("count overflow")]
    CountOverflow,

    /// A paid increment carried less than the price.
    #[error("insufficient payment: price is {price}, got {paid}")]
    InsufficientPayment {
        /// The fixed price.
        price: Wei,
        /// What was attached.
        paid: Wei,
    },

    /// Caller is not the counter's owner.
    #[error("unauthorized: only the owner can do this")]
    Unauthorized,

    /// There is nothing to withdraw.
    #[error("no proceeds to withdraw")]
    NoProceeds,

    /// The host could not complete the outbound transfer.
    #[error("outbound transfer failed: {0}")]
    Transfer(#[from] HostError),
}

impl CounterError {
    /// Stable machine-readable name for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            CounterError::CountNegative => "CountNegative",
            CounterError::CountOverflow => "CountOverflow",
            CounterError::InsufficientPayment { .. } => "InsufficientPayment",
            CounterError::Unauthorized => "Unauthorized",
            CounterError::NoProceeds => "NoProceeds",
            CounterError::Transfer(_) => "TransferFailed",
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Counter event log entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterEvent {
    /// The count went up; carries the new count.
    Incremented { count: u64 },
    /// The count went down; carries the new count.
    Decremented { count: u64 },
    /// The count was reset to zero.
    Reset { by: Address },
    /// A paid increment was made.
    PaidIncrement {
        payer: Address,
        paid: Wei,
        count: u64,
    },
    /// The owner collected the proceeds.
    ProceedsWithdrawn { owner: Address, amount: Wei },
}

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

/// The counter's persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    /// Principal allowed to withdraw proceeds.
    pub owner: Address,
    /// Fixed price of a paid increment.
    pub price: Wei,
    /// The current count.
    pub count: u64,
    /// Increments made by each user (plain and paid).
    pub tallies: BTreeMap<Address, u64>,
    /// Payments collected and not yet withdrawn.
    pub proceeds: Wei,
}

/// The counter contract.
#[derive(Debug, Clone)]
pub struct Counter {
    state: CounterState,
    events: Vec<CounterEvent>,
}

impl Counter {
    /// Creates a counter at zero owned by `owner`, charging `price` per
    /// paid increment.
    pub fn new(owner: Address, price: Wei) -> Self {
        Self::from_state(CounterState {
            owner,
            price,
            count: 0,
            tallies: BTreeMap::new(),
            proceeds: 0,
        })
    }

    /// Restores a counter from persisted state.
    pub fn from_state(state: CounterState) -> Self {
        Self {
            state,
            events: Vec::new(),
        }
    }

    fn bump(&mut self, user: Address) -> Result<u64, CounterError> {
        let count = self
            .state
            .count
            .checked_add(1)
            .ok_or(CounterError::CountOverflow)?;
        let tally = self
            .state
            .tallies
            .get(&user)
            .copied()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or(CounterError::CountOverflow)?;
        self.state.count = count;
        self.state.tallies.insert(user, tally);
        Ok(count)
    }

    /// Adds one to the count and to the caller's tally.
    pub fn increment(&mut self, ctx: &CallContext) -> Result<u64, CounterError> {
        let count = self.bump(ctx.caller)?;
        self.events.push(CounterEvent::Incremented { count });
        debug!(caller = %ctx.caller, count, "incremented");
        Ok(count)
    }

    /// Subtracts one from the count.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::CountNegative`] when the count is already zero.
    pub fn decrement(&mut self, ctx: &CallContext) -> Result<u64, CounterError> {
        let count = self
            .state
            .count
            .checked_sub(1)
            .ok_or(CounterError::CountNegative)?;
        self.state.count = count;
        self.events.push(CounterEvent::Decremented { count });
        debug!(caller = %ctx.caller, count, "decremented");
        Ok(count)
    }

    /// Sets the count back to zero. Tallies are kept.
    pub fn reset(&mut self, ctx: &CallContext) {
        self.state.count = 0;
        self.events.push(CounterEvent::Reset { by: ctx.caller });
        debug!(caller = %ctx.caller, "reset");
    }

    /// Increments in exchange for the value attached to the call.
    ///
    /// Any amount at or above the price is accepted and kept in full.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::InsufficientPayment`] if the attached value is
    /// below the price.
    pub fn paid_increment(&mut self, ctx: &CallContext) -> Result<u64, CounterError> {
        if ctx.value < self.state.price {
            return Err(CounterError::InsufficientPayment {
                price: self.state.price,
                paid: ctx.value,
            });
        }
        let proceeds = self
            .state
            .proceeds
            .checked_add(ctx.value)
            .ok_or(CounterError::CountOverflow)?;
        let count = self.bump(ctx.caller)?;
        self.state.proceeds = proceeds;

        self.events.push(CounterEvent::PaidIncrement {
            payer: ctx.caller,
            paid: ctx.value,
            count,
        });
        debug!(caller = %ctx.caller, paid = ctx.value, count, "paid increment");
        Ok(count)
    }

    /// Sends all collected proceeds to the owner.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::Unauthorized`] unless the caller is the owner,
    /// [`CounterError::NoProceeds`] if there is nothing to send, and
    /// [`CounterError::Transfer`] if the host fails the transfer, in which
    /// case the counter is restored to its state before the call.
    pub fn withdraw_proceeds<H>(&mut self, host: &mut H, ctx: &CallContext) -> Result<Wei, CounterError>
    where
        H: TransferHost<Counter> + ?Sized,
    {
        if ctx.caller != self.state.owner {
            return Err(CounterError::Unauthorized);
        }
        let amount = self.state.proceeds;
        if amount == 0 {
            return Err(CounterError::NoProceeds);
        }

        let snapshot = self.state.clone();
        let committed_events = self.events.len();

        self.state.proceeds = 0;
        let owner = self.state.owner;
        if let Err(err) = host.transfer(self, &owner, amount) {
            // Also discards anything a re-entrant call committed meanwhile.
            self.state = snapshot;
            self.events.truncate(committed_events);
            warn!(%owner, amount, error = %err, "proceeds withdrawal reverted");
            return Err(err.into());
        }

        self.events.push(CounterEvent::ProceedsWithdrawn { owner, amount });
        debug!(%owner, amount, "proceeds withdrawn");
        Ok(amount)
    }

    // -- Queries ------------------------------------------------------------

    /// The current count.
    pub fn count(&self) -> u64 {
        self.state.count
    }

    /// How many increments `user` has made.
    pub fn tally_of(&self, user: &Address) -> u64 {
        self.state.tallies.get(user).copied().unwrap_or(0)
    }

    /// Proceeds waiting for the owner.
    pub fn proceeds(&self) -> Wei {
        self.state.proceeds
    }

    /// The owner.
    pub fn owner(&self) -> Address {
        self.state.owner
    }

    /// Price of a paid increment.
    pub fn price(&self) -> Wei {
        self.state.price
    }

    /// The persisted state.
    pub fn state(&self) -> &CounterState {
        &self.state
    }

    /// Events emitted since the last drain.
    pub fn events(&self) -> &[CounterEvent] {
        &self.events
    }

    /// Drains emitted events.
    pub fn take_events(&mut self) -> Vec<CounterEvent> {
        std::mem::take(&mut self.events)
    }
}
