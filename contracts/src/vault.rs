//! # Vault Contract
//!
//! Custodies deposited value on behalf of many principals. A principal can
//! withdraw their own funds, or delegate a bounded, revocable spending
//! right (an allowance) to a spender who may then withdraw on their behalf.
//!
//! ## Operations
//!
//! | Operation       | Checks (in order)                          | Effects                                   |
//! |-----------------|--------------------------------------------|-------------------------------------------|
//! | `deposit`       | value > 0                                  | balance += value, depositor set insert    |
//! | `withdraw`      | amount <= own balance                      | balance -= amount, then transfer out      |
//! | `approve`       | amount <= own balance                      | allowance(owner, spender) = amount        |
//! | `withdraw_from` | amount <= allowance, amount <= owner bal.  | allowance -= amount, balance -= amount, then transfer out |
//!
//! ## Safety Model
//!
//! - **Checks, effects, interactions.** Every decrement is committed before
//!   the host is asked to move value out. A recipient that re-enters the
//!   vault from inside the transfer sees the reduced balance and allowance.
//! - **Reentrancy guard.** On top of that ordering, a depth counter rejects
//!   nested mutating calls with [`VaultError::ReentrantCall`] unless the
//!   guard is switched off in [`VaultConfig`]. Queries are never guarded.
//! - **All-or-nothing.** A call that fails anywhere, including inside the
//!   host's transfer, restores the state and the event log it started with.
//! - **Checked arithmetic.** Every credit uses `checked_add`.
//!
//! Allowances are capped by the owner's balance when they are set, not when
//! they are spent. A later withdraw by the owner can leave an allowance
//! larger than the balance behind it, which is why `withdraw_from` checks
//! the owner's balance as well as the allowance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use vault_protocol::amount::Wei;
use vault_protocol::host::{CallContext, HostError, TransferHost};
use vault_protocol::identity::Address;

use crate::depositor_set::DepositorSet;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
///
/// The first five variants are precondition failures the caller can act on;
/// clients distinguish them to tell "you don't have enough" apart from "you
/// weren't allowed enough" and "the owner doesn't have enough".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VaultError {
    /// A deposit carried no value.
    #[error("invalid amount: must deposit a positive amount")]
    InvalidAmount,

    /// Withdrawal exceeds the caller's own balance.
    #[error("insufficient balance: account has {balance}, tried to withdraw {amount}")]
    InsufficientBalance {
        /// The caller's balance.
        balance: Wei,
        /// Amount requested.
        amount: Wei,
    },

    /// Approval exceeds the approver's current balance.
    #[error("insufficient balance to approve: account has {balance}, tried to approve {amount}")]
    InsufficientBalanceToApprove {
        /// The approver's balance.
        balance: Wei,
        /// Allowance requested.
        amount: Wei,
    },

    /// Delegated withdrawal exceeds the allowance granted to the caller.
    #[error("insufficient allowance: allowance is {allowance}, tried to withdraw {amount}")]
    InsufficientAllowance {
        /// Remaining allowance for (owner, caller).
        allowance: Wei,
        /// Amount requested.
        amount: Wei,
    },

    /// Delegated withdrawal is within the allowance but exceeds the owner's balance.
    #[error("owner has insufficient balance: owner has {balance}, tried to withdraw {amount}")]
    OwnerInsufficientBalance {
        /// The owner's balance.
        balance: Wei,
        /// Amount requested.
        amount: Wei,
    },

    /// A checked arithmetic step failed.
    #[error("arithmetic overflow")]
    Overflow,

    /// A mutating call arrived while another was still in progress.
    #[error("reentrant call rejected")]
    ReentrantCall,

    /// The host could not complete the outbound transfer.
    #[error("outbound transfer failed: {0}")]
    Transfer(#[from] HostError),
}

impl VaultError {
    /// Stable machine-readable name of the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::InvalidAmount => "InvalidAmount",
            VaultError::InsufficientBalance { .. } => "InsufficientBalance",
            VaultError::InsufficientBalanceToApprove { .. } => "InsufficientBalanceToApprove",
            VaultError::InsufficientAllowance { .. } => "InsufficientAllowance",
            VaultError::OwnerInsufficientBalance { .. } => "OwnerInsufficientBalance",
            VaultError::Overflow => "Overflow",
            VaultError::ReentrantCall => "ReentrantCall",
            VaultError::Transfer(_) => "TransferFailed",
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One entry in the vault's append-only event log. Exactly one is emitted
/// per successful mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    /// `principal` deposited `amount`.
    Deposit { principal: Address, amount: Wei },
    /// `spender` withdrew `amount` from `owner`'s balance. For a plain
    /// withdraw, spender and owner are the same principal.
    Withdrawal {
        spender: Address,
        owner: Address,
        amount: Wei,
    },
    /// `owner` set `spender`'s allowance to exactly `amount`.
    AllowanceSet {
        owner: Address,
        spender: Address,
        amount: Wei,
    },
}

impl VaultEvent {
    /// Event name as it appears in logs and receipts.
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::Deposit { .. } => "Deposit",
            VaultEvent::Withdrawal { .. } => "Withdrawal",
            VaultEvent::AllowanceSet { .. } => "AllowanceSet",
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The persisted ledger: balances, allowances, depositors, and the value
/// the vault holds in custody.
///
/// Absent entries read as zero. A zero balance is kept once written; it is
/// a valid state, not a missing one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    balances: BTreeMap<Address, Wei>,
    #[serde(with = "allowance_entries")]
    allowances: BTreeMap<(Address, Address), Wei>,
    depositors: DepositorSet,
    held: Wei,
}

impl VaultState {
    /// Balance of `principal`, zero if never seen.
    pub fn balance_of(&self, principal: &Address) -> Wei {
        self.balances.get(principal).copied().unwrap_or(0)
    }

    /// Allowance granted by `owner` to `spender`, zero if never set.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Wei {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    /// Value held in custody.
    pub fn held(&self) -> Wei {
        self.held
    }

    /// All recorded balances, including zero ones.
    pub fn balances(&self) -> impl Iterator<Item = (&Address, &Wei)> {
        self.balances.iter()
    }

    /// All recorded allowances as `(owner, spender, amount)`.
    pub fn allowances(&self) -> impl Iterator<Item = (&Address, &Address, &Wei)> {
        self.allowances
            .iter()
            .map(|((owner, spender), amount)| (owner, spender, amount))
    }

    /// The depositor set.
    pub fn depositors(&self) -> &DepositorSet {
        &self.depositors
    }

    /// Sum of all balances, or `None` if it does not fit in a `u128`.
    pub fn total_balances(&self) -> Option<Wei> {
        self.balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b))
    }
}

/// Allowances serialize as a list of `{owner, spender, amount}` entries,
/// since JSON object keys cannot be tuples.
mod allowance_entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use vault_protocol::amount::Wei;
    use vault_protocol::identity::Address;

    #[derive(Serialize, Deserialize)]
    struct Entry {
        owner: Address,
        spender: Address,
        amount: Wei,
    }

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<(Address, Address), Wei>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let entries: Vec<Entry> = map
            .iter()
            .map(|(&(owner, spender), &amount)| Entry {
                owner,
                spender,
                amount,
            })
            .collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<(Address, Address), Wei>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|e| ((e.owner, e.spender), e.amount))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Behavioural switches for a [`Vault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultConfig {
    /// Reject mutating calls that arrive while another one is in progress.
    pub reentrancy_guard: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            reentrancy_guard: true,
        }
    }
}

/// The vault ledger.
///
/// Owns its [`VaultState`] exclusively. Each mutating operation takes the
/// call context from the host and, where value leaves the vault, the host
/// itself so it can carry out the transfer.
#[derive(Debug, Clone, Default)]
pub struct Vault {
    state: VaultState,
    config: VaultConfig,
    /// Events committed since the host last drained them.
    events: Vec<VaultEvent>,
    /// Number of mutating calls currently on the stack.
    depth: u32,
}

impl Vault {
    /// Creates an empty vault with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty vault with an explicit configuration.
    pub fn with_config(config: VaultConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Restores a vault from a persisted state.
    pub fn from_state(state: VaultState, config: VaultConfig) -> Self {
        Self {
            state,
            config,
            events: Vec::new(),
            depth: 0,
        }
    }

    /// Runs one mutating call as an all-or-nothing unit.
    ///
    /// On error the state and the event log are put back exactly as they
    /// were when the call started.
    fn transact<T>(
        &mut self,
        op: &'static str,
        call: impl FnOnce(&mut Self) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        if self.depth > 0 && self.config.reentrancy_guard {
            warn!(op, depth = self.depth, "reentrant call rejected");
            return Err(VaultError::ReentrantCall);
        }

        let snapshot = self.state.clone();
        let committed_events = self.events.len();

        self.depth += 1;
        let result = call(self);
        self.depth -= 1;

        if let Err(err) = &result {
            self.state = snapshot;
            self.events.truncate(committed_events);
            debug!(op, error = %err, "call reverted");
        }
        result
    }

    /// Deposits the value attached to the call into the caller's balance.
    ///
    /// The caller joins the depositor set on their first deposit.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidAmount`] if no value is attached.
    /// Returns [`VaultError::Overflow`] if a balance would overflow.
    pub fn deposit(&mut self, ctx: &CallContext) -> Result<(), VaultError> {
        self.transact("deposit", |vault| {
            let principal = ctx.caller;
            let amount = ctx.value;
            if amount == 0 {
                return Err(VaultError::InvalidAmount);
            }

            let state = &mut vault.state;
            let balance = state
                .balance_of(&principal)
                .checked_add(amount)
                .ok_or(VaultError::Overflow)?;
            let held = state.held.checked_add(amount).ok_or(VaultError::Overflow)?;

            state.balances.insert(principal, balance);
            state.held = held;
            let first_deposit = state.depositors.insert(principal);

            vault.events.push(VaultEvent::Deposit { principal, amount });
            debug!(%principal, amount, balance, first_deposit, "deposit");
            Ok(())
        })
    }

    /// Withdraws `amount` of the caller's own balance to the caller.
    ///
    /// The balance is reduced before the host transfers the value out.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InsufficientBalance`] if `amount` exceeds the
    /// caller's balance. Returns [`VaultError::Transfer`] if the host fails
    /// the transfer, in which case nothing changes.
    pub fn withdraw<H>(
        &mut self,
        host: &mut H,
        ctx: &CallContext,
        amount: Wei,
    ) -> Result<(), VaultError>
    where
        H: TransferHost<Vault> + ?Sized,
    {
        self.transact("withdraw", |vault| {
            let principal = ctx.caller;
            let balance = vault.state.balance_of(&principal);
            if amount > balance {
                return Err(VaultError::InsufficientBalance { balance, amount });
            }

            let remaining = balance - amount;
            vault.state.balances.insert(principal, remaining);
            vault.state.held = vault
                .state
                .held
                .checked_sub(amount)
                .ok_or(VaultError::Overflow)?;

            host.transfer(vault, &principal, amount)?;

            vault.events.push(VaultEvent::Withdrawal {
                spender: principal,
                owner: principal,
                amount,
            });
            debug!(%principal, amount, remaining, "withdraw");
            Ok(())
        })
    }

    /// Sets `spender`'s allowance over the caller's balance to `amount`.
    ///
    /// This overwrites any previous allowance for the pair; it does not add
    /// to it. Approving zero revokes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InsufficientBalanceToApprove`] if `amount`
    /// exceeds the caller's current balance.
    pub fn approve(
        &mut self,
        ctx: &CallContext,
        spender: Address,
        amount: Wei,
    ) -> Result<(), VaultError> {
        self.transact("approve", |vault| {
            let owner = ctx.caller;
            let balance = vault.state.balance_of(&owner);
            if amount > balance {
                return Err(VaultError::InsufficientBalanceToApprove { balance, amount });
            }

            vault.state.allowances.insert((owner, spender), amount);

            vault.events.push(VaultEvent::AllowanceSet {
                owner,
                spender,
                amount,
            });
            debug!(%owner, %spender, amount, "allowance set");
            Ok(())
        })
    }

    /// Withdraws `amount` from `owner`'s balance to the caller, spending the
    /// allowance `owner` granted the caller.
    ///
    /// Both the allowance and the owner's balance are reduced before the
    /// host transfers the value out.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// Returns [`VaultError::InsufficientAllowance`] if `amount` exceeds the
    /// allowance. Returns [`VaultError::OwnerInsufficientBalance`] if it
    /// exceeds the owner's balance. Returns [`VaultError::Transfer`] if the
    /// host fails the transfer.
    pub fn withdraw_from<H>(
        &mut self,
        host: &mut H,
        ctx: &CallContext,
        owner: Address,
        amount: Wei,
    ) -> Result<(), VaultError>
    where
        H: TransferHost<Vault> + ?Sized,
    {
        self.transact("withdraw_from", |vault| {
            let spender = ctx.caller;
            let allowance = vault.state.allowance(&owner, &spender);
            if amount > allowance {
                return Err(VaultError::InsufficientAllowance { allowance, amount });
            }
            let balance = vault.state.balance_of(&owner);
            if amount > balance {
                return Err(VaultError::OwnerInsufficientBalance { balance, amount });
            }

            vault
                .state
                .allowances
                .insert((owner, spender), allowance - amount);
            vault.state.balances.insert(owner, balance - amount);
            vault.state.held = vault
                .state
                .held
                .checked_sub(amount)
                .ok_or(VaultError::Overflow)?;

            host.transfer(vault, &spender, amount)?;

            vault.events.push(VaultEvent::Withdrawal {
                spender,
                owner,
                amount,
            });
            debug!(%spender, %owner, amount, "withdraw on behalf");
            Ok(())
        })
    }

    // -- Queries ------------------------------------------------------------

    /// Balance of `principal`. Unknown principals have a zero balance.
    pub fn balance_of(&self, principal: &Address) -> Wei {
        self.state.balance_of(principal)
    }

    /// Allowance `owner` granted `spender`. Zero if never set.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Wei {
        self.state.allowance(owner, spender)
    }

    /// Total value the vault holds in custody.
    pub fn contract_balance(&self) -> Wei {
        self.state.held
    }

    /// Number of distinct principals that have ever deposited.
    pub fn total_depositors(&self) -> usize {
        self.state.depositors.len()
    }

    /// Every principal that has ever deposited, in first-deposit order.
    pub fn depositors(&self) -> &[Address] {
        self.state.depositors.as_slice()
    }

    /// Events committed since the last [`take_events`](Self::take_events).
    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Drains the committed events, typically so the host can persist them.
    pub fn take_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    /// The underlying ledger state.
    pub fn state(&self) -> &VaultState {
        &self.state
    }

    /// The active configuration.
    pub fn config(&self) -> VaultConfig {
        self.config
    }

    /// Number of mutating calls in progress. Non-zero only while a host
    /// transfer is running.
    pub fn call_depth(&self) -> u32 {
        self.depth
    }

    /// Returns `true` if the held value equals the sum of all balances.
    pub fn check_conservation(&self) -> bool {
        self.state.total_balances() == Some(self.state.held)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
