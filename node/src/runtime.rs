//! # Execution Runtime
//!
//! Hosts the vault and the counter on top of a [`LedgerDb`]. The runtime
//! plays the part of the outside world: it authenticates callers, keeps the
//! external wallets that value flows in from and out to, attaches value to
//! calls, and carries out every outbound transfer.
//!
//! Each call runs to completion against in-memory state. A committed call
//! has its events appended to the log in one batch, then the three
//! snapshots (vault, counter, wallets) are rewritten. A reverted call
//! leaves both the memory state and the store untouched.

use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use vault_contracts::{Counter, CounterEvent, CounterState, Vault, VaultConfig, VaultEvent, VaultState};
use vault_protocol::amount::Wei;
use vault_protocol::config::{COUNTER_SNAPSHOT_KEY, VAULT_SNAPSHOT_KEY, WALLETS_SNAPSHOT_KEY};
use vault_protocol::host::{CallContext, HostError, TransferHost};
use vault_protocol::identity::Address;
use vault_protocol::storage::{LedgerDb, SnapshotSet};

use crate::metrics::LedgerMetrics;
use crate::script::Call;

// ---------------------------------------------------------------------------
// External wallets
// ---------------------------------------------------------------------------

/// Balances held outside the contracts, plus the total ever minted into
/// them by `fund`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBook {
    balances: BTreeMap<Address, Wei>,
    minted: Wei,
}

impl WalletBook {
    /// External balance of `account`.
    pub fn balance_of(&self, account: &Address) -> Wei {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Total value minted into the system.
    pub fn minted(&self) -> Wei {
        self.minted
    }

    /// Sum of all external balances, or `None` on overflow.
    pub fn total(&self) -> Option<Wei> {
        self.balances
            .values()
            .try_fold(0u128, |acc, v| acc.checked_add(*v))
    }

    /// Creates new value in `account`.
    pub fn mint(&mut self, account: Address, amount: Wei) -> Result<(), HostError> {
        let minted = self
            .minted
            .checked_add(amount)
            .ok_or(HostError::Overflow(account))?;
        self.credit(account, amount)?;
        self.minted = minted;
        Ok(())
    }

    /// Adds `amount` to `account`.
    pub fn credit(&mut self, account: Address, amount: Wei) -> Result<(), HostError> {
        let balance = self
            .balance_of(&account)
            .checked_add(amount)
            .ok_or(HostError::Overflow(account))?;
        self.balances.insert(account, balance);
        Ok(())
    }

    /// Takes `amount` out of `account`, failing if it cannot cover it.
    pub fn debit(&mut self, account: Address, amount: Wei) -> Result<(), HostError> {
        let available = self.balance_of(&account);
        if amount > available {
            return Err(HostError::InsufficientFunds {
                account,
                available,
                requested: amount,
            });
        }
        self.balances.insert(account, available - amount);
        Ok(())
    }
}

/// Outbound transfers from either contract land in the recipient's wallet.
impl TransferHost<Vault> for WalletBook {
    fn transfer(&mut self, _vault: &mut Vault, to: &Address, amount: Wei) -> Result<(), HostError> {
        self.credit(*to, amount)
    }
}

impl TransferHost<Counter> for WalletBook {
    fn transfer(
        &mut self,
        _counter: &mut Counter,
        to: &Address,
        amount: Wei,
    ) -> Result<(), HostError> {
        self.credit(*to, amount)
    }
}

// ---------------------------------------------------------------------------
// Events and receipts
// ---------------------------------------------------------------------------

/// An entry in the persistent event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Vault(VaultEvent),
    Counter(CounterEvent),
    Funded { account: Address, amount: Wei },
}

/// Outcome of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    Reverted,
}

/// Why a call reverted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revert {
    /// Machine-readable error kind.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl From<vault_contracts::VaultError> for Revert {
    fn from(err: vault_contracts::VaultError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<vault_contracts::CounterError> for Revert {
    fn from(err: vault_contracts::CounterError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<HostError> for Revert {
    fn from(err: HostError) -> Self {
        let code = match err {
            HostError::TransferRejected { .. } => "TransferRejected",
            HostError::InsufficientFunds { .. } => "InsufficientFunds",
            HostError::Overflow(_) => "Overflow",
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

/// One line of `exec` output.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub call_id: Uuid,
    pub index: usize,
    pub op: &'static str,
    pub caller: Address,
    pub status: CallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Revert>,
    pub events: Vec<LedgerEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_event_seq: Option<u64>,
    pub executed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Stages the three snapshots that together make up the ledger.
fn snapshot_set(
    vault: &VaultState,
    counter: &CounterState,
    wallets: &WalletBook,
) -> Result<SnapshotSet> {
    let mut snapshots = SnapshotSet::default();
    snapshots.put(VAULT_SNAPSHOT_KEY, vault)?;
    snapshots.put(COUNTER_SNAPSHOT_KEY, counter)?;
    snapshots.put(WALLETS_SNAPSHOT_KEY, wallets)?;
    Ok(snapshots)
}

/// The vault, the counter and the wallets, bound to a store.
pub struct Runtime {
    db: LedgerDb,
    vault: Vault,
    counter: Counter,
    wallets: WalletBook,
    metrics: LedgerMetrics,
    executed: usize,
}

impl Runtime {
    /// Writes the genesis snapshots: an empty vault, a counter at zero owned
    /// by `counter_owner`, and no external value.
    pub fn init(db: &LedgerDb, counter_owner: Address, increment_price: Wei) -> Result<()> {
        if db.has_snapshot(VAULT_SNAPSHOT_KEY)? {
            bail!("store is already initialized");
        }
        let counter = Counter::new(counter_owner, increment_price);
        let snapshots = snapshot_set(&VaultState::default(), counter.state(), &WalletBook::default())?;
        db.commit::<LedgerEvent>(&[], &snapshots)?;
        db.flush()?;
        info!(%counter_owner, increment_price, "ledger initialized");
        Ok(())
    }

    /// Loads the contracts and wallets from an initialized store.
    pub fn open(db: LedgerDb, config: VaultConfig) -> Result<Self> {
        let vault_state: VaultState = db
            .get_snapshot(VAULT_SNAPSHOT_KEY)?
            .context("store is not initialized; run `vault-node init` first")?;
        let counter_state: CounterState = db
            .get_snapshot(COUNTER_SNAPSHOT_KEY)?
            .context("counter snapshot missing")?;
        let wallets: WalletBook = db
            .get_snapshot(WALLETS_SNAPSHOT_KEY)?
            .context("wallet snapshot missing")?;
        let metrics = LedgerMetrics::new().context("failed to register metrics")?;

        let runtime = Self {
            db,
            vault: Vault::from_state(vault_state, config),
            counter: Counter::from_state(counter_state),
            wallets,
            metrics,
            executed: 0,
        };
        runtime.check_supply()?;
        runtime.refresh_gauges();
        Ok(runtime)
    }

    /// Runs one call and persists it if it commits.
    ///
    /// A reverted call is reported in the receipt, not as an `Err`. `Err`
    /// means the store failed or a ledger invariant broke, and the caller
    /// should stop.
    pub fn execute(&mut self, call: &Call) -> Result<Receipt> {
        let started = Instant::now();
        let call_id = Uuid::new_v4();
        let index = self.executed;
        self.executed += 1;

        let outcome = self.dispatch(call);

        self.check_supply()?;
        if !self.vault.check_conservation() {
            bail!("vault conservation violated after {} (call {call_id})", call.op());
        }

        let (status, error, events, first_event_seq) = match outcome {
            Ok(events) => {
                let seq = self
                    .persist(&events)
                    .with_context(|| format!("failed to persist call {call_id}"))?;
                (CallStatus::Success, None, events, Some(seq))
            }
            Err(revert) => {
                warn!(
                    %call_id,
                    op = call.op(),
                    caller = %call.caller(),
                    code = revert.code,
                    "call reverted: {}",
                    revert.message
                );
                (CallStatus::Reverted, Some(revert), Vec::new(), None)
            }
        };

        let outcome_label = match status {
            CallStatus::Success => "success",
            CallStatus::Reverted => "reverted",
        };
        self.metrics
            .observe_call(call.op(), outcome_label, started.elapsed().as_secs_f64());
        self.refresh_gauges();

        Ok(Receipt {
            call_id,
            index,
            op: call.op(),
            caller: call.caller(),
            status,
            error,
            events,
            first_event_seq,
            executed_at: Utc::now(),
        })
    }

    fn dispatch(&mut self, call: &Call) -> Result<Vec<LedgerEvent>, Revert> {
        match *call {
            Call::Fund { account, amount } => {
                self.wallets.mint(account, amount)?;
                return Ok(vec![LedgerEvent::Funded { account, amount }]);
            }
            Call::Deposit { caller, amount } => {
                self.wallets.debit(caller, amount)?;
                if let Err(err) = self.vault.deposit(&CallContext::with_value(caller, amount)) {
                    self.wallets.credit(caller, amount)?;
                    return Err(err.into());
                }
            }
            Call::Withdraw { caller, amount } => {
                self.vault
                    .withdraw(&mut self.wallets, &CallContext::new(caller), amount)?;
            }
            Call::Approve {
                caller,
                spender,
                amount,
            } => {
                self.vault
                    .approve(&CallContext::new(caller), spender, amount)?;
            }
            Call::WithdrawFrom {
                caller,
                owner,
                amount,
            } => {
                self.vault.withdraw_from(
                    &mut self.wallets,
                    &CallContext::new(caller),
                    owner,
                    amount,
                )?;
            }
            Call::Increment { caller } => {
                self.counter.increment(&CallContext::new(caller))?;
            }
            Call::Decrement { caller } => {
                self.counter.decrement(&CallContext::new(caller))?;
            }
            Call::Reset { caller } => {
                self.counter.reset(&CallContext::new(caller));
            }
            Call::PaidIncrement { caller, amount } => {
                self.wallets.debit(caller, amount)?;
                let ctx = CallContext::with_value(caller, amount);
                if let Err(err) = self.counter.paid_increment(&ctx) {
                    self.wallets.credit(caller, amount)?;
                    return Err(err.into());
                }
            }
            Call::WithdrawProceeds { caller } => {
                self.counter
                    .withdraw_proceeds(&mut self.wallets, &CallContext::new(caller))?;
            }
        }

        let events = self
            .vault
            .take_events()
            .into_iter()
            .map(LedgerEvent::Vault)
            .chain(self.counter.take_events().into_iter().map(LedgerEvent::Counter))
            .collect();
        Ok(events)
    }

    fn persist(&self, events: &[LedgerEvent]) -> Result<u64> {
        let snapshots = snapshot_set(self.vault.state(), self.counter.state(), &self.wallets)?;
        let seq = self.db.commit(events, &snapshots)?;
        self.metrics
            .events_persisted_total
            .inc_by(events.len() as u64);
        debug!(first_seq = seq, count = events.len(), "events persisted");
        Ok(seq)
    }

    /// Minted value must be fully accounted for by the wallets, the vault's
    /// custody, and the counter's uncollected proceeds.
    fn check_supply(&self) -> Result<()> {
        let accounted = self
            .wallets
            .total()
            .and_then(|w| w.checked_add(self.vault.contract_balance()))
            .and_then(|t| t.checked_add(self.counter.proceeds()));
        if accounted != Some(self.wallets.minted()) {
            bail!(
                "value supply mismatch: minted {}, accounted {:?}",
                self.wallets.minted(),
                accounted
            );
        }
        Ok(())
    }

    fn refresh_gauges(&self) {
        self.metrics
            .set_ledger(self.vault.contract_balance(), self.vault.total_depositors());
    }

    /// Flushes the store to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub fn counter(&self) -> &Counter {
        &self.counter
    }

    pub fn wallets(&self) -> &WalletBook {
        &self.wallets
    }

    pub fn db(&self) -> &LedgerDb {
        &self.db
    }

    pub fn metrics(&self) -> &LedgerMetrics {
        &self.metrics
    }
}
