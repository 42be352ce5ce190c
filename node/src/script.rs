//! # Call Scripts
//!
//! A script is a JSON document listing calls to replay against the ledger,
//! in order. Principals are hex addresses or labels (`"alice"`), amounts
//! are decimal strings in whole units (`"1.5"`).
//!
//! ```json
//! {
//!   "calls": [
//!     { "call": "fund",          "account": "alice", "amount": "10.0" },
//!     { "call": "deposit",       "caller": "alice",  "amount": "1.0" },
//!     { "call": "approve",       "caller": "alice",  "spender": "bob", "amount": "0.5" },
//!     { "call": "withdraw_from", "caller": "bob",    "owner": "alice", "amount": "0.5" },
//!     { "call": "increment",     "caller": "bob" }
//!   ]
//! }
//! ```
//!
//! A bare JSON array of calls is accepted as well.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use vault_protocol::amount::{parse_units, Wei};
use vault_protocol::identity::Address;

/// One call as written in the script file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ScriptCall {
    Fund {
        account: String,
        amount: String,
    },
    Deposit {
        caller: String,
        amount: String,
    },
    Withdraw {
        caller: String,
        amount: String,
    },
    Approve {
        caller: String,
        spender: String,
        amount: String,
    },
    WithdrawFrom {
        caller: String,
        owner: String,
        amount: String,
    },
    Increment {
        caller: String,
    },
    Decrement {
        caller: String,
    },
    Reset {
        caller: String,
    },
    PaidIncrement {
        caller: String,
        amount: String,
    },
    WithdrawProceeds {
        caller: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptFile {
    Wrapped { calls: Vec<ScriptCall> },
    Bare(Vec<ScriptCall>),
}

/// A call with principals and amounts resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Fund { account: Address, amount: Wei },
    Deposit { caller: Address, amount: Wei },
    Withdraw { caller: Address, amount: Wei },
    Approve { caller: Address, spender: Address, amount: Wei },
    WithdrawFrom { caller: Address, owner: Address, amount: Wei },
    Increment { caller: Address },
    Decrement { caller: Address },
    Reset { caller: Address },
    PaidIncrement { caller: Address, amount: Wei },
    WithdrawProceeds { caller: Address },
}

impl Call {
    /// Operation name used in receipts and metric labels.
    pub fn op(&self) -> &'static str {
        match self {
            Call::Fund { .. } => "fund",
            Call::Deposit { .. } => "deposit",
            Call::Withdraw { .. } => "withdraw",
            Call::Approve { .. } => "approve",
            Call::WithdrawFrom { .. } => "withdraw_from",
            Call::Increment { .. } => "increment",
            Call::Decrement { .. } => "decrement",
            Call::Reset { .. } => "reset",
            Call::PaidIncrement { .. } => "paid_increment",
            Call::WithdrawProceeds { .. } => "withdraw_proceeds",
        }
    }

    /// The principal the call acts for. For `fund` this is the credited account.
    pub fn caller(&self) -> Address {
        match *self {
            Call::Fund { account, .. } => account,
            Call::Deposit { caller, .. }
            | Call::Withdraw { caller, .. }
            | Call::Approve { caller, .. }
            | Call::WithdrawFrom { caller, .. }
            | Call::Increment { caller }
            | Call::Decrement { caller }
            | Call::Reset { caller }
            | Call::PaidIncrement { caller, .. }
            | Call::WithdrawProceeds { caller } => caller,
        }
    }
}

fn principal(s: &str) -> Result<Address> {
    Address::parse_or_derive(s).with_context(|| format!("invalid principal {s:?}"))
}

fn amount(s: &str) -> Result<Wei> {
    parse_units(s).with_context(|| format!("invalid amount {s:?}"))
}

impl ScriptCall {
    /// Resolves labels to addresses and decimal strings to wei.
    pub fn resolve(&self) -> Result<Call> {
        Ok(match self {
            ScriptCall::Fund { account, amount: a } => Call::Fund {
                account: principal(account)?,
                amount: amount(a)?,
            },
            ScriptCall::Deposit { caller, amount: a } => Call::Deposit {
                caller: principal(caller)?,
                amount: amount(a)?,
            },
            ScriptCall::Withdraw { caller, amount: a } => Call::Withdraw {
                caller: principal(caller)?,
                amount: amount(a)?,
            },
            ScriptCall::Approve {
                caller,
                spender,
                amount: a,
            } => Call::Approve {
                caller: principal(caller)?,
                spender: principal(spender)?,
                amount: amount(a)?,
            },
            ScriptCall::WithdrawFrom {
                caller,
                owner,
                amount: a,
            } => Call::WithdrawFrom {
                caller: principal(caller)?,
                owner: principal(owner)?,
                amount: amount(a)?,
            },
            ScriptCall::Increment { caller } => Call::Increment {
                caller: principal(caller)?,
            },
            ScriptCall::Decrement { caller } => Call::Decrement {
                caller: principal(caller)?,
            },
            ScriptCall::Reset { caller } => Call::Reset {
                caller: principal(caller)?,
            },
            ScriptCall::PaidIncrement { caller, amount: a } => Call::PaidIncrement {
                caller: principal(caller)?,
                amount: amount(a)?,
            },
            ScriptCall::WithdrawProceeds { caller } => Call::WithdrawProceeds {
                caller: principal(caller)?,
            },
        })
    }
}

/// Parses a script and resolves every call. Any malformed call rejects the
/// whole script before anything runs.
pub fn parse_script(json: &str) -> Result<Vec<Call>> {
    let file: ScriptFile = serde_json::from_str(json).context("malformed call script")?;
    let calls = match file {
        ScriptFile::Wrapped { calls } => calls,
        ScriptFile::Bare(calls) => calls,
    };
    calls
        .iter()
        .enumerate()
        .map(|(i, call)| call.resolve().with_context(|| format!("call #{i}")))
        .collect()
}

/// Reads and parses a script file.
pub fn load_script(path: &Path) -> Result<Vec<Call>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    parse_script(&json).with_context(|| format!("in script {}", path.display()))
}
