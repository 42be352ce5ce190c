//! # CLI Interface
//!
//! Defines the command-line argument structure for `vault-node` using
//! `clap` derive. Supports five subcommands: `init`, `exec`, `query`,
//! `address`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vault ledger execution host.
///
/// Keeps a vault and a counter in a local store, replays JSON call scripts
/// against them, and answers queries about the persisted state.
#[derive(Parser, Debug)]
#[command(
    name = "vault-node",
    about = "Vault ledger execution host",
    version,
    propagate_version = true
)]
pub struct VaultNodeCli {
    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "VAULT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the vault node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the store with an empty vault and a counter at zero.
    Init(InitArgs),
    /// Replay a JSON call script and print one receipt per call.
    Exec(ExecArgs),
    /// Read persisted state.
    Query(QueryArgs),
    /// Print the address derived from a label.
    Address(AddressArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "VAULT_DATA_DIR", default_value = ".vault")]
    pub data_dir: PathBuf,

    /// Owner of the counter's paid-increment proceeds (hex address or label).
    #[arg(long, default_value = "deployer")]
    pub counter_owner: String,

    /// Price of one paid increment, in whole units. Defaults to 0.001.
    #[arg(long)]
    pub increment_price: Option<String>,
}

/// Arguments for the `exec` subcommand.
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Path to the data directory.
    #[arg(long, short = 'd', env = "VAULT_DATA_DIR", default_value = ".vault")]
    pub data_dir: PathBuf,

    /// JSON call script to replay.
    pub script: PathBuf,

    /// Let nested calls from transfer recipients run instead of rejecting them.
    #[arg(long)]
    pub no_reentrancy_guard: bool,

    /// Print Prometheus metrics to stderr after the script finishes.
    #[arg(long)]
    pub metrics: bool,
}

/// Arguments for the `query` subcommand.
#[derive(Parser, Debug)]
pub struct QueryArgs {
    /// Path to the data directory.
    #[arg(long, short = 'd', env = "VAULT_DATA_DIR", default_value = ".vault")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub query: Query,
}

/// What to read. Principals are hex addresses or labels.
#[derive(Subcommand, Debug)]
pub enum Query {
    /// Vault balance of a principal.
    Balance { principal: String },
    /// Amount `spender` may still withdraw from `owner`.
    Allowance { owner: String, spender: String },
    /// Total value held by the vault.
    ContractBalance,
    /// Every principal that ever deposited, in first-deposit order.
    Depositors,
    /// The persisted event log.
    Events {
        /// First sequence number to show.
        #[arg(long, default_value_t = 0)]
        from: u64,
        /// Maximum number of events to show.
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// External wallet balance of a principal.
    Wallet { principal: String },
    /// The counter's current count.
    Count,
}

/// Arguments for the `address` subcommand.
#[derive(Parser, Debug)]
pub struct AddressArgs {
    /// Label (or hex address) to resolve.
    pub label: String,
}
