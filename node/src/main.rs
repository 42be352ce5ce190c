// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vault Node
//!
//! Entry point for the `vault-node` binary. Parses CLI arguments,
//! initializes logging, opens the store, and dispatches to a subcommand.
//!
//! The binary supports five subcommands:
//!
//! - `init`    : create the store with an empty vault and a counter
//! - `exec`    : replay a JSON call script, one receipt per line on stdout
//! - `query`   : read balances, allowances, depositors, events, wallets
//! - `address` : print the address derived from a label
//! - `version` : print build version information

mod cli;
mod logging;
mod metrics;
mod runtime;
mod script;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use vault_contracts::VaultConfig;
use vault_protocol::amount::{format_units, parse_units};
use vault_protocol::config::{DEFAULT_INCREMENT_PRICE, VALUE_SYMBOL};
use vault_protocol::identity::Address;
use vault_protocol::storage::LedgerDb;

use cli::{Commands, Query, VaultNodeCli};
use logging::LogFormat;
use runtime::{LedgerEvent, Runtime};

const DEFAULT_LOG_FILTER: &str = "vault_node=info,vault_contracts=info,vault_protocol=info";

fn main() -> Result<()> {
    let cli = VaultNodeCli::parse();
    logging::init_logging(DEFAULT_LOG_FILTER, LogFormat::from_str_lossy(&cli.log_format))
        .context("failed to initialize logging")?;

    match cli.command {
        Commands::Init(args) => init_store(args),
        Commands::Exec(args) => exec_script(args),
        Commands::Query(args) => query_store(args),
        Commands::Address(args) => {
            let address = principal(&args.label)?;
            println!("{address}");
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn principal(s: &str) -> Result<Address> {
    Address::parse_or_derive(s).with_context(|| format!("invalid principal {s:?}"))
}

fn open_db(data_dir: &Path) -> Result<LedgerDb> {
    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let db = LedgerDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "database opened");
    Ok(db)
}

/// Creates the store and writes the genesis snapshots.
fn init_store(args: cli::InitArgs) -> Result<()> {
    let owner = principal(&args.counter_owner)?;
    let price = match &args.increment_price {
        Some(text) => parse_units(text)
            .with_context(|| format!("invalid increment price {text:?}"))?,
        None => DEFAULT_INCREMENT_PRICE,
    };

    tracing::info!(data_dir = %args.data_dir.display(), "initializing store");
    let db = open_db(&args.data_dir)?;
    Runtime::init(&db, owner, price)?;

    println!("Store initialized successfully.");
    println!("  Data directory  : {}", args.data_dir.display());
    println!("  Counter owner   : {owner}");
    println!("  Increment price : {} {VALUE_SYMBOL}", format_units(price));
    Ok(())
}

/// Replays a call script. Reverted calls are reported and skipped; a store
/// failure or a broken invariant stops the run.
fn exec_script(args: cli::ExecArgs) -> Result<()> {
    let calls = script::load_script(&args.script)?;
    let config = VaultConfig {
        reentrancy_guard: !args.no_reentrancy_guard,
    };
    let mut runtime = Runtime::open(open_db(&args.data_dir)?, config)?;

    tracing::info!(
        script = %args.script.display(),
        calls = calls.len(),
        reentrancy_guard = config.reentrancy_guard,
        "executing script"
    );

    let mut reverted = 0usize;
    for call in &calls {
        let receipt = runtime.execute(call)?;
        if receipt.status == runtime::CallStatus::Reverted {
            reverted += 1;
        }
        println!("{}", serde_json::to_string(&receipt)?);
    }
    runtime.flush()?;

    tracing::info!(
        executed = calls.len(),
        reverted,
        held = %format_units(runtime.vault().contract_balance()),
        "script finished"
    );

    if args.metrics {
        eprint!("{}", runtime.metrics().encode()?);
    }
    Ok(())
}

#[derive(Serialize)]
struct LoggedEvent<'a> {
    seq: u64,
    event: &'a LedgerEvent,
}

fn query_store(args: cli::QueryArgs) -> Result<()> {
    let runtime = Runtime::open(open_db(&args.data_dir)?, VaultConfig::default())?;
    let vault = runtime.vault();

    match args.query {
        Query::Balance { principal: p } => {
            println!("{} {VALUE_SYMBOL}", format_units(vault.balance_of(&principal(&p)?)));
        }
        Query::Allowance { owner, spender } => {
            let allowance = vault.allowance(&principal(&owner)?, &principal(&spender)?);
            println!("{} {VALUE_SYMBOL}", format_units(allowance));
        }
        Query::ContractBalance => {
            println!("{} {VALUE_SYMBOL}", format_units(vault.contract_balance()));
        }
        Query::Depositors => {
            for depositor in vault.depositors() {
                println!("{depositor}");
            }
        }
        Query::Events { from, limit } => {
            let events: Vec<(u64, LedgerEvent)> = runtime.db().events(from, limit)?;
            for (seq, event) in &events {
                let line = LoggedEvent { seq: *seq, event };
                println!("{}", serde_json::to_string(&line)?);
            }
        }
        Query::Wallet { principal: p } => {
            let balance = runtime.wallets().balance_of(&principal(&p)?);
            println!("{} {VALUE_SYMBOL}", format_units(balance));
        }
        Query::Count => {
            println!("{}", runtime.counter().count());
        }
    }
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("vault-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", vault_protocol::config::PROTOCOL_VERSION);
    println!("rustc      {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
