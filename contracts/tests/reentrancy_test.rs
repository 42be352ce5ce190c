//! Reentrancy tests.
//!
//! The host's transfer hook gets `&mut Vault` while a withdrawal is still
//! in progress, which is exactly where a hostile recipient would try to
//! call back in. These hosts play that recipient.

use vault_contracts::vault::{Vault, VaultConfig, VaultError};
use vault_protocol::amount::{parse_units, Wei};
use vault_protocol::host::{CallContext, HostError, NullHost, TransferHost};
use vault_protocol::identity::Address;

fn eth(amount: &str) -> Wei {
    parse_units(amount).expect("valid test amount")
}

/// A recipient that tries to withdraw again every time it is paid, and
/// records what it saw and what happened.
struct Reenterer {
    amount: Wei,
    attempts_left: u32,
    observed_balances: Vec<Wei>,
    observed_allowances: Vec<Wei>,
    owner: Option<Address>,
    outcomes: Vec<Result<(), VaultError>>,
    received: Wei,
}

impl Reenterer {
    fn new(amount: Wei, attempts: u32) -> Self {
        Self {
            amount,
            attempts_left: attempts,
            observed_balances: Vec::new(),
            observed_allowances: Vec::new(),
            owner: None,
            outcomes: Vec::new(),
            received: 0,
        }
    }

    fn spending_for(mut self, owner: Address) -> Self {
        self.owner = Some(owner);
        self
    }
}

impl TransferHost<Vault> for Reenterer {
    fn transfer(&mut self, vault: &mut Vault, to: &Address, amount: Wei) -> Result<(), HostError> {
        self.received += amount;
        let ctx = CallContext::new(*to);

        match self.owner {
            None => self.observed_balances.push(vault.balance_of(to)),
            Some(owner) => {
                self.observed_balances.push(vault.balance_of(&owner));
                self.observed_allowances.push(vault.allowance(&owner, to));
            }
        }

        if self.attempts_left > 0 {
            self.attempts_left -= 1;
            let again = self.amount;
            let outcome = match self.owner {
                None => vault.withdraw(self, &ctx, again),
                Some(owner) => vault.withdraw_from(self, &ctx, owner, again),
            };
            self.outcomes.push(outcome);
        }
        Ok(())
    }
}

#[test]
fn guard_rejects_reentrant_withdraw() {
    let attacker = Address::derive("attacker");
    let mut vault = Vault::new();
    vault
        .deposit(&CallContext::with_value(attacker, eth("1.0")))
        .unwrap();

    let mut host = Reenterer::new(eth("1.0"), 1);
    vault
        .withdraw(&mut host, &CallContext::new(attacker), eth("1.0"))
        .unwrap();

    assert_eq!(host.outcomes, vec![Err(VaultError::ReentrantCall)]);
    assert_eq!(host.received, eth("1.0"));
    assert_eq!(vault.balance_of(&attacker), 0);
    assert_eq!(vault.contract_balance(), 0);
    assert!(vault.check_conservation());
}

#[test]
fn balance_is_already_reduced_when_transfer_runs() {
    let attacker = Address::derive("attacker");
    let mut vault = Vault::new();
    vault
        .deposit(&CallContext::with_value(attacker, eth("1.0")))
        .unwrap();

    let mut host = Reenterer::new(0, 0);
    vault
        .withdraw(&mut host, &CallContext::new(attacker), eth("0.4"))
        .unwrap();

    assert_eq!(host.observed_balances, vec![eth("0.6")]);
}

#[test]
fn without_guard_reentrant_withdraw_sees_reduced_balance() {
    let attacker = Address::derive("attacker");
    let victim = Address::derive("victim");
    let mut vault = Vault::with_config(VaultConfig {
        reentrancy_guard: false,
    });
    vault
        .deposit(&CallContext::with_value(victim, eth("5.0")))
        .unwrap();
    vault
        .deposit(&CallContext::with_value(attacker, eth("1.0")))
        .unwrap();

    // Try to drain the same 1.0 three more times from inside the transfer.
    let mut host = Reenterer::new(eth("1.0"), 3);
    vault
        .withdraw(&mut host, &CallContext::new(attacker), eth("1.0"))
        .unwrap();

    assert_eq!(host.observed_balances, vec![0]);
    assert_eq!(
        host.outcomes,
        vec![Err(VaultError::InsufficientBalance {
            balance: 0,
            amount: eth("1.0")
        })]
    );
    assert_eq!(host.received, eth("1.0"));
    assert_eq!(vault.balance_of(&victim), eth("5.0"));
    assert_eq!(vault.contract_balance(), eth("5.0"));
    assert!(vault.check_conservation());
}

#[test]
fn without_guard_nested_withdrawals_within_balance_both_commit() {
    let user = Address::derive("user");
    let mut vault = Vault::with_config(VaultConfig {
        reentrancy_guard: false,
    });
    vault
        .deposit(&CallContext::with_value(user, eth("1.0")))
        .unwrap();

    let mut host = Reenterer::new(eth("0.5"), 1);
    vault
        .withdraw(&mut host, &CallContext::new(user), eth("0.5"))
        .unwrap();

    assert_eq!(host.outcomes, vec![Ok(())]);
    assert_eq!(host.received, eth("1.0"));
    assert_eq!(vault.balance_of(&user), 0);
    assert_eq!(vault.events().len(), 3);
    assert!(vault.check_conservation());
}

#[test]
fn withdraw_from_decrements_allowance_and_balance_before_transfer() {
    let owner = Address::derive("owner");
    let spender = Address::derive("spender");
    let mut vault = Vault::with_config(VaultConfig {
        reentrancy_guard: false,
    });
    vault
        .deposit(&CallContext::with_value(owner, eth("1.0")))
        .unwrap();
    vault
        .approve(&CallContext::new(owner), spender, eth("0.5"))
        .unwrap();

    let mut host = Reenterer::new(eth("0.5"), 1).spending_for(owner);
    vault
        .withdraw_from(&mut host, &CallContext::new(spender), owner, eth("0.5"))
        .unwrap();

    assert_eq!(host.observed_balances, vec![eth("0.5")]);
    assert_eq!(host.observed_allowances, vec![0]);
    assert_eq!(
        host.outcomes,
        vec![Err(VaultError::InsufficientAllowance {
            allowance: 0,
            amount: eth("0.5")
        })]
    );
    assert_eq!(host.received, eth("0.5"));
    assert_eq!(vault.balance_of(&owner), eth("0.5"));
    assert!(vault.check_conservation());
}

#[test]
fn queries_are_allowed_during_a_call() {
    let user = Address::derive("user");
    let mut vault = Vault::new();
    vault
        .deposit(&CallContext::with_value(user, eth("1.0")))
        .unwrap();

    let mut depth_seen = 0;
    let mut held_seen = 0;
    let mut host = |v: &mut Vault, _to: &Address, _amount: Wei| -> Result<(), HostError> {
        depth_seen = v.call_depth();
        held_seen = v.contract_balance();
        Ok(())
    };
    vault
        .withdraw(&mut host, &CallContext::new(user), eth("1.0"))
        .unwrap();

    assert_eq!(depth_seen, 1);
    assert_eq!(held_seen, 0);
    assert_eq!(vault.call_depth(), 0);
}

#[test]
fn guard_rejects_reentrant_deposit_and_approve_too() {
    let user = Address::derive("user");
    let mut vault = Vault::new();
    vault
        .deposit(&CallContext::with_value(user, eth("1.0")))
        .unwrap();

    let mut results = Vec::new();
    let mut host = |v: &mut Vault, to: &Address, _amount: Wei| -> Result<(), HostError> {
        results.push(v.deposit(&CallContext::with_value(*to, 1)));
        results.push(v.approve(&CallContext::new(*to), Address::ZERO, 0));
        results.push(v.withdraw(&mut NullHost, &CallContext::new(*to), 0));
        Ok(())
    };
    vault
        .withdraw(&mut host, &CallContext::new(user), eth("0.1"))
        .unwrap();

    assert_eq!(results, vec![Err(VaultError::ReentrantCall); 3]);
    assert_eq!(vault.events().len(), 2);
}

#[test]
fn failed_outer_call_discards_nested_effects() {
    let user = Address::derive("user");
    let mut vault = Vault::with_config(VaultConfig {
        reentrancy_guard: false,
    });
    vault
        .deposit(&CallContext::with_value(user, eth("1.0")))
        .unwrap();
    let before = vault.state().clone();
    let events_before = vault.events().len();

    // Nested withdraw commits, then the outer transfer is refused.
    let mut host = |v: &mut Vault, to: &Address, amount: Wei| -> Result<(), HostError> {
        v.withdraw(&mut NullHost, &CallContext::new(*to), eth("0.2"))
            .expect("nested withdraw within balance");
        Err(HostError::TransferRejected {
            to: *to,
            amount,
            reason: "recipient reverted".into(),
        })
    };
    let result = vault.withdraw(&mut host, &CallContext::new(user), eth("0.5"));

    assert_eq!(result.unwrap_err().code(), "TransferFailed");
    assert_eq!(vault.state(), &before);
    assert_eq!(vault.events().len(), events_before);
}
