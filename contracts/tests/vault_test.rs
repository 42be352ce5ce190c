//! Integration tests for the vault contract.
//!
//! These walk through the deposit / withdraw / approve / withdraw-on-behalf
//! lifecycle the way a host would drive it: one call at a time, each with
//! its own caller context, amounts written as decimal strings.

use vault_contracts::vault::{Vault, VaultError, VaultEvent};
use vault_protocol::amount::{parse_units, Wei};
use vault_protocol::host::{CallContext, NullHost};
use vault_protocol::identity::Address;

/// Helper: decimal string to wei.
fn eth(amount: &str) -> Wei {
    parse_units(amount).expect("valid test amount")
}

fn principals() -> (Address, Address, Address) {
    (
        Address::derive("owner"),
        Address::derive("user1"),
        Address::derive("user2"),
    )
}

fn deposit(vault: &mut Vault, who: Address, amount: &str) {
    vault
        .deposit(&CallContext::with_value(who, eth(amount)))
        .expect("deposit");
}

// ---------------------------------------------------------------------------
// Deposits
// ---------------------------------------------------------------------------

#[test]
fn deposit_is_credited_and_announced() {
    let (_, user1, _) = principals();
    let mut vault = Vault::new();

    deposit(&mut vault, user1, "1.0");

    assert_eq!(
        vault.events(),
        &[VaultEvent::Deposit {
            principal: user1,
            amount: eth("1.0")
        }]
    );
    assert_eq!(vault.balance_of(&user1), eth("1.0"));
    assert_eq!(vault.contract_balance(), eth("1.0"));
    assert_eq!(vault.depositors(), &[user1]);
}

#[test]
fn zero_deposit_rejected() {
    let (_, user1, _) = principals();
    let mut vault = Vault::new();
    let result = vault.deposit(&CallContext::with_value(user1, 0));
    assert_eq!(result, Err(VaultError::InvalidAmount));
}

#[test]
fn depositors_tracked_once_each() {
    let (_, user1, user2) = principals();
    let mut vault = Vault::new();

    deposit(&mut vault, user1, "1.0");
    deposit(&mut vault, user2, "1.0");
    deposit(&mut vault, user1, "1.0");
    deposit(&mut vault, user2, "0.1");

    assert_eq!(vault.total_depositors(), 2);
    assert_eq!(vault.depositors(), &[user1, user2]);
}

#[test]
fn repeated_deposits_do_not_duplicate_depositor() {
    let (_, user1, _) = principals();
    let mut vault = Vault::new();
    deposit(&mut vault, user1, "1.0");
    deposit(&mut vault, user1, "1.0");
    assert_eq!(vault.total_depositors(), 1);
    assert_eq!(vault.balance_of(&user1), eth("2.0"));
}

#[test]
fn depositor_stays_listed_after_withdrawing_everything() {
    let (_, user1, _) = principals();
    let mut vault = Vault::new();
    deposit(&mut vault, user1, "1.0");
    vault
        .withdraw(&mut NullHost, &CallContext::new(user1), eth("1.0"))
        .unwrap();

    assert_eq!(vault.balance_of(&user1), 0);
    assert_eq!(vault.total_depositors(), 1);
    assert_eq!(vault.depositors(), &[user1]);
}

// ---------------------------------------------------------------------------
// Withdrawals
// ---------------------------------------------------------------------------

#[test]
fn partial_withdrawal() {
    let (_, user1, _) = principals();
    let mut vault = Vault::new();
    deposit(&mut vault, user1, "1.0");

    vault
        .withdraw(&mut NullHost, &CallContext::new(user1), eth("0.5"))
        .unwrap();

    assert_eq!(
        vault.events().last(),
        Some(&VaultEvent::Withdrawal {
            spender: user1,
            owner: user1,
            amount: eth("0.5")
        })
    );
    assert_eq!(vault.balance_of(&user1), eth("0.5"));
    assert_eq!(vault.contract_balance(), eth("0.5"));
}

#[test]
fn withdrawal_with_empty_balance_rejected_and_state_unchanged() {
    let (_, user1, _) = principals();
    let mut vault = Vault::new();
    let before = vault.state().clone();

    let result = vault.withdraw(&mut NullHost, &CallContext::new(user1), eth("1.0"));

    assert!(matches!(
        result,
        Err(VaultError::InsufficientBalance { balance: 0, .. })
    ));
    assert_eq!(vault.state(), &before);
    assert!(vault.events().is_empty());
}

#[test]
fn cannot_withdraw_someone_elses_balance() {
    let (_, user1, user2) = principals();
    let mut vault = Vault::new();
    deposit(&mut vault, user1, "1.0");

    let result = vault.withdraw(&mut NullHost, &CallContext::new(user2), eth("0.1"));
    assert_eq!(result.unwrap_err().code(), "InsufficientBalance");
    assert_eq!(vault.balance_of(&user1), eth("1.0"));
}

#[test]
fn zero_withdrawal_is_allowed() {
    let (_, user1, _) = principals();
    let mut vault = Vault::new();
    vault
        .withdraw(&mut NullHost, &CallContext::new(user1), 0)
        .unwrap();
    assert_eq!(vault.events().len(), 1);
}

// ---------------------------------------------------------------------------
// Allowances
// ---------------------------------------------------------------------------

#[test]
fn approve_sets_allowance_and_announces_it() {
    let (_, user1, user2) = principals();
    let mut vault = Vault::new();
    deposit(&mut vault, user1, "1.0");

    vault
        .approve(&CallContext::new(user1), user2, eth("0.5"))
        .unwrap();

    assert_eq!(
        vault.events().last(),
        Some(&VaultEvent::AllowanceSet {
            owner: user1,
            spender: user2,
            amount: eth("0.5")
        })
    );
    assert_eq!(vault.allowance(&user1, &user2), eth("0.5"));
}

#[test]
fn allowance_above_balance_rejected() {
    let (_, user1, user2) = principals();
    let mut vault = Vault::new();
    let result = vault.approve(&CallContext::new(user1), user2, eth("1.0"));
    assert_eq!(result.unwrap_err().code(), "InsufficientBalanceToApprove");
    assert_eq!(vault.allowance(&user1, &user2), 0);
}

#[test]
fn approve_zero_revokes() {
    let (_, user1, user2) = principals();
    let mut vault = Vault::new();
    deposit(&mut vault, user1, "1.0");
    let ctx = CallContext::new(user1);
    vault.approve(&ctx, user2, eth("0.5")).unwrap();
    vault.approve(&ctx, user2, 0).unwrap();

    let result = vault.withdraw_from(&mut NullHost, &CallContext::new(user2), user1, 1);
    assert_eq!(result.unwrap_err().code(), "InsufficientAllowance");
}

#[test]
fn withdraw_from_within_allowance() {
    let (_, user1, user2) = principals();
    let mut vault = Vault::new();
    deposit(&mut vault, user1, "1.0");
    vault
        .approve(&CallContext::new(user1), user2, eth("0.5"))
        .unwrap();

    vault
        .withdraw_from(&mut NullHost, &CallContext::new(user2), user1, eth("0.3"))
        .unwrap();

    assert_eq!(
        vault.events().last(),
        Some(&VaultEvent::Withdrawal {
            spender: user2,
            owner: user1,
            amount: eth("0.3")
        })
    );
    assert_eq!(vault.balance_of(&user1), eth("0.7"));
    assert_eq!(vault.allowance(&user1, &user2), eth("0.2"));
    assert_eq!(vault.contract_balance(), eth("0.7"));
}

#[test]
fn withdraw_from_without_allowance_rejected() {
    let (_, user1, user2) = principals();
    let mut vault = Vault::new();
    deposit(&mut vault, user1, "1.0");

    let result = vault.withdraw_from(&mut NullHost, &CallContext::new(user2), user1, eth("0.5"));
    assert_eq!(
        result,
        Err(VaultError::InsufficientAllowance {
            allowance: 0,
            amount: eth("0.5")
        })
    );
}

#[test]
fn withdraw_from_rejected_when_owner_balance_shrank_below_allowance() {
    let (_, user1, user2) = principals();
    let mut vault = Vault::new();
    deposit(&mut vault, user1, "1.0");
    vault
        .approve(&CallContext::new(user1), user2, eth("0.5"))
        .unwrap();
    vault
        .withdraw(&mut NullHost, &CallContext::new(user1), eth("0.8"))
        .unwrap();
    let before = vault.state().clone();

    let result = vault.withdraw_from(&mut NullHost, &CallContext::new(user2), user1, eth("0.5"));

    assert_eq!(
        result,
        Err(VaultError::OwnerInsufficientBalance {
            balance: eth("0.2"),
            amount: eth("0.5")
        })
    );
    assert_eq!(vault.state(), &before);
    assert_eq!(vault.allowance(&user1, &user2), eth("0.5"));
}

#[test]
fn multiple_spenders_draw_independently() {
    let (owner, user1, user2) = principals();
    let mut vault = Vault::new();
    deposit(&mut vault, user1, "2.0");
    let ctx = CallContext::new(user1);
    vault.approve(&ctx, user2, eth("0.5")).unwrap();
    vault.approve(&ctx, owner, eth("0.3")).unwrap();

    assert_eq!(vault.allowance(&user1, &user2), eth("0.5"));
    assert_eq!(vault.allowance(&user1, &owner), eth("0.3"));

    vault
        .withdraw_from(&mut NullHost, &CallContext::new(user2), user1, eth("0.5"))
        .unwrap();
    vault
        .withdraw_from(&mut NullHost, &CallContext::new(owner), user1, eth("0.3"))
        .unwrap();

    assert_eq!(vault.balance_of(&user1), eth("1.2"));
    assert_eq!(vault.allowance(&user1, &user2), 0);
    assert_eq!(vault.allowance(&user1, &owner), 0);
    assert!(vault.check_conservation());
}

#[test]
fn allowance_cannot_be_spent_twice() {
    let (_, user1, user2) = principals();
    let mut vault = Vault::new();
    deposit(&mut vault, user1, "1.0");
    vault
        .approve(&CallContext::new(user1), user2, eth("0.5"))
        .unwrap();
    let spender = CallContext::new(user2);
    vault
        .withdraw_from(&mut NullHost, &spender, user1, eth("0.5"))
        .unwrap();
    let result = vault.withdraw_from(&mut NullHost, &spender, user1, eth("0.5"));
    assert_eq!(result.unwrap_err().code(), "InsufficientAllowance");
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

#[test]
fn state_json_roundtrip() {
    let (_, user1, user2) = principals();
    let mut vault = Vault::new();
    deposit(&mut vault, user1, "1.0");
    deposit(&mut vault, user2, "0.25");
    vault
        .approve(&CallContext::new(user1), user2, eth("0.5"))
        .unwrap();

    let json = serde_json::to_string(vault.state()).unwrap();
    let restored: vault_contracts::VaultState = serde_json::from_str(&json).unwrap();

    assert_eq!(&restored, vault.state());
    assert_eq!(restored.allowance(&user1, &user2), eth("0.5"));
    assert_eq!(restored.depositors().as_slice(), &[user1, user2]);
}
