//! # Protocol Configuration & Constants
//!
//! Every magic number lives here. If you're hardcoding a constant
//! somewhere else, move it here.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Major version. Bump when the persisted state layout changes.
pub const PROTOCOL_VERSION_MAJOR: u16 = 0;

/// Minor version. Bump on backward-compatible additions.
pub const PROTOCOL_VERSION_MINOR: u16 = 1;

/// Patch version.
pub const PROTOCOL_VERSION_PATCH: u16 = 0;

/// The full version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Value Units
// ---------------------------------------------------------------------------

/// Decimal places of the native value unit. 18, same as ether, so amounts
/// written as `"1.0"` mean the same thing they mean everywhere else.
pub const VALUE_DECIMALS: u32 = 18;

/// Display symbol for the native value unit.
pub const VALUE_SYMBOL: &str = "ETH";

// ---------------------------------------------------------------------------
// Storage Keys
// ---------------------------------------------------------------------------

/// Snapshot key for the vault ledger state.
pub const VAULT_SNAPSHOT_KEY: &str = "vault";

/// Snapshot key for the counter state.
pub const COUNTER_SNAPSHOT_KEY: &str = "counter";

/// Snapshot key for the host's external wallet balances.
pub const WALLETS_SNAPSHOT_KEY: &str = "wallets";

// ---------------------------------------------------------------------------
// Counter Defaults
// ---------------------------------------------------------------------------

/// Price of a paid increment when the counter is created by the node:
/// 0.001 of a whole unit.
pub const DEFAULT_INCREMENT_PRICE: u128 = 1_000_000_000_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_matches_components() {
        assert_eq!(
            PROTOCOL_VERSION,
            format!(
                "{}.{}.{}",
                PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR, PROTOCOL_VERSION_PATCH
            )
        );
    }

    #[test]
    fn default_price_is_below_one_unit() {
        assert!(DEFAULT_INCREMENT_PRICE < 10u128.pow(VALUE_DECIMALS));
    }
}
