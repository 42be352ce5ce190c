//! # Depositor Set
//!
//! Insertion-ordered set of principals that have ever deposited. Backed by
//! a `Vec` for stable enumeration and a `HashSet` for O(1) membership, so
//! repeated deposits never rescan the list.
//!
//! Membership means "has ever deposited", not "currently holds funds": a
//! principal who withdraws down to zero stays in the set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use vault_protocol::identity::Address;

/// Ordered, duplicate-free list of depositors.
///
/// Serializes as the plain ordered list; the membership index is rebuilt
/// on the way back in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Address>", into = "Vec<Address>")]
pub struct DepositorSet {
    order: Vec<Address>,
    index: HashSet<Address>,
}

impl DepositorSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `address` if it is not already present.
    ///
    /// Returns `true` on first insertion, `false` if it was already there.
    pub fn insert(&mut self, address: Address) -> bool {
        if !self.index.insert(address) {
            return false;
        }
        self.order.push(address);
        true
    }

    /// Returns `true` if `address` has ever been inserted.
    pub fn contains(&self, address: &Address) -> bool {
        self.index.contains(address)
    }

    /// Number of distinct depositors.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no one has deposited yet.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Depositors in first-deposit order.
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.order.iter()
    }

    /// Depositors in first-deposit order, as a slice.
    pub fn as_slice(&self) -> &[Address] {
        &self.order
    }
}

impl PartialEq for DepositorSet {
    fn eq(&self, other: &Self) -> bool {
        // The index is derived from `order`.
        self.order == other.order
    }
}

impl Eq for DepositorSet {}

impl From<Vec<Address>> for DepositorSet {
    fn from(addresses: Vec<Address>) -> Self {
        let mut set = Self::new();
        for address in addresses {
            set.insert(address);
        }
        set
    }
}

impl From<DepositorSet> for Vec<Address> {
    fn from(set: DepositorSet) -> Self {
        set.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::derive(label)
    }

    #[test]
    fn insert_is_idempotent() {
        let mut set = DepositorSet::new();
        assert!(set.insert(addr("alice")));
        assert!(!set.insert(addr("alice")));
        assert!(!set.insert(addr("alice")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn enumeration_keeps_first_insertion_order() {
        let mut set = DepositorSet::new();
        set.insert(addr("carol"));
        set.insert(addr("alice"));
        set.insert(addr("carol"));
        set.insert(addr("bob"));

        let order: Vec<Address> = set.iter().copied().collect();
        assert_eq!(order, vec![addr("carol"), addr("alice"), addr("bob")]);
    }

    #[test]
    fn contains_tracks_membership() {
        let mut set = DepositorSet::new();
        assert!(set.is_empty());
        set.insert(addr("alice"));
        assert!(set.contains(&addr("alice")));
        assert!(!set.contains(&addr("bob")));
    }

    #[test]
    fn deserialization_rebuilds_index_and_drops_duplicates() {
        let a = addr("alice");
        let b = addr("bob");
        let json = serde_json::to_string(&vec![a, b, a]).unwrap();
        let set: DepositorSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set.as_slice(), &[a, b]);
        assert!(set.contains(&b));
    }

    #[test]
    fn serializes_as_plain_list() {
        let mut set = DepositorSet::new();
        set.insert(addr("alice"));
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
        assert_eq!(json.as_array().unwrap().len(), 1);
    }
}
