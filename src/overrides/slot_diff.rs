//! Storage slot differ
//!
//! `balanceOf(from)` and `allowance(from, to)` against the same token read the
//! same implementation/metadata slots plus one mapping entry each. Keeping only
//! the token's own entries and taking the symmetric difference isolates those
//! two mapping entries. Anything other than exactly two survivors is rejected.

use alloy_eips::eip2930::AccessListItem;
use alloy_primitives::{Address, B256};
use std::collections::BTreeSet;

use crate::error::{Result, SimulationError};

/// Storage keys of the single entry for `token`
fn token_keys(token: Address, entries: &[AccessListItem]) -> Result<BTreeSet<B256>> {
    let own: Vec<&AccessListItem> = entries.iter().filter(|e| e.address == token).collect();
    match own.as_slice() {
        [entry] => Ok(entry.storage_keys.iter().copied().collect()),
        _ => Err(SimulationError::InvalidAccessListLength { token, found: own.len() }),
    }
}

/// The two mapping-entry slots unique to the balance and allowance probes.
/// Output order follows key order, not probe order.
pub fn diff_storage_slots(
    token: Address,
    balance_probe: &[AccessListItem],
    allowance_probe: &[AccessListItem],
) -> Result<[B256; 2]> {
    let balance_keys = token_keys(token, balance_probe)?;
    let allowance_keys = token_keys(token, allowance_probe)?;

    let unique: Vec<B256> = balance_keys.symmetric_difference(&allowance_keys).copied().collect();
    match unique.as_slice() {
        [a, b] => Ok([*a, *b]),
        _ => Err(SimulationError::InvalidStorageKeyCount { token, found: unique.len() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const TOKEN: Address = address!("7070707070707070707070707070707070707070");

    fn key(n: u8) -> B256 {
        B256::repeat_byte(n)
    }

    fn entry(address: Address, keys: &[u8]) -> AccessListItem {
        AccessListItem { address, storage_keys: keys.iter().map(|n| key(*n)).collect() }
    }

    #[test]
    fn test_common_keys_cancel() {
        // 3 shared implementation/metadata slots + one mapping slot per probe
        let balance = vec![entry(TOKEN, &[1, 2, 3, 10])];
        let allowance = vec![entry(TOKEN, &[1, 2, 3, 20])];

        let slots = diff_storage_slots(TOKEN, &balance, &allowance).unwrap();
        assert_eq!(slots, [key(10), key(20)]);
    }

    #[test]
    fn test_foreign_entries_are_ignored() {
        let implementation = Address::repeat_byte(0x11);
        let balance = vec![entry(implementation, &[7, 8]), entry(TOKEN, &[1, 10])];
        let allowance = vec![entry(TOKEN, &[1, 20]), entry(implementation, &[7, 9])];

        let slots = diff_storage_slots(TOKEN, &balance, &allowance).unwrap();
        assert_eq!(slots, [key(10), key(20)]);
    }

    #[test]
    fn test_four_unique_keys_rejected() {
        let balance = vec![entry(TOKEN, &[1, 10, 11])];
        let allowance = vec![entry(TOKEN, &[1, 20, 21])];

        let err = diff_storage_slots(TOKEN, &balance, &allowance).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidStorageKeyCount { found: 4, .. }));
    }

    #[test]
    fn test_identical_probes_rejected() {
        let balance = vec![entry(TOKEN, &[1, 2])];
        let err = diff_storage_slots(TOKEN, &balance, &balance).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidStorageKeyCount { found: 0, .. }));
    }

    #[test]
    fn test_missing_or_duplicate_token_entry_rejected() {
        let foreign_only = vec![entry(Address::repeat_byte(0x11), &[1])];
        let ok = vec![entry(TOKEN, &[1, 20])];
        assert!(matches!(
            diff_storage_slots(TOKEN, &foreign_only, &ok),
            Err(SimulationError::InvalidAccessListLength { found: 0, .. })
        ));

        let duplicated = vec![entry(TOKEN, &[1]), entry(TOKEN, &[10])];
        assert!(matches!(
            diff_storage_slots(TOKEN, &ok, &duplicated),
            Err(SimulationError::InvalidAccessListLength { found: 2, .. })
        ));
    }
}
