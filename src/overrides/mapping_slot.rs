//! Solidity mapping slot layout
//!
//! slot(mapping[key]) = keccak256(pad32(key) ++ pad32(base_slot))

use alloy_primitives::{keccak256, Address, B256, U256};

fn hash_key(key: Address, base: B256) -> B256 {
    let mut encoded = [0u8; 64];
    encoded[12..32].copy_from_slice(key.as_slice());
    encoded[32..].copy_from_slice(base.as_slice());
    keccak256(encoded)
}

/// Slot of `mapping(address => _)[key]` declared at `base_slot`
pub fn mapping_slot(key: Address, base_slot: U256) -> B256 {
    hash_key(key, B256::from(base_slot.to_be_bytes::<32>()))
}

/// Slot of `mapping(address => mapping(address => _))[outer][inner]`
pub fn nested_mapping_slot(outer: Address, inner: Address, base_slot: U256) -> B256 {
    hash_key(inner, mapping_slot(outer, base_slot))
}

/// Storage word for `true`
pub fn bool_word(value: bool) -> B256 {
    B256::with_last_byte(value as u8)
}

/// Storage word for a uint256
pub fn uint_word(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_mapping_slot_layout() {
        let owner = address!("C36442b4a4522E871399CD717aBDD847Ab11FE88");
        let mut manual = [0u8; 64];
        manual[12..32].copy_from_slice(owner.as_slice());
        manual[63] = 5;
        assert_eq!(mapping_slot(owner, U256::from(5u64)), keccak256(manual));
    }

    #[test]
    fn test_nested_mapping_slot_layout() {
        let owner = Address::repeat_byte(0xaa);
        let operator = Address::repeat_byte(0xbb);
        let outer = mapping_slot(owner, U256::from(5u64));

        let mut manual = [0u8; 64];
        manual[12..32].copy_from_slice(operator.as_slice());
        manual[32..].copy_from_slice(outer.as_slice());
        assert_eq!(nested_mapping_slot(owner, operator, U256::from(5u64)), keccak256(manual));

        // Key order matters
        assert_ne!(
            nested_mapping_slot(owner, operator, U256::from(5u64)),
            nested_mapping_slot(operator, owner, U256::from(5u64))
        );
    }

    #[test]
    fn test_words() {
        assert_eq!(bool_word(true).as_slice()[31], 1);
        assert_eq!(bool_word(false), B256::ZERO);
        assert_eq!(uint_word(U256::from(1000u64)).as_slice()[30..], [0x03, 0xe8]);
    }
}
