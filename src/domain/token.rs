//! ERC-20 read calls: `balanceOf(address)` and `decimals()`.

use alloy_primitives::{Address, Bytes, U256};

/// `bytes4(keccak256("balanceOf(address)"))`
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// `bytes4(keccak256("decimals()"))`
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

pub fn balance_of_calldata(owner: Address) -> Bytes {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(owner.into_word().as_slice());
    Bytes::from(data)
}

pub fn decimals_calldata() -> Bytes {
    Bytes::copy_from_slice(&DECIMALS_SELECTOR)
}

/// Decode a single `uint256` return word.
pub fn decode_uint256(ret: &[u8]) -> Result<U256, String> {
    if ret.len() != 32 {
        return Err(format!("expected 32-byte return word, got {} bytes", ret.len()));
    }
    Ok(U256::from_be_slice(ret))
}

/// Decode a `uint8` return word, rejecting values with high bits set.
pub fn decode_uint8(ret: &[u8]) -> Result<u8, String> {
    let word = decode_uint256(ret)?;
    u8::try_from(word).map_err(|_| format!("decimals out of range: {word}"))
}

/// Split calldata into selector and arguments.
pub fn split_selector(data: &[u8]) -> Option<([u8; 4], &[u8])> {
    if data.len() < 4 {
        return None;
    }
    let selector: [u8; 4] = data[..4].try_into().ok()?;
    Some((selector, &data[4..]))
}

/// Encode a value as a 32-byte return word.
pub fn encode_word(value: U256) -> Bytes {
    Bytes::from(value.to_be_bytes::<32>().to_vec())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::keccak256;

    use super::*;

    #[test]
    fn test_selectors() {
        assert_eq!(keccak256("balanceOf(address)")[..4], BALANCE_OF_SELECTOR);
        assert_eq!(keccak256("decimals()")[..4], DECIMALS_SELECTOR);
    }

    #[test]
    fn test_balance_of_calldata_layout() {
        let owner: Address = "0x2dF2582739737BEAe10Bd764E63bBC07668820d1".parse().unwrap();
        let data = balance_of_calldata(owner);
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &BALANCE_OF_SELECTOR);
        assert!(data[4..16].iter().all(|b| *b == 0));
        assert_eq!(&data[16..], owner.as_slice());
    }

    #[test]
    fn test_decode_words() {
        let word = encode_word(U256::from(18u64));
        assert_eq!(decode_uint8(&word).unwrap(), 18);
        assert_eq!(decode_uint256(&word).unwrap(), U256::from(18u64));

        assert!(decode_uint256(&[0u8; 31]).is_err());
        assert!(decode_uint8(&encode_word(U256::from(256u64))).is_err());
    }
}
