//! Seed-based address derivation.
//!
//! Reproduces the "create address with seed" convention bit for bit:
//!   address = sha256(base || seed || program_id)
//! rendered as base58 for display and matching.

use sha2::{Digest, Sha256};

use super::pubkey::{encode_address, Pubkey, MAX_ADDRESS_LEN};

/// Longest seed accepted by the on-chain equivalent.
pub const MAX_SEED_LEN: usize = 32;

/// A derived address: raw key plus its base58 string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAddress {
    pub pubkey: Pubkey,
    pub encoded: String,
}

/// Derives the 32-byte address for `seed` under `base` and `program_id`.
#[inline]
pub fn derive_with_seed(base: &Pubkey, seed: &[u8], program_id: &Pubkey) -> Pubkey {
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    hasher.update(seed);
    hasher.update(program_id.as_bytes());
    Pubkey::from_bytes(hasher.finalize().into())
}

/// Derives an address and renders it.
pub fn derive_address(
    base: &Pubkey,
    seed: &[u8],
    program_id: &Pubkey,
) -> Result<DerivedAddress, bs58::encode::Error> {
    let pubkey = derive_with_seed(base, seed, program_id);
    let mut buf = [0u8; MAX_ADDRESS_LEN];
    let len = encode_address(&pubkey, &mut buf)?;
    // base58 output is always ASCII
    let encoded = String::from_utf8_lossy(&buf[..len]).into_owned();
    Ok(DerivedAddress { pubkey, encoded })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TOKEN_2022_PROGRAM_ID;

    #[test]
    fn test_known_vector() {
        let base = Pubkey::from_bytes([0u8; 32]);
        let program_id = Pubkey::from_bytes([1u8; 32]);
        let derived = derive_with_seed(&base, b"test", &program_id);

        assert_eq!(
            derived.to_hex(),
            "138b167e7fa077cf68341452146378fba1ff4c9d8346bb023d05a692b9806c16"
        );
        assert_eq!(
            derived.to_base58(),
            "2KHks6tfJJ6V9z8RRTBur4JzdetNCohxdtDF9RZfoJhK"
        );
    }

    #[test]
    fn test_deterministic() {
        let base = Pubkey::from_bytes([1u8; 32]);
        let first = derive_address(&base, b"abcdefghijklmnop", &TOKEN_2022_PROGRAM_ID).unwrap();
        let second = derive_address(&base, b"abcdefghijklmnop", &TOKEN_2022_PROGRAM_ID).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.encoded, "6kWfUj1952FYBeMVPsHu14CDH3B6KXK8gGQqHmodNLFc");
    }

    #[test]
    fn test_matches_concatenated_hash() {
        let base = Pubkey::from_bytes([7u8; 32]);
        let program_id = Pubkey::from_bytes([9u8; 32]);
        let seed = b"some-seed";

        let mut buf = Vec::new();
        buf.extend_from_slice(base.as_bytes());
        buf.extend_from_slice(seed);
        buf.extend_from_slice(program_id.as_bytes());
        let expected: [u8; 32] = Sha256::digest(&buf).into();

        assert_eq!(derive_with_seed(&base, seed, &program_id).as_bytes(), &expected);
    }
}
