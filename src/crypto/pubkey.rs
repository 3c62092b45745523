//! 32-byte public key representation and base58 utilities.

use std::fmt;
use std::str::FromStr;

/// Longest base58 rendering of a 32-byte value.
pub const MAX_ADDRESS_LEN: usize = 44;

/// The base58 alphabet used for address rendering.
pub const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Token-2022 program id (`TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb`).
pub const TOKEN_2022_PROGRAM_ID: Pubkey = Pubkey::from_bytes([
    6, 221, 246, 225, 238, 117, 143, 222, 24, 66, 93, 188, 228, 108, 205, 218, 182, 26, 252, 77,
    131, 185, 13, 39, 254, 189, 249, 40, 216, 161, 139, 252,
]);

/// Errors produced when parsing a public key from text.
#[derive(Debug, thiserror::Error)]
pub enum PubkeyError {
    #[error("invalid base58: {0}")]
    Base58(#[from] bs58::decode::Error),

    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

/// A 32-byte public key, program id or derived address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    /// Creates a key from raw bytes.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the key as raw bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the base58 string form.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Returns the key as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Encodes `key` into `buf` without allocating, returning the encoded length.
#[inline]
pub fn encode_address(
    key: &Pubkey,
    buf: &mut [u8; MAX_ADDRESS_LEN],
) -> Result<usize, bs58::encode::Error> {
    bs58::encode(key.as_bytes()).onto(&mut buf[..])
}

impl FromStr for Pubkey {
    type Err = PubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim()).into_vec()?;
        let len = bytes.len();
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| PubkeyError::Length(len))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self.to_base58())
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_program_id() {
        let parsed: Pubkey = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb".parse().unwrap();
        assert_eq!(parsed, TOKEN_2022_PROGRAM_ID);
        assert_eq!(
            TOKEN_2022_PROGRAM_ID.to_string(),
            "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb"
        );
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(
            Pubkey::from_bytes([0u8; 32]).to_base58(),
            "11111111111111111111111111111111"
        );

        let mut bytes = [0xffu8; 32];
        bytes[0] = 0;
        assert_eq!(
            Pubkey::from_bytes(bytes).to_base58(),
            "14uQeVj5tqViQh7yWWGStvkEG1Zmhx6uasJtWCJziofL"
        );
    }

    #[test]
    fn test_encode_into_buffer() {
        let key = Pubkey::from_bytes([0xffu8; 32]);
        let mut buf = [0u8; MAX_ADDRESS_LEN];
        let len = encode_address(&key, &mut buf).unwrap();
        assert_eq!(len, MAX_ADDRESS_LEN);
        assert_eq!(
            std::str::from_utf8(&buf[..len]).unwrap(),
            "JEKNVnkbo3jma5nREBBJCDoXFVeKkD56V3xKrvRmWxFG"
        );
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(matches!("112".parse::<Pubkey>(), Err(PubkeyError::Length(3))));
        assert!(matches!("0OIl".parse::<Pubkey>(), Err(PubkeyError::Base58(_))));
    }
}
