//! Cryptographic operations for seed-derived vanity addresses.
//!
//! This module provides:
//! - The 32-byte `Pubkey` type with base58 rendering
//! - Address derivation via sha256(base || seed || program_id)
//! - Random seed generation

mod derive;
mod pubkey;
mod seed;

pub use derive::{derive_address, derive_with_seed, DerivedAddress, MAX_SEED_LEN};
pub use pubkey::{
    encode_address, Pubkey, PubkeyError, BASE58_ALPHABET, MAX_ADDRESS_LEN, TOKEN_2022_PROGRAM_ID,
};
pub use seed::{Seed, SeedGenerator, LANE_DIGITS, MAX_LANE_INDEX, MIN_SEED_LEN, SEED_CHARSET};
