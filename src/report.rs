//! Machine-readable result block printed by the CLI.

use std::time::Duration;

use serde::Serialize;

use crate::crypto::Pubkey;
use crate::worker::FoundAddress;

pub const RESULT_START: &str = "RESULT_START";
pub const RESULT_END: &str = "RESULT_END";

/// JSON payload describing a found address.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRecord {
    pub base_pubkey: String,
    pub seed: String,
    pub seed_hex: String,
    pub token_address: String,
    /// Seconds from start to match
    pub time_taken: f64,
    /// Attempts across all workers
    pub attempts: u64,
}

impl ResultRecord {
    pub fn new(base_pubkey: &Pubkey, found: &FoundAddress, elapsed: Duration, attempts: u64) -> Self {
        Self {
            base_pubkey: base_pubkey.to_base58(),
            seed: found.seed.as_str().to_owned(),
            seed_hex: found.seed.to_hex(),
            token_address: found.address.encoded.clone(),
            time_taken: elapsed.as_secs_f64(),
            attempts,
        }
    }

    /// Renders the record between the `RESULT_START` and `RESULT_END` marker lines.
    pub fn to_block(&self) -> serde_json::Result<String> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(format!("{}\n{}\n{}", RESULT_START, json, RESULT_END))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_address, Seed, TOKEN_2022_PROGRAM_ID};

    #[test]
    fn test_result_block() {
        let base = Pubkey::from_bytes([1u8; 32]);
        let seed = Seed::from_str_checked("abcdefghijklmnop").unwrap();
        let address = derive_address(&base, seed.as_bytes(), &TOKEN_2022_PROGRAM_ID).unwrap();
        let found = FoundAddress {
            seed,
            address,
            attempts: 7,
            elapsed: Duration::from_millis(1500),
            worker_id: 0,
        };

        let block = ResultRecord::new(&base, &found, Duration::from_millis(2500), 42)
            .to_block()
            .unwrap();
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines.first(), Some(&RESULT_START));
        assert_eq!(lines.last(), Some(&RESULT_END));

        let json = &block[RESULT_START.len()..block.len() - RESULT_END.len()];
        let value: serde_json::Value = serde_json::from_str(json.trim()).unwrap();
        assert_eq!(value["base_pubkey"], "4vJ9JU1bJJE96FWSJKvHsmmFADCg4gpZQff4P3bkLKi");
        assert_eq!(value["seed"], "abcdefghijklmnop");
        assert_eq!(value["seed_hex"], "6162636465666768696a6b6c6d6e6f70");
        assert_eq!(value["token_address"], "6kWfUj1952FYBeMVPsHu14CDH3B6KXK8gGQqHmodNLFc");
        assert_eq!(value["time_taken"], 2.5);
        assert_eq!(value["attempts"], 42);
    }
}
