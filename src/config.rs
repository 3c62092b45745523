//! Runtime configuration for the vanity address search.

use std::time::Duration;

use clap::Parser;

use crate::crypto::{Pubkey, PubkeyError, MAX_SEED_LEN, TOKEN_2022_PROGRAM_ID};
use crate::matcher::Position;
use crate::request::{
    Accelerator, RequestError, SearchRequest, DEFAULT_BATCH_SIZE, DEFAULT_LANES,
};

/// Seed-derived Vanity Address Generator
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Base public key the address is derived from (base58)
    #[arg(short, long)]
    pub base: String,

    /// Pattern to search for (base58 characters)
    #[arg(short, long)]
    pub pattern: String,

    /// Pattern position: start or end
    #[arg(short = 't', long, default_value = "end")]
    pub position: Position,

    /// Case insensitive matching
    #[arg(short = 'i', long, default_value = "false")]
    pub case_insensitive: bool,

    /// Number of worker threads (default: number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Owning program id (base58)
    #[arg(long, default_value_t = TOKEN_2022_PROGRAM_ID.to_base58())]
    pub program_id: String,

    /// Characters per seed
    #[arg(long, default_value_t = MAX_SEED_LEN)]
    pub seed_len: usize,

    /// Attempts between worker progress reports
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: u64,

    /// Progress report interval in seconds
    #[arg(short = 'r', long, default_value = "1")]
    pub report_interval: u64,

    /// Accelerator: none, lanes, or gpu
    #[arg(short = 'a', long, default_value = "none")]
    pub accelerator: Accelerator,

    /// Candidates per accelerator dispatch
    #[arg(long, default_value_t = DEFAULT_LANES)]
    pub lanes: usize,

    /// GPU device index to use
    #[cfg(feature = "gpu")]
    #[arg(long, default_value = "0")]
    pub gpu_device: usize,

    /// Give up after this many attempts per worker
    #[arg(long)]
    pub max_attempts: Option<u64>,
}

impl Config {
    /// Returns the number of workers, defaulting to CPU count
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }

    /// Returns the GPU device index.
    pub fn gpu_device_index(&self) -> usize {
        #[cfg(feature = "gpu")]
        {
            self.gpu_device
        }
        #[cfg(not(feature = "gpu"))]
        {
            0
        }
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_request().map(|_| ())
    }

    /// Builds the validated search request.
    pub fn to_request(&self) -> Result<SearchRequest, ConfigError> {
        let base_pubkey = parse_pubkey("base", &self.base)?;
        let program_id = parse_pubkey("program id", &self.program_id)?;

        if self.report_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "Report interval must be at least 1 second".into(),
            ));
        }

        if self.max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue(
                "Max attempts must be at least 1".into(),
            ));
        }

        let mut request =
            SearchRequest::new(base_pubkey, program_id, self.pattern.as_str(), self.position);
        request.case_insensitive = self.case_insensitive;
        request.worker_count = self.worker_count();
        request.batch_size = self.batch_size;
        request.seed_len = self.seed_len;
        request.accelerator = self.accelerator;
        request.lanes = self.lanes;
        request.gpu_device = self.gpu_device_index();
        request.max_attempts = self.max_attempts;

        request.validate()?;
        Ok(request)
    }
}

fn parse_pubkey(field: &'static str, value: &str) -> Result<Pubkey, ConfigError> {
    value
        .parse()
        .map_err(|source| ConfigError::InvalidPubkey { field, source })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {field}: {source}")]
    InvalidPubkey {
        field: &'static str,
        #[source]
        source: PubkeyError,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Request(#[from] RequestError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "4vJ9JU1bJJE96FWSJKvHsmmFADCg4gpZQff4P3bkLKi";

    fn make_test_config(pattern: &str) -> Config {
        Config {
            base: BASE.into(),
            pattern: pattern.into(),
            position: Position::End,
            case_insensitive: false,
            workers: Some(2),
            program_id: TOKEN_2022_PROGRAM_ID.to_base58(),
            seed_len: MAX_SEED_LEN,
            batch_size: DEFAULT_BATCH_SIZE,
            report_interval: 1,
            accelerator: Accelerator::None,
            lanes: DEFAULT_LANES,
            #[cfg(feature = "gpu")]
            gpu_device: 0,
            max_attempts: None,
        }
    }

    #[test]
    fn test_valid_pattern() {
        let config = make_test_config("pump");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_pattern() {
        let config = make_test_config("0xdead");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Request(RequestError::InvalidCharacter('0')))
        ));
    }

    #[test]
    fn test_to_request() {
        let mut config = make_test_config("Pump");
        config.case_insensitive = true;
        config.position = Position::Start;
        config.max_attempts = Some(10);

        let request = config.to_request().unwrap();
        assert_eq!(request.base_pubkey, Pubkey::from_bytes([1u8; 32]));
        assert_eq!(request.program_id, TOKEN_2022_PROGRAM_ID);
        assert_eq!(request.worker_count, 2);
        assert_eq!(request.position, Position::Start);
        assert!(request.case_insensitive);
        assert_eq!(request.max_attempts, Some(10));
    }

    #[test]
    fn test_invalid_base() {
        let mut config = make_test_config("abc");
        config.base = "not-base58!".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPubkey { field: "base", .. })
        ));
    }

    #[test]
    fn test_zero_report_interval() {
        let mut config = make_test_config("abc");
        config.report_interval = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_parse_args() {
        let config = Config::try_parse_from([
            "seed_vanity",
            "--base",
            BASE,
            "--pattern",
            "pump",
            "--position",
            "start",
            "-i",
            "--accelerator",
            "lanes",
        ])
        .unwrap();

        assert_eq!(config.position, Position::Start);
        assert!(config.case_insensitive);
        assert_eq!(config.accelerator, Accelerator::Lanes);
        assert_eq!(config.program_id, TOKEN_2022_PROGRAM_ID.to_base58());
        assert_eq!(config.seed_len, MAX_SEED_LEN);
    }
}
