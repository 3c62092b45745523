//! Search request and up-front validation.

use std::str::FromStr;

use crate::crypto::{Pubkey, MAX_ADDRESS_LEN, MAX_LANE_INDEX, MAX_SEED_LEN, MIN_SEED_LEN};
use crate::matcher::{Pattern, Position};

/// Default number of attempts between a worker's progress reports.
pub const DEFAULT_BATCH_SIZE: u64 = 1_000;

/// Default candidates per batch-kernel dispatch.
pub const DEFAULT_LANES: usize = 1 << 16;

/// Upper bound on candidates per batch-kernel dispatch.
pub const MAX_LANES: usize = 1 << 24;

/// Optional data-parallel engine used next to, or instead of, CPU workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accelerator {
    /// CPU worker threads only
    #[default]
    None,
    /// CPU lane kernel replacing the per-thread workers
    Lanes,
    /// OpenCL kernel alongside the CPU workers
    Gpu,
}

impl FromStr for Accelerator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "cpu" | "threads" => Ok(Accelerator::None),
            "lanes" | "batch" => Ok(Accelerator::Lanes),
            "gpu" | "opencl" => Ok(Accelerator::Gpu),
            _ => Err(format!("Unknown accelerator: {}", s)),
        }
    }
}

impl std::fmt::Display for Accelerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Accelerator::None => write!(f, "none"),
            Accelerator::Lanes => write!(f, "lanes"),
            Accelerator::Gpu => write!(f, "gpu"),
        }
    }
}

/// Reasons a request is rejected before any work starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("pattern cannot be empty")]
    EmptyPattern,

    #[error("pattern is {len} characters, addresses are at most {max}")]
    PatternTooLong { len: usize, max: usize },

    #[error("pattern character {0:?} never appears in a base58 address")]
    InvalidCharacter(char),

    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    #[error("seed length {len} outside {min}..={max}")]
    SeedLength { len: usize, min: usize, max: usize },

    #[error("lane count {0} outside 1..={max}", max = MAX_LANES)]
    LaneCount(usize),

    #[error("position {position} is not supported by the {accelerator} accelerator")]
    UnsupportedPosition {
        position: Position,
        accelerator: Accelerator,
    },
}

/// Immutable parameters of one search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Anchor key for every candidate
    pub base_pubkey: Pubkey,
    /// Program the derived account belongs to
    pub program_id: Pubkey,
    /// Vanity pattern
    pub pattern: String,
    /// Where the pattern must appear
    pub position: Position,
    /// Ignore ASCII case when matching
    pub case_insensitive: bool,
    /// Number of CPU workers (or lane-kernel threads)
    pub worker_count: usize,
    /// Attempts between worker progress reports
    pub batch_size: u64,
    /// Characters per seed candidate
    pub seed_len: usize,
    /// Optional data-parallel engine
    pub accelerator: Accelerator,
    /// Candidates per kernel dispatch
    pub lanes: usize,
    /// OpenCL device index
    pub gpu_device: usize,
    /// Per-worker attempt cap; `None` searches until matched or cancelled
    pub max_attempts: Option<u64>,
}

impl SearchRequest {
    /// Creates a request with default tuning.
    pub fn new(
        base_pubkey: Pubkey,
        program_id: Pubkey,
        pattern: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            base_pubkey,
            program_id,
            pattern: pattern.into(),
            position,
            case_insensitive: false,
            worker_count: num_cpus::get(),
            batch_size: DEFAULT_BATCH_SIZE,
            seed_len: MAX_SEED_LEN,
            accelerator: Accelerator::None,
            lanes: DEFAULT_LANES,
            gpu_device: 0,
            max_attempts: None,
        }
    }

    /// Returns the compiled matcher for this request.
    pub fn compiled_pattern(&self) -> Pattern {
        Pattern::new(self.pattern.as_str(), self.position, self.case_insensitive)
    }

    /// Checks every precondition of the search.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.pattern.is_empty() {
            return Err(RequestError::EmptyPattern);
        }

        let len = self.pattern.chars().count();
        if len > MAX_ADDRESS_LEN {
            return Err(RequestError::PatternTooLong {
                len,
                max: MAX_ADDRESS_LEN,
            });
        }

        if let Some(c) = self.compiled_pattern().first_impossible_char() {
            return Err(RequestError::InvalidCharacter(c));
        }

        if self.worker_count == 0 {
            return Err(RequestError::ZeroWorkers);
        }

        if self.batch_size == 0 {
            return Err(RequestError::ZeroBatchSize);
        }

        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&self.seed_len) {
            return Err(RequestError::SeedLength {
                len: self.seed_len,
                min: MIN_SEED_LEN,
                max: MAX_SEED_LEN,
            });
        }

        if self.accelerator != Accelerator::None
            && (self.lanes == 0 || self.lanes > MAX_LANES || self.lanes as u64 > MAX_LANE_INDEX)
        {
            return Err(RequestError::LaneCount(self.lanes));
        }

        // The OpenCL kernel only implements suffix matching.
        if self.accelerator == Accelerator::Gpu && self.position == Position::Start {
            return Err(RequestError::UnsupportedPosition {
                position: self.position,
                accelerator: self.accelerator,
            });
        }

        Ok(())
    }
}
