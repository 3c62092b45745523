//! # seed_vanity
//!
//! High-performance vanity search for seed-derived program addresses.
//!
//! An address is `sha256(base_pubkey || seed || program_id)` rendered in
//! base58; the search looks for a seed whose address starts or ends with a
//! chosen pattern.
//!
//! ## Architecture
//!
//! - `crypto`: Keys, address derivation and seed generation
//! - `matcher`: Pattern matching against base58 addresses
//! - `request`: Search parameters and validation
//! - `worker`: Parallel execution, batch kernels and the worker pool
//! - `report`: Result block emitted by the CLI
//! - `config`: Runtime configuration

pub mod config;
pub mod crypto;
pub mod matcher;
pub mod report;
pub mod request;
pub mod worker;

pub use config::{Config, ConfigError};
pub use crypto::{derive_address, derive_with_seed, DerivedAddress, Pubkey, Seed, SeedGenerator};
pub use matcher::{MatchResult, Pattern, Position};
pub use report::ResultRecord;
pub use request::{Accelerator, RequestError, SearchRequest};
pub use worker::{
    search, search_with_progress, CancelToken, FoundAddress, SearchError, SearchOutcome,
    Throughput, WorkerPool, WorkerState,
};

#[cfg(feature = "gpu")]
pub use worker::gpu::{GpuError, GpuKernel};
