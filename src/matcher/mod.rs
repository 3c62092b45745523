//! Pattern matching for base58 addresses.
//!
//! Supports two anchoring positions:
//! - Start: match at the beginning of the address
//! - End: match at the end of the address

mod pattern;

pub use pattern::{matches, MatchResult, Pattern, Position};
