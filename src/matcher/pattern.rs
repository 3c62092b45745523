//! Pattern matching implementation.

use std::str::FromStr;

use crate::crypto::BASE58_ALPHABET;

/// Where in the address the pattern must appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Match at the beginning of the address
    Start,
    /// Match at the end of the address
    #[default]
    End,
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "start" | "prefix" | "begin" => Ok(Position::Start),
            "end" | "suffix" => Ok(Position::End),
            _ => Err(format!("Unknown position: {} (expected start or end)", s)),
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Start => write!(f, "start"),
            Position::End => write!(f, "end"),
        }
    }
}

/// Result of a pattern match operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// Full match found
    Match,
    /// No match
    NoMatch,
}

impl MatchResult {
    #[inline]
    pub fn is_match(self) -> bool {
        matches!(self, MatchResult::Match)
    }
}

impl From<bool> for MatchResult {
    #[inline]
    fn from(matched: bool) -> Self {
        if matched {
            MatchResult::Match
        } else {
            MatchResult::NoMatch
        }
    }
}

/// Tests `address` for `pattern` at `position`.
///
/// An empty pattern matches every address.
pub fn matches(address: &str, pattern: &str, position: Position, case_insensitive: bool) -> bool {
    anchored(address.as_bytes(), pattern.as_bytes(), position, case_insensitive)
}

#[inline]
fn anchored(address: &[u8], pattern: &[u8], position: Position, fold_case: bool) -> bool {
    if pattern.len() > address.len() {
        return false;
    }
    let window = match position {
        Position::Start => &address[..pattern.len()],
        Position::End => &address[address.len() - pattern.len()..],
    };
    if fold_case {
        window.eq_ignore_ascii_case(pattern)
    } else {
        window == pattern
    }
}

/// A compiled pattern for efficient matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// The pattern string (lowercased when case insensitive)
    pattern: String,
    /// Where the pattern must appear
    position: Position,
    /// Whether matching ignores ASCII case
    case_insensitive: bool,
}

impl Pattern {
    /// Creates a new pattern.
    pub fn new(pattern: impl Into<String>, position: Position, case_insensitive: bool) -> Self {
        let pattern = pattern.into();
        let pattern = if case_insensitive {
            pattern.to_lowercase()
        } else {
            pattern
        };

        Self {
            pattern,
            position,
            case_insensitive,
        }
    }

    /// Returns the pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Matches a base58 address string against this pattern.
    #[inline]
    pub fn matches(&self, address: &str) -> MatchResult {
        self.matches_bytes(address.as_bytes()).into()
    }

    /// Matches raw ASCII address bytes, as produced by `encode_address`.
    #[inline]
    pub fn matches_bytes(&self, address: &[u8]) -> bool {
        anchored(
            address,
            self.pattern.as_bytes(),
            self.position,
            self.case_insensitive,
        )
    }

    /// Returns the first character that can never appear in an address,
    /// taking case folding into account.
    pub fn first_impossible_char(&self) -> Option<char> {
        self.pattern.chars().find(|&c| self.char_weight(c) == 0)
    }

    /// Number of alphabet symbols that satisfy pattern character `c`.
    fn char_weight(&self, c: char) -> usize {
        BASE58_ALPHABET
            .chars()
            .filter(|&a| {
                if self.case_insensitive {
                    a.to_ascii_lowercase() == c
                } else {
                    a == c
                }
            })
            .count()
    }

    /// Returns the expected number of attempts to find a match.
    ///
    /// Each position is treated as uniform over the 58-symbol alphabet; with
    /// case folding, symbols present in both cases count twice. Leading
    /// characters of real addresses are not uniform, so start patterns are
    /// an approximation.
    pub fn estimated_difficulty(&self) -> f64 {
        self.pattern
            .chars()
            .map(|c| match self.char_weight(c) {
                0 => f64::INFINITY,
                w => 58.0 / w as f64,
            })
            .product()
    }

    /// Returns a human-readable difficulty estimate.
    pub fn difficulty_description(&self) -> String {
        let diff = self.estimated_difficulty();
        if diff <= 1_000.0 {
            "Very Easy (< 1 second)".into()
        } else if diff <= 100_000.0 {
            "Easy (seconds)".into()
        } else if diff <= 10_000_000.0 {
            "Medium (minutes)".into()
        } else if diff <= 1_000_000_000.0 {
            "Hard (hours)".into()
        } else {
            "Very Hard (days or more)".into()
        }
    }
}
