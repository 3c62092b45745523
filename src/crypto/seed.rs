//! Random seed candidates.

use std::fmt;

use rand::rngs::ThreadRng;
use rand::Rng;

use super::derive::MAX_SEED_LEN;

/// Characters a seed is drawn from. Keeps every seed a valid UTF-8 seed string.
pub const SEED_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Shortest seed the generator will produce.
pub const MIN_SEED_LEN: usize = 16;

/// Trailing seed characters reserved for a batch lane index (base 62).
pub const LANE_DIGITS: usize = 5;

/// Number of distinct lane indices `Seed::with_lane` can encode (62^5).
pub const MAX_LANE_INDEX: u64 = 916_132_832;

/// A seed candidate: up to 32 ASCII alphanumeric bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seed {
    bytes: [u8; MAX_SEED_LEN],
    len: u8,
}

impl Seed {
    /// Builds a seed from its text form. Returns `None` if the text is longer
    /// than `MAX_SEED_LEN` or contains characters outside `SEED_CHARSET`.
    pub fn from_str_checked(s: &str) -> Option<Self> {
        if s.len() > MAX_SEED_LEN || !s.bytes().all(|b| SEED_CHARSET.contains(&b)) {
            return None;
        }
        let mut bytes = [0u8; MAX_SEED_LEN];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Some(Self {
            bytes,
            len: s.len() as u8,
        })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn as_str(&self) -> &str {
        // SEED_CHARSET is ASCII
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Returns a copy with the last `LANE_DIGITS` characters replaced by
    /// `lane` written in base 62 over `SEED_CHARSET`.
    ///
    /// Lane indices are taken modulo `MAX_LANE_INDEX`; seeds shorter than
    /// `LANE_DIGITS` are returned unchanged.
    #[inline]
    pub fn with_lane(&self, lane: u64) -> Self {
        let mut out = *self;
        let len = self.len as usize;
        if len < LANE_DIGITS {
            return out;
        }
        let mut rest = lane % MAX_LANE_INDEX;
        for slot in out.bytes[len - LANE_DIGITS..len].iter_mut().rev() {
            *slot = SEED_CHARSET[(rest % 62) as usize];
            rest /= 62;
        }
        out
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed({})", self.as_str())
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infinite, non-restartable stream of random seeds.
pub struct SeedGenerator {
    rng: ThreadRng,
    len: usize,
}

impl SeedGenerator {
    /// Creates a generator producing seeds of `len` characters.
    ///
    /// `len` is clamped to `MIN_SEED_LEN..=MAX_SEED_LEN`; callers validate it
    /// beforehand.
    pub fn new(len: usize) -> Self {
        Self {
            rng: rand::thread_rng(),
            len: len.clamp(MIN_SEED_LEN, MAX_SEED_LEN),
        }
    }

    pub fn seed_len(&self) -> usize {
        self.len
    }
}

impl Iterator for SeedGenerator {
    type Item = Seed;

    #[inline]
    fn next(&mut self) -> Option<Seed> {
        let mut bytes = [0u8; MAX_SEED_LEN];
        for b in bytes[..self.len].iter_mut() {
            *b = SEED_CHARSET[self.rng.gen_range(0..SEED_CHARSET.len())];
        }
        Some(Seed {
            bytes,
            len: self.len as u8,
        })
    }
}
