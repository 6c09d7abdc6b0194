// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Splittable pseudo-random keys.
//!
//! Every stochastic operation consumes a key it was handed and returns the
//! next key for the caller to persist. A key is never drawn from twice:
//! callers split first, keep one half, and spend the other.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque, splittable PRNG key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrngKey(u64);

impl PrngKey {
    /// Create a key from an explicit seed
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Create a key seeded from the wall clock (nanoseconds since the epoch)
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self(nanos)
    }

    /// Key from an optional seed, falling back to the clock
    pub fn from_seed_or_time(seed: Option<u64>) -> Self {
        seed.map(Self::new).unwrap_or_else(Self::from_time)
    }

    /// Derive `n` independent keys from this one
    pub fn split(self, n: usize) -> Vec<PrngKey> {
        let mut stream = ChaCha8Rng::seed_from_u64(self.0);
        (0..n).map(|_| PrngKey(stream.next_u64())).collect()
    }

    /// Split into `(next, sub)`: keep `next`, spend `sub`
    pub fn split2(self) -> (PrngKey, PrngKey) {
        let mut stream = ChaCha8Rng::seed_from_u64(self.0);
        (PrngKey(stream.next_u64()), PrngKey(stream.next_u64()))
    }

    /// Sampler for a single stochastic draw with this key
    pub fn rng(self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }

    /// Raw seed value (for archives and diagnostics)
    pub fn seed(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for PrngKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrngKey({:#018x})", self.0)
    }
}
