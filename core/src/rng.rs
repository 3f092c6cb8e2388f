//! Deterministic random number generation.
//!
//! RULE: Nothing in a simulation may call any platform RNG.
//! All randomness flows through SimRng instances derived from a single
//! master seed, so a replayed input log reproduces the same run.
//!
//! SimRng is a [`Resource`]: snapshots deep-copy its full state, so undo
//! rewinds the random stream along with everything else.

use crate::live::Resource;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::any::Any;

#[derive(Debug, Clone, PartialEq)]
pub struct SimRng {
    pub name: &'static str,
    inner:    Pcg64Mcg,
}

impl SimRng {
    /// Create a stream from the master seed and a stable stream index.
    /// The index must never change once assigned.
    pub fn new(master_seed: u64, stream: u64) -> Self {
        let derived_seed = master_seed ^ (stream.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name:  "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Roll a float in [lo, hi).
    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

impl Resource for SimRng {
    fn type_name(&self) -> &'static str { "SimRng" }
    fn duplicate(&self) -> Box<dyn Resource> { Box::new(self.clone()) }
    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
