//! Deterministic random number generation for synthetic sequences.
//!
//! RULE: Nothing in the engine may call any platform RNG.
//! Synthetic data draws from a `SynthRng` seeded from a single master
//! seed, so the same seed always produces the same snapshot sequence.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use crate::types::Vec3;

pub struct SynthRng {
    inner: Pcg64Mcg,
}

impl SynthRng {
    /// Each stream index gets an independent, reproducible stream.
    pub fn new(master_seed: u64, stream: u64) -> Self {
        let derived_seed = master_seed ^ (stream.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform in [lo, hi).
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Isotropic unit vector.
    pub fn unit_vector(&mut self) -> Vec3 {
        let cos_theta = self.uniform(-1.0, 1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = self.uniform(0.0, std::f64::consts::TAU);
        Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
    }
}
