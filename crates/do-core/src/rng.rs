//! Deterministic RNG handle and seed derivation for interventional draws.

use std::f64::consts::TAU;
use std::hash::Hasher;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use siphasher::sip::SipHasher13;

/// RNG handle threaded through every stochastic stage of the sampler.
///
/// Seeding policy: the caller owns a master `seed: u64`; each interventional
/// draw runs on its own substream whose seed is SipHash-1-3 (zero keys) of
/// `(master_seed, draw_index)`. Consecutive draws are therefore independent
/// streams, while two samplers sharing a master seed replay identically on
/// every platform.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Creates a handle seeded directly from `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates the handle for draw number `draw_index` under `master_seed`.
    pub fn for_draw(master_seed: u64, draw_index: u64) -> Self {
        Self::from_seed(derive_substream_seed(master_seed, draw_index))
    }

    /// Returns a mutable reference to the underlying RNG.
    pub fn inner_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Uniform draw on `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Bernoulli draw returning `1.0` with probability `p` (clamped to `[0, 1]`).
    pub fn bernoulli(&mut self, p: f64) -> f64 {
        if self.uniform() < p.clamp(0.0, 1.0) {
            1.0
        } else {
            0.0
        }
    }

    /// Standard normal draw (Box-Muller).
    pub fn standard_normal(&mut self) -> f64 {
        // 1 - u keeps the log argument inside (0, 1].
        let u1 = 1.0 - self.uniform();
        let u2 = self.uniform();
        (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
    }
}

impl RngCore for RngHandle {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Derives the deterministic seed for a specific substream.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}
