//! Guest random numbers: xorshift64*.

use tracing::warn;

const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;
const MULTIPLIER: u64 = 0x2545_F491_4F6C_DD1D;

/// Small deterministic generator. The same seed always yields the same stream.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        let mut rng = Self { state: 0 };
        rng.reseed(seed);
        rng
    }

    /// Seed from the operating system, or a fixed seed if that fails.
    pub fn from_entropy() -> Self {
        let mut bytes = [0u8; 8];
        if let Err(e) = getrandom::getrandom(&mut bytes) {
            warn!(error = %e, "no OS entropy, using fixed seed");
        }
        Self::new(u64::from_le_bytes(bytes))
    }

    pub fn reseed(&mut self, seed: u64) {
        // xorshift state must never be zero
        self.state = match seed ^ SEED_MIX {
            0 => SEED_MIX,
            mixed => mixed,
        };
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(MULTIPLIER)
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}
