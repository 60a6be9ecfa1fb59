use std::hash::Hasher;

/// A deterministic FNV-1a 64-bit hasher.
///
/// Used instead of `DefaultHasher` (which is randomized) to derive scenario
/// seeds and per-purpose RNG streams from string identifiers.
#[derive(Debug)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }
}

/// Seed derived from a label.
pub fn seed_from_label(label: &str) -> u64 {
    let mut hasher = FnvHasher::new();
    hasher.write(label.as_bytes());
    hasher.finish()
}

/// Independent RNG stream for one purpose of a seeded run.
pub fn stream_seed(seed: u64, purpose: &str) -> u64 {
    let mut hasher = FnvHasher::new();
    hasher.write_u64(seed);
    hasher.write(purpose.as_bytes());
    hasher.finish()
}
