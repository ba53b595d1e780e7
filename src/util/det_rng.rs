//! Seeded pseudo-random number generator for scheduling decisions.
//!
//! xorshift64: tiny, fast, and fully determined by its seed, which is all a
//! schedule explorer needs. Not cryptographically secure.

/// Deterministic xorshift64 generator.
#[derive(Debug, Clone)]
pub struct DetRng {
    state: u64,
}

impl DetRng {
    /// Creates a generator from `seed`. A zero seed is replaced with 1, since
    /// xorshift never leaves the all-zero state.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Next raw 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform value in `[0, bound)`.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is zero.
    pub fn next_usize(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "bound must be non-zero");
        (self.next_u64() % bound as u64) as usize
    }

    /// Uniform value in `[0, max_value)`; returns 0 when `max_value` is 0.
    pub fn next_below(&mut self, max_value: u32) -> u32 {
        if max_value == 0 {
            return 0;
        }
        (self.next_u64() % u64::from(max_value)) as u32
    }
}
