//! Process-independent hashing for event content and state fingerprints.
//!
//! `std`'s `RandomState` is keyed per process, so a hash recorded in a trace
//! would not match the same payload on replay. [`DetHasher`] is FNV-1a with a
//! splitmix-style finalizer and no per-process key.

use std::hash::{BuildHasher, Hash, Hasher};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Fixed-key, non-cryptographic hasher.
#[derive(Debug, Clone)]
pub struct DetHasher {
    state: u64,
}

impl Default for DetHasher {
    fn default() -> Self {
        Self { state: FNV_OFFSET }
    }
}

impl Hasher for DetHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.state = bytes
            .iter()
            .fold(self.state, |h, &b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME));
    }

    fn finish(&self) -> u64 {
        let mut z = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}

/// [`BuildHasher`] handing out fresh [`DetHasher`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetBuildHasher;

impl BuildHasher for DetBuildHasher {
    type Hasher = DetHasher;

    fn build_hasher(&self) -> DetHasher {
        DetHasher::default()
    }
}

/// `HashMap` whose hashing does not depend on the process.
pub type DetHashMap<K, V> = std::collections::HashMap<K, V, DetBuildHasher>;

/// Hashes `value` with a fresh [`DetHasher`].
#[must_use]
pub fn det_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    DetBuildHasher.hash_one(value)
}
