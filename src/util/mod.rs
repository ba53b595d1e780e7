//! Deterministic utilities shared by strategies and the actor harness.

pub mod det_hash;
pub mod det_rng;

pub use det_hash::{det_hash, DetBuildHasher, DetHashMap, DetHasher};
pub use det_rng::DetRng;
