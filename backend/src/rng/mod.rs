//! Deterministic random number generation
//!
//! Uses xorshift64* algorithm for fast, deterministic random number generation.
//! CRITICAL: All randomness in the simulator MUST go through this module.
//!
//! The scheduler and nodes only see the [`RandomSource`] trait, so tests can
//! drive them with scripted values while simulations use [`RngManager`].

mod xorshift;

pub use xorshift::RngManager;

/// Source of randomness consumed by the trust model
///
/// Three draws are needed: a uniform float in `[0, 1)` (dishonesty roll),
/// a uniform float in an arbitrary range (target confidence and correctness
/// jitter), and an arbitrary non-zero hash for fabricated results.
pub trait RandomSource {
    /// Uniform value in `[0.0, 1.0)`
    fn next_f64(&mut self) -> f64;

    /// Uniform value in `[lo, hi)`
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Arbitrary hash value that is never the canonical hash `0`
    fn nonzero_hash(&mut self) -> u64;
}
