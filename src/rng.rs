//! Uniform random helpers for call ids and service durations
//!
//! `thread_rng` is seeded once per thread, so rapid bursts of calls still
//! draw independent ids.

use rand::Rng;

use crate::cdr::CallId;

/// Uniform integer in `[lo, hi]`, bounds inclusive
pub fn uniform(lo: u64, hi: u64) -> u64 {
    rand::thread_rng().gen_range(lo..=hi)
}

/// Random call id in `[1, u64::MAX]`
pub fn call_id() -> CallId {
    uniform(1, u64::MAX)
}
