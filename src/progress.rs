//! Scan progress accounting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Count of candidates checked so far.
///
/// Incremented exactly once per fully processed work item, whether the
/// lookup succeeded or was skipped after a transient error. Owned by the
/// dispatch engine and handed to workers as an `Arc`; nothing else mutates
/// it.
#[derive(Debug, Default)]
pub struct ProgressCounter(AtomicU64);

impl ProgressCounter {
    /// A counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one processed candidate, returning the new total.
    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The current total.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
