//! Cosmetic task labels.
//!
//! Labels identify tasks in the dashboard; they carry no semantics and are
//! assigned once, at submission time or when the reconciler first marks a
//! task complete.

use std::sync::atomic::{AtomicU64, Ordering};

const WORDS: &[&str] = &[
    "amber", "basalt", "cobalt", "drift", "ember", "flint", "garnet", "harbor", "indigo", "juniper",
    "krypton", "lumen", "meridian", "nimbus", "onyx", "pumice", "quartz", "russet", "sable",
    "topaz", "umber", "vertex", "willow", "xenon", "yonder", "zephyr",
];

/// Hands out `word-N` labels from a fixed wordlist.
pub struct LabelMint {
    counter: AtomicU64,
}

impl LabelMint {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let word = WORDS[(n as usize) % WORDS.len()];
        format!("{}-{}", word, n + 1)
    }
}

impl Default for LabelMint {
    fn default() -> Self {
        Self::new()
    }
}
