//! Channel mask generation and parsing, shared by the regions using the same channel plan.

pub mod dynamic;
pub mod fixed;

use alloc::vec::Vec;

/// Copies `mask` into a vector of `len` flags, padding with disabled channels.
pub(crate) fn pad_mask(mask: &[bool], len: usize) -> Vec<bool> {
    let mut padded: Vec<bool> = mask.iter().copied().take(len).collect();
    padded.resize(len, false);
    padded
}
