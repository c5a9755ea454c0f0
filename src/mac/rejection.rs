//! Rejection memory: values a device refused, kept so that they are not requested again.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Uplink data rate range of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct DataRateRange {
    pub min_data_rate_index: u8,
    pub max_data_rate_index: u8,
}

/// Sorted, duplicate-free storage.
pub trait RejectionSet<T: Ord + Copy> {
    /// Inserts `value` at its sorted position. Returns false if it was already present.
    fn insert_sorted(&mut self, value: T) -> bool;
    /// Whether `value` was rejected.
    fn contains_sorted(&self, value: &T) -> bool;
}

impl<T: Ord + Copy> RejectionSet<T> for alloc::vec::Vec<T> {
    fn insert_sorted(&mut self, value: T) -> bool {
        match self.binary_search(&value) {
            Ok(_) => false,
            Err(index) => {
                self.insert(index, value);
                true
            }
        }
    }

    fn contains_sorted(&self, value: &T) -> bool {
        self.binary_search(value).is_ok()
    }
}

impl<T: Ord + Copy, const N: usize> RejectionSet<T> for heapless::Vec<T, N> {
    fn insert_sorted(&mut self, value: T) -> bool {
        match self.binary_search(&value) {
            Ok(_) => false,
            Err(index) => {
                if self.is_full() {
                    warn!("rejection set full, dropping value");
                    return false;
                }
                self.insert(index, value).is_ok()
            }
        }
    }

    fn contains_sorted(&self, value: &T) -> bool {
        self.binary_search(value).is_ok()
    }
}
