// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use alloc::collections::VecDeque;
use core::num::NonZeroUsize;

/// A bounded history of samples.
///
/// Samples are kept in insertion order. Pushing into a full buffer evicts the oldest sample.
#[derive(Clone, Debug, PartialEq)]
pub struct RingBuffer<T> {
    samples: VecDeque<T>,
    capacity: NonZeroUsize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.get()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// The number of samples currently stored.
    pub fn available(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity.get()
    }

    /// Add a sample, returning the evicted sample if the buffer was already full.
    pub fn push(&mut self, sample: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    /// The oldest sample, or `None` when the buffer is empty.
    pub fn oldest(&self) -> Option<&T> {
        self.samples.front()
    }

    /// The most recently pushed sample.
    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }

    /// Drop the oldest sample without looking at it.
    ///
    /// Returns `false` if there was nothing to drop.
    pub fn discard(&mut self) -> bool {
        self.samples.pop_front().is_some()
    }

    /// Remove every sample.
    pub fn flush(&mut self) {
        self.samples.clear()
    }

    /// Iterate over the samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.samples.iter()
    }
}
