// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
extern crate alloc;

use alloc::rc::Rc;
use core::cell::Cell;

use embedded_hal::blocking::delay::DelayMs;

use crate::clock::Clock;

/// A clock that only moves when told to, or when something delays on it.
///
/// Clones share the same time.
#[derive(Clone, Debug, Default)]
pub(crate) struct MockTimer {
    now: Rc<Cell<u64>>,
}

impl MockTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, now: u64) {
        self.now.set(now)
    }

    pub(crate) fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms)
    }

    pub(crate) fn now(&self) -> u64 {
        self.now.get()
    }
}

impl Clock for MockTimer {
    fn now_ms(&mut self) -> u64 {
        self.now.get()
    }
}

impl DelayMs<u32> for MockTimer {
    fn delay_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms))
    }
}
