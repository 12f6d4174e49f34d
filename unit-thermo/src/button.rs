// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// Press/release edges for a polled button.
///
/// The button is polled from `update`, at its own interval independent of the measurement
/// interval. Edges are relative to the previous poll and stay visible until the next one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ButtonEdgeState {
    previous: bool,
    current: bool,
    holding: bool,
    interval_ms: u32,
    last_polled_at: Option<u64>,
}

impl ButtonEdgeState {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            previous: false,
            current: false,
            holding: false,
            interval_ms,
            last_polled_at: None,
        }
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub(crate) fn set_interval_ms(&mut self, interval_ms: u32) {
        self.interval_ms = interval_ms;
    }

    /// Check if the button should be polled at `now`.
    pub fn is_due(&self, now: u64, force: bool) -> bool {
        match self.last_polled_at {
            Some(last) => force || now >= last + u64::from(self.interval_ms),
            None => true,
        }
    }

    /// Record the button level seen at `now`.
    pub(crate) fn record(&mut self, now: u64, pressed: bool) {
        self.previous = self.current;
        self.current = pressed;
        if !pressed {
            self.holding = false;
        }
        self.last_polled_at = Some(now);
    }

    /// Mark the button as held down, as reported by devices that classify presses themselves.
    pub(crate) fn set_holding(&mut self) {
        if self.current {
            self.holding = true;
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.current
    }

    /// The button went down since the previous poll.
    pub fn was_pressed(&self) -> bool {
        self.current && !self.previous
    }

    /// The button came up since the previous poll.
    pub fn was_released(&self) -> bool {
        !self.current && self.previous
    }

    pub fn is_holding(&self) -> bool {
        self.holding
    }
}
