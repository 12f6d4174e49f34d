// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
#[cfg(feature = "std")]
extern crate std;

use embedded_hal::blocking::delay::DelayMs;

/// A monotonic millisecond clock.
///
/// `embedded-hal` 0.2 has no clock trait, so this fills the gap. Drivers pair it with
/// [`DelayMs<u32>`] for the few places they have to wait on a device.
pub trait Clock {
    /// Milliseconds since some fixed, arbitrary point.
    fn now_ms(&mut self) -> u64;
}

/// Wait until `check` returns `true`, polling every `step_ms`.
///
/// Returns `Ok(false)` if `timeout_ms` elapses first. Errors from `check` end the wait
/// immediately.
pub(crate) fn poll_until<T, E, F>(
    timer: &mut T,
    timeout_ms: u32,
    step_ms: u32,
    mut check: F,
) -> Result<bool, E>
where
    T: Clock + DelayMs<u32>,
    F: FnMut() -> Result<bool, E>,
{
    let deadline = timer.now_ms() + u64::from(timeout_ms);
    loop {
        if check()? {
            return Ok(true);
        }
        if timer.now_ms() >= deadline {
            return Ok(false);
        }
        timer.delay_ms(step_ms);
    }
}

/// A [`Clock`] and delay provider backed by the standard library.
#[cfg(feature = "std")]
#[derive(Clone, Copy, Debug)]
pub struct SystemTimer {
    epoch: std::time::Instant,
}

#[cfg(feature = "std")]
impl SystemTimer {
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for SystemTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for SystemTimer {
    fn now_ms(&mut self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

#[cfg(feature = "std")]
impl DelayMs<u32> for SystemTimer {
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)))
    }
}
