// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! Interval-gated sampling shared by every driver.
//!
//! There is no timer thread or interrupt involved: the application calls `update` from its own
//! loop as often as it likes, and a device read only happens once the sampling interval has
//! elapsed. Successful reads land in a [`RingBuffer`], so an application that polls slowly can
//! still drain every sample taken since it last looked.

use core::num::NonZeroUsize;

use log::debug;

use crate::error::LibraryError;
use crate::ring::RingBuffer;

/// Timing state for periodic measurement.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PeriodicState {
    running: bool,

    /// Milliseconds between samples.
    interval_ms: u32,

    /// When the current run was started.
    started_at: u64,

    /// When the last sample was taken during the current run.
    last_sample_at: Option<u64>,
}

impl PeriodicState {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn last_sample_at(&self) -> Option<u64> {
        self.last_sample_at
    }

    /// Check if a sample should be taken at `now`.
    ///
    /// The first sample of a run is due one interval after the run started, later samples one
    /// interval after the previous one. `force` skips the interval check, but nothing is ever due
    /// while stopped.
    pub fn is_due(&self, now: u64, force: bool) -> bool {
        if !self.running {
            return false;
        }
        let reference = self.last_sample_at.unwrap_or(self.started_at);
        force || now >= reference + u64::from(self.interval_ms)
    }
}

/// The periodic measurement state machine, along with the samples it has collected.
///
/// There are two states, stopped and running. Starting while running and stopping while stopped
/// are both errors, and neither changes any state.
#[derive(Clone, Debug)]
pub struct PeriodicController<S> {
    state: PeriodicState,
    samples: RingBuffer<S>,

    /// Whether the most recent poll stored a new sample.
    updated: bool,
}

impl<S> PeriodicController<S> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            state: PeriodicState::default(),
            samples: RingBuffer::new(capacity),
            updated: false,
        }
    }

    pub fn state(&self) -> &PeriodicState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn interval_ms(&self) -> u32 {
        self.state.interval_ms
    }

    pub fn last_sample_at(&self) -> Option<u64> {
        self.state.last_sample_at
    }

    /// Whether the last poll stored a new sample.
    pub fn updated(&self) -> bool {
        self.updated
    }

    pub fn samples(&self) -> &RingBuffer<S> {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut RingBuffer<S> {
        &mut self.samples
    }

    /// Fail with [`LibraryError::Busy`] if periodic measurement is running.
    ///
    /// Drivers call this before any bus traffic for operations that need an idle device.
    pub fn ensure_stopped(&self) -> Result<(), LibraryError> {
        if self.state.running {
            Err(LibraryError::Busy)
        } else {
            Ok(())
        }
    }

    /// Move to the running state.
    ///
    /// Any device programming for the new run has to be done (successfully) before calling this.
    pub fn start(&mut self, now: u64, interval_ms: u32) -> Result<(), LibraryError> {
        self.ensure_stopped()?;
        self.state = PeriodicState {
            running: true,
            interval_ms,
            started_at: now,
            last_sample_at: None,
        };
        debug!("periodic measurement started, every {}ms", interval_ms);
        Ok(())
    }

    /// Move to the stopped state.
    ///
    /// Drivers call this before disabling measurement on the device, so the controller is stopped
    /// even when that fails.
    pub fn stop(&mut self) -> Result<(), LibraryError> {
        if !self.state.running {
            return Err(LibraryError::NotRunning);
        }
        self.state.running = false;
        self.updated = false;
        debug!("periodic measurement stopped");
        Ok(())
    }

    /// Start a poll, returning whether a sample should be read now.
    ///
    /// This clears the updated flag. When it returns `true`, the caller reads the device and
    /// passes the result to [`record`][PeriodicController::record].
    pub fn begin_poll(&mut self, now: u64, force: bool) -> bool {
        self.updated = false;
        self.state.is_due(now, force)
    }

    /// Store a sample read at `now`.
    pub fn record(&mut self, now: u64, sample: S) {
        self.samples.push(sample);
        self.state.last_sample_at = Some(now);
        self.updated = true;
    }

    /// One poll tick.
    ///
    /// `read` is only called when a sample is due. It can return `Ok(None)` when the device has
    /// nothing new yet, which isn't an error but doesn't count as a sample either. Errors are
    /// returned as-is and leave the state unchanged. Returns the new updated flag.
    pub fn poll<E, F>(&mut self, now: u64, force: bool, read: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<Option<S>, E>,
    {
        if self.begin_poll(now, force) {
            if let Some(sample) = read()? {
                self.record(now, sample);
            }
        }
        Ok(self.updated)
    }

    /// Change how many samples are kept.
    ///
    /// This is only allowed while stopped. The stored samples are dropped if the capacity
    /// actually changes.
    pub fn resize(&mut self, capacity: NonZeroUsize) -> Result<(), LibraryError> {
        self.ensure_stopped()?;
        if self.samples.capacity() != capacity.get() {
            self.samples = RingBuffer::new(capacity);
        }
        Ok(())
    }
}

/// The polling surface every driver in this crate shares.
pub trait PeriodicMeasurement {
    type Sample;
    type Error;

    fn controller(&self) -> &PeriodicController<Self::Sample>;

    fn controller_mut(&mut self) -> &mut PeriodicController<Self::Sample>;

    /// One poll tick: take a measurement if one is due (or `force` is set), and refresh any
    /// other state the device needs polled, like a button.
    fn update(&mut self, force: bool) -> Result<(), Self::Error>;

    /// Stop periodic measurement.
    ///
    /// The driver is stopped afterwards even if disabling measurement on the device fails, but
    /// the failure is still returned.
    fn stop_periodic_measurement(&mut self) -> Result<(), Self::Error>;

    fn in_periodic(&self) -> bool {
        self.controller().is_running()
    }

    /// Whether the most recent [`update`][PeriodicMeasurement::update] stored a new sample.
    fn updated(&self) -> bool {
        self.controller().updated()
    }

    /// When the most recent sample was taken.
    fn updated_at(&self) -> Option<u64> {
        self.controller().last_sample_at()
    }

    fn interval_ms(&self) -> u32 {
        self.controller().interval_ms()
    }

    fn oldest(&self) -> Option<&Self::Sample> {
        self.controller().samples().oldest()
    }

    fn latest(&self) -> Option<&Self::Sample> {
        self.controller().samples().latest()
    }

    fn available(&self) -> usize {
        self.controller().samples().available()
    }

    fn is_empty(&self) -> bool {
        self.controller().samples().is_empty()
    }

    fn is_full(&self) -> bool {
        self.controller().samples().is_full()
    }

    fn discard(&mut self) -> bool {
        self.controller_mut().samples_mut().discard()
    }

    fn flush(&mut self) {
        self.controller_mut().samples_mut().flush()
    }
}
