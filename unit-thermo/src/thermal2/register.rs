// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use core::convert::TryFrom;

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::LibraryError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub(crate) enum Register {
    /// Writing the status back clears the latched button events.
    ButtonStatus = 0x00,
    AlarmStatus = 0x01,
    /// Big endian.
    DeviceId = 0x04,
    /// Big endian.
    FirmwareVersion = 0x06,
    /// The address, followed by its complement.
    Address = 0x08,
    FunctionControl = 0x0A,
    RefreshRate = 0x0B,
    NoiseFilter = 0x0C,
    MonitorSize = 0x10,
    AlarmEnable = 0x11,
    BuzzerFrequency = 0x12,
    BuzzerDuty = 0x14,
    Led = 0x15,
    /// The low alarm block, the high alarm block is 0x10 later.
    AlarmThreshold = 0x20,
    /// Buzzer frequency, then the buzzer interval.
    AlarmBuzzerFrequency = 0x22,
    AlarmLed = 0x25,
    /// Data ready flag, then the subpage.
    DataStatus = 0x6E,
    /// Temperature summary, followed by the pixel data at 0x80.
    Data = 0x70,
}

bitflags! {
    /// The features the unit runs on its own.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
    pub struct FunctionControl: u8 {
        /// Let the alarms drive the buzzer.
        const BUZZER = 0x01;
        /// Let the alarms drive the LED.
        const LED = 0x02;
        /// Continuously capture frames.
        const AUTO_REFRESH = 0x04;
    }
}

bitflags! {
    /// Button events, latched by the unit until the status is written back.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
    pub struct ButtonStatus: u8 {
        const PRESSED = 0x01;
        const WAS_PRESSED = 0x02;
        const WAS_RELEASED = 0x04;
        const WAS_CLICKED = 0x08;
        const WAS_HELD = 0x10;
    }
}

bitflags! {
    /// Which summary temperatures are checked against the alarm thresholds.
    ///
    /// The same layout is used for reporting which alarms have triggered.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
    pub struct AlarmFlags: u8 {
        const LOWEST_BELOW_LOW = 0x01;
        const MEDIAN_BELOW_LOW = 0x02;
        const AVERAGE_BELOW_LOW = 0x04;
        const HIGHEST_BELOW_LOW = 0x08;
        const LOWEST_ABOVE_HIGH = 0x10;
        const MEDIAN_ABOVE_HIGH = 0x20;
        const AVERAGE_ABOVE_HIGH = 0x40;
        const HIGHEST_ABOVE_HIGH = 0x80;
    }
}

/// How often the unit captures a subpage.
///
/// Each subpage has half of the pixels, so a full image takes two captures.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RefreshRate {
    /// 0.5 Hz, one subpage every two seconds.
    Half,
    One,
    Two,
    Four,
    Eight,
    /// 16Hz, which is what [`begin`][super::Thermal2::begin] uses by default.
    Sixteen,
    ThirtyTwo,
    SixtyFour,
}

/// Milliseconds between subpages for each refresh rate.
const INTERVALS: [u32; 8] = [2000, 1000, 500, 250, 125, 62, 31, 15];

impl RefreshRate {
    pub(crate) fn from_raw(raw: u8) -> Result<Self, LibraryError> {
        Self::try_from(raw & 0x07).map_err(|_| LibraryError::InvalidData("Invalid refresh rate"))
    }

    /// The time between two captures.
    pub fn interval_ms(&self) -> u32 {
        INTERVALS[u8::from(*self) as usize]
    }
}

impl Default for RefreshRate {
    fn default() -> Self {
        Self::Sixteen
    }
}

impl TryFrom<f32> for RefreshRate {
    type Error = LibraryError;

    /// Attempt to create a `RefreshRate` from a frequency in Hz.
    ///
    /// This will only work if the source number *exactly* matches one of the rates.
    /// ```
    /// # use core::convert::TryFrom;
    /// # use unit_thermo::thermal2::RefreshRate;
    /// assert_eq!(RefreshRate::try_from(0.5), Ok(RefreshRate::Half));
    /// assert!(RefreshRate::try_from(3.0).is_err());
    /// ```
    #[allow(clippy::float_cmp)]
    fn try_from(value: f32) -> Result<Self, Self::Error> {
        [
            Self::Half,
            Self::One,
            Self::Two,
            Self::Four,
            Self::Eight,
            Self::Sixteen,
            Self::ThirtyTwo,
            Self::SixtyFour,
        ]
        .into_iter()
        .find(|rate| f32::from(*rate) == value)
        .ok_or(LibraryError::InvalidData(
            "The given number does not match a valid refresh rate",
        ))
    }
}

impl From<RefreshRate> for f32 {
    fn from(rate: RefreshRate) -> Self {
        match rate {
            RefreshRate::Half => 0.5,
            RefreshRate::One => 1f32,
            RefreshRate::Two => 2f32,
            RefreshRate::Four => 4f32,
            RefreshRate::Eight => 8f32,
            RefreshRate::Sixteen => 16f32,
            RefreshRate::ThirtyTwo => 32f32,
            RefreshRate::SixtyFour => 64f32,
        }
    }
}
