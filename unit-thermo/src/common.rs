// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Types shared by the units with alarm outputs (the NCIR2 and Thermal2).
//!
//! Both units can sound a buzzer and light an RGB LED when the measured temperature crosses a
//! low or a high threshold, and both lay the two alarm configurations out back to back in their
//! register maps.
//!
//! # Glossary
//! <dl>
//! <dt>
//! Duty
//! </dt><dd>
//! The fraction of each buzzer period the buzzer is driven. The NCIR2 uses a two segment byte
//! encoding, the Thermal2 a plain byte.
//! </dd>
//! <dt>
//! Emissivity
//! </dt><dd>
//! How much IR radiation a surface emits relative to an ideal black body at the same
//! temperature.
//! </dd>
//! </dl>

/// Which alarm threshold a setting applies to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AlarmLevel {
    /// Triggers when the temperature drops below the threshold.
    Low,
    /// Triggers when the temperature rises above the threshold.
    High,
}

impl AlarmLevel {
    /// The register of this level's copy of a setting, given the low level's register and the
    /// size of the setting.
    pub(crate) fn register(&self, low_register: u8, stride: u8) -> u8 {
        match self {
            Self::Low => low_register,
            Self::High => low_register + stride,
        }
    }
}

/// An LED color.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(rgb: Rgb) -> Self {
        [rgb.red, rgb.green, rgb.blue]
    }
}

/// Colors are often written as `0xRRGGBB`. The top byte is ignored.
impl From<u32> for Rgb {
    fn from(packed: u32) -> Self {
        let [_, red, green, blue] = packed.to_be_bytes();
        Self::new(red, green, blue)
    }
}

impl From<Rgb> for u32 {
    fn from(rgb: Rgb) -> Self {
        u32::from_be_bytes([0, rgb.red, rgb.green, rgb.blue])
    }
}
