// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! Conversions between raw register encodings and physical values.
//!
//! Every function here is pure. Encoders come in two flavors: those that clamp an out-of-domain
//! value to the nearest encodable one (temperature thresholds), and those that reject it with a
//! [`LibraryError::OutOfRange`] (emissivity, duty cycle, signed thresholds). Drivers call the
//! rejecting encoders before touching the bus, so a rejected value never reaches a device.

// Various floating point operations are not implemented in core, so we use num_traits (and libm)
// to provide them when std isn't available.
#[cfg_attr(feature = "std", allow(unused_imports))]
use num_traits::Float;

use crate::error::LibraryError;

/// Offset between the Kelvin and Celsius scales.
pub const KELVIN_OFFSET: f32 = 273.15;

/// A temperature, stored in degrees Celsius.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Temperature(f32);

impl Temperature {
    pub fn from_celsius(celsius: f32) -> Self {
        Self(celsius)
    }

    pub fn from_kelvin(kelvin: f32) -> Self {
        Self(kelvin - KELVIN_OFFSET)
    }

    pub fn celsius(&self) -> f32 {
        self.0
    }

    pub fn kelvin(&self) -> f32 {
        self.0 + KELVIN_OFFSET
    }

    pub fn fahrenheit(&self) -> f32 {
        celsius_to_fahrenheit(self.0)
    }
}

pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

// MLX90614

/// Set on an MLX90614 RAM word when the measurement is not valid.
pub const MLX90614_ERROR_FLAG: u16 = 0x8000;

/// Lowest object threshold the MLX90614 can store.
pub const OBJECT_LIMIT_MIN: f32 = -273.15;
/// Highest object threshold the MLX90614 can store.
pub const OBJECT_LIMIT_MAX: f32 = 382.2;
/// Lowest ambient threshold the MLX90614 can store.
pub const AMBIENT_LIMIT_MIN: f32 = -38.2;
/// Highest ambient threshold the MLX90614 can store (approximately).
pub const AMBIENT_LIMIT_MAX: f32 = 125.0;

/// Lowest emissivity the MLX90614 accepts.
pub const EMISSIVITY_MIN: f32 = 0.1;
/// Highest emissivity the MLX90614 accepts.
pub const EMISSIVITY_MAX: f32 = 1.0;

/// Decode an ambient or object temperature word from the MLX90614's RAM.
///
/// The scale is 0.02K per LSB. Words with the error flag set decode to `None`.
pub fn linearized_temperature(raw: u16) -> Option<Temperature> {
    if raw & MLX90614_ERROR_FLAG != 0 {
        None
    } else {
        Some(Temperature::from_kelvin(f32::from(raw) * 0.02))
    }
}

/// Decode an object threshold (`To_max`/`To_min`) EEPROM word.
pub fn object_limit_to_celsius(raw: u16) -> f32 {
    (f64::from(raw) * 0.01 - 273.15) as f32
}

/// Encode an object threshold, clamping to [`OBJECT_LIMIT_MIN`]..=[`OBJECT_LIMIT_MAX`].
///
/// The encoding truncates with a 0.005 bias, the same as the rounding done by the firmware, so
/// `celsius_to_object_limit(object_limit_to_celsius(raw)) == raw` for every raw value. A NaN
/// encodes as 0.
pub fn celsius_to_object_limit(celsius: f32) -> u16 {
    let clamped = f64::from(celsius.clamp(OBJECT_LIMIT_MIN, OBJECT_LIMIT_MAX));
    ((clamped + 273.15 + 0.005) * 100.0) as u16
}

/// Decode an ambient threshold byte from `Ta_range`.
pub fn ambient_limit_to_celsius(raw: u8) -> f32 {
    (f64::from(raw) * 0.64 - 38.2) as f32
}

/// Encode an ambient threshold, clamping to [`AMBIENT_LIMIT_MIN`]..=[`AMBIENT_LIMIT_MAX`].
///
/// Like [`celsius_to_object_limit`], half an LSB (0.32°C) is added before truncating. A NaN
/// encodes as 0.
pub fn celsius_to_ambient_limit(celsius: f32) -> u8 {
    let clamped = f64::from(celsius.clamp(AMBIENT_LIMIT_MIN, AMBIENT_LIMIT_MAX));
    ((clamped + 38.2 + 0.32) * 100.0 / 64.0) as u8
}

pub fn emissivity_from_raw(raw: u16) -> f32 {
    f32::from(raw) / 65535.0
}

/// Encode an emissivity value, rejecting anything outside 0.1..=1.0.
pub fn emissivity_to_raw(emissivity: f32) -> Result<u16, LibraryError> {
    if !(EMISSIVITY_MIN..=EMISSIVITY_MAX).contains(&emissivity) {
        return Err(LibraryError::OutOfRange(
            "Emissivity must be between 0.1 and 1.0",
        ));
    }
    Ok((f64::from(emissivity) * 65535.0).round() as u16)
}

// NCIR2

/// Decode a NCIR2 temperature (0.01°C per LSB, signed).
pub fn centi_celsius_to_celsius(raw: i16) -> f32 {
    f32::from(raw) / 100.0
}

/// Encode a temperature for the NCIR2, rejecting values that don't fit in an `i16`.
pub fn celsius_to_centi_celsius(celsius: f32) -> Result<i16, LibraryError> {
    let scaled = (f64::from(celsius) * 100.0).round();
    if scaled.is_nan() || scaled < f64::from(i16::MIN) || scaled > f64::from(i16::MAX) {
        Err(LibraryError::OutOfRange(
            "Temperature must be between -327.68 and 327.67 degrees Celsius",
        ))
    } else {
        Ok(scaled as i16)
    }
}

/// Decode a NCIR2 buzzer duty byte.
///
/// The curve has two segments: 0..=127 covers 0 to 0.5, 128..=255 covers just over 0.5 to 1.0.
pub fn duty_from_raw(raw: u8) -> f32 {
    if raw < 128 {
        f32::from(raw) / 127.0 * 0.5
    } else {
        f32::from(raw - 127) / 128.0 * 0.5 + 0.5
    }
}

/// Encode a duty cycle for the NCIR2 buzzer, rejecting values outside 0.0..=1.0.
///
/// This is not the exact inverse of [`duty_from_raw`] around the segment boundary; the mapping is
/// kept identical to the one the unit's firmware expects.
pub fn duty_to_raw(duty: f32) -> Result<u8, LibraryError> {
    if !(0.0..=1.0).contains(&duty) {
        return Err(LibraryError::OutOfRange(
            "Duty cycle must be between 0.0 and 1.0",
        ));
    }
    let raw = if duty <= 0.5 {
        duty * 255.0
    } else {
        127.0 + 128.0 * (2.0 * (duty - 0.5))
    };
    Ok(raw as u8)
}

// Thermal2

/// Decode a Thermal2 temperature word (1/128°C per LSB, offset by -64°C).
pub fn thermal_to_celsius(raw: u16) -> f32 {
    f32::from(raw) / 128.0 - 64.0
}

/// Encode a temperature for the Thermal2, clamping to the range of a `u16`.
///
/// A NaN encodes as 0.
pub fn celsius_to_thermal(celsius: f32) -> u16 {
    let scaled = ((f64::from(celsius) + 64.0) * 128.0).round();
    scaled.clamp(0.0, f64::from(u16::MAX)) as u16
}
