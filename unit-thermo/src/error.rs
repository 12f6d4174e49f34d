// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
#[cfg(feature = "std")]
extern crate std;

use core::fmt;

use embedded_hal::blocking::i2c;

/// Errors that don't involve I²C.
#[derive(Clone, Debug, PartialEq)]
pub enum LibraryError {
    /// When a value from the device is malformed in some way.
    InvalidData(&'static str),

    /// The packet error code sent by an SMBus device did not match the data it sent.
    ChecksumMismatch { expected: u8, actual: u8 },

    /// A value given to the library cannot be encoded for the device.
    ///
    /// Nothing is written to the device when this error is returned.
    OutOfRange(&'static str),

    /// The operation is not allowed while periodic measurement is running.
    Busy,

    /// Periodic measurement was asked to stop, but it was not running.
    NotRunning,

    /// The device did not identify itself as expected.
    NotDetected(&'static str),

    /// The given value is not a usable 7-bit I²C address.
    InvalidAddress(u8),

    /// The device did not reach the expected state in time.
    Timeout,
}

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryError::InvalidData(msg) => write!(f, "{}", msg),
            LibraryError::ChecksumMismatch { expected, actual } => write!(
                f,
                "PEC mismatch (expected {:#04x}, received {:#04x})",
                expected, actual
            ),
            LibraryError::OutOfRange(msg) => write!(f, "{}", msg),
            LibraryError::Busy => write!(f, "periodic measurement is running"),
            LibraryError::NotRunning => write!(f, "periodic measurement is not running"),
            LibraryError::NotDetected(msg) => write!(f, "device not detected: {}", msg),
            LibraryError::InvalidAddress(address) => {
                write!(f, "{:#04x} is not a valid I²C address", address)
            }
            LibraryError::Timeout => write!(f, "timed out waiting for the device"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LibraryError {}

pub enum Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    /// Errors from a combined write-then-read I²C transaction.
    I2cWriteReadError(<I2C as i2c::WriteRead>::Error),

    /// Errors from an I²C write.
    I2cWriteError(<I2C as i2c::Write>::Error),

    /// Errors from an I²C read.
    I2cReadError(<I2C as i2c::Read>::Error),

    /// Errors originating from within this library.
    LibraryError(LibraryError),
}

// Custom Debug implementation so that I2C doesn't need to implement Debug (like the one from
// linux-embedded-hal).
impl<I2C> fmt::Debug for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
    <I2C as i2c::Write>::Error: fmt::Debug,
    <I2C as i2c::Read>::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2cWriteReadError(i2c_error) => f
                .debug_tuple("Error::I2cWriteReadError")
                .field(i2c_error)
                .finish(),
            Error::I2cWriteError(i2c_error) => f
                .debug_tuple("Error::I2cWriteError")
                .field(i2c_error)
                .finish(),
            Error::I2cReadError(i2c_error) => f
                .debug_tuple("Error::I2cReadError")
                .field(i2c_error)
                .finish(),
            Error::LibraryError(err) => f.debug_tuple("Error::LibraryError").field(err).finish(),
        }
    }
}

impl<I2C> fmt::Display for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
    <I2C as i2c::Write>::Error: fmt::Debug,
    <I2C as i2c::Read>::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2cWriteReadError(i2c_error) => write!(f, "I2C Error: {:?}", i2c_error),
            Error::I2cWriteError(i2c_error) => write!(f, "I2C Error: {:?}", i2c_error),
            Error::I2cReadError(i2c_error) => write!(f, "I2C Error: {:?}", i2c_error),
            Error::LibraryError(err) => write!(f, "Library Error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl<I2C> std::error::Error for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
    <I2C as i2c::WriteRead>::Error: std::error::Error + 'static,
    <I2C as i2c::Write>::Error: std::error::Error + 'static,
    <I2C as i2c::Read>::Error: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::I2cWriteReadError(i2c_error) => Some(i2c_error),
            Error::I2cWriteError(i2c_error) => Some(i2c_error),
            Error::I2cReadError(i2c_error) => Some(i2c_error),
            Error::LibraryError(lib_err) => Some(lib_err),
        }
    }
}

impl<I2C> From<LibraryError> for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    fn from(lib_err: LibraryError) -> Self {
        Self::LibraryError(lib_err)
    }
}

impl<I2C> Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    /// The library error, if this isn't a bus error.
    pub fn library_error(&self) -> Option<&LibraryError> {
        match self {
            Error::LibraryError(err) => Some(err),
            _ => None,
        }
    }
}
