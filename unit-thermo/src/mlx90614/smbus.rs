// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! SMBus word access with packet error codes.
//!
//! The MLX90614 doesn't have byte registers; every RAM and EEPROM cell is a little endian word,
//! and every transaction is protected by a CRC-8 over the whole transaction (including the
//! address bytes).

use embedded_hal::blocking::i2c;

use crate::bus::RegisterBus;
use crate::error::{Error, LibraryError};

use super::register::Command;

/// Read a word, checking the trailing PEC.
pub(crate) fn read_word<I2C>(bus: &mut RegisterBus<I2C>, command: Command) -> Result<u16, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    let address = bus.address() << 1;
    let command = u8::from(command);
    let [low, high, actual] = bus.read_array::<3>(command)?;
    let expected = smbus_pec::pec(&[address, command, address | 1, low, high]);
    if expected != actual {
        return Err(LibraryError::ChecksumMismatch { expected, actual }.into());
    }
    Ok(u16::from_le_bytes([low, high]))
}

pub(crate) fn write_word<I2C>(
    bus: &mut RegisterBus<I2C>,
    command: Command,
    value: u16,
) -> Result<(), Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    let command = u8::from(command);
    let [low, high] = value.to_le_bytes();
    let pec = smbus_pec::pec(&[bus.address() << 1, command, low, high]);
    bus.write(command, &[low, high, pec])
}

/// Send a command that carries no data.
pub(crate) fn send_command<I2C>(bus: &mut RegisterBus<I2C>, command: Command) -> Result<(), Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    let command = u8::from(command);
    let pec = smbus_pec::pec(&[bus.address() << 1, command]);
    bus.write(command, &[pec])
}
