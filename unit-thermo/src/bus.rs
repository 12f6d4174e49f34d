// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! Register access over I²C.
//!
//! All three units expose a flat map of byte-addressed registers. [`RegisterBus`] owns the
//! `embedded-hal` bus along with the address the unit currently answers at, so that changing the
//! address of a unit re-targets every later transaction.

use arrayvec::ArrayVec;
use embedded_hal::blocking::i2c;
use log::trace;

use crate::error::{Error, LibraryError};

/// The longest register write (register address included) any of the units needs.
pub(crate) const MAX_WRITE_LENGTH: usize = 8;

/// Check that an address is a usable 7-bit address (not reserved by the I²C specification).
pub fn is_valid_address(address: u8) -> bool {
    (0x08..=0x77).contains(&address)
}

#[derive(Clone, Debug)]
pub struct RegisterBus<I2C> {
    /// The I²C bus the unit is accessible on.
    bus: I2C,

    /// The address the unit is currently accessible at.
    address: u8,
}

impl<I2C> RegisterBus<I2C>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    pub fn new(bus: I2C, address: u8) -> Self {
        Self { bus, address }
    }

    /// The address transactions are currently sent to.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Send every later transaction to `address`.
    ///
    /// This only changes where the host sends transactions, it does not reconfigure the unit.
    pub fn change_address(&mut self, address: u8) -> Result<(), LibraryError> {
        if !is_valid_address(address) {
            return Err(LibraryError::InvalidAddress(address));
        }
        self.address = address;
        Ok(())
    }

    /// Give back the underlying bus.
    pub fn release(self) -> I2C {
        self.bus
    }

    /// Read `buffer.len()` bytes starting at `register`.
    pub fn read(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Error<I2C>> {
        self.bus
            .write_read(self.address, &[register], buffer)
            .map_err(Error::I2cWriteReadError)
    }

    pub fn read_array<const N: usize>(&mut self, register: u8) -> Result<[u8; N], Error<I2C>> {
        let mut buffer = [0u8; N];
        self.read(register, &mut buffer)?;
        Ok(buffer)
    }

    pub fn read_u8(&mut self, register: u8) -> Result<u8, Error<I2C>> {
        let [value] = self.read_array::<1>(register)?;
        Ok(value)
    }

    pub fn read_u16_le(&mut self, register: u8) -> Result<u16, Error<I2C>> {
        Ok(u16::from_le_bytes(self.read_array(register)?))
    }

    pub fn read_u16_be(&mut self, register: u8) -> Result<u16, Error<I2C>> {
        Ok(u16::from_be_bytes(self.read_array(register)?))
    }

    /// Write `data` to the registers starting at `register`.
    pub fn write(&mut self, register: u8, data: &[u8]) -> Result<(), Error<I2C>> {
        let mut combined: ArrayVec<u8, MAX_WRITE_LENGTH> = ArrayVec::new();
        combined.push(register);
        combined
            .try_extend_from_slice(data)
            .map_err(|_| LibraryError::OutOfRange("Register write is too long"))?;
        self.bus
            .write(self.address, &combined)
            .map_err(Error::I2cWriteError)
    }

    pub fn write_u8(&mut self, register: u8, value: u8) -> Result<(), Error<I2C>> {
        self.write(register, &[value])
    }

    pub fn write_u16_le(&mut self, register: u8, value: u16) -> Result<(), Error<I2C>> {
        self.write(register, &value.to_le_bytes())
    }

    /// Read a long block of data starting at `register`.
    ///
    /// The register address is sent once, then the data is clocked out in reads of at most
    /// `batch_length` bytes, relying on the unit auto-incrementing its register pointer. Some
    /// controllers (and the units themselves) have small transfer buffers, so `batch_length` is
    /// kept to a multiple of four bytes and at least four.
    pub fn read_batched(
        &mut self,
        register: u8,
        buffer: &mut [u8],
        batch_length: usize,
    ) -> Result<(), Error<I2C>> {
        let batch_length = (batch_length - batch_length % 4).max(4);
        self.bus
            .write(self.address, &[register])
            .map_err(Error::I2cWriteError)?;
        for chunk in buffer.chunks_mut(batch_length) {
            self.bus
                .read(self.address, chunk)
                .map_err(Error::I2cReadError)?;
        }
        trace!(
            "read {} bytes from {:#04x} in batches of {}",
            buffer.len(),
            register,
            batch_length
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::test::{I2cOperation, MockRegisterBus};
    use crate::LibraryError;

    use super::{is_valid_address, RegisterBus};

    #[test]
    fn valid_addresses() {
        assert!(!is_valid_address(0x00));
        assert!(!is_valid_address(0x07));
        assert!(is_valid_address(0x08));
        assert!(is_valid_address(0x5A));
        assert!(is_valid_address(0x77));
        assert!(!is_valid_address(0x78));
        assert!(!is_valid_address(0xFF));
    }

    #[test]
    fn read_write_register() {
        let mocked = MockRegisterBus::new(0x5A);
        mocked.set_registers(0x10, &[0x34, 0x12]);
        let mut bus = RegisterBus::new(mocked.clone(), 0x5A);
        assert_eq!(bus.read_u16_le(0x10).unwrap(), 0x1234);
        assert_eq!(bus.read_u16_be(0x10).unwrap(), 0x3412);
        bus.write_u16_le(0x20, 0xBEEF).unwrap();
        assert_eq!(mocked.registers(0x20, 2), [0xEF, 0xBE]);
        assert_eq!(
            mocked.recent_operations()[0],
            I2cOperation::Write {
                register: 0x20,
                length: 2
            }
        );
    }

    #[test]
    fn write_too_long() {
        let mocked = MockRegisterBus::new(0x5A);
        let mut bus = RegisterBus::new(mocked.clone(), 0x5A);
        let err = bus.write(0x00, &[0u8; 8]).unwrap_err();
        assert!(matches!(
            err.library_error(),
            Some(LibraryError::OutOfRange(_))
        ));
        assert!(mocked.recent_operations().is_empty());
    }

    #[test]
    fn change_address_retargets() {
        let mocked = MockRegisterBus::new(0x5A);
        let mut bus = RegisterBus::new(mocked.clone(), 0x5A);
        assert_eq!(
            bus.change_address(0x02),
            Err(LibraryError::InvalidAddress(0x02))
        );
        assert_eq!(bus.address(), 0x5A);
        bus.change_address(0x40).unwrap();
        assert_eq!(bus.address(), 0x40);
        // The mock is still at the old address, so this fails.
        assert!(bus.read_u8(0x00).is_err());
        mocked.set_i2c_address(0x40);
        assert!(bus.read_u8(0x00).is_ok());
    }

    #[test]
    fn batched_read() {
        let mocked = MockRegisterBus::new(0x32);
        let data: [u8; 40] = core::array::from_fn(|n| n as u8);
        mocked.set_registers(0x70, &data);
        let mut bus = RegisterBus::new(mocked.clone(), 0x32);
        let mut buffer = [0u8; 40];
        // 30 gets rounded down to 28
        bus.read_batched(0x70, &mut buffer, 30).unwrap();
        assert_eq!(buffer, data);
        let ops = mocked.recent_operations();
        // Newest first: the 12 byte tail, the 28 byte head, then the register pointer
        assert_eq!(ops.len(), 3);
        assert_eq!(
            ops[0],
            I2cOperation::Read {
                register: 0x70 + 28,
                length: 12
            }
        );
        assert_eq!(
            ops[1],
            I2cOperation::Read {
                register: 0x70,
                length: 28
            }
        );
        assert_eq!(
            ops[2],
            I2cOperation::Write {
                register: 0x70,
                length: 0
            }
        );
    }
}
