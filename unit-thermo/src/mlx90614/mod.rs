// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! Driver for the Melexis MLX90614 infrared thermometer.
//!
//! The MLX90614 speaks SMBus: every cell is a 16-bit word, and every transaction carries a packet
//! error code. Settings live in EEPROM, so changing them is slow (each write is an erase then a
//! write, 10ms each) and wears the part. The driver keeps a copy of the EEPROM (see
//! [`EepromShadow`]) so that writes of unchanged values can be skipped.
//!
//! Both the single sensor part and the dual sensor MLX90614BAA are supported, see
//! [`Mlx90614Driver`] and [`Mlx90614BaaDriver`]. The only differences are how long the filters
//! take to settle, and whether the second object temperature is meaningful.
mod register;
mod smbus;

use core::marker::PhantomData;
use core::num::NonZeroUsize;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;
use log::{debug, trace, warn};
use paste::paste;

use crate::bus::{is_valid_address, RegisterBus};
use crate::clock::{poll_until, Clock};
use crate::codec::{
    ambient_limit_to_celsius, celsius_to_ambient_limit, celsius_to_object_limit,
    emissivity_from_raw, emissivity_to_raw, linearized_temperature, object_limit_to_celsius,
    Temperature, MLX90614_ERROR_FLAG,
};
use crate::error::{Error, LibraryError};
use crate::periodic::{PeriodicController, PeriodicMeasurement};

pub use register::{
    Command, ConfigRegister, DualVariant, Fir, Flags, Gain, Iir, IrSensor, Output, PwmControl,
    PwmMode, PwmPin, StandardVariant, Variant,
};

use smbus::{read_word, send_command, write_word};

/// The SMBus address the MLX90614 ships with.
pub const DEFAULT_ADDRESS: u8 = 0x5A;

/// How long an EEPROM erase or write takes (the datasheet gives 5ms typical, 10ms max).
const EEPROM_WRITE_DELAY_MS: u32 = 10;

/// How long to wait for the unit to answer at a new address.
const ADDRESS_CHANGE_TIMEOUT_MS: u32 = 1000;

/// The single sensor MLX90614.
pub type Mlx90614Driver<I2C, T> = Mlx90614<I2C, T, StandardVariant>;

/// The dual sensor MLX90614BAA.
pub type Mlx90614BaaDriver<I2C, T> = Mlx90614<I2C, T, DualVariant>;

/// One reading of the linearized temperatures.
///
/// Words that were not read (because of the output mode), or that the unit flagged as invalid,
/// decode to `None`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Measurement {
    raw: [u16; 3],
}

impl Default for Measurement {
    fn default() -> Self {
        Self {
            raw: [MLX90614_ERROR_FLAG; 3],
        }
    }
}

impl Measurement {
    /// Create a measurement from the raw ambient, object 1 and object 2 words.
    pub fn from_raw(raw: [u16; 3]) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> [u16; 3] {
        self.raw
    }

    pub fn ambient(&self) -> Option<Temperature> {
        linearized_temperature(self.raw[0])
    }

    pub fn object1(&self) -> Option<Temperature> {
        linearized_temperature(self.raw[1])
    }

    /// The second object temperature. Only the dual sensor parts have a real second sensor.
    pub fn object2(&self) -> Option<Temperature> {
        linearized_temperature(self.raw[2])
    }
}

/// A copy of the user-visible EEPROM cells.
///
/// This is read in [`begin`][Mlx90614::begin], and kept current by every EEPROM write the driver
/// makes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EepromShadow {
    pub object_max: u16,
    pub object_min: u16,
    pub pwm_control: u16,
    /// Maximum in the high byte, minimum in the low byte.
    pub ambient_range: u16,
    pub emissivity: u16,
    pub config: u16,
    /// The SMBus address is the low byte.
    pub address: u16,
    pub id: [u16; 4],
}

impl EepromShadow {
    pub fn config_register(&self) -> ConfigRegister {
        self.config.into()
    }

    fn update(&mut self, command: Command, value: u16) {
        match command {
            Command::ObjectMax => self.object_max = value,
            Command::ObjectMin => self.object_min = value,
            Command::PwmControl => self.pwm_control = value,
            Command::AmbientRange => self.ambient_range = value,
            Command::Emissivity => self.emissivity = value,
            Command::Config => self.config = value,
            Command::Address => self.address = value,
            Command::Id0 => self.id[0] = value,
            Command::Id1 => self.id[1] = value,
            Command::Id2 => self.id[2] = value,
            Command::Id3 => self.id[3] = value,
            _ => (),
        }
    }
}

/// Settings applied by [`begin`][Mlx90614::begin].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Start periodic measurement at the end of `begin`.
    pub start_periodic: bool,
    pub iir: Iir,
    pub fir: Fir,
    pub gain: Gain,
    pub ir_sensor: IrSensor,
    /// Written before periodic measurement starts. Only used when `start_periodic` is set.
    pub emissivity: f32,
    /// How many measurements to keep.
    pub stored_size: NonZeroUsize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_periodic: true,
            iir: Iir::Filter100,
            fir: Fir::Filter1024,
            gain: Gain::Coefficient12_5,
            ir_sensor: IrSensor::Single,
            emissivity: 1.0,
            stored_size: NonZeroUsize::MIN,
        }
    }
}

/// Generate read and write methods for a field in the configuration register.
macro_rules! config_field {
    { $field:ident, $typ:ty, $doc:literal } => {
    paste! {
        #[doc = "Read the " $doc " from the configuration register."]
        pub fn [< read_ $field >](&mut self) -> Result<$typ, Error<I2C>> {
            Ok(self.read_config()?.$field())
        }

        #[doc = "Change the " $doc ". This is an EEPROM write, and is skipped if the value is already set."]
        pub fn [< write_ $field >](&mut self, new_value: $typ) -> Result<(), Error<I2C>> {
            self.periodic.ensure_stopped()?;
            let mut current = self.read_config()?;
            if current.$field() != new_value {
                current.[< set_ $field >](new_value);
                self.write_config(current)
            } else {
                Ok(())
            }
        }
    }};
}

/// Generate NaN-defaulting accessors for one of the temperatures in the oldest measurement.
macro_rules! oldest_temperature {
    { $field:ident } => {
    paste! {
        pub fn [< $field _kelvin >](&self) -> f32 {
            self.oldest().and_then(Measurement::$field).map_or(f32::NAN, |t| t.kelvin())
        }

        pub fn [< $field _celsius >](&self) -> f32 {
            self.oldest().and_then(Measurement::$field).map_or(f32::NAN, |t| t.celsius())
        }

        pub fn [< $field _fahrenheit >](&self) -> f32 {
            self.oldest().and_then(Measurement::$field).map_or(f32::NAN, |t| t.fahrenheit())
        }
    }};
}

#[derive(Clone, Debug)]
pub struct Mlx90614<I2C, T, V> {
    bus: RegisterBus<I2C>,
    timer: T,
    config: Config,
    eeprom: EepromShadow,
    periodic: PeriodicController<Measurement>,
    variant: PhantomData<V>,
}

impl<I2C, T, V> Mlx90614<I2C, T, V>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
    T: Clock + DelayMs<u32>,
    V: Variant,
{
    /// Create a driver for the unit at `address`. Nothing is sent on the bus until
    /// [`begin`][Mlx90614::begin].
    pub fn new(bus: I2C, address: u8, timer: T, config: Config) -> Self {
        Self {
            bus: RegisterBus::new(bus, address),
            timer,
            config,
            eeprom: EepromShadow::default(),
            periodic: PeriodicController::new(config.stored_size),
            variant: PhantomData,
        }
    }

    /// Detect the unit, load the EEPROM and (optionally) start periodic measurement.
    pub fn begin(&mut self) -> Result<(), Error<I2C>> {
        self.periodic.resize(self.config.stored_size)?;
        self.eeprom = read_eeprom(&mut self.bus)?;
        if self.eeprom.id == [0; 4] {
            return Err(LibraryError::NotDetected("The unit's ID is blank").into());
        }
        let config = self.eeprom.config_register();
        debug!(
            "found {} at {:#04x}, ID {:04x?}, IIR {:?} FIR {:?} gain {:?} output {:?}",
            V::NAME,
            self.bus.address(),
            self.eeprom.id,
            config.iir(),
            config.fir(),
            config.gain(),
            config.output()
        );
        if self.config.start_periodic {
            self.write_emissivity(self.config.emissivity)?;
            self.start_periodic_measurement(
                self.config.iir,
                self.config.fir,
                self.config.gain,
                self.config.ir_sensor,
            )?;
        }
        Ok(())
    }

    /// The address the unit is being accessed at.
    pub fn address(&self) -> u8 {
        self.bus.address()
    }

    /// Give back the bus and timer.
    pub fn release(self) -> (I2C, T) {
        (self.bus.release(), self.timer)
    }

    pub fn eeprom(&self) -> &EepromShadow {
        &self.eeprom
    }

    /// Program the filters, gain and sensor selection, then start periodic measurement.
    pub fn start_periodic_measurement(
        &mut self,
        iir: Iir,
        fir: Fir,
        gain: Gain,
        ir_sensor: IrSensor,
    ) -> Result<(), Error<I2C>> {
        self.periodic.ensure_stopped()?;
        let current = self.read_config()?;
        let mut config = current;
        config.set_iir(iir);
        config.set_fir(fir);
        config.set_gain(gain);
        config.set_ir_sensor(ir_sensor);
        if config != current {
            self.write_config(config)?;
        }
        self.start_periodic_measurement_with_current()
    }

    /// Start periodic measurement with whatever is in the configuration register.
    ///
    /// The measurement interval follows the filter settings.
    pub fn start_periodic_measurement_with_current(&mut self) -> Result<(), Error<I2C>> {
        self.periodic.ensure_stopped()?;
        let config = self.eeprom.config_register();
        let interval = V::interval_ms(config.iir(), config.fir());
        let now = self.timer.now_ms();
        self.periodic.start(now, interval)?;
        Ok(())
    }

    /// Take one measurement outside of periodic measurement.
    pub fn measure_singleshot(&mut self) -> Result<Measurement, Error<I2C>> {
        self.periodic.ensure_stopped()?;
        read_measurement(&mut self.bus, self.eeprom.config_register().output())
    }

    /// Read the raw (not linearized) IR channels.
    pub fn read_raw_ir(&mut self) -> Result<[u16; 2], Error<I2C>> {
        Ok([
            read_word(&mut self.bus, Command::RawIr1)?,
            read_word(&mut self.bus, Command::RawIr2)?,
        ])
    }

    pub fn read_config(&mut self) -> Result<ConfigRegister, Error<I2C>> {
        Ok(read_word(&mut self.bus, Command::Config)?.into())
    }

    /// Write the whole configuration register.
    pub fn write_config(&mut self, config: ConfigRegister) -> Result<(), Error<I2C>> {
        self.periodic.ensure_stopped()?;
        if !config.fir().is_recommended() {
            warn!("FIR lengths below 128 are not recommended ({:?})", config.fir());
        }
        if config.ir_sensor() == IrSensor::Dual && !V::DUAL_SENSOR {
            warn!("{} only has one IR sensor", V::NAME);
        }
        self.write_eeprom(Command::Config, config.into())
    }

    config_field! { output, Output, "PWM output mode" }
    config_field! { iir, Iir, "IIR filter setting" }
    config_field! { fir, Fir, "FIR filter length" }
    config_field! { gain, Gain, "amplifier gain" }
    config_field! { ir_sensor, IrSensor, "IR sensor selection" }
    config_field! { positive_ks, bool, "sign of the Ks coefficient" }
    config_field! { positive_kf2, bool, "sign of the Kf2 coefficient" }

    pub fn read_emissivity_raw(&mut self) -> Result<u16, Error<I2C>> {
        read_word(&mut self.bus, Command::Emissivity)
    }

    pub fn read_emissivity(&mut self) -> Result<f32, Error<I2C>> {
        Ok(emissivity_from_raw(self.read_emissivity_raw()?))
    }

    pub fn write_emissivity_raw(&mut self, emissivity: u16) -> Result<(), Error<I2C>> {
        self.periodic.ensure_stopped()?;
        if self.eeprom.emissivity == emissivity {
            return Ok(());
        }
        self.write_eeprom(Command::Emissivity, emissivity)
    }

    /// Set the emissivity of the object being measured (0.1 to 1.0).
    pub fn write_emissivity(&mut self, emissivity: f32) -> Result<(), Error<I2C>> {
        let raw = emissivity_to_raw(emissivity)?;
        self.write_emissivity_raw(raw)
    }

    /// Read the object temperature range as `(minimum, maximum)` raw words.
    pub fn read_object_range_raw(&mut self) -> Result<(u16, u16), Error<I2C>> {
        Ok((
            read_word(&mut self.bus, Command::ObjectMin)?,
            read_word(&mut self.bus, Command::ObjectMax)?,
        ))
    }

    /// Read the object temperature range in degrees Celsius.
    pub fn read_object_range(&mut self) -> Result<(f32, f32), Error<I2C>> {
        let (min, max) = self.read_object_range_raw()?;
        Ok((object_limit_to_celsius(min), object_limit_to_celsius(max)))
    }

    pub fn write_object_range_raw(&mut self, min: u16, max: u16) -> Result<(), Error<I2C>> {
        self.periodic.ensure_stopped()?;
        if min > max {
            return Err(LibraryError::OutOfRange("The minimum is above the maximum").into());
        }
        if self.eeprom.object_min != min {
            self.write_eeprom(Command::ObjectMin, min)?;
        }
        if self.eeprom.object_max != max {
            self.write_eeprom(Command::ObjectMax, max)?;
        }
        Ok(())
    }

    /// Set the object temperature range, clamped to what the unit can store.
    pub fn write_object_range(&mut self, min: f32, max: f32) -> Result<(), Error<I2C>> {
        self.write_object_range_raw(celsius_to_object_limit(min), celsius_to_object_limit(max))
    }

    /// Read the ambient temperature range as `(minimum, maximum)` raw bytes.
    pub fn read_ambient_range_raw(&mut self) -> Result<(u8, u8), Error<I2C>> {
        let [min, max] = read_word(&mut self.bus, Command::AmbientRange)?.to_le_bytes();
        Ok((min, max))
    }

    pub fn read_ambient_range(&mut self) -> Result<(f32, f32), Error<I2C>> {
        let (min, max) = self.read_ambient_range_raw()?;
        Ok((ambient_limit_to_celsius(min), ambient_limit_to_celsius(max)))
    }

    pub fn write_ambient_range_raw(&mut self, min: u8, max: u8) -> Result<(), Error<I2C>> {
        self.periodic.ensure_stopped()?;
        if min > max {
            return Err(LibraryError::OutOfRange("The minimum is above the maximum").into());
        }
        let value = u16::from_le_bytes([min, max]);
        if self.eeprom.ambient_range == value {
            return Ok(());
        }
        self.write_eeprom(Command::AmbientRange, value)
    }

    pub fn write_ambient_range(&mut self, min: f32, max: f32) -> Result<(), Error<I2C>> {
        self.write_ambient_range_raw(celsius_to_ambient_limit(min), celsius_to_ambient_limit(max))
    }

    pub fn read_pwm_control(&mut self) -> Result<PwmControl, Error<I2C>> {
        Ok(read_word(&mut self.bus, Command::PwmControl)?.into())
    }

    pub fn write_pwm_control(&mut self, pwm: PwmControl) -> Result<(), Error<I2C>> {
        self.periodic.ensure_stopped()?;
        let value = u16::from(pwm);
        if self.eeprom.pwm_control == value {
            return Ok(());
        }
        self.write_eeprom(Command::PwmControl, value)
    }

    pub fn read_flags(&mut self) -> Result<Flags, Error<I2C>> {
        Ok(read_word(&mut self.bus, Command::Flags)?.into())
    }

    /// Read the SMBus address stored in EEPROM.
    pub fn read_address(&mut self) -> Result<u8, Error<I2C>> {
        let [address, _] = read_word(&mut self.bus, Command::Address)?.to_le_bytes();
        Ok(address)
    }

    /// Store a new SMBus address, then switch to it.
    ///
    /// This waits up to a second for the unit to answer at the new address, returning
    /// [`LibraryError::Timeout`] if it doesn't. The driver uses the new address either way.
    pub fn change_address(&mut self, address: u8) -> Result<(), Error<I2C>> {
        if !is_valid_address(address) {
            return Err(LibraryError::InvalidAddress(address).into());
        }
        // The high byte of the address cell is reserved.
        let value = (self.eeprom.address & 0xFF00) | u16::from(address);
        self.program_eeprom(Command::Address, value)?;
        let previous = self.bus.address();
        self.bus.change_address(address)?;
        let answered = poll_until(&mut self.timer, ADDRESS_CHANGE_TIMEOUT_MS, 1, || {
            Ok::<_, Error<I2C>>(matches!(
                read_word(&mut self.bus, Command::Address),
                Ok(stored) if stored == value
            ))
        })?;
        if !answered {
            warn!("no answer at {:#04x} after changing address", address);
            return Err(LibraryError::Timeout.into());
        }
        self.eeprom.address = value;
        debug!("moved from {:#04x} to {:#04x}", previous, address);
        Ok(())
    }

    /// Put the unit into sleep mode.
    ///
    /// Waking the unit back up requires holding SCL high and SDA low for at least 33ms, which
    /// has to be done with the pins directly.
    pub fn sleep(&mut self) -> Result<(), Error<I2C>> {
        send_command(&mut self.bus, Command::Sleep)?;
        debug!("{} at {:#04x} is going to sleep", V::NAME, self.bus.address());
        Ok(())
    }

    oldest_temperature! { ambient }
    oldest_temperature! { object1 }
    oldest_temperature! { object2 }

    /// Erase then write an EEPROM cell.
    fn program_eeprom(&mut self, command: Command, value: u16) -> Result<(), Error<I2C>> {
        if !command.is_eeprom() {
            return Err(LibraryError::InvalidData("Not an EEPROM cell").into());
        }
        write_word(&mut self.bus, command, 0)?;
        self.timer.delay_ms(EEPROM_WRITE_DELAY_MS);
        write_word(&mut self.bus, command, value)?;
        self.timer.delay_ms(EEPROM_WRITE_DELAY_MS);
        Ok(())
    }

    /// Write an EEPROM cell, read it back, and update the shadow copy.
    fn write_eeprom(&mut self, command: Command, value: u16) -> Result<(), Error<I2C>> {
        self.program_eeprom(command, value)?;
        if read_word(&mut self.bus, command)? != value {
            return Err(LibraryError::InvalidData("EEPROM cell did not keep the written value").into());
        }
        self.eeprom.update(command, value);
        debug!("wrote {:#06x} to EEPROM cell {:?}", value, command);
        Ok(())
    }
}

impl<I2C, T, V> PeriodicMeasurement for Mlx90614<I2C, T, V>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
    T: Clock + DelayMs<u32>,
    V: Variant,
{
    type Sample = Measurement;
    type Error = Error<I2C>;

    fn controller(&self) -> &PeriodicController<Measurement> {
        &self.periodic
    }

    fn controller_mut(&mut self) -> &mut PeriodicController<Measurement> {
        &mut self.periodic
    }

    fn update(&mut self, force: bool) -> Result<(), Error<I2C>> {
        let now = self.timer.now_ms();
        let output = self.eeprom.config_register().output();
        self.periodic.poll(now, force, || {
            read_measurement(&mut self.bus, output).map(Some)
        })?;
        Ok(())
    }

    fn stop_periodic_measurement(&mut self) -> Result<(), Error<I2C>> {
        // Nothing to tell the unit, it measures continuously.
        self.periodic.stop()?;
        Ok(())
    }
}

/// Read the temperatures the output mode makes available.
fn read_measurement<I2C>(
    bus: &mut RegisterBus<I2C>,
    output: Output,
) -> Result<Measurement, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    let mut measurement = Measurement::default();
    for (raw, command) in measurement.raw.iter_mut().zip(output.commands()) {
        if let Some(command) = command {
            *raw = read_word(bus, command)?;
        }
    }
    trace!("read {:04x?} with output mode {:?}", measurement.raw, output);
    Ok(measurement)
}

fn read_eeprom<I2C>(bus: &mut RegisterBus<I2C>) -> Result<EepromShadow, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    Ok(EepromShadow {
        object_max: read_word(bus, Command::ObjectMax)?,
        object_min: read_word(bus, Command::ObjectMin)?,
        pwm_control: read_word(bus, Command::PwmControl)?,
        ambient_range: read_word(bus, Command::AmbientRange)?,
        emissivity: read_word(bus, Command::Emissivity)?,
        config: read_word(bus, Command::Config)?,
        address: read_word(bus, Command::Address)?,
        id: [
            read_word(bus, Command::Id0)?,
            read_word(bus, Command::Id1)?,
            read_word(bus, Command::Id2)?,
            read_word(bus, Command::Id3)?,
        ],
    })
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;

    use crate::test::{I2cOperation, MockRegisterBus, MockTimer};
    use crate::{LibraryError, PeriodicMeasurement};

    use super::*;

    /// IIR 100%, FIR 1024, gain 12.5, single sensor, ambient and object 1.
    const DEFAULT_CONFIG: u16 = 0x9F84;

    fn mock_unit() -> MockRegisterBus {
        let mocked = MockRegisterBus::new_smbus(DEFAULT_ADDRESS).with_address_register(0x2E);
        mocked.set_word(0x20, 0x9993);
        mocked.set_word(0x21, 0x62E3);
        mocked.set_word(0x22, 0x0201);
        mocked.set_word(0x23, 0xF71C);
        mocked.set_word(0x24, 0xFFFF);
        mocked.set_word(0x25, DEFAULT_CONFIG);
        mocked.set_word(0x2E, 0xBE5A);
        mocked.set_word(0x3C, 0x1234);
        mocked.set_word(0x3D, 0x5678);
        mocked.set_word(0x3E, 0x9ABC);
        mocked.set_word(0x3F, 0xDEF0);
        // 301.98K, 293.16K, 310.00K
        mocked.set_word(0x06, 0x3AFB);
        mocked.set_word(0x07, 0x3942);
        mocked.set_word(0x08, 0x3C8C);
        mocked
    }

    fn stopped_config() -> Config {
        Config {
            start_periodic: false,
            ..Config::default()
        }
    }

    fn driver<V: Variant>(
        mocked: &MockRegisterBus,
        timer: &MockTimer,
        config: Config,
    ) -> Mlx90614<MockRegisterBus, MockTimer, V> {
        let mut driver = Mlx90614::new(mocked.clone(), DEFAULT_ADDRESS, timer.clone(), config);
        driver.begin().unwrap();
        mocked.clear_recent_operations();
        driver
    }

    #[test]
    fn begin_with_defaults() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, Config::default());
        // Everything already matched, so nothing was written
        assert_eq!(mocked.word(0x25), DEFAULT_CONFIG);
        assert!(driver.in_periodic());
        assert_eq!(driver.interval_ms(), 100);
        assert_eq!(driver.eeprom().id, [0x1234, 0x5678, 0x9ABC, 0xDEF0]);
        assert_eq!(driver.eeprom().config, DEFAULT_CONFIG);
    }

    #[test]
    fn begin_dual_interval() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let driver: Mlx90614BaaDriver<_, _> = driver(&mocked, &timer, Config::default());
        assert_eq!(driver.interval_ms(), 140);
    }

    #[test]
    fn begin_not_detected() {
        let mocked = mock_unit();
        for command in 0x3C..=0x3F {
            mocked.set_word(command, 0);
        }
        let mut driver: Mlx90614Driver<_, _> =
            Mlx90614::new(mocked, DEFAULT_ADDRESS, MockTimer::new(), Config::default());
        let err = driver.begin().unwrap_err();
        assert!(matches!(
            err.library_error(),
            Some(LibraryError::NotDetected(_))
        ));
        assert!(!driver.in_periodic());
    }

    #[test]
    fn begin_programs_settings() {
        let mocked = mock_unit();
        mocked.set_word(0x24, 0x8000);
        let timer = MockTimer::new();
        let config = Config {
            iir: Iir::Filter50,
            fir: Fir::Filter128,
            emissivity: 0.95,
            ..Config::default()
        };
        let driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, config);
        assert_eq!(mocked.word(0x24), 62258);
        assert_eq!(driver.eeprom().emissivity, 62258);
        let written = ConfigRegister::from(mocked.word(0x25));
        assert_eq!(written.iir(), Iir::Filter50);
        assert_eq!(written.fir(), Fir::Filter128);
        // Calibration bits are untouched
        assert_eq!(mocked.word(0x25) & 0xC0F8, DEFAULT_CONFIG & 0xC0F8);
        assert_eq!(driver.interval_ms(), 300);
    }

    #[test]
    fn periodic_updates() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let config = Config {
            stored_size: NonZeroUsize::new(4).unwrap(),
            ..Config::default()
        };
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, config);
        driver.update(false).unwrap();
        assert!(!driver.updated());
        assert!(driver.ambient_celsius().is_nan());
        timer.advance(100);
        driver.update(false).unwrap();
        assert!(driver.updated());
        assert_eq!(driver.updated_at(), Some(100));
        assert_approx_eq!(f32, driver.ambient_kelvin(), 301.98, epsilon = 0.001);
        assert_approx_eq!(f32, driver.object1_celsius(), 20.01, epsilon = 0.001);
        // Not read in this output mode
        assert!(driver.object2_celsius().is_nan());
        assert_eq!(driver.oldest().unwrap().raw(), [0x3AFB, 0x3942, 0x8000]);
        timer.advance(50);
        driver.update(false).unwrap();
        assert!(!driver.updated());
        driver.update(true).unwrap();
        assert!(driver.updated());
        assert_eq!(driver.available(), 2);
        assert!(driver.discard());
        driver.flush();
        assert!(driver.is_empty());
    }

    #[test]
    fn output_mode_object_only() {
        let mocked = mock_unit();
        let mut config = ConfigRegister::from(DEFAULT_CONFIG);
        config.set_output(Output::Object1Object2);
        config.set_ir_sensor(IrSensor::Dual);
        mocked.set_word(0x25, config.into());
        let timer = MockTimer::new();
        let config = Config {
            ir_sensor: IrSensor::Dual,
            ..Config::default()
        };
        let mut driver: Mlx90614BaaDriver<_, _> = driver(&mocked, &timer, config);
        driver.update(true).unwrap();
        assert!(driver.ambient_celsius().is_nan());
        assert_approx_eq!(f32, driver.object1_kelvin(), 293.16, epsilon = 0.001);
        assert_approx_eq!(f32, driver.object2_kelvin(), 310.0, epsilon = 0.001);
        assert_approx_eq!(f32, driver.object2_fahrenheit(), 98.33, epsilon = 0.001);
        let ops = mocked.recent_operations();
        assert_eq!(ops.len(), 2);
        assert_eq!(
            ops[0],
            I2cOperation::Read {
                register: 0x08,
                length: 3
            }
        );
        assert_eq!(
            ops[1],
            I2cOperation::Read {
                register: 0x07,
                length: 3
            }
        );
    }

    #[test]
    fn invalid_flag_is_nan() {
        let mocked = mock_unit();
        mocked.set_word(0x07, 0x8123);
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, Config::default());
        driver.update(true).unwrap();
        assert!(driver.updated());
        assert!(driver.object1_celsius().is_nan());
        assert!(driver.oldest().unwrap().object1().is_none());
        assert!(driver.oldest().unwrap().ambient().is_some());
    }

    #[test]
    fn emissivity_rejected() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        let shadow = *driver.eeprom();
        for bad in [0.09, 1.001] {
            let err = driver.write_emissivity(bad).unwrap_err();
            assert!(matches!(
                err.library_error(),
                Some(LibraryError::OutOfRange(_))
            ));
        }
        assert_eq!(mocked.write_count(), 0);
        assert_eq!(*driver.eeprom(), shadow);
        assert_eq!(mocked.word(0x24), 0xFFFF);
    }

    #[test]
    fn emissivity_written() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        driver.write_emissivity(0.5).unwrap();
        assert_eq!(mocked.word(0x24), 32768);
        assert_eq!(driver.eeprom().emissivity, 32768);
        assert_approx_eq!(f32, driver.read_emissivity().unwrap(), 0.5, epsilon = 0.0001);
        // Erase, write, then read back
        let ops = mocked.recent_operations();
        assert_eq!(
            ops[1],
            I2cOperation::Read {
                register: 0x24,
                length: 3
            }
        );
        assert_eq!(
            ops[2],
            I2cOperation::Write {
                register: 0x24,
                length: 3
            }
        );
        assert_eq!(
            ops[3],
            I2cOperation::Write {
                register: 0x24,
                length: 3
            }
        );
        assert_eq!(timer.now(), 20);
    }

    #[test]
    fn emissivity_unchanged_is_skipped() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        driver.write_emissivity(1.0).unwrap();
        assert_eq!(mocked.write_count(), 0);
    }

    #[test]
    fn busy_while_running() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, Config::default());
        driver.update(true).unwrap();
        assert_eq!(driver.available(), 1);
        let err = driver.measure_singleshot().unwrap_err();
        assert_eq!(err.library_error(), Some(&LibraryError::Busy));
        let err = driver.write_emissivity(0.5).unwrap_err();
        assert_eq!(err.library_error(), Some(&LibraryError::Busy));
        let err = driver.write_fir(Fir::Filter256).unwrap_err();
        assert_eq!(err.library_error(), Some(&LibraryError::Busy));
        assert_eq!(mocked.write_count(), 0);
        assert_eq!(driver.available(), 1);
    }

    #[test]
    fn singleshot() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        let measurement = driver.measure_singleshot().unwrap();
        assert_approx_eq!(
            f32,
            measurement.ambient().unwrap().kelvin(),
            301.98,
            epsilon = 0.001
        );
        assert!(driver.is_empty());
        assert_eq!(driver.updated_at(), None);
    }

    #[test]
    fn start_and_stop() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        assert_eq!(
            driver.stop_periodic_measurement().unwrap_err().library_error(),
            Some(&LibraryError::NotRunning)
        );
        driver.start_periodic_measurement_with_current().unwrap();
        assert_eq!(
            driver
                .start_periodic_measurement_with_current()
                .unwrap_err()
                .library_error(),
            Some(&LibraryError::Busy)
        );
        assert_eq!(driver.interval_ms(), 100);
        driver.stop_periodic_measurement().unwrap();
        assert!(!driver.in_periodic());
        // Stopping doesn't touch the unit
        assert_eq!(mocked.write_count(), 0);
    }

    #[test]
    fn config_fields() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        assert_eq!(driver.read_gain().unwrap(), Gain::Coefficient12_5);
        assert!(driver.read_positive_ks().unwrap());
        driver.write_fir(Fir::Filter1024).unwrap();
        assert_eq!(mocked.write_count(), 0);
        driver.write_fir(Fir::Filter64).unwrap();
        assert_eq!(driver.read_fir().unwrap(), Fir::Filter64);
        driver.write_positive_kf2(true).unwrap();
        assert!(driver.read_positive_kf2().unwrap());
        driver.write_output(Output::Object2).unwrap();
        assert_eq!(driver.read_output().unwrap(), Output::Object2);
        assert_eq!(driver.eeprom().config, mocked.word(0x25));
        // Non-recommended FIR lengths have no interval
        driver.start_periodic_measurement_with_current().unwrap();
        assert_eq!(driver.interval_ms(), 0);
    }

    #[test]
    fn object_range() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        let err = driver.write_object_range(50.0, -10.0).unwrap_err();
        assert!(matches!(
            err.library_error(),
            Some(LibraryError::OutOfRange(_))
        ));
        assert_eq!(mocked.write_count(), 0);
        driver.write_object_range(-10.0, 50.0).unwrap();
        let (min, max) = driver.read_object_range().unwrap();
        assert_approx_eq!(f32, min, -10.0, epsilon = 0.001);
        assert_approx_eq!(f32, max, 50.0, epsilon = 0.001);
        assert_eq!(driver.eeprom().object_min, 26315);
        assert_eq!(driver.eeprom().object_max, 32315);
        // Clamped to what fits
        driver.write_object_range(-300.0, 500.0).unwrap();
        assert_eq!(driver.read_object_range_raw().unwrap(), (0, 65535));
    }

    #[test]
    fn ambient_range() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        assert_eq!(driver.read_ambient_range_raw().unwrap(), (0x1C, 0xF7));
        let (min, max) = driver.read_ambient_range().unwrap();
        assert_approx_eq!(f32, min, -20.28, epsilon = 0.001);
        assert_approx_eq!(f32, max, 119.88, epsilon = 0.001);
        assert!(driver.write_ambient_range_raw(0x20, 0x10).is_err());
        driver.write_ambient_range_raw(0x10, 0x20).unwrap();
        assert_eq!(mocked.word(0x23), 0x2010);
        assert_eq!(driver.eeprom().ambient_range, 0x2010);
    }

    #[test]
    fn pwm_and_flags() {
        let mocked = mock_unit();
        mocked.set_word(0xF0, 0x0080);
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        let mut pwm = driver.read_pwm_control().unwrap();
        assert_eq!(pwm.mode(), PwmMode::Single);
        pwm.set_enabled(true);
        driver.write_pwm_control(pwm).unwrap();
        assert_eq!(mocked.word(0x22), 0x0203);
        assert!(driver.read_flags().unwrap().eeprom_busy());
    }

    #[test]
    fn change_address() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        assert_eq!(driver.read_address().unwrap(), 0x5A);
        let err = driver.change_address(0x78).unwrap_err();
        assert_eq!(err.library_error(), Some(&LibraryError::InvalidAddress(0x78)));
        assert_eq!(mocked.write_count(), 0);
        driver.change_address(0x5B).unwrap();
        assert_eq!(mocked.i2c_address(), 0x5B);
        assert_eq!(driver.address(), 0x5B);
        assert_eq!(mocked.word(0x2E), 0xBE5B);
        assert_eq!(driver.eeprom().address, 0xBE5B);
        assert_eq!(driver.read_address().unwrap(), 0x5B);
    }

    #[test]
    fn change_address_timeout() {
        // Without the address hook the unit stays where it is.
        let mocked = MockRegisterBus::new_smbus(DEFAULT_ADDRESS);
        mocked.set_word(0x3C, 0x1234);
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        let err = driver.change_address(0x5B).unwrap_err();
        assert_eq!(err.library_error(), Some(&LibraryError::Timeout));
        assert!(timer.now() >= 1000);
        assert_eq!(driver.address(), 0x5B);
    }

    #[test]
    fn checksum_mismatch() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, Config::default());
        mocked.set_corrupt_pec(true);
        let err = driver.update(true).unwrap_err();
        assert!(matches!(
            err.library_error(),
            Some(LibraryError::ChecksumMismatch { .. })
        ));
        assert!(!driver.updated());
        assert!(driver.is_empty());
    }

    #[test]
    fn sleep() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        driver.sleep().unwrap();
        assert_eq!(
            mocked.recent_operations()[0],
            I2cOperation::Write {
                register: 0xFF,
                length: 1
            }
        );
    }

    #[test]
    fn raw_ir() {
        let mocked = mock_unit();
        mocked.set_word(0x04, 0x0123);
        mocked.set_word(0x05, 0x8456);
        let timer = MockTimer::new();
        let mut driver: Mlx90614Driver<_, _> = driver(&mocked, &timer, stopped_config());
        assert_eq!(driver.read_raw_ir().unwrap(), [0x0123, 0x8456]);
    }
}
