// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! Driver for the NCIR2 infrared thermometer unit.
//!
//! The NCIR2 puts a microcontroller in front of its thermopile, so unlike the MLX90614 it has
//! plain byte registers, measures on its own, and has no notion of filter settings. On top of
//! the thermometer it has an RGB LED, a buzzer and a button, with the LED and buzzer optionally
//! driven by low and high temperature alarms.
use core::num::NonZeroUsize;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;
use log::{debug, trace, warn};
use num_enum::IntoPrimitive;

use crate::bus::{is_valid_address, RegisterBus};
use crate::button::ButtonEdgeState;
use crate::clock::{poll_until, Clock};
use crate::codec::{
    celsius_to_centi_celsius, centi_celsius_to_celsius, duty_from_raw, duty_to_raw,
    emissivity_from_raw, emissivity_to_raw, Temperature,
};
use crate::common::{AlarmLevel, Rgb};
use crate::error::{Error, LibraryError};
use crate::periodic::{PeriodicController, PeriodicMeasurement};

pub const DEFAULT_ADDRESS: u8 = 0x5A;

/// How long to wait for the unit to answer at a new address.
const ADDRESS_CHANGE_TIMEOUT_MS: u32 = 1000;

/// The range of alarm buzzer intervals the firmware accepts, in milliseconds.
const ALARM_BUZZER_INTERVAL: core::ops::RangeInclusive<u16> = 1..=5000;

#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
enum Register {
    Temperature = 0x00,
    Emissivity = 0x10,
    /// Low threshold, the high threshold follows 2 bytes later.
    AlarmTemperature = 0x20,
    /// Low alarm color, the high alarm color follows 3 bytes later.
    AlarmLed = 0x30,
    /// Low alarm buzzer, the high alarm buzzer follows 5 bytes later.
    AlarmBuzzer = 0x40,
    Buzzer = 0x50,
    BuzzerDuty = 0x52,
    BuzzerControl = 0x53,
    Led = 0x60,
    Button = 0x70,
    SaveConfig = 0x80,
    ChipTemperature = 0x90,
    FirmwareVersion = 0xFE,
    Address = 0xFF,
}

impl Register {
    fn at(self, level: AlarmLevel) -> u8 {
        let stride = match self {
            Self::AlarmTemperature => 2,
            Self::AlarmLed => 3,
            _ => 5,
        };
        level.register(self.into(), stride)
    }
}

/// One temperature reading.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Measurement {
    raw: [u8; 2],
}

impl Default for Measurement {
    fn default() -> Self {
        Self { raw: [0x00, 0x80] }
    }
}

impl Measurement {
    /// Create a measurement from the two bytes read from the unit (little endian).
    pub fn from_raw(raw: [u8; 2]) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> [u8; 2] {
        self.raw
    }

    /// The reading in hundredths of a degree Celsius.
    pub fn value(&self) -> i16 {
        i16::from_le_bytes(self.raw)
    }

    pub fn temperature(&self) -> Temperature {
        Temperature::from_celsius(centi_celsius_to_celsius(self.value()))
    }

    pub fn celsius(&self) -> f32 {
        self.temperature().celsius()
    }

    pub fn fahrenheit(&self) -> f32 {
        self.temperature().fahrenheit()
    }
}

/// How the buzzer sounds for an alarm.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AlarmBuzzer {
    /// Tone frequency in Hz.
    pub frequency: u16,
    /// Time between beeps in ms.
    pub interval_ms: u16,
    pub duty_raw: u8,
}

impl AlarmBuzzer {
    pub fn duty(&self) -> f32 {
        duty_from_raw(self.duty_raw)
    }
}

/// The free running buzzer settings.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Buzzer {
    pub frequency: u16,
    pub duty_raw: u8,
}

impl Buzzer {
    pub fn duty(&self) -> f32 {
        duty_from_raw(self.duty_raw)
    }
}

/// Settings applied by [`begin`][Ncir2::begin].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    pub start_periodic: bool,
    /// Measurement interval in ms.
    pub interval_ms: u32,
    /// How often the button is polled, in ms.
    pub button_interval_ms: u32,
    pub stored_size: NonZeroUsize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_periodic: true,
            interval_ms: 250,
            button_interval_ms: 20,
            stored_size: NonZeroUsize::MIN,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ncir2<I2C, T> {
    bus: RegisterBus<I2C>,
    timer: T,
    config: Config,
    periodic: PeriodicController<Measurement>,
    button: ButtonEdgeState,
}

impl<I2C, T> Ncir2<I2C, T>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
    T: Clock + DelayMs<u32>,
{
    pub fn new(bus: I2C, address: u8, timer: T, config: Config) -> Self {
        Self {
            bus: RegisterBus::new(bus, address),
            timer,
            config,
            periodic: PeriodicController::new(config.stored_size),
            button: ButtonEdgeState::new(config.button_interval_ms),
        }
    }

    /// Detect the unit and (optionally) start periodic measurement.
    pub fn begin(&mut self) -> Result<(), Error<I2C>> {
        self.periodic.resize(self.config.stored_size)?;
        let firmware = self.read_firmware_version()?;
        if firmware == 0 {
            return Err(LibraryError::NotDetected("Firmware version is 0").into());
        }
        debug!(
            "found NCIR2 at {:#04x}, firmware {:#04x}",
            self.bus.address(),
            firmware
        );
        self.button.set_interval_ms(self.config.button_interval_ms);
        if self.config.start_periodic {
            self.start_periodic_measurement(self.config.interval_ms)?;
        }
        Ok(())
    }

    pub fn address(&self) -> u8 {
        self.bus.address()
    }

    /// Give back the bus and timer.
    pub fn release(self) -> (I2C, T) {
        (self.bus.release(), self.timer)
    }

    /// Start taking a measurement every `interval_ms`.
    pub fn start_periodic_measurement(&mut self, interval_ms: u32) -> Result<(), Error<I2C>> {
        let now = self.timer.now_ms();
        self.periodic.start(now, interval_ms)?;
        self.config.interval_ms = interval_ms;
        Ok(())
    }

    /// Start periodic measurement with the most recently used interval.
    pub fn start_periodic_measurement_with_current(&mut self) -> Result<(), Error<I2C>> {
        self.start_periodic_measurement(self.config.interval_ms)
    }

    pub fn measure_singleshot(&mut self) -> Result<Measurement, Error<I2C>> {
        self.periodic.ensure_stopped()?;
        read_temperature(&mut self.bus, Register::Temperature)
    }

    /// The temperature of the oldest stored measurement in degrees Celsius, or NaN.
    pub fn celsius(&self) -> f32 {
        self.oldest().map_or(f32::NAN, Measurement::celsius)
    }

    pub fn fahrenheit(&self) -> f32 {
        self.oldest().map_or(f32::NAN, Measurement::fahrenheit)
    }

    pub fn read_emissivity_raw(&mut self) -> Result<u16, Error<I2C>> {
        self.bus.read_u16_le(Register::Emissivity.into())
    }

    pub fn read_emissivity(&mut self) -> Result<f32, Error<I2C>> {
        Ok(emissivity_from_raw(self.read_emissivity_raw()?))
    }

    pub fn write_emissivity_raw(&mut self, emissivity: u16) -> Result<(), Error<I2C>> {
        self.bus.write_u16_le(Register::Emissivity.into(), emissivity)
    }

    /// Set the emissivity (0.1 to 1.0).
    pub fn write_emissivity(&mut self, emissivity: f32) -> Result<(), Error<I2C>> {
        let raw = emissivity_to_raw(emissivity)?;
        self.write_emissivity_raw(raw)
    }

    /// Read an alarm threshold in hundredths of a degree Celsius.
    pub fn read_alarm_temperature_raw(&mut self, level: AlarmLevel) -> Result<i16, Error<I2C>> {
        let raw = self.bus.read_array(Register::AlarmTemperature.at(level))?;
        Ok(i16::from_le_bytes(raw))
    }

    pub fn read_alarm_temperature(&mut self, level: AlarmLevel) -> Result<f32, Error<I2C>> {
        Ok(centi_celsius_to_celsius(
            self.read_alarm_temperature_raw(level)?,
        ))
    }

    pub fn write_alarm_temperature_raw(
        &mut self,
        level: AlarmLevel,
        threshold: i16,
    ) -> Result<(), Error<I2C>> {
        self.bus
            .write(Register::AlarmTemperature.at(level), &threshold.to_le_bytes())
    }

    /// Set an alarm threshold. Thresholds outside of ±327.67°C are rejected.
    pub fn write_alarm_temperature(
        &mut self,
        level: AlarmLevel,
        celsius: f32,
    ) -> Result<(), Error<I2C>> {
        let raw = celsius_to_centi_celsius(celsius)?;
        self.write_alarm_temperature_raw(level, raw)
    }

    pub fn read_alarm_led(&mut self, level: AlarmLevel) -> Result<Rgb, Error<I2C>> {
        Ok(self.bus.read_array::<3>(Register::AlarmLed.at(level))?.into())
    }

    pub fn write_alarm_led(&mut self, level: AlarmLevel, color: Rgb) -> Result<(), Error<I2C>> {
        let bytes: [u8; 3] = color.into();
        self.bus.write(Register::AlarmLed.at(level), &bytes)
    }

    pub fn read_alarm_buzzer(&mut self, level: AlarmLevel) -> Result<AlarmBuzzer, Error<I2C>> {
        let register = Register::AlarmBuzzer.at(level);
        Ok(AlarmBuzzer {
            frequency: self.bus.read_u16_le(register)?,
            interval_ms: self.bus.read_u16_le(register + 2)?,
            duty_raw: self.bus.read_u8(register + 4)?,
        })
    }

    /// Configure an alarm's buzzer. The interval has to be between 1 and 5000ms.
    pub fn write_alarm_buzzer_raw(
        &mut self,
        level: AlarmLevel,
        buzzer: AlarmBuzzer,
    ) -> Result<(), Error<I2C>> {
        if !ALARM_BUZZER_INTERVAL.contains(&buzzer.interval_ms) {
            return Err(LibraryError::OutOfRange(
                "Alarm buzzer interval must be between 1 and 5000ms",
            )
            .into());
        }
        let [frequency_low, frequency_high] = buzzer.frequency.to_le_bytes();
        let [interval_low, interval_high] = buzzer.interval_ms.to_le_bytes();
        self.bus.write(
            Register::AlarmBuzzer.at(level),
            &[
                frequency_low,
                frequency_high,
                interval_low,
                interval_high,
                buzzer.duty_raw,
            ],
        )
    }

    pub fn write_alarm_buzzer(
        &mut self,
        level: AlarmLevel,
        frequency: u16,
        interval_ms: u16,
        duty: f32,
    ) -> Result<(), Error<I2C>> {
        let duty_raw = duty_to_raw(duty)?;
        self.write_alarm_buzzer_raw(
            level,
            AlarmBuzzer {
                frequency,
                interval_ms,
                duty_raw,
            },
        )
    }

    pub fn read_buzzer(&mut self) -> Result<Buzzer, Error<I2C>> {
        Ok(Buzzer {
            frequency: self.bus.read_u16_le(Register::Buzzer.into())?,
            duty_raw: self.bus.read_u8(Register::BuzzerDuty.into())?,
        })
    }

    pub fn write_buzzer_raw(&mut self, buzzer: Buzzer) -> Result<(), Error<I2C>> {
        let [low, high] = buzzer.frequency.to_le_bytes();
        self.bus
            .write(Register::Buzzer.into(), &[low, high, buzzer.duty_raw])
    }

    pub fn write_buzzer(&mut self, frequency: u16, duty: f32) -> Result<(), Error<I2C>> {
        let duty_raw = duty_to_raw(duty)?;
        self.write_buzzer_raw(Buzzer {
            frequency,
            duty_raw,
        })
    }

    pub fn read_buzzer_enabled(&mut self) -> Result<bool, Error<I2C>> {
        Ok(self.bus.read_u8(Register::BuzzerControl.into())? != 0)
    }

    pub fn write_buzzer_enabled(&mut self, enabled: bool) -> Result<(), Error<I2C>> {
        self.bus
            .write_u8(Register::BuzzerControl.into(), u8::from(enabled))
    }

    pub fn read_led(&mut self) -> Result<Rgb, Error<I2C>> {
        Ok(self.bus.read_array::<3>(Register::Led.into())?.into())
    }

    pub fn write_led(&mut self, color: Rgb) -> Result<(), Error<I2C>> {
        let bytes: [u8; 3] = color.into();
        self.bus.write(Register::Led.into(), &bytes)
    }

    /// Read whether the button is currently held down.
    pub fn read_button_status(&mut self) -> Result<bool, Error<I2C>> {
        // 0 is pressed
        Ok(self.bus.read_u8(Register::Button.into())? == 0)
    }

    /// The button state as of the last [`update`][PeriodicMeasurement::update].
    pub fn button(&self) -> &ButtonEdgeState {
        &self.button
    }

    pub fn is_pressed(&self) -> bool {
        self.button.is_pressed()
    }

    pub fn was_pressed(&self) -> bool {
        self.button.was_pressed()
    }

    pub fn was_released(&self) -> bool {
        self.button.was_released()
    }

    /// Persist the current settings to the unit's flash.
    pub fn write_config_to_flash(&mut self) -> Result<(), Error<I2C>> {
        self.bus.write_u8(Register::SaveConfig.into(), 1)
    }

    /// Read the temperature of the unit's microcontroller.
    pub fn read_chip_temperature(&mut self) -> Result<Measurement, Error<I2C>> {
        read_temperature(&mut self.bus, Register::ChipTemperature)
    }

    pub fn read_firmware_version(&mut self) -> Result<u8, Error<I2C>> {
        self.bus.read_u8(Register::FirmwareVersion.into())
    }

    pub fn read_address(&mut self) -> Result<u8, Error<I2C>> {
        self.bus.read_u8(Register::Address.into())
    }

    /// Move the unit to a new address.
    ///
    /// This waits up to a second for the unit to answer at the new address, returning
    /// [`LibraryError::Timeout`] if it doesn't. The driver uses the new address either way.
    pub fn change_address(&mut self, address: u8) -> Result<(), Error<I2C>> {
        if !is_valid_address(address) {
            return Err(LibraryError::InvalidAddress(address).into());
        }
        self.bus.write_u8(Register::Address.into(), address)?;
        let previous = self.bus.address();
        self.bus.change_address(address)?;
        let answered = poll_until(&mut self.timer, ADDRESS_CHANGE_TIMEOUT_MS, 1, || {
            Ok::<_, Error<I2C>>(matches!(
                self.bus.read_u8(Register::Address.into()),
                Ok(stored) if stored == address
            ))
        })?;
        if !answered {
            warn!("no answer at {:#04x} after changing address", address);
            return Err(LibraryError::Timeout.into());
        }
        debug!("moved from {:#04x} to {:#04x}", previous, address);
        Ok(())
    }
}

impl<I2C, T> PeriodicMeasurement for Ncir2<I2C, T>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
    T: Clock + DelayMs<u32>,
{
    type Sample = Measurement;
    type Error = Error<I2C>;

    fn controller(&self) -> &PeriodicController<Measurement> {
        &self.periodic
    }

    fn controller_mut(&mut self) -> &mut PeriodicController<Measurement> {
        &mut self.periodic
    }

    /// Take a measurement if one is due, then poll the button if it is due.
    ///
    /// The button is polled even when periodic measurement is stopped, or when the measurement
    /// failed. The measurement error is returned first.
    fn update(&mut self, force: bool) -> Result<(), Error<I2C>> {
        let now = self.timer.now_ms();
        let measured = self.periodic.poll(now, force, || {
            read_temperature(&mut self.bus, Register::Temperature).map(Some)
        });
        let button = if self.button.is_due(now, force) {
            self.bus
                .read_u8(Register::Button.into())
                .map(|status| self.button.record(now, status == 0))
        } else {
            Ok(())
        };
        measured?;
        button
    }

    fn stop_periodic_measurement(&mut self) -> Result<(), Error<I2C>> {
        // The unit measures continuously, there's nothing to tell it.
        self.periodic.stop()?;
        Ok(())
    }
}

fn read_temperature<I2C>(
    bus: &mut RegisterBus<I2C>,
    register: Register,
) -> Result<Measurement, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    let measurement = Measurement::from_raw(bus.read_array(register.into())?);
    trace!("read {} from {:?}", measurement.value(), register);
    Ok(measurement)
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;

    use crate::test::{I2cOperation, MockRegisterBus, MockTimer};
    use crate::{AlarmLevel, LibraryError, PeriodicMeasurement, Rgb};

    use super::*;

    fn mock_unit() -> MockRegisterBus {
        let mocked = MockRegisterBus::new(DEFAULT_ADDRESS).with_address_register(0xFF);
        // 25.37°C
        mocked.set_registers(0x00, &[0xE9, 0x09]);
        mocked.set_registers(0x10, &[0xFF, 0xFF]);
        // Not pressed
        mocked.set_registers(0x70, &[1]);
        // 41.5°C
        mocked.set_registers(0x90, &[0x36, 0x10]);
        mocked.set_registers(0xFE, &[0x03, DEFAULT_ADDRESS]);
        mocked
    }

    fn driver(
        mocked: &MockRegisterBus,
        timer: &MockTimer,
        config: Config,
    ) -> Ncir2<MockRegisterBus, MockTimer> {
        let mut driver = Ncir2::new(mocked.clone(), DEFAULT_ADDRESS, timer.clone(), config);
        driver.begin().unwrap();
        mocked.clear_recent_operations();
        driver
    }

    fn stopped_config() -> Config {
        Config {
            start_periodic: false,
            ..Config::default()
        }
    }

    #[test]
    fn measurement_decoding() {
        let measurement = Measurement::from_raw([0xE9, 0x09]);
        assert_eq!(measurement.value(), 2537);
        assert_approx_eq!(f32, measurement.celsius(), 25.37);
        assert_approx_eq!(f32, measurement.fahrenheit(), 77.666, epsilon = 0.001);
        let negative = Measurement::from_raw([0x0C, 0xFE]);
        assert_approx_eq!(f32, negative.celsius(), -5.0);
        assert_approx_eq!(f32, Measurement::default().celsius(), -327.68);
    }

    #[test]
    fn begin_not_detected() {
        let mocked = mock_unit();
        mocked.set_registers(0xFE, &[0]);
        let mut driver = Ncir2::new(mocked, DEFAULT_ADDRESS, MockTimer::new(), Config::default());
        let err = driver.begin().unwrap_err();
        assert!(matches!(
            err.library_error(),
            Some(LibraryError::NotDetected(_))
        ));
        assert!(!driver.in_periodic());
    }

    #[test]
    fn periodic_measurement() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let config = Config {
            stored_size: NonZeroUsize::new(4).unwrap(),
            ..Config::default()
        };
        let mut driver = driver(&mocked, &timer, config);
        assert!(driver.in_periodic());
        assert_eq!(driver.interval_ms(), 250);
        assert!(driver.celsius().is_nan());
        for tick in 0..=10 {
            timer.set(tick * 50);
            driver.update(false).unwrap();
            assert_eq!(driver.updated(), tick == 5 || tick == 10, "tick {}", tick);
        }
        assert_eq!(driver.available(), 2);
        assert_approx_eq!(f32, driver.celsius(), 25.37);
        driver.stop_periodic_measurement().unwrap();
        assert_eq!(mocked.write_count(), 0);
        assert_eq!(
            driver.stop_periodic_measurement().unwrap_err().library_error(),
            Some(&LibraryError::NotRunning)
        );
    }

    #[test]
    fn restart_with_current_interval() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, stopped_config());
        driver.start_periodic_measurement(1000).unwrap();
        assert_eq!(
            driver
                .start_periodic_measurement(10)
                .unwrap_err()
                .library_error(),
            Some(&LibraryError::Busy)
        );
        driver.stop_periodic_measurement().unwrap();
        driver.start_periodic_measurement_with_current().unwrap();
        assert_eq!(driver.interval_ms(), 1000);
    }

    #[test]
    fn singleshot() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, stopped_config());
        let measurement = driver.measure_singleshot().unwrap();
        assert_eq!(measurement.value(), 2537);
        assert!(driver.is_empty());
        driver.start_periodic_measurement(100).unwrap();
        let err = driver.measure_singleshot().unwrap_err();
        assert_eq!(err.library_error(), Some(&LibraryError::Busy));
        assert!(driver.is_empty());
    }

    #[test]
    fn button_edges() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, stopped_config());
        driver.update(false).unwrap();
        assert!(!driver.is_pressed());
        mocked.set_registers(0x70, &[0]);
        // Too soon for the button
        timer.set(10);
        driver.update(false).unwrap();
        assert!(!driver.is_pressed());
        timer.set(20);
        driver.update(false).unwrap();
        assert!(driver.is_pressed());
        assert!(driver.was_pressed());
        timer.set(40);
        driver.update(false).unwrap();
        assert!(!driver.was_pressed());
        mocked.set_registers(0x70, &[1]);
        driver.update(true).unwrap();
        assert!(driver.was_released());
        assert!(driver.read_button_status().map(|pressed| !pressed).unwrap());
    }

    #[test]
    fn emissivity() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, stopped_config());
        assert_approx_eq!(f32, driver.read_emissivity().unwrap(), 1.0);
        assert!(driver.write_emissivity(0.05).is_err());
        assert_eq!(mocked.write_count(), 0);
        driver.write_emissivity(0.1).unwrap();
        assert_eq!(mocked.registers(0x10, 2), 6554u16.to_le_bytes());
        assert_eq!(driver.read_emissivity_raw().unwrap(), 6554);
    }

    #[test]
    fn alarm_temperature() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, stopped_config());
        driver
            .write_alarm_temperature(AlarmLevel::Low, -12.34)
            .unwrap();
        driver
            .write_alarm_temperature(AlarmLevel::High, 100.0)
            .unwrap();
        assert_eq!(mocked.registers(0x20, 4), [0x2E, 0xFB, 0x10, 0x27]);
        assert_eq!(
            driver.read_alarm_temperature_raw(AlarmLevel::Low).unwrap(),
            -1234
        );
        assert_approx_eq!(
            f32,
            driver.read_alarm_temperature(AlarmLevel::High).unwrap(),
            100.0
        );
        mocked.clear_recent_operations();
        let err = driver
            .write_alarm_temperature(AlarmLevel::High, 400.0)
            .unwrap_err();
        assert!(matches!(
            err.library_error(),
            Some(LibraryError::OutOfRange(_))
        ));
        assert_eq!(mocked.write_count(), 0);
    }

    #[test]
    fn alarm_led() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, stopped_config());
        driver
            .write_alarm_led(AlarmLevel::High, Rgb::new(0xFF, 0x80, 0x00))
            .unwrap();
        assert_eq!(mocked.registers(0x33, 3), [0xFF, 0x80, 0x00]);
        assert_eq!(
            driver.read_alarm_led(AlarmLevel::High).unwrap(),
            Rgb::from(0xFF8000)
        );
        assert_eq!(driver.read_alarm_led(AlarmLevel::Low).unwrap(), Rgb::OFF);
    }

    #[test]
    fn alarm_buzzer() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, stopped_config());
        driver
            .write_alarm_buzzer(AlarmLevel::High, 4000, 500, 0.5)
            .unwrap();
        assert_eq!(
            mocked.registers(0x45, 5),
            [0xA0, 0x0F, 0xF4, 0x01, 127]
        );
        let buzzer = driver.read_alarm_buzzer(AlarmLevel::High).unwrap();
        assert_eq!(buzzer.frequency, 4000);
        assert_eq!(buzzer.interval_ms, 500);
        assert_approx_eq!(f32, buzzer.duty(), 0.5);
        mocked.clear_recent_operations();
        for interval_ms in [0, 5001] {
            let err = driver
                .write_alarm_buzzer(AlarmLevel::Low, 4000, interval_ms, 0.5)
                .unwrap_err();
            assert!(matches!(
                err.library_error(),
                Some(LibraryError::OutOfRange(_))
            ));
        }
        assert!(driver
            .write_alarm_buzzer(AlarmLevel::Low, 4000, 100, 1.5)
            .is_err());
        assert_eq!(mocked.write_count(), 0);
    }

    #[test]
    fn buzzer() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, stopped_config());
        driver.write_buzzer(2000, 1.0).unwrap();
        assert_eq!(mocked.registers(0x50, 3), [0xD0, 0x07, 0xFF]);
        let buzzer = driver.read_buzzer().unwrap();
        assert_eq!(buzzer.frequency, 2000);
        assert_approx_eq!(f32, buzzer.duty(), 1.0);
        assert!(!driver.read_buzzer_enabled().unwrap());
        driver.write_buzzer_enabled(true).unwrap();
        assert_eq!(mocked.registers(0x53, 1), [1]);
        assert!(driver.read_buzzer_enabled().unwrap());
    }

    #[test]
    fn led_and_flash() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, stopped_config());
        driver.write_led(Rgb::new(1, 2, 3)).unwrap();
        assert_eq!(driver.read_led().unwrap(), Rgb::new(1, 2, 3));
        driver.write_config_to_flash().unwrap();
        assert_eq!(
            mocked.recent_operations()[0],
            I2cOperation::Write {
                register: 0x80,
                length: 1
            }
        );
        assert_eq!(mocked.registers(0x80, 1), [1]);
    }

    #[test]
    fn chip_temperature_and_firmware() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, stopped_config());
        assert_approx_eq!(
            f32,
            driver.read_chip_temperature().unwrap().celsius(),
            41.5
        );
        assert_eq!(driver.read_firmware_version().unwrap(), 3);
    }

    #[test]
    fn change_address() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, stopped_config());
        assert_eq!(driver.read_address().unwrap(), DEFAULT_ADDRESS);
        let err = driver.change_address(0x04).unwrap_err();
        assert_eq!(err.library_error(), Some(&LibraryError::InvalidAddress(0x04)));
        driver.change_address(0x40).unwrap();
        assert_eq!(mocked.i2c_address(), 0x40);
        assert_eq!(driver.address(), 0x40);
        assert_eq!(driver.read_address().unwrap(), 0x40);
    }

    #[test]
    fn change_address_timeout() {
        let mocked = MockRegisterBus::new(DEFAULT_ADDRESS);
        mocked.set_registers(0xFE, &[1]);
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, stopped_config());
        let err = driver.change_address(0x40).unwrap_err();
        assert_eq!(err.library_error(), Some(&LibraryError::Timeout));
        assert!(timer.now() >= 1000);
    }

    #[test]
    fn button_polled_when_measurement_fails() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, Config::default());
        mocked.set_failing_register(Some(0x00));
        mocked.set_registers(0x70, &[0]);
        assert!(matches!(
            driver.update(true),
            Err(Error::I2cWriteReadError(_))
        ));
        assert!(!driver.updated());
        assert!(driver.is_pressed());
        assert!(driver.was_pressed());
        mocked.set_failing_register(None);
        timer.set(20);
        driver.update(true).unwrap();
        assert!(driver.updated());
        assert!(!driver.was_pressed());
    }

    #[test]
    fn bus_failure() {
        let mocked = mock_unit();
        let timer = MockTimer::new();
        let mut driver = driver(&mocked, &timer, Config::default());
        mocked.set_failing(true);
        assert!(matches!(
            driver.update(true),
            Err(Error::I2cWriteReadError(_))
        ));
        assert!(!driver.updated());
        assert!(driver.in_periodic());
        mocked.set_failing(false);
        driver.update(true).unwrap();
        assert!(driver.updated());
    }
}
