// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! Driver for the Thermal2 thermal camera unit.
//!
//! The Thermal2 pairs an MLX90640 with a microcontroller that does all of the calibration work.
//! What comes out over I²C is already in (scaled) degrees Celsius: one subpage of pixels at a time,
//! along with a summary of the temperatures within a configurable monitoring area. Like the NCIR2,
//! it also has a button, an RGB LED and a buzzer that the alarms can drive.
//!
//! Each frame only covers one [subpage][Subpage], so a full image takes two frames.
use core::num::NonZeroUsize;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;
use log::{debug, trace, warn};

use crate::bus::{is_valid_address, RegisterBus};
use crate::button::ButtonEdgeState;
use crate::clock::{poll_until, Clock};
use crate::codec::{celsius_to_thermal, thermal_to_celsius};
use crate::common::{AlarmLevel, Rgb};
use crate::error::{Error, LibraryError};
use crate::periodic::{PeriodicController, PeriodicMeasurement};

mod frame;
mod register;

pub use frame::{Frame, Position, Subpage, FRAME_LENGTH, HEIGHT, SUBPAGE_PIXELS, WIDTH};
pub use register::{AlarmFlags, ButtonStatus, FunctionControl, RefreshRate};

use register::Register;

pub const DEFAULT_ADDRESS: u8 = 0x32;

/// The value of the device ID register.
const DEVICE_ID: u16 = 0x9064;

/// How long to wait for the unit to answer at a new address.
const ADDRESS_CHANGE_TIMEOUT_MS: u32 = 1000;

/// The alarm blocks are this far apart.
const ALARM_STRIDE: u8 = 0x10;

/// The shortest alarm buzzer interval, in units of 10ms.
const MIN_ALARM_INTERVAL: u8 = 5;

const MAX_MONITOR_WIDTH: u8 = 15;
const MAX_MONITOR_HEIGHT: u8 = 11;
const MAX_NOISE_FILTER: u8 = 15;

/// Wait at least this long for a pair of frames in [`Thermal2::measure_singleshot`].
const MIN_SINGLESHOT_TIMEOUT_MS: u32 = 2500;

impl Register {
    fn at(self, level: AlarmLevel) -> u8 {
        level.register(self.into(), ALARM_STRIDE)
    }
}

/// Whether a new frame is available, and which subpage it is.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DataStatus {
    pub ready: bool,
    pub subpage: Subpage,
}

impl From<[u8; 2]> for DataStatus {
    fn from(raw: [u8; 2]) -> Self {
        Self {
            ready: raw[0] != 0,
            subpage: Subpage::from(raw[1]),
        }
    }
}

/// How the buzzer sounds for an alarm.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AlarmBuzzer {
    /// Tone frequency in Hz.
    pub frequency: u16,
    /// Time between beeps, in units of 10ms.
    pub interval: u8,
}

impl AlarmBuzzer {
    pub fn interval_ms(&self) -> u32 {
        u32::from(self.interval) * 10
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Buzzer {
    pub frequency: u16,
    /// 128 is the loudest, getting quieter the further away from 128.
    pub duty: u8,
}

/// Settings applied by [`begin`][Thermal2::begin].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    pub start_periodic: bool,
    pub refresh_rate: RefreshRate,
    /// Width of the monitoring area (0 to 15).
    pub monitor_width: u8,
    /// Height of the monitoring area (0 to 11).
    pub monitor_height: u8,
    /// Written to the unit as-is, except for [`FunctionControl::AUTO_REFRESH`] which follows
    /// periodic measurement.
    pub function_control: FunctionControl,
    /// How often the button is polled, in ms.
    pub button_interval_ms: u32,
    pub stored_size: NonZeroUsize,
    /// The longest single read used for frame data.
    ///
    /// Many I²C controllers can only read small blocks at a time. Arduino's Wire library has a 32
    /// byte buffer for example.
    pub read_batch_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_periodic: true,
            refresh_rate: RefreshRate::default(),
            monitor_width: MAX_MONITOR_WIDTH,
            monitor_height: MAX_MONITOR_HEIGHT,
            function_control: FunctionControl::LED,
            button_interval_ms: 20,
            stored_size: NonZeroUsize::MIN,
            read_batch_length: 32,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Thermal2<I2C, T> {
    bus: RegisterBus<I2C>,
    timer: T,
    config: Config,
    periodic: PeriodicController<Frame>,
    button: ButtonEdgeState,
    button_status: ButtonStatus,
}

impl<I2C, T> Thermal2<I2C, T>
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
            button_status: ButtonStatus::empty(),
        }
    }

    /// Detect the unit, apply the settings from the [`Config`] and (optionally) start periodic
    /// measurement.
    pub fn begin(&mut self) -> Result<(), Error<I2C>> {
        self.periodic.resize(self.config.stored_size)?;
        let id = self.bus.read_u16_be(Register::DeviceId.into())?;
        if id != DEVICE_ID {
            return Err(LibraryError::NotDetected("Unexpected device ID").into());
        }
        let firmware = self.read_firmware_version()?;
        if firmware == 0 {
            return Err(LibraryError::NotDetected("Firmware version is 0").into());
        }
        debug!(
            "found Thermal2 at {:#04x}, firmware {:#06x}",
            self.bus.address(),
            firmware
        );
        self.button.set_interval_ms(self.config.button_interval_ms);
        // Have the unit latch button events until they're read
        self.bus.write_u8(Register::ButtonStatus.into(), 1)?;
        self.write_function_control(self.config.function_control)?;
        self.write_buzzer(0, 0)?;
        self.write_led(Rgb::OFF)?;
        self.write_monitor_size(self.config.monitor_width, self.config.monitor_height)?;
        if self.config.start_periodic {
            self.start_periodic_measurement(self.config.refresh_rate)?;
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

    /// Turn on auto refresh at `rate`, and start collecting frames.
    pub fn start_periodic_measurement(&mut self, rate: RefreshRate) -> Result<(), Error<I2C>> {
        self.periodic.ensure_stopped()?;
        self.update_function_control(FunctionControl::AUTO_REFRESH, true)?;
        self.write_refresh_rate(rate)?;
        let now = self.timer.now_ms();
        self.periodic.start(now, rate.interval_ms())?;
        self.config.refresh_rate = rate;
        Ok(())
    }

    /// Start periodic measurement at the refresh rate the unit is currently using.
    pub fn start_periodic_measurement_with_current(&mut self) -> Result<(), Error<I2C>> {
        let rate = self.read_refresh_rate()?;
        self.start_periodic_measurement(rate)
    }

    /// Capture both subpages.
    ///
    /// The frames are returned in subpage order. This can take a while at the slower refresh
    /// rates: each subpage takes one refresh interval, and the wait is capped at twice the time
    /// for two frames (but at least 5 seconds), after which [`LibraryError::Timeout`] is
    /// returned.
    pub fn measure_singleshot(&mut self) -> Result<[Frame; 2], Error<I2C>> {
        self.periodic.ensure_stopped()?;
        let period = self.read_refresh_rate()?.interval_ms();
        let timeout = 2 * (2 * period).max(MIN_SINGLESHOT_TIMEOUT_MS);
        let deadline = self.timer.now_ms() + u64::from(timeout);
        let batch_length = self.config.read_batch_length;
        let mut zero = None;
        let mut one = None;
        self.request_data()?;
        self.timer.delay_ms(period);
        loop {
            if let Some(frame) = read_ready_frame(&mut self.bus, batch_length)? {
                match frame.subpage() {
                    Subpage::Zero => zero = Some(frame),
                    Subpage::One => one = Some(frame),
                }
                if zero.is_some() && one.is_some() {
                    break;
                }
                self.request_data()?;
                self.timer.delay_ms(period);
            } else {
                self.timer.delay_ms(1);
            }
            if self.timer.now_ms() >= deadline {
                break;
            }
        }
        match (zero, one) {
            (Some(zero), Some(one)) => Ok([zero, one]),
            _ => {
                warn!("timed out waiting for both subpages");
                Err(LibraryError::Timeout.into())
            }
        }
    }

    /// Ask the unit to capture a new frame.
    pub fn request_data(&mut self) -> Result<(), Error<I2C>> {
        self.bus.write_u8(Register::DataStatus.into(), 0)
    }

    pub fn read_data_status(&mut self) -> Result<DataStatus, Error<I2C>> {
        Ok(self.bus.read_array::<2>(Register::DataStatus.into())?.into())
    }

    /// Read the frame data as it is right now, labeled as `subpage`.
    pub fn read_data(&mut self, subpage: Subpage) -> Result<Frame, Error<I2C>> {
        read_frame(&mut self.bus, subpage, self.config.read_batch_length)
    }

    pub fn read_function_control(&mut self) -> Result<FunctionControl, Error<I2C>> {
        let raw = self.bus.read_u8(Register::FunctionControl.into())?;
        Ok(FunctionControl::from_bits_truncate(raw))
    }

    /// Replace all of the function control flags. Only allowed while stopped.
    pub fn write_function_control(&mut self, flags: FunctionControl) -> Result<(), Error<I2C>> {
        self.periodic.ensure_stopped()?;
        self.bus
            .write_u8(Register::FunctionControl.into(), flags.bits())
    }

    fn update_function_control(
        &mut self,
        flag: FunctionControl,
        enabled: bool,
    ) -> Result<(), Error<I2C>> {
        let mut flags = self.read_function_control()?;
        flags.set(flag, enabled);
        self.bus
            .write_u8(Register::FunctionControl.into(), flags.bits())
    }

    pub fn read_buzzer_enabled(&mut self) -> Result<bool, Error<I2C>> {
        Ok(self
            .read_function_control()?
            .contains(FunctionControl::BUZZER))
    }

    /// Let the alarms sound the buzzer.
    pub fn write_buzzer_enabled(&mut self, enabled: bool) -> Result<(), Error<I2C>> {
        self.update_function_control(FunctionControl::BUZZER, enabled)
    }

    pub fn read_led_enabled(&mut self) -> Result<bool, Error<I2C>> {
        Ok(self.read_function_control()?.contains(FunctionControl::LED))
    }

    /// Let the alarms light the LED.
    pub fn write_led_enabled(&mut self, enabled: bool) -> Result<(), Error<I2C>> {
        self.update_function_control(FunctionControl::LED, enabled)
    }

    pub fn read_refresh_rate(&mut self) -> Result<RefreshRate, Error<I2C>> {
        let raw = self.bus.read_u8(Register::RefreshRate.into())?;
        Ok(RefreshRate::from_raw(raw)?)
    }

    /// Only allowed while stopped, use
    /// [`start_periodic_measurement`][Thermal2::start_periodic_measurement] to change the rate of
    /// a running measurement.
    pub fn write_refresh_rate(&mut self, rate: RefreshRate) -> Result<(), Error<I2C>> {
        self.periodic.ensure_stopped()?;
        self.bus.write_u8(Register::RefreshRate.into(), rate.into())
    }

    pub fn read_noise_filter_level(&mut self) -> Result<u8, Error<I2C>> {
        self.bus.read_u8(Register::NoiseFilter.into())
    }

    /// Set the noise filter level, from 0 (off) to 15.
    pub fn write_noise_filter_level(&mut self, level: u8) -> Result<(), Error<I2C>> {
        if level > MAX_NOISE_FILTER {
            return Err(LibraryError::OutOfRange("Noise filter level must be at most 15").into());
        }
        self.bus.write_u8(Register::NoiseFilter.into(), level)
    }

    /// Read the size of the monitoring area as `(width, height)`.
    pub fn read_monitor_size(&mut self) -> Result<(u8, u8), Error<I2C>> {
        let raw = self.bus.read_u8(Register::MonitorSize.into())?;
        Ok((raw & 0x0F, raw >> 4))
    }

    /// Set the size of the area the summary temperatures are computed over.
    pub fn write_monitor_size(&mut self, width: u8, height: u8) -> Result<(), Error<I2C>> {
        if width > MAX_MONITOR_WIDTH || height > MAX_MONITOR_HEIGHT {
            return Err(LibraryError::OutOfRange(
                "Monitor width must be at most 15, and height at most 11",
            )
            .into());
        }
        self.bus
            .write_u8(Register::MonitorSize.into(), (height << 4) | width)
    }

    pub fn read_alarm_enabled(&mut self) -> Result<AlarmFlags, Error<I2C>> {
        let raw = self.bus.read_u8(Register::AlarmEnable.into())?;
        Ok(AlarmFlags::from_bits_truncate(raw))
    }

    pub fn write_alarm_enabled(&mut self, alarms: AlarmFlags) -> Result<(), Error<I2C>> {
        self.bus.write_u8(Register::AlarmEnable.into(), alarms.bits())
    }

    /// Which alarms are currently triggered.
    pub fn read_alarm_status(&mut self) -> Result<AlarmFlags, Error<I2C>> {
        let raw = self.bus.read_u8(Register::AlarmStatus.into())?;
        Ok(AlarmFlags::from_bits_truncate(raw))
    }

    pub fn read_alarm_temperature_raw(&mut self, level: AlarmLevel) -> Result<u16, Error<I2C>> {
        self.bus.read_u16_le(Register::AlarmThreshold.at(level))
    }

    pub fn read_alarm_temperature(&mut self, level: AlarmLevel) -> Result<f32, Error<I2C>> {
        Ok(thermal_to_celsius(self.read_alarm_temperature_raw(level)?))
    }

    pub fn write_alarm_temperature_raw(
        &mut self,
        level: AlarmLevel,
        threshold: u16,
    ) -> Result<(), Error<I2C>> {
        self.bus
            .write_u16_le(Register::AlarmThreshold.at(level), threshold)
    }

    /// Set an alarm threshold. Temperatures outside of -64°C to 448°C are clamped.
    pub fn write_alarm_temperature(
        &mut self,
        level: AlarmLevel,
        celsius: f32,
    ) -> Result<(), Error<I2C>> {
        self.write_alarm_temperature_raw(level, celsius_to_thermal(celsius))
    }

    pub fn read_alarm_buzzer(&mut self, level: AlarmLevel) -> Result<AlarmBuzzer, Error<I2C>> {
        let [low, high, interval] = self
            .bus
            .read_array::<3>(Register::AlarmBuzzerFrequency.at(level))?;
        Ok(AlarmBuzzer {
            frequency: u16::from_le_bytes([low, high]),
            interval,
        })
    }

    /// Configure an alarm's buzzer. The interval has to be at least 5 (50ms).
    pub fn write_alarm_buzzer(
        &mut self,
        level: AlarmLevel,
        buzzer: AlarmBuzzer,
    ) -> Result<(), Error<I2C>> {
        if buzzer.interval < MIN_ALARM_INTERVAL {
            return Err(LibraryError::OutOfRange(
                "Alarm buzzer interval must be between 5 and 255",
            )
            .into());
        }
        let [low, high] = buzzer.frequency.to_le_bytes();
        self.bus.write(
            Register::AlarmBuzzerFrequency.at(level),
            &[low, high, buzzer.interval],
        )
    }

    pub fn read_alarm_led(&mut self, level: AlarmLevel) -> Result<Rgb, Error<I2C>> {
        Ok(self.bus.read_array::<3>(Register::AlarmLed.at(level))?.into())
    }

    pub fn write_alarm_led(&mut self, level: AlarmLevel, color: Rgb) -> Result<(), Error<I2C>> {
        let bytes: [u8; 3] = color.into();
        self.bus.write(Register::AlarmLed.at(level), &bytes)
    }

    pub fn read_buzzer(&mut self) -> Result<Buzzer, Error<I2C>> {
        let [low, high, duty] = self.bus.read_array::<3>(Register::BuzzerFrequency.into())?;
        Ok(Buzzer {
            frequency: u16::from_le_bytes([low, high]),
            duty,
        })
    }

    pub fn write_buzzer(&mut self, frequency: u16, duty: u8) -> Result<(), Error<I2C>> {
        let [low, high] = frequency.to_le_bytes();
        self.bus
            .write(Register::BuzzerFrequency.into(), &[low, high, duty])
    }

    pub fn write_buzzer_duty(&mut self, duty: u8) -> Result<(), Error<I2C>> {
        self.bus.write_u8(Register::BuzzerDuty.into(), duty)
    }

    pub fn read_led(&mut self) -> Result<Rgb, Error<I2C>> {
        Ok(self.bus.read_array::<3>(Register::Led.into())?.into())
    }

    pub fn write_led(&mut self, color: Rgb) -> Result<(), Error<I2C>> {
        let bytes: [u8; 3] = color.into();
        self.bus.write(Register::Led.into(), &bytes)
    }

    /// Read the latched button events, clearing them on the unit.
    pub fn read_button_status(&mut self) -> Result<ButtonStatus, Error<I2C>> {
        read_button_status(&mut self.bus)
    }

    /// The button events from the last poll in [`update`][PeriodicMeasurement::update].
    pub fn button_status(&self) -> ButtonStatus {
        self.button_status
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

    pub fn is_holding(&self) -> bool {
        self.button.is_holding()
    }

    pub fn read_firmware_version(&mut self) -> Result<u16, Error<I2C>> {
        self.bus.read_u16_be(Register::FirmwareVersion.into())
    }

    /// Read the address the unit is configured for.
    ///
    /// The unit stores the address alongside its complement, a mismatch is reported as
    /// [`LibraryError::InvalidData`].
    pub fn read_address(&mut self) -> Result<u8, Error<I2C>> {
        read_address(&mut self.bus)
    }

    /// Move the unit to a new address.
    ///
    /// This waits up to a second for the unit to answer at the new address, returning
    /// [`LibraryError::Timeout`] if it doesn't. The driver uses the new address either way.
    pub fn change_address(&mut self, address: u8) -> Result<(), Error<I2C>> {
        if !is_valid_address(address) {
            return Err(LibraryError::InvalidAddress(address).into());
        }
        self.bus.write(Register::Address.into(), &[address, !address])?;
        let previous = self.bus.address();
        self.bus.change_address(address)?;
        let answered = poll_until(&mut self.timer, ADDRESS_CHANGE_TIMEOUT_MS, 1, || {
            Ok::<_, Error<I2C>>(matches!(read_address(&mut self.bus), Ok(stored) if stored == address))
        })?;
        if !answered {
            warn!("no answer at {:#04x} after changing address", address);
            return Err(LibraryError::Timeout.into());
        }
        debug!("moved from {:#04x} to {:#04x}", previous, address);
        Ok(())
    }
}

impl<I2C, T> PeriodicMeasurement for Thermal2<I2C, T>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
    T: Clock + DelayMs<u32>,
{
    type Sample = Frame;
    type Error = Error<I2C>;

    fn controller(&self) -> &PeriodicController<Frame> {
        &self.periodic
    }

    fn controller_mut(&mut self) -> &mut PeriodicController<Frame> {
        &mut self.periodic
    }

    /// Read a frame if one is due and the unit has one ready, then poll the button if it is due.
    ///
    /// The button is polled even when periodic measurement is stopped, or when reading the frame
    /// failed. The frame error is returned first.
    fn update(&mut self, force: bool) -> Result<(), Error<I2C>> {
        let now = self.timer.now_ms();
        let batch_length = self.config.read_batch_length;
        let measured = self
            .periodic
            .poll(now, force, || read_ready_frame(&mut self.bus, batch_length));
        let button = if self.button.is_due(now, force) {
            read_button_status(&mut self.bus).map(|status| {
                self.button.record(now, status.contains(ButtonStatus::PRESSED));
                if status.contains(ButtonStatus::WAS_HELD) {
                    self.button.set_holding();
                }
                self.button_status = status;
            })
        } else {
            Ok(())
        };
        measured?;
        button
    }

    /// Stop collecting frames and turn off auto refresh.
    fn stop_periodic_measurement(&mut self) -> Result<(), Error<I2C>> {
        self.periodic.stop()?;
        self.update_function_control(FunctionControl::AUTO_REFRESH, false)
    }
}

/// Read a frame if the unit says one is ready.
fn read_ready_frame<I2C>(
    bus: &mut RegisterBus<I2C>,
    batch_length: usize,
) -> Result<Option<Frame>, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    let status = DataStatus::from(bus.read_array::<2>(Register::DataStatus.into())?);
    if !status.ready {
        return Ok(None);
    }
    read_frame(bus, status.subpage, batch_length).map(Some)
}

fn read_frame<I2C>(
    bus: &mut RegisterBus<I2C>,
    subpage: Subpage,
    batch_length: usize,
) -> Result<Frame, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    let mut buffer = [0u8; FRAME_LENGTH];
    bus.read_batched(Register::Data.into(), &mut buffer, batch_length)?;
    let frame = Frame::from_bytes(subpage, &buffer)?;
    trace!("read {:?}", frame);
    Ok(frame)
}

fn read_button_status<I2C>(bus: &mut RegisterBus<I2C>) -> Result<ButtonStatus, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    let raw = bus.read_u8(Register::ButtonStatus.into())?;
    bus.write_u8(Register::ButtonStatus.into(), raw)?;
    Ok(ButtonStatus::from_bits_truncate(raw))
}

fn read_address<I2C>(bus: &mut RegisterBus<I2C>) -> Result<u8, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write + i2c::Read,
{
    let [address, inverted] = bus.read_array::<2>(Register::Address.into())?;
    if address != !inverted {
        return Err(LibraryError::InvalidData("Address register is corrupt").into());
    }
    Ok(address)
}
