// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use bitvec::prelude::*;
use num_enum::IntoPrimitive;

use crate::util::{is_bit_set, with_bit};

/// SMBus commands understood by the MLX90614.
///
/// RAM is at `0x00..=0x1F`, EEPROM has bit 5 set.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum Command {
    RawIr1 = 0x04,
    RawIr2 = 0x05,
    Ambient = 0x06,
    Object1 = 0x07,
    Object2 = 0x08,
    ObjectMax = 0x20,
    ObjectMin = 0x21,
    PwmControl = 0x22,
    AmbientRange = 0x23,
    Emissivity = 0x24,
    Config = 0x25,
    Address = 0x2E,
    Id0 = 0x3C,
    Id1 = 0x3D,
    Id2 = 0x3E,
    Id3 = 0x3F,
    Flags = 0xF0,
    Sleep = 0xFF,
}

const EEPROM_FLAG: u8 = 0x20;

impl Command {
    pub fn is_eeprom(&self) -> bool {
        u8::from(*self) & 0xE0 == EEPROM_FLAG
    }
}

/// Infinite impulse response filter strength.
///
/// The percentage is how much of each new reading makes it into the output.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum Iir {
    Filter50,
    Filter25,
    Filter17,
    Filter13,
    Filter100,
    Filter80,
    Filter67,
    Filter57,
}

impl Iir {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Filter50,
            1 => Self::Filter25,
            2 => Self::Filter17,
            3 => Self::Filter13,
            4 => Self::Filter100,
            5 => Self::Filter80,
            6 => Self::Filter67,
            _ => Self::Filter57,
        }
    }
}

/// Finite impulse response filter length.
///
/// Lengths below 128 are not recommended by Melexis.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive)]
#[repr(u8)]
pub enum Fir {
    Filter8,
    Filter16,
    Filter32,
    Filter64,
    Filter128,
    Filter256,
    Filter512,
    Filter1024,
}

impl Fir {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Filter8,
            1 => Self::Filter16,
            2 => Self::Filter32,
            3 => Self::Filter64,
            4 => Self::Filter128,
            5 => Self::Filter256,
            6 => Self::Filter512,
            _ => Self::Filter1024,
        }
    }

    pub fn is_recommended(&self) -> bool {
        *self >= Self::Filter128
    }
}

/// Amplifier gain.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum Gain {
    /// Amplifier bypassed.
    Coefficient1,
    Coefficient3,
    Coefficient6,
    Coefficient12_5,
    Coefficient25,
    Coefficient50,
    Coefficient100,
}

impl Gain {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Coefficient1,
            1 => Self::Coefficient3,
            2 => Self::Coefficient6,
            3 => Self::Coefficient12_5,
            4 => Self::Coefficient25,
            5 => Self::Coefficient50,
            // Both 6 and 7 are a gain of 100
            _ => Self::Coefficient100,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum IrSensor {
    Single,
    Dual,
}

/// What the two PWM outputs carry, which also decides which RAM words hold valid data.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum Output {
    /// Ambient and object 1.
    AmbientObject1,
    /// Ambient and object 2.
    AmbientObject2,
    /// Object 2 only.
    Object2,
    /// Object 1 and object 2.
    Object1Object2,
}

impl Output {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::AmbientObject1,
            1 => Self::AmbientObject2,
            2 => Self::Object2,
            _ => Self::Object1Object2,
        }
    }

    /// The RAM words to read for this mode, in [ambient, object 1, object 2] order.
    pub(crate) fn commands(&self) -> [Option<Command>; 3] {
        match self {
            Self::AmbientObject1 => [Some(Command::Ambient), Some(Command::Object1), None],
            Self::AmbientObject2 => [Some(Command::Ambient), None, Some(Command::Object2)],
            Self::Object2 => [None, None, Some(Command::Object2)],
            Self::Object1Object2 => [None, Some(Command::Object1), Some(Command::Object2)],
        }
    }
}

const IIR_BITS: core::ops::Range<usize> = 0..3;
const OUTPUT_BITS: core::ops::Range<usize> = 4..6;
const IR_SENSOR_BIT: usize = 6;
const POSITIVE_KS_BIT: usize = 7;
const FIR_BITS: core::ops::Range<usize> = 8..11;
const GAIN_BITS: core::ops::Range<usize> = 11..14;
const POSITIVE_KF2_BIT: usize = 14;

/// The configuration register (EEPROM `0x25`).
///
/// Bits not covered by an accessor are factory calibration and are preserved as-is.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ConfigRegister(u16);

impl ConfigRegister {
    fn field(&self, bits: core::ops::Range<usize>) -> u8 {
        self.0.view_bits::<Lsb0>()[bits].load_le::<u8>()
    }

    fn set_field(&mut self, bits: core::ops::Range<usize>, value: u8) {
        self.0.view_bits_mut::<Lsb0>()[bits].store_le(value);
    }

    pub fn iir(&self) -> Iir {
        Iir::from_bits(self.field(IIR_BITS))
    }

    pub fn set_iir(&mut self, iir: Iir) {
        self.set_field(IIR_BITS, iir.into())
    }

    pub fn output(&self) -> Output {
        Output::from_bits(self.field(OUTPUT_BITS))
    }

    pub fn set_output(&mut self, output: Output) {
        self.set_field(OUTPUT_BITS, output.into())
    }

    pub fn ir_sensor(&self) -> IrSensor {
        if is_bit_set(self.0, IR_SENSOR_BIT) {
            IrSensor::Dual
        } else {
            IrSensor::Single
        }
    }

    pub fn set_ir_sensor(&mut self, ir_sensor: IrSensor) {
        self.0 = with_bit(self.0, IR_SENSOR_BIT, ir_sensor == IrSensor::Dual);
    }

    /// The sign of the Ks temperature coefficient.
    pub fn positive_ks(&self) -> bool {
        is_bit_set(self.0, POSITIVE_KS_BIT)
    }

    pub fn set_positive_ks(&mut self, positive: bool) {
        self.0 = with_bit(self.0, POSITIVE_KS_BIT, positive);
    }

    pub fn fir(&self) -> Fir {
        Fir::from_bits(self.field(FIR_BITS))
    }

    pub fn set_fir(&mut self, fir: Fir) {
        self.set_field(FIR_BITS, fir.into())
    }

    pub fn gain(&self) -> Gain {
        Gain::from_bits(self.field(GAIN_BITS))
    }

    pub fn set_gain(&mut self, gain: Gain) {
        self.set_field(GAIN_BITS, gain.into())
    }

    /// The sign of the Kf2 temperature coefficient.
    pub fn positive_kf2(&self) -> bool {
        is_bit_set(self.0, POSITIVE_KF2_BIT)
    }

    pub fn set_positive_kf2(&mut self, positive: bool) {
        self.0 = with_bit(self.0, POSITIVE_KF2_BIT, positive);
    }
}

impl From<u16> for ConfigRegister {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<ConfigRegister> for u16 {
    fn from(register: ConfigRegister) -> Self {
        register.0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PwmMode {
    Extended,
    Single,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PwmPin {
    OpenDrain,
    PushPull,
}

/// The PWM control register (EEPROM `0x22`).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PwmControl(u16);

impl PwmControl {
    pub fn mode(&self) -> PwmMode {
        if is_bit_set(self.0, 0) {
            PwmMode::Single
        } else {
            PwmMode::Extended
        }
    }

    pub fn set_mode(&mut self, mode: PwmMode) {
        self.0 = with_bit(self.0, 0, mode == PwmMode::Single);
    }

    pub fn enabled(&self) -> bool {
        is_bit_set(self.0, 1)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.0 = with_bit(self.0, 1, enabled);
    }

    pub fn pin(&self) -> PwmPin {
        if is_bit_set(self.0, 2) {
            PwmPin::PushPull
        } else {
            PwmPin::OpenDrain
        }
    }

    pub fn set_pin(&mut self, pin: PwmPin) {
        self.0 = with_bit(self.0, 2, pin == PwmPin::PushPull);
    }

    pub fn thermal_relay(&self) -> bool {
        is_bit_set(self.0, 3)
    }

    pub fn set_thermal_relay(&mut self, thermal_relay: bool) {
        self.0 = with_bit(self.0, 3, thermal_relay);
    }

    pub fn repetition(&self) -> u8 {
        self.0.view_bits::<Lsb0>()[4..9].load_le::<u8>()
    }

    /// Values above 31 are truncated to 5 bits.
    pub fn set_repetition(&mut self, repetition: u8) {
        self.0.view_bits_mut::<Lsb0>()[4..9].store_le(repetition & 0x1F);
    }

    pub fn period_raw(&self) -> u8 {
        self.0.view_bits::<Lsb0>()[9..16].load_le::<u8>()
    }

    pub fn set_period_raw(&mut self, period: u8) {
        self.0.view_bits_mut::<Lsb0>()[9..16].store_le(period & 0x7F);
    }

    /// The PWM period in milliseconds.
    ///
    /// A raw period of 0 means 128, and extended mode doubles the period.
    pub fn period_ms(&self) -> f32 {
        let raw = match self.period_raw() {
            0 => 128,
            n => n,
        };
        let multiplier = match self.mode() {
            PwmMode::Single => 1.0,
            PwmMode::Extended => 2.0,
        };
        1.024 * multiplier * f32::from(raw)
    }
}

impl From<u16> for PwmControl {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<PwmControl> for u16 {
    fn from(register: PwmControl) -> Self {
        register.0
    }
}

/// The read-only flags register (`0xF0`).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Flags(u16);

impl Flags {
    /// An EEPROM write is still in progress.
    pub fn eeprom_busy(&self) -> bool {
        is_bit_set(self.0, 7)
    }

    /// The EEPROM double error flag is set.
    pub fn eeprom_dead(&self) -> bool {
        is_bit_set(self.0, 5)
    }

    /// The power-on initialization has finished.
    pub fn initialized(&self) -> bool {
        !is_bit_set(self.0, 4)
    }
}

impl From<u16> for Flags {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

pub type IntervalTable = [[u32; 4]; 8];

/// Settling times in ms for the A series, indexed by IIR then FIR - 4.
const INTERVALS_A: IntervalTable = [
    [300, 370, 540, 860],
    [700, 880, 1300, 2000],
    [1100, 1400, 2000, 3300],
    [1500, 1900, 2800, 4500],
    [40, 50, 60, 100],
    [120, 160, 220, 350],
    [240, 300, 430, 700],
    [260, 340, 480, 780],
];

/// Settling times in ms for the B and D series.
const INTERVALS_BD: IntervalTable = [
    [470, 600, 840, 1330],
    [1100, 1400, 2000, 3200],
    [1800, 2200, 3200, 5000],
    [2400, 3000, 4300, 7000],
    [60, 70, 100, 140],
    [200, 240, 340, 540],
    [380, 480, 670, 1100],
    [420, 530, 750, 1200],
];

/// The parts of the MLX90614 family that differ between models.
pub trait Variant {
    const NAME: &'static str;

    /// Whether the part has two thermopiles.
    const DUAL_SENSOR: bool;

    const INTERVALS: IntervalTable;

    /// How long the filters take to produce a new value.
    ///
    /// There is no data for the non-recommended FIR lengths, so those are 0.
    fn interval_ms(iir: Iir, fir: Fir) -> u32 {
        let fir_index = u8::from(fir) as usize;
        if fir_index < 4 {
            0
        } else {
            Self::INTERVALS[u8::from(iir) as usize][fir_index - 4]
        }
    }
}

/// The single sensor MLX90614 (A series).
#[derive(Clone, Copy, Debug)]
pub struct StandardVariant;

impl Variant for StandardVariant {
    const NAME: &'static str = "MLX90614";
    const DUAL_SENSOR: bool = false;
    const INTERVALS: IntervalTable = INTERVALS_A;
}

/// The dual sensor MLX90614BAA.
#[derive(Clone, Copy, Debug)]
pub struct DualVariant;

impl Variant for DualVariant {
    const NAME: &'static str = "MLX90614BAA";
    const DUAL_SENSOR: bool = true;
    const INTERVALS: IntervalTable = INTERVALS_BD;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_fields() {
        // IIR 100%, FIR 1024, gain 12.5, single sensor, Ta/To1
        let config = ConfigRegister::from(0x9F84);
        assert_eq!(config.iir(), Iir::Filter100);
        assert_eq!(config.output(), Output::AmbientObject1);
        assert_eq!(config.ir_sensor(), IrSensor::Single);
        assert!(config.positive_ks());
        assert_eq!(config.fir(), Fir::Filter1024);
        assert_eq!(config.gain(), Gain::Coefficient12_5);
        assert!(!config.positive_kf2());
    }

    #[test]
    fn config_setters_preserve_other_bits() {
        let mut config = ConfigRegister::from(0xFFFF);
        config.set_iir(Iir::Filter50);
        assert_eq!(u16::from(config), 0xFFF8);
        config.set_fir(Fir::Filter8);
        assert_eq!(u16::from(config), 0xF8F8);
        config.set_gain(Gain::Coefficient1);
        assert_eq!(u16::from(config), 0xC0F8);
        config.set_output(Output::AmbientObject1);
        assert_eq!(u16::from(config), 0xC0C8);
        config.set_ir_sensor(IrSensor::Single);
        config.set_positive_ks(false);
        config.set_positive_kf2(false);
        assert_eq!(u16::from(config), 0x8008);
    }

    #[test]
    fn gain_seven_is_100() {
        let config = ConfigRegister::from(0x07 << 11);
        assert_eq!(config.gain(), Gain::Coefficient100);
    }

    #[test]
    fn pwm_control() {
        let mut pwm = PwmControl::from(0x0201);
        assert_eq!(pwm.mode(), PwmMode::Single);
        assert!(!pwm.enabled());
        assert_eq!(pwm.pin(), PwmPin::OpenDrain);
        assert_eq!(pwm.period_raw(), 1);
        float_cmp::assert_approx_eq!(f32, pwm.period_ms(), 1.024);
        pwm.set_period_raw(0);
        pwm.set_mode(PwmMode::Extended);
        float_cmp::assert_approx_eq!(f32, pwm.period_ms(), 262.144);
        pwm.set_repetition(0xFF);
        assert_eq!(pwm.repetition(), 0x1F);
        pwm.set_enabled(true);
        pwm.set_pin(PwmPin::PushPull);
        pwm.set_thermal_relay(true);
        assert_eq!(u16::from(pwm), 0x01FE);
    }

    #[test]
    fn flags() {
        let flags = Flags::from(0x0080);
        assert!(flags.eeprom_busy());
        assert!(!flags.eeprom_dead());
        assert!(flags.initialized());
        assert!(!Flags::from(0x0010).initialized());
    }

    #[test]
    fn intervals() {
        assert_eq!(
            StandardVariant::interval_ms(Iir::Filter100, Fir::Filter1024),
            100
        );
        assert_eq!(DualVariant::interval_ms(Iir::Filter100, Fir::Filter1024), 140);
        assert_eq!(StandardVariant::interval_ms(Iir::Filter50, Fir::Filter128), 300);
        assert_eq!(DualVariant::interval_ms(Iir::Filter57, Fir::Filter512), 750);
        assert_eq!(StandardVariant::interval_ms(Iir::Filter13, Fir::Filter64), 0);
    }

    #[test]
    fn eeprom_commands() {
        assert!(Command::Emissivity.is_eeprom());
        assert!(Command::Id3.is_eeprom());
        assert!(!Command::Object1.is_eeprom());
        assert!(!Command::Flags.is_eeprom());
        assert!(!Command::Sleep.is_eeprom());
    }

    #[test]
    fn output_commands() {
        assert_eq!(
            Output::Object2.commands(),
            [None, None, Some(Command::Object2)]
        );
        assert_eq!(
            Output::AmbientObject2.commands(),
            [Some(Command::Ambient), None, Some(Command::Object2)]
        );
    }
}
