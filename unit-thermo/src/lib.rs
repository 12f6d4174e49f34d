//! Drivers for three I²C infrared temperature units: the Melexis MLX90614 thermometer (in both
//! the single and dual sensor versions), the NCIR2 thermometer, and the Thermal2 thermal camera.
//!
//! All of the drivers share one polling model. Instead of relying on interrupts or a background
//! thread, the application calls [`update`][PeriodicMeasurement::update] from its own loop as
//! often as it likes. Once the sampling interval has elapsed, the driver reads a new sample from
//! the unit and stores it in a bounded [`RingBuffer`], from which it can be inspected or drained
//! at the application's leisure. Every driver also has a one-off (singleshot) measurement for
//! when periodic measurement is stopped.
//!
//! This library uses the [`embedded-hal`][embedded-hal] blocking I²C and delay traits, along with
//! a small [`Clock`] trait for reading the current time. It is `no_std` compatible, but does need
//! an allocator for the sample buffers.
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/*/embedded_hal/blocking/i2c/index.html
//!
//! # Example
//! ```no_run
//! use linux_embedded_hal::I2cdev;
//! use unit_thermo::ncir2::{self, Ncir2};
//! use unit_thermo::{PeriodicMeasurement, SystemTimer};
//!
//! let i2c_bus = I2cdev::new("/dev/i2c-1").expect("/dev/i2c-1 needs to be an I2C controller");
//! let mut thermometer = Ncir2::new(
//!     i2c_bus,
//!     ncir2::DEFAULT_ADDRESS,
//!     SystemTimer::new(),
//!     ncir2::Config::default(),
//! );
//! // Measurements start every 250ms by default
//! thermometer.begin()?;
//! loop {
//!     thermometer.update(false)?;
//!     if thermometer.updated() {
//!         println!("{:.2}°C", thermometer.celsius());
//!     }
//! }
//! # Ok::<(), unit_thermo::Error<I2cdev>>(())
//! ```
//!
//! # Units
//! The [`mlx90614`] module has the bare Melexis sensor. Its settings live in EEPROM, so they are
//! slow to change and the driver avoids rewriting unchanged values. The [`ncir2`] and
//! [`thermal2`] units have a microcontroller in front of the sensor, giving them plain byte
//! registers along with a button, an RGB LED and a buzzer that can be driven by temperature
//! alarms.

#![no_std]
#![allow(clippy::float_cmp)]

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("Either the 'std' or 'libm' feature must be enabled.");

extern crate alloc;

mod bus;
mod button;
mod clock;
pub mod codec;
pub mod common;
#[doc(hidden)]
pub mod error;
pub mod mlx90614;
pub mod ncir2;
pub mod periodic;
mod ring;
#[cfg(test)]
mod test;
pub mod thermal2;
mod util;

pub use bus::is_valid_address;
pub use button::ButtonEdgeState;
#[cfg(feature = "std")]
pub use clock::SystemTimer;
pub use clock::Clock;
pub use codec::Temperature;
pub use common::{AlarmLevel, Rgb};
#[doc(inline)]
pub use error::{Error, LibraryError};
pub use mlx90614::{Mlx90614BaaDriver, Mlx90614Driver};
pub use ncir2::Ncir2;
pub use periodic::{PeriodicController, PeriodicMeasurement, PeriodicState};
pub use ring::RingBuffer;
pub use thermal2::Thermal2;
