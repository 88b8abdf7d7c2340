//! Platform-agnostic async Rust drivers for four environmental sensors built on the
//! [`embedded-hal`] and [`embedded-hal-async`] traits:
//!
//! - [`Bh1750`]: ambient light, in lux.
//! - [`Bmp180`]: barometric pressure and temperature, with sea-level and altitude conversions.
//! - [`Th01`]: relative humidity and temperature, with dew point.
//! - [`Hmc5883l`]: three-axis magnetic field, in µT.
//!
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal/tree/master/embedded-hal
//! [`embedded-hal-async`]: https://github.com/rust-embedded/embedded-hal/tree/master/embedded-hal-async
//!
//! Every driver implements [`Sensor`]: `connect()`, `connected()` and `read()`. Drivers do not
//! own a bus handle from the start; they are given a [`BusProvider`] and open a channel to their
//! slave address when they connect. [`SingleBus`] turns one existing `embedded_hal_async::i2c::I2c`
//! into such a provider.
//!
//! The BH1750 can also sample continuously. It then implements [`NotifyingSensor`]: it keeps its
//! last reading and publishes every change of it to an `embassy-sync` pub/sub channel.
//!
//! Drivers do no internal locking. A driver instance must only be used from one task at a time.
//!
//! This driver allows you to:
//! - Take one-shot light readings at low, high and very-high resolution.
//! - Change the BH1750 measurement time to trade range for sensitivity.
//! - Run the BH1750 in continuous mode and subscribe to changes.
//! - Read BMP180 pressure at any of the four oversampling levels.
//! - Convert between station pressure, sea-level pressure and altitude.
//! - Read TH01 humidity and temperature, optionally with the heater on.
//! - Several TH01 chips on one address, selected by their chip-select lines.
//! - Self-test the HMC5883L at connect time.
//! - Read the HMC5883L either on its data-ready interrupt or by waiting a fixed time.
//!
//! ## Features
//!
//! - `log` (default): Enables logging using the `log` framework.
//! - `defmt`: Enables logging using the `defmt` framework.
//!
//! ## Example
//!
//! ```ignore
//! use ambient_sensors::{Bmp180, Sensor, SingleBus};
//!
//! // Platform-specific
//! let i2c = /* embedded_hal_async::i2c::I2c instance */;
//! let delay = /* embedded_hal_async::delay::DelayNs instance */;
//!
//! let mut bmp180 = Bmp180::new(SingleBus::new(i2c), delay).unwrap();
//! if bmp180.connect().await.unwrap() {
//!     let reading = bmp180.read().await.unwrap();
//!     println!("{:.2} hPa, {:.1} °C, {:.0} m",
//!         reading.pressure_hpa,
//!         reading.temperature_c,
//!         reading.altitude(1013.25));
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("Features \"defmt\" and \"log\" are mutually exclusive and cannot be enabled together");

#[macro_use]
mod fmt;

pub mod bh1750;
pub mod bmp180;
pub mod bus;
pub mod hmc5883l;
pub mod register;
pub mod sensor;
pub mod th01;
mod types;

#[cfg(test)]
mod test_support;

pub use crate::{
    bh1750::{Bh1750, Bh1750Config},
    bmp180::{Bmp180, Bmp180Config},
    bus::{BusId, BusProvider, BusSpeed, NoBus, SingleBus},
    hmc5883l::{Hmc5883l, Hmc5883lConfig},
    sensor::{NotifyingSensor, Sensor},
    th01::{Th01, Th01Config},
    types::*,
};

#[cfg(feature = "defmt")]
use defmt::Format;

/// All possible errors in this crate
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, PartialEq)]
pub enum Error<E> {
    /// I²C communication error
    I2c(E),
    /// A chip-select or data-ready pin reported an error
    Gpio,
    /// The host has no I²C capability
    NotSupported,
    /// No bus controller matched, or no channel could be opened on it
    BusNotFound,
    /// The device did not identify itself as expected
    CommunicationFailure,
    /// The driver is not in a state that allows the operation, e.g. not connected
    InvalidState,
    /// A configuration value is outside its valid range
    ArgumentRange,
    /// The device did not report completion in time
    Timeout,
    /// The magnetometer self-test failed at every gain level
    SelfTestFailure,
}
