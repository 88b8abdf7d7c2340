//! BMP180 barometric pressure and temperature sensor.
//!
//! Every reading is a temperature conversion followed by a pressure conversion at the configured
//! oversampling setting; both raw values go through the datasheet compensation algorithm using the
//! EEPROM calibration coefficients, which are read once per connection.

mod calibration;
mod device_impl;
mod hw_def;

pub use calibration::Calibration;
pub use hw_def::MAX_OVERSAMPLING;

use crate::Error;
use crate::bus::{BusProvider, BusSpeed};

#[cfg(feature = "defmt")]
use defmt::Format;

/// BMP180 settings
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Bmp180Config {
    /// pressure oversampling setting, `0..=3`: 1, 2, 4 or 8 internal samples
    pub oversampling: u8,
}
impl Bmp180Config {
    /// Check every field is within its domain
    pub fn validate<E>(&self) -> Result<(), Error<E>> {
        validate_oversampling(self.oversampling)
    }
}

pub(crate) fn validate_oversampling<E>(oversampling: u8) -> Result<(), Error<E>> {
    if oversampling <= MAX_OVERSAMPLING {
        Ok(())
    } else {
        Err(Error::ArgumentRange)
    }
}

/// BMP180 device driver
pub struct Bmp180<P: BusProvider, Delay> {
    pub(crate) provider: P,
    pub(crate) channel: Option<P::Channel>,
    pub(crate) delay: Delay,
    pub(crate) config: Bmp180Config,
    pub(crate) bus: &'static str,
    pub(crate) speed: BusSpeed,
    pub(crate) calibration: Option<Calibration>,
}
