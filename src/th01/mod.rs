//! TH01 relative humidity and temperature sensor.
//!
//! The TH01 answers on the bus only while its chip-select line is low, so several of them can share
//! the one fixed address with a chip-select line each. The driver drives the line low for the
//! duration of every transaction sequence and always drives it high again afterwards, whether the
//! sequence succeeded, failed, or was cancelled.

mod device_impl;
mod hw_def;

use crate::bus::{BusProvider, BusSpeed};

use embedded_hal::digital::OutputPin;

#[cfg(feature = "defmt")]
use defmt::Format;

/// TH01 settings
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Th01Config {
    /// run the on-chip heater during conversions, to drive off condensation
    pub heater: bool,
}

/// Temperature in °C from the temperature data register
pub fn raw_to_centigrade(raw: u16) -> f64 {
    (raw >> 2) as f64 / 32.0 - 50.0
}

/// Relative humidity in percent from the humidity data register
pub fn raw_to_humidity_percent(raw: u16) -> f64 {
    (raw >> 4) as f64 / 16.0 - 24.0
}

/// TH01 device driver
pub struct Th01<P: BusProvider, CS, Delay> {
    pub(crate) provider: P,
    pub(crate) channel: Option<P::Channel>,
    pub(crate) cs: CS,
    pub(crate) delay: Delay,
    pub(crate) config: Th01Config,
    pub(crate) bus: &'static str,
    pub(crate) speed: BusSpeed,
}

/// Chip-select held low; driven high again when dropped
pub(crate) struct Selected<'a, CS: OutputPin> {
    cs: &'a mut CS,
}
impl<'a, CS: OutputPin> Selected<'a, CS> {
    /// The guard exists before the line is driven, so a failed `set_low` is still followed by a
    /// `set_high`.
    pub(crate) fn assert(cs: &'a mut CS) -> (Self, Result<(), CS::Error>) {
        let selected = Self { cs };
        let res = selected.cs.set_low();
        (selected, res)
    }
}
impl<CS: OutputPin> Drop for Selected<'_, CS> {
    fn drop(&mut self) {
        if self.cs.set_high().is_err() {
            warn!("th01: could not release chip-select");
        }
    }
}
