//! BH1750FVI ambient light sensor.
//!
//! The chip has no registers, only single-byte op-codes. A measurement is either one-shot (the chip
//! powers itself down afterwards) or continuous (the chip keeps refreshing its data register).
//!
//! In continuous mode the driver keeps its own sampling schedule: call
//! [`Bh1750::continuous_tick`] (or [`Bh1750::run_continuous`]) from a task, and every tick waits
//! for the next sampling time and then reads the data register. Changes of the reading are
//! published to the channel given to [`NotifyingSensor::notify_to`](crate::NotifyingSensor).

mod device_impl;
mod hw_def;

pub use hw_def::{
    DEFAULT_MEASUREMENT_TIME, MAX_MEASUREMENT_TIME, MIN_CONTINUOUS_PERIOD_MS, MIN_MEASUREMENT_TIME,
};

use crate::Error;
use crate::bus::{BusProvider, BusSpeed};
use crate::types::Illumination;

use embassy_sync::pubsub::DynPublisher;
use hw_def::*;

#[cfg(feature = "defmt")]
use defmt::Format;

/// I²C address, selected by the level of the ADDR pin
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Address {
    /// ADDR low: 0x23
    #[default]
    Low,
    /// ADDR high: 0x5C
    High,
}
impl Address {
    /// 7-bit address
    pub fn as_u8(self) -> u8 {
        match self {
            Address::Low => 0x23,
            Address::High => 0x5C,
        }
    }
}

/// Measurement resolution
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Resolution {
    /// 4 lx steps, fast conversion
    Low,
    /// 1 lx steps
    #[default]
    High,
    /// 0.5 lx steps
    VeryHigh,
}
impl Resolution {
    pub(crate) fn one_time_op(self) -> OpCode {
        match self {
            Resolution::Low => OpCode::OneTimeLowRes,
            Resolution::High => OpCode::OneTimeHighRes,
            Resolution::VeryHigh => OpCode::OneTimeHighRes2,
        }
    }

    pub(crate) fn continuous_op(self) -> OpCode {
        match self {
            Resolution::Low => OpCode::ContinuousLowRes,
            Resolution::High => OpCode::ContinuousHighRes,
            Resolution::VeryHigh => OpCode::ContinuousHighRes2,
        }
    }

    pub(crate) fn conversion_ms(self) -> u32 {
        match self {
            Resolution::Low => LOW_RES_CONVERSION_MS,
            Resolution::High | Resolution::VeryHigh => HIGH_RES_CONVERSION_MS,
        }
    }
}

/// Convert data register counts to lux
pub fn counts_to_lux(counts: u16, resolution: Resolution, measurement_time: u8) -> f64 {
    let lux = counts as f64 / COUNTS_PER_LUX * (DEFAULT_MEASUREMENT_TIME as f64 / measurement_time as f64);
    match resolution {
        Resolution::VeryHigh => lux / 2.0,
        Resolution::Low | Resolution::High => lux,
    }
}

/// BH1750 settings
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Bh1750Config {
    /// slave address
    pub address: Address,
    /// resolution used for one-shot and continuous measurements
    pub resolution: Resolution,
    /// measurement time register value, `31..=254`
    pub measurement_time: u8,
    /// continuous sampling period in milliseconds, at least 10
    pub continuous_period_ms: u32,
}
impl Default for Bh1750Config {
    fn default() -> Self {
        Self {
            address: Address::default(),
            resolution: Resolution::default(),
            measurement_time: DEFAULT_MEASUREMENT_TIME,
            continuous_period_ms: DEFAULT_CONTINUOUS_PERIOD_MS,
        }
    }
}
impl Bh1750Config {
    /// Check every field is within its domain
    pub fn validate<E>(&self) -> Result<(), Error<E>> {
        validate_measurement_time(self.measurement_time)?;
        validate_continuous_period(self.continuous_period_ms)
    }
}

pub(crate) fn validate_measurement_time<E>(measurement_time: u8) -> Result<(), Error<E>> {
    if (MIN_MEASUREMENT_TIME..=MAX_MEASUREMENT_TIME).contains(&measurement_time) {
        Ok(())
    } else {
        Err(Error::ArgumentRange)
    }
}

pub(crate) fn validate_continuous_period<E>(period_ms: u32) -> Result<(), Error<E>> {
    if period_ms >= MIN_CONTINUOUS_PERIOD_MS {
        Ok(())
    } else {
        Err(Error::ArgumentRange)
    }
}

/// Power and acquisition state of the chip as last commanded
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerState {
    /// powered down, lowest consumption
    PoweredDown,
    /// powered on, waiting for a measurement command
    Idle,
    /// a one-shot measurement is converting
    OneShotPending,
    /// measuring continuously
    ContinuousRunning,
}

/// BH1750 device driver
pub struct Bh1750<'a, P: BusProvider, Delay> {
    pub(crate) provider: P,
    pub(crate) channel: Option<P::Channel>,
    pub(crate) delay: Delay,
    pub(crate) config: Bh1750Config,
    pub(crate) bus: &'static str,
    pub(crate) speed: BusSpeed,
    pub(crate) state: PowerState,
    /// continuous schedule: next tick still owes the grace delay
    pub(crate) awaiting_grace: bool,
    pub(crate) last_reading: Option<Illumination>,
    pub(crate) publisher: Option<DynPublisher<'a, Illumination>>,
}
