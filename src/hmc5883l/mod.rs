//! HMC5883L three-axis magnetometer.
//!
//! Measurements are single-shot. With a data-ready line the driver waits for its falling edge,
//! bounded by a timeout; without one it waits a fixed settle time and reads the result directly.
//! `connect()` identifies the chip and runs the built-in positive-bias self-test.

mod device_impl;
mod hw_def;

use crate::bus::{BusProvider, BusSpeed};
use crate::register;
use crate::types::MagneticField;

use core::convert::Infallible;
use embedded_hal::digital::ErrorType;
use embedded_hal_async::digital::Wait;
use hw_def::*;

#[cfg(feature = "defmt")]
use defmt::Format;

/// Measurement range and resolution
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Gain {
    /// ±0.88 Ga
    Ga0_88,
    /// ±1.3 Ga
    #[default]
    Ga1_3,
    /// ±1.9 Ga
    Ga1_9,
    /// ±2.5 Ga
    Ga2_5,
    /// ±4.0 Ga
    Ga4_0,
    /// ±4.7 Ga
    Ga4_7,
    /// ±5.6 Ga
    Ga5_6,
    /// ±8.1 Ga
    Ga8_1,
}
impl Gain {
    /// Gain bits of config register B
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Gain for the three gain bits of config register B
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Gain::Ga0_88,
            1 => Gain::Ga1_3,
            2 => Gain::Ga1_9,
            3 => Gain::Ga2_5,
            4 => Gain::Ga4_0,
            5 => Gain::Ga4_7,
            6 => Gain::Ga5_6,
            7 => Gain::Ga8_1,
            _ => return None,
        })
    }

    /// Resolution in counts per gauss
    pub fn counts_per_gauss(self) -> u16 {
        COUNTS_PER_GAUSS[self as usize]
    }
}

/// Number of samples averaged per measurement
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Averaging {
    /// 1 sample
    One,
    /// 2 samples
    Two,
    /// 4 samples
    Four,
    /// 8 samples
    #[default]
    Eight,
}

/// Output rate in continuous mode
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DataRate {
    /// 0.75 Hz
    Hz0_75,
    /// 1.5 Hz
    Hz1_5,
    /// 3 Hz
    Hz3,
    /// 7.5 Hz
    Hz7_5,
    /// 15 Hz
    #[default]
    Hz15,
    /// 30 Hz
    Hz30,
    /// 75 Hz
    Hz75,
}

/// HMC5883L settings
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Hmc5883lConfig {
    /// measurement range
    pub gain: Gain,
    /// samples averaged per measurement
    pub averaging: Averaging,
    /// continuous-mode output rate
    pub data_rate: DataRate,
}
impl Hmc5883lConfig {
    /// Config register A with the given measurement-mode (bias) bits
    pub(crate) fn config_a(&self, bias: u8) -> u8 {
        (self.averaging as u8) << 5 | (self.data_rate as u8) << 2 | bias
    }

    /// Config register B
    pub(crate) fn config_b(&self) -> u8 {
        gain_bits(self.gain.code())
    }
}

pub(crate) fn gain_bits(code: u8) -> u8 {
    code << 5
}

/// Field from the block read starting at config register B: gain, mode, then X, Z and Y.
/// The gain is taken from the block itself, so a reading is always scaled by the gain it was
/// measured with.
pub(crate) fn decode_sample(buf: &[u8; SAMPLE_LEN]) -> MagneticField {
    let counts_per_gauss = COUNTS_PER_GAUSS[(buf[0] >> 5) as usize] as f64;
    let micro_tesla = |offset| register::be_i16(buf, offset) as f64 / counts_per_gauss * 100.0;
    MagneticField {
        x: micro_tesla(2),
        z: micro_tesla(4),
        y: micro_tesla(6),
    }
}

/// Whether a positive-bias count lies inside the self-test limits for `gain_code`
pub(crate) fn within_self_test_limits(count: i16, gain_code: u8) -> bool {
    let gain = COUNTS_PER_GAUSS[gain_code as usize] as i32;
    let reference = SELF_TEST_REFERENCE_GAIN as i32;
    let low = SELF_TEST_LOW * gain / reference;
    let high = SELF_TEST_HIGH * gain / reference;
    (low..=high).contains(&(count as i32))
}

/// Data-ready line for a driver that has none; it is never waited on
#[derive(Debug)]
pub enum NoDataReady {}

impl ErrorType for NoDataReady {
    type Error = Infallible;
}

impl Wait for NoDataReady {
    async fn wait_for_high(&mut self) -> Result<(), Infallible> {
        match *self {}
    }

    async fn wait_for_low(&mut self) -> Result<(), Infallible> {
        match *self {}
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Infallible> {
        match *self {}
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Infallible> {
        match *self {}
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Infallible> {
        match *self {}
    }
}

/// HMC5883L device driver
pub struct Hmc5883l<P: BusProvider, Delay, DRDY = NoDataReady> {
    pub(crate) provider: P,
    pub(crate) channel: Option<P::Channel>,
    pub(crate) delay: Delay,
    pub(crate) data_ready: Option<DRDY>,
    pub(crate) config: Hmc5883lConfig,
    pub(crate) bus: &'static str,
    pub(crate) speed: BusSpeed,
}
