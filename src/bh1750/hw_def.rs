//! BH1750FVI op-codes and timing.

/// Instruction set. The chip has no registers: every command is a single byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub(crate) enum OpCode {
    PowerDown = 0x00,
    PowerOn = 0x01,
    Reset = 0x07,
    ContinuousHighRes = 0x10,
    ContinuousHighRes2 = 0x11,
    ContinuousLowRes = 0x13,
    OneTimeHighRes = 0x20,
    OneTimeHighRes2 = 0x21,
    OneTimeLowRes = 0x23,
    /// high 3 bits of the measurement time are OR'd into the low bits
    MeasurementTimeHigh = 0x40,
    /// low 5 bits of the measurement time are OR'd into the low bits
    MeasurementTimeLow = 0x60,
}
impl OpCode {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Measurement time register value after power-up; the lux formula is normalised to it
pub const DEFAULT_MEASUREMENT_TIME: u8 = 69;
/// Smallest accepted measurement time register value
pub const MIN_MEASUREMENT_TIME: u8 = 31;
/// Largest accepted measurement time register value
pub const MAX_MEASUREMENT_TIME: u8 = 254;

/// Shortest accepted continuous sampling period
pub const MIN_CONTINUOUS_PERIOD_MS: u32 = 10;
pub(crate) const DEFAULT_CONTINUOUS_PERIOD_MS: u32 = 1000;
/// Wait before the first sample after continuous mode is (re)armed
pub(crate) const CONTINUOUS_GRACE_MS: u32 = 1000;

// Worst-case conversion times at the default measurement time.
pub(crate) const LOW_RES_CONVERSION_MS: u32 = 24;
pub(crate) const HIGH_RES_CONVERSION_MS: u32 = 180;

/// Counts per lux at the default measurement time
pub(crate) const COUNTS_PER_LUX: f64 = 1.2;

/// Split a measurement time into its two op-codes, high bits first
pub(crate) fn measurement_time_commands(measurement_time: u8) -> [u8; 2] {
    [
        OpCode::MeasurementTimeHigh.as_u8() | (measurement_time >> 5),
        OpCode::MeasurementTimeLow.as_u8() | (measurement_time & 0x1F),
    ]
}
