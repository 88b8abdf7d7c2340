//! BMP180 register map and timing.

pub(crate) const ADDRESS: u8 = 0x77;

pub(crate) const REG_CALIBRATION: u8 = 0xAA;
pub(crate) const REG_CHIP_ID: u8 = 0xD0;
pub(crate) const REG_SOFT_RESET: u8 = 0xE0;
pub(crate) const REG_CTRL_MEAS: u8 = 0xF4;
pub(crate) const REG_OUT_MSB: u8 = 0xF6;

pub(crate) const CALIBRATION_LEN: usize = 22;
pub(crate) const CHIP_ID: u8 = 0x55;
pub(crate) const SOFT_RESET: u8 = 0xB6;

pub(crate) const CMD_TEMPERATURE: u8 = 0x2E;
/// oversampling setting goes in bits 7:6
pub(crate) const CMD_PRESSURE: u8 = 0x34;
/// start-of-conversion bit of ctrl_meas; set while a conversion runs
pub(crate) const CTRL_SCO_BIT: u8 = 5;

/// Highest oversampling setting (8 samples)
pub const MAX_OVERSAMPLING: u8 = 3;

pub(crate) const TEMPERATURE_CONVERSION_MS: u32 = 5;
/// pressure conversion waits this times 2^oversampling
pub(crate) const PRESSURE_CONVERSION_BASE_MS: u32 = 5;
pub(crate) const STATUS_POLL_MS: u32 = 2;
pub(crate) const MAX_STATUS_POLLS: usize = 50;
pub(crate) const MAX_STALE_PRESSURE_READS: usize = 8;
pub(crate) const SOFT_RESET_MS: u32 = 10;
