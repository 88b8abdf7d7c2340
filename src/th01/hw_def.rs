//! TH01 register map and timing.

pub(crate) const ADDRESS: u8 = 0x40;

pub(crate) const REG_STATUS: u8 = 0x00;
pub(crate) const REG_DATA: u8 = 0x01;
pub(crate) const REG_CONFIG: u8 = 0x03;
pub(crate) const REG_ID: u8 = 0x11;

pub(crate) const CONFIG_START: u8 = 0x01;
pub(crate) const CONFIG_HEAT: u8 = 0x02;
/// select temperature instead of humidity
pub(crate) const CONFIG_TEMP: u8 = 0x10;

/// /RDY: set while a conversion is in progress
pub(crate) const STATUS_NOT_READY: u8 = 0x01;

/// upper nibble of the ID register
pub(crate) const DEVICE_ID: u8 = 0x5;

pub(crate) const WAKE_MS: u32 = 15;
pub(crate) const STATUS_POLL_MS: u32 = 5;
pub(crate) const MAX_STATUS_POLLS: usize = 50;
