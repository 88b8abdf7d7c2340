//! HMC5883L register map, mode values and timing.

pub(crate) const ADDRESS: u8 = 0x1E;

pub(crate) const REG_CONFIG_A: u8 = 0x00;
pub(crate) const REG_CONFIG_B: u8 = 0x01;
pub(crate) const REG_MODE: u8 = 0x02;
/// X, Z, Y: big-endian pairs
pub(crate) const REG_DATA: u8 = 0x03;
pub(crate) const REG_ID_A: u8 = 0x0A;

pub(crate) const ID: [u8; 3] = *b"H43";

pub(crate) const MODE_CONTINUOUS: u8 = 0x00;
pub(crate) const MODE_SINGLE: u8 = 0x01;
pub(crate) const MODE_IDLE: u8 = 0x03;

/// Config A measurement-mode bits
pub(crate) const BIAS_NONE: u8 = 0x00;
pub(crate) const BIAS_POSITIVE: u8 = 0x01;

/// Value an axis reads when its ADC over- or underflowed
pub(crate) const AXIS_OVERFLOW: i16 = -4096;

/// Config B through the last data register
pub(crate) const SAMPLE_LEN: usize = 8;

pub(crate) const DATA_READY_TIMEOUT_MS: u32 = 200;
pub(crate) const SINGLE_SHOT_SETTLE_MS: u32 = 100;
/// One measurement period at 15 Hz
pub(crate) const SELF_TEST_PERIOD_MS: u32 = 67;

/// Config A during the self-test: 8-sample averaging, 15 Hz, positive bias
pub(crate) const SELF_TEST_CONFIG_A: u8 = 0b11 << 5 | 0b100 << 2 | BIAS_POSITIVE;
/// Gain codes tried by the self-test, most sensitive first
pub(crate) const SELF_TEST_GAINS: [u8; 3] = [5, 6, 7];
/// Gain the self-test limits are specified at
pub(crate) const SELF_TEST_REFERENCE_GAIN: u16 = 390;
pub(crate) const SELF_TEST_LOW: i32 = 243;
pub(crate) const SELF_TEST_HIGH: i32 = 575;

/// Counts per gauss for each gain code
pub(crate) const COUNTS_PER_GAUSS: [u16; 8] = [1370, 1090, 820, 660, 440, 390, 330, 230];
