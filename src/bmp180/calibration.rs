//! Factory calibration coefficients and the BMP180 compensation algorithm.
//!
//! The arithmetic follows the datasheet's integer algorithm step by step, truncating divisions and
//! arithmetic shifts included, so results match the reference implementation bit for bit.

use crate::register::{be_i16, be_u16};

use super::hw_def::CALIBRATION_LEN;

#[cfg(feature = "defmt")]
use defmt::Format;

/// Calibration coefficients stored in the BMP180 EEPROM (registers 0xAA..=0xBF, big-endian)
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub struct Calibration {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

/// Compensated output: temperature in 0.1 °C and pressure in Pa
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Compensated {
    pub temperature_tenths: i32,
    pub pressure_pa: i32,
}

impl Calibration {
    /// Decode the 22-byte EEPROM block.
    ///
    /// Returns `None` when any coefficient reads 0x0000 or 0xFFFF, which is what an unprogrammed
    /// EEPROM or a floating bus returns.
    pub fn from_bytes(buf: &[u8; CALIBRATION_LEN]) -> Option<Self> {
        if buf.chunks_exact(2).any(|word| word == [0x00, 0x00] || word == [0xFF, 0xFF]) {
            return None;
        }
        Some(Self {
            ac1: be_i16(buf, 0),
            ac2: be_i16(buf, 2),
            ac3: be_i16(buf, 4),
            ac4: be_u16(buf, 6),
            ac5: be_u16(buf, 8),
            ac6: be_u16(buf, 10),
            b1: be_i16(buf, 12),
            b2: be_i16(buf, 14),
            mb: be_i16(buf, 16),
            mc: be_i16(buf, 18),
            md: be_i16(buf, 20),
        })
    }

    /// Temperature and pressure for the uncompensated values `ut` and `up`.
    ///
    /// Intermediates are carried in 64 bits, which gives the 32-bit results wherever those do not
    /// overflow. `None` when a divisor comes out zero or a result does not fit in 32 bits.
    pub(crate) fn compensate(&self, ut: i32, up: i32, oversampling: u8) -> Option<Compensated> {
        let ut = ut as i64;
        let x1 = ((ut - self.ac6 as i64) * self.ac5 as i64) >> 15;
        let x2 = ((self.mc as i64) << 11).checked_div(x1 + self.md as i64)?;
        let b5 = x1 + x2;
        let temperature_tenths = (b5 + 8) >> 4;

        let b6 = b5 - 4000;
        let x1 = (self.b2 as i64 * ((b6 * b6) >> 12)) >> 11;
        let x2 = (self.ac2 as i64 * b6) >> 11;
        let x3 = x1 + x2;
        let b3 = ((((self.ac1 as i64) * 4 + x3) << oversampling) + 2) / 4;

        let x1 = (self.ac3 as i64 * b6) >> 13;
        let x2 = (self.b1 as i64 * ((b6 * b6) >> 12)) >> 16;
        let x3 = (x1 + x2 + 2) >> 2;
        let b4 = (self.ac4 as u32).wrapping_mul((x3 + 32768) as u32) >> 15;
        let b7 = (up as u32).wrapping_sub(b3 as u32).wrapping_mul(50000 >> oversampling);

        let p = if b7 < 0x8000_0000 {
            (b7 * 2).checked_div(b4)?
        } else {
            b7.checked_div(b4)?.wrapping_mul(2)
        };
        let p = p as i32 as i64;
        let x1 = (p >> 8) * (p >> 8);
        let x1 = (x1 * 3038) >> 16;
        let x2 = (-7357 * p) >> 16;
        let p = p + ((x1 + x2 + 3791) >> 4);

        Some(Compensated {
            temperature_tenths: i32::try_from(temperature_tenths).ok()?,
            pressure_pa: i32::try_from(p).ok()?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Coefficients of the worked example in the BMP180 datasheet
    pub(crate) const DATASHEET_BYTES: [u8; CALIBRATION_LEN] = [
        0x01, 0x98, 0xFF, 0xB8, 0xC7, 0xD1, 0x7F, 0xE5, 0x7F, 0xF5, 0x5A, 0x71, 0x18, 0x2E, 0x00,
        0x04, 0x80, 0x00, 0xDD, 0xF9, 0x0B, 0x34,
    ];

    #[test]
    fn decodes_signed_and_unsigned_coefficients() {
        let cal = Calibration::from_bytes(&DATASHEET_BYTES).unwrap();
        assert_eq!(cal.ac1, 408);
        assert_eq!(cal.ac2, -72);
        assert_eq!(cal.ac3, -14383);
        assert_eq!(cal.ac4, 32741);
        assert_eq!(cal.ac5, 32757);
        assert_eq!(cal.ac6, 23153);
        assert_eq!(cal.b1, 6190);
        assert_eq!(cal.b2, 4);
        assert_eq!(cal.mb, -32768);
        assert_eq!(cal.mc, -8711);
        assert_eq!(cal.md, 2868);
    }

    #[test]
    fn datasheet_example() {
        let cal = Calibration::from_bytes(&DATASHEET_BYTES).unwrap();
        assert_eq!(
            cal.compensate(27898, 23843, 0),
            Some(Compensated { temperature_tenths: 150, pressure_pa: 69964 })
        );
    }

    #[test]
    fn blank_or_floating_eeprom_is_rejected() {
        assert_eq!(Calibration::from_bytes(&[0x00; CALIBRATION_LEN]), None);
        assert_eq!(Calibration::from_bytes(&[0xFF; CALIBRATION_LEN]), None);

        let mut one_blank_word = DATASHEET_BYTES;
        one_blank_word[20..].copy_from_slice(&[0x00, 0x00]);
        assert_eq!(Calibration::from_bytes(&one_blank_word), None);
    }

    #[test]
    fn zero_divisor_yields_none() {
        // x1 is 4743 for ut = 27898, so md = -4743 zeroes the B5 divisor
        let cal = Calibration { md: -4743, ..Calibration::from_bytes(&DATASHEET_BYTES).unwrap() };
        assert_eq!(cal.compensate(27898, 23843, 0), None);

        let cal = Calibration { ac4: 0, ..Calibration::from_bytes(&DATASHEET_BYTES).unwrap() };
        assert_eq!(cal.compensate(27898, 23843, 0), None);
    }

    #[test]
    fn extreme_inputs_do_not_overflow() {
        let cal = Calibration {
            ac1: i16::MAX,
            ac2: i16::MIN,
            ac3: i16::MIN,
            ac4: 0xFFFE,
            ac5: 0xFFFE,
            ac6: 1,
            b1: i16::MAX,
            b2: i16::MAX,
            mb: 1,
            mc: i16::MIN,
            md: 1,
        };
        for oversampling in 0..=3 {
            let _ = cal.compensate(0xFFFF, 0x7FFFF, oversampling);
            let _ = cal.compensate(0, 0, oversampling);
        }
    }
}
