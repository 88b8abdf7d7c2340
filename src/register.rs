//! Register transaction helper shared by every driver.
//!
//! These functions are the only place the crate touches the bus. They know nothing about any
//! particular chip and never retry: a failed transfer is handed back as [`Error::I2c`].

use crate::Error;

use embedded_hal_async::i2c::I2c;

/// Largest payload that [`write_register`] will place behind a register address
pub const MAX_PAYLOAD: usize = 7;

/// Interpret `bytes[offset..offset + 2]` as a big-endian unsigned 16-bit value.
///
/// Panics if fewer than two bytes are available at `offset`.
pub fn be_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Interpret `bytes[offset..offset + 2]` as a big-endian signed 16-bit value.
///
/// Panics if fewer than two bytes are available at `offset`.
pub fn be_i16(bytes: &[u8], offset: usize) -> i16 {
    i16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Write raw bytes (an op-code, or a register address followed by data) to `address`.
pub async fn write<I2C, E>(i2c: &mut I2C, address: u8, bytes: &[u8]) -> Result<(), Error<E>>
where
    I2C: I2c<Error = E>,
{
    i2c.write(address, bytes).await.map_err(Error::I2c)
}

/// Write `payload` to `register`: one transfer carrying the register address then the data.
pub async fn write_register<I2C, E>(
    i2c: &mut I2C,
    address: u8,
    register: u8,
    payload: &[u8],
) -> Result<(), Error<E>>
where
    I2C: I2c<Error = E>,
{
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::ArgumentRange);
    }
    let mut buf = [0u8; MAX_PAYLOAD + 1];
    buf[0] = register;
    buf[1..=payload.len()].copy_from_slice(payload);
    write(i2c, address, &buf[..=payload.len()]).await
}

/// Set the register pointer to `register`, then burst-read `buf.len()` bytes.
pub async fn write_read<I2C, E>(
    i2c: &mut I2C,
    address: u8,
    register: u8,
    buf: &mut [u8],
) -> Result<(), Error<E>>
where
    I2C: I2c<Error = E>,
{
    i2c.write_read(address, &[register], buf).await.map_err(Error::I2c)
}

/// Read `buf.len()` bytes without addressing a register first.
pub async fn read<I2C, E>(i2c: &mut I2C, address: u8, buf: &mut [u8]) -> Result<(), Error<E>>
where
    I2C: I2c<Error = E>,
{
    i2c.read(address, buf).await.map_err(Error::I2c)
}
