use super::hw_def::*;
use super::*;

use crate::bus::{self, DEFAULT_BUS};
use crate::register;
use crate::sensor::Sensor;
use crate::types::BarometricReading;

use embedded_hal_async::{delay::DelayNs, i2c::I2c};

impl<P, Delay, E> Bmp180<P, Delay>
where
    P: BusProvider,
    P::Channel: I2c<Error = E>,
    Delay: DelayNs,
{
    /// Create a driver with the default configuration (no oversampling).
    ///
    /// Fails with [`Error::NotSupported`] when `provider` has no I²C capability.
    pub fn new(provider: P, delay: Delay) -> Result<Self, Error<E>> {
        Self::with_config(provider, delay, Bmp180Config::default())
    }

    /// Create a driver with `config`, which must be valid
    pub fn with_config(provider: P, delay: Delay, config: Bmp180Config) -> Result<Self, Error<E>> {
        bus::ensure_supported(&provider)?;
        config.validate()?;
        Ok(Self {
            provider,
            channel: None,
            delay,
            config,
            bus: DEFAULT_BUS,
            speed: BusSpeed::Standard,
            calibration: None,
        })
    }

    /// Ask the provider for the controller named `bus` instead of the default
    pub fn on_bus(mut self, bus: &'static str) -> Self {
        self.bus = bus;
        self
    }

    /// Current settings
    pub fn config(&self) -> &Bmp180Config {
        &self.config
    }

    /// Set the pressure oversampling, `0..=3`. Higher settings are slower and less noisy.
    pub fn set_oversampling(&mut self, oversampling: u8) -> Result<(), Error<E>> {
        validate_oversampling(oversampling)?;
        self.config.oversampling = oversampling;
        Ok(())
    }

    /// Calibration coefficients, once the first reading has loaded them
    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    /// Reset the chip as if it had been power cycled
    pub async fn soft_reset(&mut self) -> Result<(), Error<E>> {
        let channel = self.channel.as_mut().ok_or(Error::InvalidState)?;
        register::write_register(channel, ADDRESS, REG_SOFT_RESET, &[SOFT_RESET]).await?;
        self.delay.delay_ms(SOFT_RESET_MS).await;
        Ok(())
    }

    /// Hand the channel back to the provider and forget the calibration.
    /// Does nothing when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(channel) = self.channel.take() {
            self.provider.close(channel);
        }
        self.calibration = None;
    }

    /// Disconnect and give back the provider and delay
    pub fn release(mut self) -> (P, Delay) {
        self.disconnect();
        (self.provider, self.delay)
    }

    async fn read_register(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Error<E>> {
        let channel = self.channel.as_mut().ok_or(Error::InvalidState)?;
        register::write_read(channel, ADDRESS, reg, buf).await
    }

    async fn start_conversion(&mut self, command: u8) -> Result<(), Error<E>> {
        let channel = self.channel.as_mut().ok_or(Error::InvalidState)?;
        trace!("bmp180: start conversion 0x{:02x}", command);
        register::write_register(channel, ADDRESS, REG_CTRL_MEAS, &[command]).await
    }

    async fn identify(&mut self) -> Result<(), Error<E>> {
        let mut id = [0u8; 1];
        self.read_register(REG_CHIP_ID, &mut id).await?;
        if id[0] == CHIP_ID {
            Ok(())
        } else {
            warn!("bmp180: unexpected chip id 0x{:02x}", id[0]);
            Err(Error::CommunicationFailure)
        }
    }

    async fn load_calibration(&mut self) -> Result<Calibration, Error<E>> {
        if let Some(calibration) = self.calibration {
            return Ok(calibration);
        }
        let mut buf = [0u8; CALIBRATION_LEN];
        self.read_register(REG_CALIBRATION, &mut buf).await?;
        let Some(calibration) = Calibration::from_bytes(&buf) else {
            warn!("bmp180: implausible calibration block {:?}", buf);
            return Err(Error::CommunicationFailure);
        };
        debug!("bmp180: calibration loaded");
        self.calibration = Some(calibration);
        Ok(calibration)
    }

    /// Poll the start-of-conversion bit until the chip clears it
    async fn wait_conversion(&mut self) -> Result<(), Error<E>> {
        for _ in 0..MAX_STATUS_POLLS {
            let mut ctrl = [0u8; 1];
            self.read_register(REG_CTRL_MEAS, &mut ctrl).await?;
            if ctrl[0] & (1 << CTRL_SCO_BIT) == 0 {
                return Ok(());
            }
            self.delay.delay_ms(STATUS_POLL_MS).await;
        }
        warn!("bmp180: conversion did not complete");
        Err(Error::Timeout)
    }

    async fn measure_temperature(&mut self) -> Result<[u8; 2], Error<E>> {
        self.start_conversion(CMD_TEMPERATURE).await?;
        self.delay.delay_ms(TEMPERATURE_CONVERSION_MS).await;
        self.wait_conversion().await?;
        let mut raw = [0u8; 2];
        self.read_register(REG_OUT_MSB, &mut raw).await?;
        Ok(raw)
    }

    /// Uncompensated pressure. `temperature_raw` is what the temperature conversion left in the
    /// output registers; seeing it again means the pressure result has not landed yet.
    async fn measure_pressure(&mut self, temperature_raw: [u8; 2]) -> Result<i32, Error<E>> {
        let oversampling = self.config.oversampling;
        for _ in 0..MAX_STALE_PRESSURE_READS {
            self.start_conversion(CMD_PRESSURE | (oversampling << 6)).await?;
            self.delay.delay_ms(PRESSURE_CONVERSION_BASE_MS << oversampling).await;
            self.wait_conversion().await?;

            let mut raw = [0u8; 3];
            self.read_register(REG_OUT_MSB, &mut raw).await?;
            if raw[..2] == temperature_raw {
                debug!("bmp180: stale pressure registers, converting again");
                continue;
            }
            let up = ((raw[0] as i32) << 16 | (raw[1] as i32) << 8 | raw[2] as i32) >> (8 - oversampling);
            return Ok(up);
        }
        warn!("bmp180: pressure registers never updated");
        Err(Error::Timeout)
    }
}

impl<P, Delay, E> Sensor for Bmp180<P, Delay>
where
    P: BusProvider,
    P::Channel: I2c<Error = E>,
    Delay: DelayNs,
{
    type Reading = BarometricReading;
    type Error = Error<E>;

    async fn connect(&mut self) -> Result<bool, Error<E>> {
        if self.channel.is_some() {
            return Ok(true);
        }
        let channel = match bus::open_channel(&mut self.provider, self.bus, ADDRESS, self.speed) {
            Ok(channel) => channel,
            Err(Error::BusNotFound) => return Ok(false),
            Err(e) => return Err(e),
        };
        self.channel = Some(channel);

        match self.identify().await {
            Ok(()) => {
                info!("bmp180: connected");
                Ok(true)
            }
            Err(_) => {
                warn!("bmp180: handshake failed");
                self.disconnect();
                Ok(false)
            }
        }
    }

    fn connected(&self) -> bool {
        self.channel.is_some()
    }

    async fn read(&mut self) -> Result<BarometricReading, Error<E>> {
        if self.channel.is_none() {
            return Err(Error::InvalidState);
        }
        let calibration = self.load_calibration().await?;
        let temperature_raw = self.measure_temperature().await?;
        let up = self.measure_pressure(temperature_raw).await?;
        let ut = register::be_u16(&temperature_raw, 0) as i32;

        let Some(out) = calibration.compensate(ut, up, self.config.oversampling) else {
            warn!("bmp180: compensation out of range for ut {} up {}", ut, up);
            return Err(Error::CommunicationFailure);
        };
        Ok(BarometricReading {
            pressure_hpa: out.pressure_pa as f64 / 100.0,
            temperature_c: out.temperature_tenths as f64 / 10.0,
        })
    }
}
