use super::hw_def::*;
use super::*;

use crate::Error;
use crate::bus::{self, DEFAULT_BUS};
use crate::register;
use crate::sensor::Sensor;
use crate::types::RelativeHumidity;

use embedded_hal_async::{delay::DelayNs, i2c::I2c};

impl<P, CS, Delay, E> Th01<P, CS, Delay>
where
    P: BusProvider,
    P::Channel: I2c<Error = E>,
    CS: OutputPin,
    Delay: DelayNs,
{
    /// Create a driver with the heater off.
    ///
    /// `cs` is the chip-select line; it is driven high (deselected) straight away.
    pub fn new(provider: P, cs: CS, delay: Delay) -> Result<Self, Error<E>> {
        Self::with_config(provider, cs, delay, Th01Config::default())
    }

    /// Create a driver with `config`
    pub fn with_config(provider: P, mut cs: CS, delay: Delay, config: Th01Config) -> Result<Self, Error<E>> {
        bus::ensure_supported(&provider)?;
        cs.set_high().map_err(|_| Error::Gpio)?;
        Ok(Self {
            provider,
            channel: None,
            cs,
            delay,
            config,
            bus: DEFAULT_BUS,
            speed: BusSpeed::Standard,
        })
    }

    /// Ask the provider for the controller named `bus` instead of the default
    pub fn on_bus(mut self, bus: &'static str) -> Self {
        self.bus = bus;
        self
    }

    /// Current settings
    pub fn config(&self) -> &Th01Config {
        &self.config
    }

    /// Turn the heater on or off for subsequent readings
    pub fn set_heater(&mut self, on: bool) {
        self.config.heater = on;
    }

    /// Content of the ID register. A TH01 reports `0x5` in the upper nibble.
    pub async fn chip_id(&mut self) -> Result<u8, Error<E>> {
        let channel = self.channel.as_mut().ok_or(Error::InvalidState)?;
        let (_selected, res) = Selected::assert(&mut self.cs);
        res.map_err(|_| Error::Gpio)?;
        self.delay.delay_ms(WAKE_MS).await;

        let mut id = [0u8; 1];
        register::write_read(channel, ADDRESS, REG_ID, &mut id).await?;
        Ok(id[0])
    }

    /// Check the ID register, failing with [`Error::CommunicationFailure`] for other chips
    pub async fn identify(&mut self) -> Result<(), Error<E>> {
        let id = self.chip_id().await?;
        if id >> 4 == DEVICE_ID {
            Ok(())
        } else {
            warn!("th01: unexpected id 0x{:02x}", id);
            Err(Error::CommunicationFailure)
        }
    }

    /// Hand the channel back to the provider. Does nothing when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(channel) = self.channel.take() {
            self.provider.close(channel);
        }
    }

    /// Disconnect and give back the provider, chip-select line and delay
    pub fn release(mut self) -> (P, CS, Delay) {
        self.disconnect();
        (self.provider, self.cs, self.delay)
    }

    fn config_bits(&self) -> u8 {
        if self.config.heater { CONFIG_START | CONFIG_HEAT } else { CONFIG_START }
    }
}

/// Start one conversion with `config` and return the data register once the chip reports ready
async fn convert<I2C, D, E>(i2c: &mut I2C, delay: &mut D, config: u8) -> Result<u16, Error<E>>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
{
    trace!("th01: start conversion 0x{:02x}", config);
    register::write_register(i2c, ADDRESS, REG_CONFIG, &[config]).await?;
    for _ in 0..MAX_STATUS_POLLS {
        delay.delay_ms(STATUS_POLL_MS).await;
        let mut status = [0u8; 1];
        register::write_read(i2c, ADDRESS, REG_STATUS, &mut status).await?;
        if status[0] & STATUS_NOT_READY == 0 {
            let mut data = [0u8; 2];
            register::write_read(i2c, ADDRESS, REG_DATA, &mut data).await?;
            return Ok(register::be_u16(&data, 0));
        }
    }
    warn!("th01: conversion did not complete");
    Err(Error::Timeout)
}

impl<P, CS, Delay, E> Sensor for Th01<P, CS, Delay>
where
    P: BusProvider,
    P::Channel: I2c<Error = E>,
    CS: OutputPin,
    Delay: DelayNs,
{
    type Reading = RelativeHumidity;
    type Error = Error<E>;

    async fn connect(&mut self) -> Result<bool, Error<E>> {
        if self.channel.is_some() {
            return Ok(true);
        }
        let mut channel = match bus::open_channel(&mut self.provider, self.bus, ADDRESS, self.speed) {
            Ok(channel) => channel,
            Err(Error::BusNotFound) => return Ok(false),
            Err(e) => return Err(e),
        };

        let present = {
            let (_selected, res) = Selected::assert(&mut self.cs);
            match res {
                Ok(()) => {
                    self.delay.delay_ms(WAKE_MS).await;
                    let mut status = [0u8; 1];
                    register::write_read(&mut channel, ADDRESS, REG_STATUS, &mut status).await.is_ok()
                }
                Err(_) => false,
            }
        };

        if present {
            info!("th01: connected");
            self.channel = Some(channel);
            Ok(true)
        } else {
            warn!("th01: no answer with chip-select asserted");
            self.provider.close(channel);
            Ok(false)
        }
    }

    fn connected(&self) -> bool {
        self.channel.is_some()
    }

    async fn read(&mut self) -> Result<RelativeHumidity, Error<E>> {
        let config = self.config_bits();
        let channel = self.channel.as_mut().ok_or(Error::InvalidState)?;
        let (_selected, res) = Selected::assert(&mut self.cs);
        res.map_err(|_| Error::Gpio)?;
        self.delay.delay_ms(WAKE_MS).await;

        let raw_temperature = convert(channel, &mut self.delay, config | CONFIG_TEMP).await?;
        let raw_humidity = convert(channel, &mut self.delay, config).await?;
        Ok(RelativeHumidity {
            temperature_c: raw_to_centigrade(raw_temperature),
            humidity_pct: raw_to_humidity_percent(raw_humidity),
        })
    }
}
