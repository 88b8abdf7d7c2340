//! Bus enumeration and channel acquisition.
//!
//! Drivers do not construct their own bus handles. They are given a [`BusProvider`] and ask it for
//! a transaction channel bound to their slave address when they connect, then hand the channel
//! back when they disconnect.

use crate::Error;

use embedded_hal_async::i2c::I2c;

#[cfg(feature = "defmt")]
use defmt::Format;

/// Friendly name of the controller drivers ask for unless told otherwise
pub const DEFAULT_BUS: &str = "I2C1";

/// Identifier of an enumerated bus controller
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BusId(pub u8);

/// I2C clock speed class requested when opening a channel
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BusSpeed {
    /// 100 kHz
    #[default]
    Standard,
    /// 400 kHz
    Fast,
}
impl BusSpeed {
    /// Clock frequency in hertz
    pub fn hz(self) -> u32 {
        match self {
            BusSpeed::Standard => 100_000,
            BusSpeed::Fast => 400_000,
        }
    }
}

/// Platform service that resolves bus controllers and opens transaction channels on them
pub trait BusProvider {
    /// Channel handed to a driver, bound to a single slave address
    type Channel: I2c;

    /// Whether the host has an I2C capability at all
    fn is_supported(&self) -> bool {
        true
    }

    /// Find the controller with the friendly name `role`
    fn find_bus(&mut self, role: &str) -> Option<BusId>;

    /// Open a channel to `address` on `bus`
    fn open(&mut self, bus: BusId, address: u8, speed: BusSpeed) -> Option<Self::Channel>;

    /// Give a channel back; called exactly once for every channel returned by [`Self::open`]
    fn close(&mut self, channel: Self::Channel) {
        drop(channel);
    }
}

/// Fail construction when the provider has no I2C capability
pub(crate) fn ensure_supported<P, E>(provider: &P) -> Result<(), Error<E>>
where
    P: BusProvider,
{
    if provider.is_supported() {
        Ok(())
    } else {
        Err(Error::NotSupported)
    }
}

/// Resolve `role` and open a channel to `address` on it
pub(crate) fn open_channel<P, E>(
    provider: &mut P,
    role: &str,
    address: u8,
    speed: BusSpeed,
) -> Result<P::Channel, Error<E>>
where
    P: BusProvider,
    P::Channel: I2c<Error = E>,
{
    let Some(bus) = provider.find_bus(role) else {
        warn!("no bus controller named {}", role);
        return Err(Error::BusNotFound);
    };
    match provider.open(bus, address, speed) {
        Some(channel) => {
            debug!("opened channel to 0x{:02x} on bus {} at {} Hz", address, bus.0, speed.hz());
            Ok(channel)
        }
        None => {
            warn!("could not open channel to 0x{:02x} on bus {}", address, bus.0);
            Err(Error::BusNotFound)
        }
    }
}

/// Provider around a single, already-constructed bus handle.
///
/// Every role resolves to the same bus. The handle is lent out by `open` and comes back on
/// `close`, so only one driver can hold it at a time. Share a physical bus between several
/// drivers by giving each one its own device handle (for example from `embedded-hal-bus`).
#[derive(Debug)]
pub struct SingleBus<I2C> {
    i2c: Option<I2C>,
}

impl<I2C: I2c> SingleBus<I2C> {
    /// Wrap `i2c`
    pub fn new(i2c: I2C) -> Self {
        Self { i2c: Some(i2c) }
    }

    /// Recover the handle, if it is not currently lent to a driver
    pub fn into_inner(self) -> Option<I2C> {
        self.i2c
    }
}

impl<I2C: I2c> BusProvider for SingleBus<I2C> {
    type Channel = I2C;

    fn find_bus(&mut self, _role: &str) -> Option<BusId> {
        self.i2c.as_ref().map(|_| BusId(0))
    }

    fn open(&mut self, _bus: BusId, _address: u8, _speed: BusSpeed) -> Option<I2C> {
        self.i2c.take()
    }

    fn close(&mut self, channel: I2C) {
        self.i2c = Some(channel);
    }
}

/// Provider for hosts without any I2C capability; every driver built on it fails construction
#[derive(Clone, Copy, Debug, Default)]
pub struct NoBus;

impl BusProvider for NoBus {
    type Channel = NoChannel;

    fn is_supported(&self) -> bool {
        false
    }

    fn find_bus(&mut self, _role: &str) -> Option<BusId> {
        None
    }

    fn open(&mut self, _bus: BusId, _address: u8, _speed: BusSpeed) -> Option<NoChannel> {
        None
    }
}

/// Channel type of [`NoBus`]; it can never be opened
#[derive(Debug)]
pub enum NoChannel {}

impl embedded_hal_async::i2c::ErrorType for NoChannel {
    type Error = embedded_hal::i2c::ErrorKind;
}

impl I2c for NoChannel {
    async fn transaction(
        &mut self,
        _address: u8,
        _operations: &mut [embedded_hal_async::i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        match *self {}
    }
}
