//! Capabilities shared by every driver in the crate.

use core::future::Future;

use embassy_sync::pubsub::DynPublisher;

/// A sensor that can be connected to and asked for a single reading.
pub trait Sensor {
    /// Value produced by one acquisition
    type Reading;
    /// Error returned by the driver
    type Error;

    /// Acquire the bus channel and check the chip answers.
    ///
    /// Resolves to `Ok(false)` rather than an error when the bus or the device cannot be found.
    /// Calling it again while connected does nothing and resolves to `Ok(true)`.
    fn connect(&mut self) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Whether the last [`Self::connect`] succeeded and the channel is still held
    fn connected(&self) -> bool;

    /// Take one reading. Fails with `InvalidState` when not connected.
    fn read(&mut self) -> impl Future<Output = Result<Self::Reading, Self::Error>>;
}

/// A sensor that keeps its most recent reading and announces every change of it.
pub trait NotifyingSensor<'a>: Sensor {
    /// Most recent reading, without touching the bus
    fn last_reading(&self) -> Option<Self::Reading>;

    /// Publish every future change of [`Self::last_reading`] to `publisher`
    fn notify_to(&mut self, publisher: DynPublisher<'a, Self::Reading>)
    where
        Self::Reading: Clone;
}
