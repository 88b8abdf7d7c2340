//! Shared pieces for the unit tests.

use core::convert::Infallible;
use std::vec::Vec;

use embedded_hal::digital::ErrorType;
use embedded_hal_async::digital::Wait;
use embedded_hal_mock::eh1::delay::Transaction as DelayTransaction;

/// Expected `delay_ms` calls, in order
pub fn delays_ms(ms: &[u32]) -> Vec<DelayTransaction> {
    ms.iter().map(|&ms| DelayTransaction::delay_ms(ms)).collect()
}

/// Data-ready line whose edge never comes. The pin mock answers every wait at once, so a timeout
/// race needs this instead.
#[derive(Debug, Default)]
pub struct SilentEdge {
    pub waits: usize,
}
impl ErrorType for SilentEdge {
    type Error = Infallible;
}
impl Wait for SilentEdge {
    async fn wait_for_high(&mut self) -> Result<(), Infallible> {
        self.wait_for_falling_edge().await
    }

    async fn wait_for_low(&mut self) -> Result<(), Infallible> {
        self.wait_for_falling_edge().await
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Infallible> {
        self.wait_for_falling_edge().await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Infallible> {
        self.waits += 1;
        core::future::pending().await
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Infallible> {
        self.wait_for_falling_edge().await
    }
}
