use super::hw_def::*;
use super::*;

use crate::bus::{self, DEFAULT_BUS};
use crate::register;
use crate::sensor::{NotifyingSensor, Sensor};

use core::convert::Infallible;
use embedded_hal_async::{delay::DelayNs, i2c::I2c};

impl<'a, P, Delay, E> Bh1750<'a, P, Delay>
where
    P: BusProvider,
    P::Channel: I2c<Error = E>,
    Delay: DelayNs,
{
    /// Create a driver with the default configuration.
    ///
    /// Fails with [`Error::NotSupported`] when `provider` has no I²C capability.
    pub fn new(provider: P, delay: Delay) -> Result<Self, Error<E>> {
        Self::with_config(provider, delay, Bh1750Config::default())
    }

    /// Create a driver with `config`, which must be valid
    pub fn with_config(provider: P, delay: Delay, config: Bh1750Config) -> Result<Self, Error<E>> {
        bus::ensure_supported(&provider)?;
        config.validate()?;
        Ok(Self {
            provider,
            channel: None,
            delay,
            config,
            bus: DEFAULT_BUS,
            speed: BusSpeed::Fast,
            state: PowerState::PoweredDown,
            awaiting_grace: false,
            last_reading: None,
            publisher: None,
        })
    }

    /// Ask the provider for the controller named `bus` instead of the default
    pub fn on_bus(mut self, bus: &'static str) -> Self {
        self.bus = bus;
        self
    }

    /// Current settings
    pub fn config(&self) -> &Bh1750Config {
        &self.config
    }

    /// Power state as last commanded
    pub fn power_state(&self) -> PowerState {
        self.state
    }

    /// Whether continuous sampling is running
    pub fn is_continuous(&self) -> bool {
        self.state == PowerState::ContinuousRunning
    }

    /// Select the resolution of later measurements.
    ///
    /// While sampling continuously, continuous mode is stopped and restarted so the chip picks up
    /// the new resolution.
    pub async fn set_resolution(&mut self, resolution: Resolution) -> Result<(), Error<E>> {
        self.config.resolution = resolution;
        if self.is_continuous() {
            self.restart_continuous().await?;
        }
        Ok(())
    }

    /// Set the measurement time register, `31..=254`.
    ///
    /// Longer times raise sensitivity and lower the top of the range. When connected the value is
    /// sent to the chip at once, restarting continuous mode around it if it is running.
    pub async fn set_measurement_time(&mut self, measurement_time: u8) -> Result<(), Error<E>> {
        validate_measurement_time(measurement_time)?;
        self.config.measurement_time = measurement_time;
        if self.channel.is_none() {
            return Ok(());
        }

        let continuous = self.is_continuous();
        if continuous {
            self.stop_continuous().await?;
        }
        self.write_measurement_time().await?;
        if continuous {
            self.start_continuous().await?;
        }
        Ok(())
    }

    /// Change the continuous sampling period, at least 10 ms. Takes effect from the next tick.
    pub fn set_continuous_period(&mut self, period_ms: u32) -> Result<(), Error<E>> {
        validate_continuous_period(period_ms)?;
        self.config.continuous_period_ms = period_ms;
        Ok(())
    }

    /// Start or stop continuous sampling
    pub async fn set_continuous(&mut self, enabled: bool) -> Result<(), Error<E>> {
        if enabled == self.is_continuous() {
            return Ok(());
        }
        if self.channel.is_none() {
            return Err(Error::InvalidState);
        }
        if enabled {
            self.start_continuous().await
        } else {
            self.stop_continuous().await
        }
    }

    /// Wait for the next sampling time, then read and convert the data register.
    ///
    /// The first tick after continuous mode is armed waits a one second grace period; later ticks
    /// wait the configured period. A failed sample is logged and yields `Ok(None)`; the schedule
    /// carries on. Fails with [`Error::InvalidState`] when continuous mode is not running.
    pub async fn continuous_tick(&mut self) -> Result<Option<Illumination>, Error<E>> {
        if !self.is_continuous() {
            return Err(Error::InvalidState);
        }
        let wait_ms = if self.awaiting_grace {
            CONTINUOUS_GRACE_MS
        } else {
            self.config.continuous_period_ms
        };
        self.awaiting_grace = false;
        self.delay.delay_ms(wait_ms).await;

        match self.sample().await {
            Ok(reading) => Ok(Some(reading)),
            Err(_) => {
                warn!("bh1750: continuous sample failed, keeping last reading");
                Ok(None)
            }
        }
    }

    /// Run [`Self::continuous_tick`] forever. Returns only if continuous mode is not running.
    pub async fn run_continuous(&mut self) -> Result<Infallible, Error<E>> {
        loop {
            self.continuous_tick().await?;
        }
    }

    /// Power the chip down, stopping continuous sampling if it is running
    pub async fn power_down(&mut self) -> Result<(), Error<E>> {
        if self.is_continuous() {
            return self.stop_continuous().await;
        }
        self.command(OpCode::PowerDown).await?;
        self.state = PowerState::PoweredDown;
        Ok(())
    }

    /// Clear the data register. Not available while sampling continuously.
    pub async fn reset(&mut self) -> Result<(), Error<E>> {
        if self.is_continuous() {
            return Err(Error::InvalidState);
        }
        self.command(OpCode::PowerOn).await?;
        self.state = PowerState::Idle;
        self.command(OpCode::Reset).await?;
        self.power_down().await
    }

    /// Hand the channel back to the provider. Does nothing when already disconnected.
    ///
    /// No command is sent: stop continuous mode first to leave the chip powered down.
    pub fn disconnect(&mut self) {
        if let Some(channel) = self.channel.take() {
            self.provider.close(channel);
        }
        self.state = PowerState::PoweredDown;
        self.awaiting_grace = false;
    }

    /// Disconnect and give back the provider and delay
    pub fn release(mut self) -> (P, Delay) {
        self.disconnect();
        (self.provider, self.delay)
    }

    async fn command(&mut self, op: OpCode) -> Result<(), Error<E>> {
        self.raw_command(op.as_u8()).await
    }

    async fn raw_command(&mut self, byte: u8) -> Result<(), Error<E>> {
        let channel = self.channel.as_mut().ok_or(Error::InvalidState)?;
        trace!("bh1750: op-code 0x{:02x}", byte);
        register::write(channel, self.config.address.as_u8(), &[byte]).await
    }

    async fn write_measurement_time(&mut self) -> Result<(), Error<E>> {
        for byte in measurement_time_commands(self.config.measurement_time) {
            self.raw_command(byte).await?;
        }
        Ok(())
    }

    async fn handshake(&mut self) -> Result<(), Error<E>> {
        self.command(OpCode::PowerOn).await?;
        self.state = PowerState::Idle;
        self.write_measurement_time().await?;
        self.command(OpCode::PowerDown).await?;
        self.state = PowerState::PoweredDown;
        Ok(())
    }

    async fn start_continuous(&mut self) -> Result<(), Error<E>> {
        self.command(OpCode::PowerOn).await?;
        self.command(self.config.resolution.continuous_op()).await?;
        self.state = PowerState::ContinuousRunning;
        self.awaiting_grace = true;
        Ok(())
    }

    async fn stop_continuous(&mut self) -> Result<(), Error<E>> {
        self.command(OpCode::PowerDown).await?;
        self.awaiting_grace = false;
        self.state = PowerState::PoweredDown;
        Ok(())
    }

    async fn restart_continuous(&mut self) -> Result<(), Error<E>> {
        debug!("bh1750: restarting continuous mode");
        self.stop_continuous().await?;
        self.start_continuous().await
    }

    async fn read_counts(&mut self) -> Result<u16, Error<E>> {
        let channel = self.channel.as_mut().ok_or(Error::InvalidState)?;
        let mut buf = [0u8; 2];
        register::read(channel, self.config.address.as_u8(), &mut buf).await?;
        Ok(register::be_u16(&buf, 0))
    }

    /// Read the data register as it stands and convert it
    async fn sample(&mut self) -> Result<Illumination, Error<E>> {
        let counts = self.read_counts().await?;
        let reading = Illumination {
            lux: counts_to_lux(counts, self.config.resolution, self.config.measurement_time),
        };
        self.record(reading);
        Ok(reading)
    }

    async fn one_shot(&mut self) -> Result<Illumination, Error<E>> {
        let resolution = self.config.resolution;
        self.command(OpCode::PowerOn).await?;
        self.state = PowerState::Idle;
        self.command(resolution.one_time_op()).await?;
        self.state = PowerState::OneShotPending;
        self.delay.delay_ms(resolution.conversion_ms()).await;
        let reading = self.sample().await?;
        self.command(OpCode::PowerDown).await?;
        self.state = PowerState::PoweredDown;
        Ok(reading)
    }

    fn record(&mut self, reading: Illumination) {
        let changed = self.last_reading.is_none_or(|last| last.differs_from(&reading));
        if changed {
            self.last_reading = Some(reading);
            if let Some(publisher) = &self.publisher {
                publisher.publish_immediate(reading);
            }
        }
    }
}

impl<'a, P, Delay, E> Sensor for Bh1750<'a, P, Delay>
where
    P: BusProvider,
    P::Channel: I2c<Error = E>,
    Delay: DelayNs,
{
    type Reading = Illumination;
    type Error = Error<E>;

    async fn connect(&mut self) -> Result<bool, Error<E>> {
        if self.channel.is_some() {
            return Ok(true);
        }
        let address = self.config.address.as_u8();
        let channel = match bus::open_channel(&mut self.provider, self.bus, address, self.speed) {
            Ok(channel) => channel,
            Err(Error::BusNotFound) => return Ok(false),
            Err(e) => return Err(e),
        };
        self.channel = Some(channel);

        match self.handshake().await {
            Ok(()) => {
                info!("bh1750: connected at 0x{:02x}", address);
                Ok(true)
            }
            Err(_) => {
                warn!("bh1750: no answer at 0x{:02x}", address);
                self.disconnect();
                Ok(false)
            }
        }
    }

    fn connected(&self) -> bool {
        self.channel.is_some()
    }

    /// One-shot measurement, or the cached reading while sampling continuously
    async fn read(&mut self) -> Result<Illumination, Error<E>> {
        if self.channel.is_none() {
            return Err(Error::InvalidState);
        }
        if self.is_continuous() {
            return match self.last_reading {
                Some(reading) => Ok(reading),
                None => self.sample().await,
            };
        }
        self.one_shot().await
    }
}

impl<'a, P, Delay, E> NotifyingSensor<'a> for Bh1750<'a, P, Delay>
where
    P: BusProvider,
    P::Channel: I2c<Error = E>,
    Delay: DelayNs,
{
    fn last_reading(&self) -> Option<Illumination> {
        self.last_reading
    }

    fn notify_to(&mut self, publisher: DynPublisher<'a, Illumination>) {
        self.publisher = Some(publisher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SingleBus;
    use crate::test_support::delays_ms;

    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_sync::pubsub::PubSubChannel;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::delay::{CheckedDelay, NoopDelay};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};
    use float_cmp::approx_eq;

    const ADDR: u8 = 0x23;

    type TestBh1750<'a> = Bh1750<'a, SingleBus<I2cMock>, CheckedDelay>;

    fn op(byte: u8) -> Transaction {
        Transaction::write(ADDR, vec![byte])
    }

    fn with_connect(rest: Vec<Transaction>) -> Vec<Transaction> {
        let mut expectations = vec![op(0x01), op(0x42), op(0x65), op(0x00)];
        expectations.extend(rest);
        expectations
    }

    fn sensor<'a>(expectations: &[Transaction], delays: &[u32]) -> TestBh1750<'a> {
        let delay = CheckedDelay::new(&delays_ms(delays));
        Bh1750::new(SingleBus::new(I2cMock::new(expectations)), delay).unwrap()
    }

    fn finish(sensor: TestBh1750<'_>) {
        let (bus, mut delay) = sensor.release();
        bus.into_inner().unwrap().done();
        delay.done();
    }

    #[test]
    fn lux_formula() {
        assert!(approx_eq!(f64, counts_to_lux(1200, Resolution::High, 69), 1000.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, counts_to_lux(1200, Resolution::Low, 69), 1000.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, counts_to_lux(1200, Resolution::VeryHigh, 69), 500.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, counts_to_lux(1200, Resolution::High, 138), 500.0, epsilon = 1e-9));
    }

    #[test]
    fn lux_is_monotonic_in_counts() {
        for mt in [MIN_MEASUREMENT_TIME, DEFAULT_MEASUREMENT_TIME, MAX_MEASUREMENT_TIME] {
            let mut previous = -1.0;
            for counts in (0..=u16::MAX).step_by(257) {
                let lux = counts_to_lux(counts, Resolution::High, mt);
                assert!(lux > previous);
                previous = lux;
            }
        }
    }

    #[test]
    fn measurement_time_is_split_in_two_op_codes() {
        assert_eq!(measurement_time_commands(69), [0x42, 0x65]);
        assert_eq!(measurement_time_commands(254), [0x47, 0x7E]);
        assert_eq!(measurement_time_commands(31), [0x40, 0x7F]);
    }

    #[test]
    fn read_before_connect_is_invalid_state() {
        let mut bh1750 = sensor(&[], &[]);
        assert!(!bh1750.connected());
        assert_eq!(block_on(bh1750.read()), Err(Error::InvalidState));
        finish(bh1750);
    }

    #[test]
    fn one_shot_high_resolution() {
        let expectations = with_connect(vec![
            op(0x01),
            op(0x20),
            Transaction::read(ADDR, vec![0x01, 0x2C]),
            op(0x00),
        ]);
        let mut bh1750 = sensor(&expectations, &[HIGH_RES_CONVERSION_MS]);
        assert_eq!(block_on(bh1750.connect()), Ok(true));
        assert_eq!(block_on(bh1750.connect()), Ok(true));

        let reading = block_on(bh1750.read()).unwrap();
        assert!(approx_eq!(f64, reading.lux, 250.0, epsilon = 1e-9));
        assert_eq!(bh1750.power_state(), PowerState::PoweredDown);
        assert_eq!(bh1750.last_reading(), Some(reading));
        finish(bh1750);
    }

    #[test]
    fn one_shot_low_resolution_waits_less() {
        let expectations = with_connect(vec![
            op(0x01),
            op(0x23),
            Transaction::read(ADDR, vec![0x00, 0x0C]),
            op(0x00),
        ]);
        let mut bh1750 = sensor(&expectations, &[LOW_RES_CONVERSION_MS]);
        block_on(bh1750.connect()).unwrap();
        block_on(bh1750.set_resolution(Resolution::Low)).unwrap();
        let reading = block_on(bh1750.read()).unwrap();
        assert!(approx_eq!(f64, reading.lux, 10.0, epsilon = 1e-9));
        finish(bh1750);
    }

    #[test]
    fn silent_chip_does_not_connect() {
        let expectations = [op(0x01).with_error(ErrorKind::Other)];
        let mut bh1750 = sensor(&expectations, &[]);
        assert_eq!(block_on(bh1750.connect()), Ok(false));
        assert!(!bh1750.connected());
        finish(bh1750);
    }

    #[test]
    fn unsupported_host_fails_construction() {
        let res = Bh1750::new(crate::bus::NoBus, NoopDelay::new());
        assert!(matches!(res, Err(Error::NotSupported)));
    }

    #[test]
    fn setters_reject_out_of_range_without_io() {
        let mut bh1750 = sensor(&with_connect(vec![]), &[]);
        block_on(bh1750.connect()).unwrap();
        assert_eq!(block_on(bh1750.set_measurement_time(30)), Err(Error::ArgumentRange));
        assert_eq!(block_on(bh1750.set_measurement_time(255)), Err(Error::ArgumentRange));
        assert_eq!(bh1750.set_continuous_period(9), Err(Error::ArgumentRange));
        assert_eq!(bh1750.config().measurement_time, DEFAULT_MEASUREMENT_TIME);
        assert_eq!(bh1750.config().continuous_period_ms, DEFAULT_CONTINUOUS_PERIOD_MS);
        assert_eq!(bh1750.set_continuous_period(10), Ok(()));
        finish(bh1750);
    }

    #[test]
    fn measurement_time_scales_lux() {
        let expectations = with_connect(vec![
            op(0x47),
            op(0x7E),
            op(0x01),
            op(0x20),
            Transaction::read(ADDR, vec![0x01, 0x2C]),
            op(0x00),
        ]);
        let mut bh1750 = sensor(&expectations, &[HIGH_RES_CONVERSION_MS]);
        block_on(bh1750.connect()).unwrap();
        block_on(bh1750.set_measurement_time(254)).unwrap();
        let reading = block_on(bh1750.read()).unwrap();
        assert!(approx_eq!(f64, reading.lux, 250.0 * 69.0 / 254.0, epsilon = 1e-9));
        finish(bh1750);
    }

    #[test]
    fn continuous_mode_ticks_and_notifies_changes_only() {
        let channel: PubSubChannel<NoopRawMutex, Illumination, 4, 1, 1> = PubSubChannel::new();
        let mut subscriber = channel.dyn_subscriber().unwrap();

        let expectations = with_connect(vec![
            op(0x01),
            op(0x10),
            Transaction::read(ADDR, vec![0x00, 0x78]),
            Transaction::read(ADDR, vec![0x00, 0x78]),
            Transaction::read(ADDR, vec![0x00, 0x00]).with_error(ErrorKind::Other),
            Transaction::read(ADDR, vec![0x00, 0xF0]),
            op(0x00),
        ]);
        let mut bh1750 = sensor(&expectations, &[CONTINUOUS_GRACE_MS, 250, 250, 250]);
        bh1750.notify_to(channel.dyn_publisher().unwrap());
        block_on(bh1750.connect()).unwrap();
        bh1750.set_continuous_period(250).unwrap();
        block_on(bh1750.set_continuous(true)).unwrap();
        assert!(bh1750.is_continuous());

        let first = block_on(bh1750.continuous_tick()).unwrap().unwrap();
        assert!(approx_eq!(f64, first.lux, 100.0, epsilon = 1e-9));
        // cached, no bus traffic
        assert_eq!(block_on(bh1750.read()), Ok(first));
        assert!(block_on(bh1750.continuous_tick()).unwrap().is_some());
        assert_eq!(block_on(bh1750.continuous_tick()), Ok(None));
        let last = block_on(bh1750.continuous_tick()).unwrap().unwrap();
        assert!(approx_eq!(f64, last.lux, 200.0, epsilon = 1e-9));

        block_on(bh1750.set_continuous(false)).unwrap();
        assert_eq!(bh1750.power_state(), PowerState::PoweredDown);
        assert_eq!(block_on(bh1750.continuous_tick()), Err(Error::InvalidState));

        assert_eq!(subscriber.try_next_message_pure(), Some(first));
        assert_eq!(subscriber.try_next_message_pure(), Some(last));
        assert_eq!(subscriber.try_next_message_pure(), None);
        finish(bh1750);
    }

    #[test]
    fn resolution_change_restarts_continuous_mode_once() {
        let expectations = with_connect(vec![
            op(0x01),
            op(0x10),
            Transaction::read(ADDR, vec![0x00, 0x78]),
            op(0x00),
            op(0x01),
            op(0x11),
            Transaction::read(ADDR, vec![0x00, 0x78]),
        ]);
        // re-arming restarts the grace period
        let mut bh1750 = sensor(&expectations, &[CONTINUOUS_GRACE_MS, CONTINUOUS_GRACE_MS]);
        block_on(bh1750.connect()).unwrap();
        block_on(bh1750.set_continuous(true)).unwrap();
        block_on(bh1750.continuous_tick()).unwrap();

        block_on(bh1750.set_resolution(Resolution::VeryHigh)).unwrap();
        assert!(bh1750.is_continuous());
        let reading = block_on(bh1750.continuous_tick()).unwrap().unwrap();
        assert!(approx_eq!(f64, reading.lux, 50.0, epsilon = 1e-9));
        finish(bh1750);
    }

    #[test]
    fn measurement_time_change_restarts_continuous_mode() {
        let expectations = with_connect(vec![
            op(0x01),
            op(0x10),
            op(0x00),
            op(0x43),
            op(0x6A),
            op(0x01),
            op(0x10),
        ]);
        let mut bh1750 = sensor(&expectations, &[]);
        block_on(bh1750.connect()).unwrap();
        block_on(bh1750.set_continuous(true)).unwrap();
        block_on(bh1750.set_measurement_time(106)).unwrap();
        assert!(bh1750.is_continuous());
        finish(bh1750);
    }

    #[test]
    fn continuous_mode_needs_connection() {
        let mut bh1750 = sensor(&[], &[]);
        assert_eq!(block_on(bh1750.set_continuous(true)), Err(Error::InvalidState));
        assert_eq!(block_on(bh1750.set_continuous(false)), Ok(()));
        finish(bh1750);
    }

    #[test]
    fn failed_power_down_keeps_continuous_mode() {
        let expectations = with_connect(vec![
            op(0x01),
            op(0x10),
            op(0x00).with_error(ErrorKind::Other),
            op(0x00),
        ]);
        let mut bh1750 = sensor(&expectations, &[]);
        block_on(bh1750.connect()).unwrap();
        block_on(bh1750.set_continuous(true)).unwrap();

        assert_eq!(block_on(bh1750.set_continuous(false)), Err(Error::I2c(ErrorKind::Other)));
        assert_eq!(bh1750.power_state(), PowerState::ContinuousRunning);

        block_on(bh1750.power_down()).unwrap();
        assert_eq!(bh1750.power_state(), PowerState::PoweredDown);
        finish(bh1750);
    }

    #[test]
    fn failed_one_shot_reports_last_commanded_state() {
        let expectations = with_connect(vec![
            op(0x01),
            op(0x20),
            Transaction::read(ADDR, vec![0x00, 0x00]).with_error(ErrorKind::Other),
            op(0x01),
            op(0x20),
            Transaction::read(ADDR, vec![0x01, 0x2C]),
            op(0x00).with_error(ErrorKind::Other),
        ]);
        let mut bh1750 = sensor(&expectations, &[HIGH_RES_CONVERSION_MS, HIGH_RES_CONVERSION_MS]);
        block_on(bh1750.connect()).unwrap();

        assert_eq!(block_on(bh1750.read()), Err(Error::I2c(ErrorKind::Other)));
        assert_eq!(bh1750.power_state(), PowerState::OneShotPending);

        // the power-down after a good sample fails: the chip was never told to power down
        assert_eq!(block_on(bh1750.read()), Err(Error::I2c(ErrorKind::Other)));
        assert_eq!(bh1750.power_state(), PowerState::OneShotPending);
        assert!(bh1750.last_reading().is_some());
        finish(bh1750);
    }
}
