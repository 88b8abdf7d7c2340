use super::hw_def::*;
use super::*;

use crate::Error;
use crate::bus::{self, DEFAULT_BUS};
use crate::sensor::Sensor;

use embassy_futures::select::{Either, select};
use embedded_hal_async::{delay::DelayNs, i2c::I2c};

impl<P, Delay, E> Hmc5883l<P, Delay, NoDataReady>
where
    P: BusProvider,
    P::Channel: I2c<Error = E>,
    Delay: DelayNs,
{
    /// Create a driver without a data-ready line, with the default configuration.
    ///
    /// Every reading waits a fixed settle time for the measurement to complete.
    pub fn new(provider: P, delay: Delay) -> Result<Self, Error<E>> {
        Self::with_config(provider, delay, Hmc5883lConfig::default())
    }

    /// Create a driver without a data-ready line
    pub fn with_config(provider: P, delay: Delay, config: Hmc5883lConfig) -> Result<Self, Error<E>> {
        Self::build(provider, delay, None, config)
    }
}

impl<P, Delay, DRDY, E> Hmc5883l<P, Delay, DRDY>
where
    P: BusProvider,
    P::Channel: I2c<Error = E>,
    Delay: DelayNs,
    DRDY: Wait,
{
    /// Create a driver that waits for the falling edge of `data_ready` after each measurement
    pub fn with_data_ready(
        provider: P,
        delay: Delay,
        data_ready: DRDY,
        config: Hmc5883lConfig,
    ) -> Result<Self, Error<E>> {
        Self::build(provider, delay, Some(data_ready), config)
    }

    fn build(provider: P, delay: Delay, data_ready: Option<DRDY>, config: Hmc5883lConfig) -> Result<Self, Error<E>> {
        bus::ensure_supported(&provider)?;
        Ok(Self {
            provider,
            channel: None,
            delay,
            data_ready,
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
    pub fn config(&self) -> &Hmc5883lConfig {
        &self.config
    }

    /// Change the measurement range. Applied to the chip at once when connected.
    pub async fn set_gain(&mut self, gain: Gain) -> Result<(), Error<E>> {
        self.config.gain = gain;
        if let Some(channel) = self.channel.as_mut() {
            register::write_register(channel, ADDRESS, REG_CONFIG_B, &[self.config.config_b()]).await?;
        }
        Ok(())
    }

    /// Change sample averaging and output rate. Applied to the chip at once when connected.
    pub async fn set_sampling(&mut self, averaging: Averaging, data_rate: DataRate) -> Result<(), Error<E>> {
        self.config.averaging = averaging;
        self.config.data_rate = data_rate;
        if let Some(channel) = self.channel.as_mut() {
            let config_a = self.config.config_a(BIAS_NONE);
            register::write_register(channel, ADDRESS, REG_CONFIG_A, &[config_a]).await?;
        }
        Ok(())
    }

    /// Hand the channel back to the provider. Does nothing when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(channel) = self.channel.take() {
            self.provider.close(channel);
        }
    }

    /// Disconnect and give back the provider, delay and data-ready line
    pub fn release(mut self) -> (P, Delay, Option<DRDY>) {
        self.disconnect();
        (self.provider, self.delay, self.data_ready)
    }

    async fn write(&mut self, reg: u8, value: u8) -> Result<(), Error<E>> {
        let channel = self.channel.as_mut().ok_or(Error::InvalidState)?;
        register::write_register(channel, ADDRESS, reg, &[value]).await
    }

    async fn read_register(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Error<E>> {
        let channel = self.channel.as_mut().ok_or(Error::InvalidState)?;
        register::write_read(channel, ADDRESS, reg, buf).await
    }

    async fn identify(&mut self) -> Result<(), Error<E>> {
        let mut id = [0u8; 3];
        self.read_register(REG_ID_A, &mut id).await?;
        if id == ID {
            Ok(())
        } else {
            warn!("hmc5883l: unexpected id {:?}", id);
            Err(Error::CommunicationFailure)
        }
    }

    /// Positive-bias self-test, escalating the gain until all three axes are within limits.
    /// Runs at fixed sampling settings whatever is configured, and leaves the chip biased;
    /// [`Self::restore`] undoes that.
    async fn self_test(&mut self) -> Result<bool, Error<E>> {
        self.write(REG_CONFIG_A, SELF_TEST_CONFIG_A).await?;
        self.write(REG_MODE, MODE_CONTINUOUS).await?;

        for gain in SELF_TEST_GAINS {
            self.write(REG_CONFIG_B, gain_bits(gain)).await?;
            self.delay.delay_ms(SELF_TEST_PERIOD_MS).await;

            let mut data = [0u8; 6];
            self.read_register(REG_DATA, &mut data).await?;
            let axes = [register::be_i16(&data, 0), register::be_i16(&data, 2), register::be_i16(&data, 4)];
            trace!("hmc5883l: self-test gain {} counts {:?}", gain, axes);
            if axes.iter().all(|&count| within_self_test_limits(count, gain)) {
                debug!("hmc5883l: self-test passed at gain {}", gain);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Normal measurement mode, configured gain, idle
    async fn restore(&mut self) -> Result<(), Error<E>> {
        self.write(REG_CONFIG_A, self.config.config_a(BIAS_NONE)).await?;
        self.write(REG_CONFIG_B, self.config.config_b()).await?;
        self.write(REG_MODE, MODE_IDLE).await
    }
}

impl<P, Delay, DRDY, E> Sensor for Hmc5883l<P, Delay, DRDY>
where
    P: BusProvider,
    P::Channel: I2c<Error = E>,
    Delay: DelayNs,
    DRDY: Wait,
{
    type Reading = MagneticField;
    type Error = Error<E>;

    /// Identify the chip and self-test it. A chip that fails the self-test at every gain is an
    /// error, [`Error::SelfTestFailure`], rather than `Ok(false)`.
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

        if self.identify().await.is_err() {
            warn!("hmc5883l: handshake failed");
            self.disconnect();
            return Ok(false);
        }

        let tested = self.self_test().await;
        let restored = self.restore().await;
        match (tested, restored) {
            (Ok(true), Ok(())) => {
                info!("hmc5883l: connected");
                Ok(true)
            }
            (Ok(false), _) => {
                warn!("hmc5883l: self-test failed at every gain");
                self.disconnect();
                Err(Error::SelfTestFailure)
            }
            _ => {
                warn!("hmc5883l: bus error during self-test");
                self.disconnect();
                Ok(false)
            }
        }
    }

    fn connected(&self) -> bool {
        self.channel.is_some()
    }

    async fn read(&mut self) -> Result<MagneticField, Error<E>> {
        let channel = self.channel.as_mut().ok_or(Error::InvalidState)?;
        register::write_register(channel, ADDRESS, REG_MODE, &[MODE_SINGLE]).await?;

        match self.data_ready.as_mut() {
            Some(pin) => match select(pin.wait_for_falling_edge(), self.delay.delay_ms(DATA_READY_TIMEOUT_MS)).await {
                Either::First(Ok(())) => {}
                Either::First(Err(_)) => return Err(Error::Gpio),
                Either::Second(()) => {
                    warn!("hmc5883l: no data-ready edge");
                    return Err(Error::Timeout);
                }
            },
            None => self.delay.delay_ms(SINGLE_SHOT_SETTLE_MS).await,
        }

        let mut buf = [0u8; SAMPLE_LEN];
        register::write_read(channel, ADDRESS, REG_CONFIG_B, &mut buf).await?;
        if [2, 4, 6].iter().any(|&offset| register::be_i16(&buf, offset) == AXIS_OVERFLOW) {
            warn!("hmc5883l: axis out of range, consider a lower gain");
        }
        Ok(decode_sample(&buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SingleBus;
    use crate::test_support::{SilentEdge, delays_ms};

    use embassy_futures::block_on;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::MockError;
    use embedded_hal_mock::eh1::delay::CheckedDelay;
    use embedded_hal_mock::eh1::digital::{Edge, Mock as PinMock, Transaction as PinTransaction};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};
    use float_cmp::approx_eq;

    type Polled = Hmc5883l<SingleBus<I2cMock>, CheckedDelay>;

    fn write(reg: u8, value: u8) -> Transaction {
        Transaction::write(ADDRESS, vec![reg, value])
    }

    fn identify() -> Transaction {
        Transaction::write_read(ADDRESS, vec![REG_ID_A], ID.to_vec())
    }

    /// Self-test level reading `count` on every axis
    fn self_test_level(gain: u8, count: i16) -> Vec<Transaction> {
        let [hi, lo] = count.to_be_bytes();
        vec![
            write(REG_CONFIG_B, gain_bits(gain)),
            Transaction::write_read(ADDRESS, vec![REG_DATA], vec![hi, lo, hi, lo, hi, lo]),
        ]
    }

    fn restore() -> Vec<Transaction> {
        vec![write(REG_CONFIG_A, 0x70), write(REG_CONFIG_B, 0x20), write(REG_MODE, MODE_IDLE)]
    }

    fn self_test_start() -> Vec<Transaction> {
        vec![identify(), write(REG_CONFIG_A, 0x71), write(REG_MODE, MODE_CONTINUOUS)]
    }

    /// Handshake where the self-test passes at the first gain
    fn handshake() -> Vec<Transaction> {
        let mut t = self_test_start();
        t.extend(self_test_level(5, 400));
        t.extend(restore());
        t
    }

    fn sample() -> Vec<Transaction> {
        vec![
            write(REG_MODE, MODE_SINGLE),
            Transaction::write_read(
                ADDRESS,
                vec![REG_CONFIG_B],
                vec![0x20, 0x03, 0x04, 0x42, 0xFD, 0xDF, 0x00, 0xDA],
            ),
        ]
    }

    fn polled(expectations: &[Transaction], delays: &[u32]) -> Polled {
        let delay = CheckedDelay::new(&delays_ms(delays));
        Hmc5883l::new(SingleBus::new(I2cMock::new(expectations)), delay).unwrap()
    }

    fn interrupt<DRDY: Wait>(
        expectations: &[Transaction],
        delays: &[u32],
        data_ready: DRDY,
    ) -> Hmc5883l<SingleBus<I2cMock>, CheckedDelay, DRDY> {
        Hmc5883l::with_data_ready(
            SingleBus::new(I2cMock::new(expectations)),
            CheckedDelay::new(&delays_ms(delays)),
            data_ready,
            Hmc5883lConfig::default(),
        )
        .unwrap()
    }

    fn finish<DRDY: Wait>(sensor: Hmc5883l<SingleBus<I2cMock>, CheckedDelay, DRDY>) -> Option<DRDY> {
        let (bus, mut delay, data_ready) = sensor.release();
        bus.into_inner().unwrap().done();
        delay.done();
        data_ready
    }

    #[test]
    fn self_test_passes_at_first_gain() {
        let mut hmc = polled(&handshake(), &[SELF_TEST_PERIOD_MS]);
        assert_eq!(block_on(hmc.connect()), Ok(true));
        assert!(hmc.connected());
        finish(hmc);
    }

    #[test]
    fn self_test_ignores_configured_sampling() {
        let config = Hmc5883lConfig { averaging: Averaging::One, data_rate: DataRate::Hz75, ..Default::default() };
        let mut expectations = self_test_start();
        expectations.extend(self_test_level(5, 400));
        expectations.extend([write(REG_CONFIG_A, 0x18), write(REG_CONFIG_B, 0x20), write(REG_MODE, MODE_IDLE)]);
        let delay = CheckedDelay::new(&delays_ms(&[SELF_TEST_PERIOD_MS]));
        let mut hmc = Hmc5883l::with_config(SingleBus::new(I2cMock::new(&expectations)), delay, config).unwrap();
        assert_eq!(block_on(hmc.connect()), Ok(true));
        finish(hmc);
    }

    #[test]
    fn self_test_escalates_gain() {
        let mut expectations = self_test_start();
        expectations.extend(self_test_level(5, 150));
        expectations.extend(self_test_level(6, 150));
        expectations.extend(self_test_level(7, 150));
        expectations.extend(restore());
        let mut hmc = polled(&expectations, &[SELF_TEST_PERIOD_MS; 3]);
        assert_eq!(block_on(hmc.connect()), Ok(true));
        finish(hmc);
    }

    #[test]
    fn self_test_failure_restores_chip_and_disconnects() {
        let mut expectations = self_test_start();
        expectations.extend(self_test_level(5, 1000));
        expectations.extend(self_test_level(6, 1000));
        expectations.extend(self_test_level(7, 1000));
        expectations.extend(restore());
        let mut hmc = polled(&expectations, &[SELF_TEST_PERIOD_MS; 3]);
        assert_eq!(block_on(hmc.connect()), Err(Error::SelfTestFailure));
        assert!(!hmc.connected());
        finish(hmc);
    }

    #[test]
    fn bus_error_during_self_test_still_restores() {
        let expectations = [
            identify(),
            write(REG_CONFIG_A, 0x71),
            write(REG_MODE, MODE_CONTINUOUS).with_error(ErrorKind::Other),
            write(REG_CONFIG_A, 0x70),
            write(REG_CONFIG_B, 0x20),
            write(REG_MODE, MODE_IDLE),
        ];
        let mut hmc = polled(&expectations, &[]);
        assert_eq!(block_on(hmc.connect()), Ok(false));
        assert!(!hmc.connected());
        finish(hmc);
    }

    #[test]
    fn wrong_id_does_not_connect() {
        let expectations = [Transaction::write_read(ADDRESS, vec![REG_ID_A], b"H42".to_vec())];
        let mut hmc = polled(&expectations, &[]);
        assert_eq!(block_on(hmc.connect()), Ok(false));
        assert_eq!(block_on(hmc.read()), Err(Error::InvalidState));
        finish(hmc);
    }

    #[test]
    fn polled_read_waits_settle_time() {
        let mut expectations = handshake();
        expectations.extend(sample());
        let mut hmc = polled(&expectations, &[SELF_TEST_PERIOD_MS, SINGLE_SHOT_SETTLE_MS]);
        block_on(hmc.connect()).unwrap();

        let field = block_on(hmc.read()).unwrap();
        assert!(approx_eq!(f64, field.x, 100.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, field.y, 20.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, field.z, -50.0, epsilon = 1e-9));
        finish(hmc);
    }

    #[test]
    fn interrupt_read_completes_on_edge() {
        let mut expectations = handshake();
        expectations.extend(sample());
        // the timeout never starts
        let edge = PinMock::new(&[PinTransaction::wait_for_edge(Edge::Falling)]);
        let mut hmc = interrupt(&expectations, &[SELF_TEST_PERIOD_MS], edge);
        block_on(hmc.connect()).unwrap();

        let field = block_on(hmc.read()).unwrap();
        assert!(approx_eq!(f64, field.x, 100.0, epsilon = 1e-9));
        finish(hmc).unwrap().done();
    }

    #[test]
    fn data_ready_pin_error_fails_the_read() {
        let mut expectations = handshake();
        expectations.push(write(REG_MODE, MODE_SINGLE));
        let edge = PinMock::new(&[
            PinTransaction::wait_for_edge(Edge::Falling).with_error(MockError::Io(std::io::ErrorKind::Other)),
        ]);
        let mut hmc = interrupt(&expectations, &[SELF_TEST_PERIOD_MS], edge);
        block_on(hmc.connect()).unwrap();

        assert_eq!(block_on(hmc.read()), Err(Error::Gpio));
        finish(hmc).unwrap().done();
    }

    #[test]
    fn interrupt_read_times_out_without_edge() {
        let mut expectations = handshake();
        expectations.push(write(REG_MODE, MODE_SINGLE));
        let delays = [SELF_TEST_PERIOD_MS, DATA_READY_TIMEOUT_MS];
        let mut hmc = interrupt(&expectations, &delays, SilentEdge::default());
        block_on(hmc.connect()).unwrap();

        assert_eq!(block_on(hmc.read()), Err(Error::Timeout));
        assert!(hmc.connected());
        assert_eq!(finish(hmc).map(|edge| edge.waits), Some(1));
    }

    #[test]
    fn set_gain_writes_config_b_when_connected() {
        let mut expectations = handshake();
        expectations.push(write(REG_CONFIG_B, 0xE0));
        expectations.push(write(REG_CONFIG_A, 0x10));
        let mut hmc = polled(&expectations, &[SELF_TEST_PERIOD_MS]);
        block_on(hmc.set_gain(Gain::Ga1_3)).unwrap();
        block_on(hmc.connect()).unwrap();
        block_on(hmc.set_gain(Gain::Ga8_1)).unwrap();
        block_on(hmc.set_sampling(Averaging::One, DataRate::Hz15)).unwrap();
        assert_eq!(hmc.config().gain, Gain::Ga8_1);
        finish(hmc);
    }
}
