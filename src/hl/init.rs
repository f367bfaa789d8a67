use super::{Callbacks, DW3000};
use crate::{
    configs::Config,
    fmt::{debug, warn},
    ll::{
        regs::{self, clk_ctrl, sys_cfg, sys_status},
        SpiCrcMode,
    },
    maybe_async_attr, spi_type,
    variant::ChipVariant,
    Error,
};

/// Attempts made by the bounded status polls
const POLL_ATTEMPTS: u32 = 100;
/// Pause between two status polls, in microseconds
const POLL_STEP_US: u32 = 10;

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
    V: ChipVariant,
    CB: Callbacks,
{
    /// Initialize the DW3000
    ///
    /// Checks that the chip on the bus is the expected variant, then waits
    /// until it has reached IDLE_RC.
    #[maybe_async_attr]
    pub async fn init<D>(&mut self, delay: &mut D) -> Result<(), Error<SPI>>
    where
        D: spi_type::delay::DelayNs,
    {
        let dev_id = self.ll.read32(regs::DEV_ID, 0).await?;
        self.report_read_crc_errors();
        if !V::matches(dev_id) {
            warn!("unexpected device id {:#x} for {}", dev_id, V::NAME);
            return Err(Error::InitializationFailed);
        }

        self.wait_for_status(sys_status::RCINIT, delay).await?;
        debug!("{} in IDLE_RC", V::NAME);

        Ok(())
    }
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
    CB: Callbacks,
{
    /// Configure the radio
    ///
    /// Writes the channel, preamble, SFD, STS and PHR settings and caches
    /// what the TX/RX paths and the interrupt handler need to know. Nothing
    /// is written if the configuration is rejected.
    #[maybe_async_attr]
    pub async fn configure(&mut self, config: Config) -> Result<(), Error<SPI>> {
        if !config.is_valid() {
            return Err(Error::InvalidConfiguration);
        }

        let (and, or) = config.sys_cfg_masks();
        self.ll
            .modify::<u32>(regs::SYS_CFG, 0, and, or)
            .await?;
        self.ll
            .write16(regs::CHAN_CTRL, 0, config.chan_ctrl())
            .await?;
        self.ll
            .write16(regs::STS_CFG, 0, config.sts_cfg())
            .await?;
        self.enable_spi_crc(config.spi_crc).await?;

        self.local.channel = config.channel;
        self.local.sts_mode = config.sts_mode;
        self.local.sts_len = config.sts_len;
        self.local.dis_fce = config.disable_fce;
        self.local.zero_len_fce_good = config.zero_len_fce_good;
        self.local.set_phr_mode(config.phr_mode);

        debug!("configured {:?}", self.local);
        Ok(())
    }

    /// Switch the system clock to auto and wait for the PLL to lock
    #[maybe_async_attr]
    pub async fn lock_pll<D>(&mut self, delay: &mut D) -> Result<(), Error<SPI>>
    where
        D: spi_type::delay::DelayNs,
    {
        self.ll
            .modify::<u8>(
                regs::CLK_CTRL,
                0,
                !clk_ctrl::SYS_CLK_MASK,
                clk_ctrl::SYS_CLK_AUTO,
            )
            .await?;

        self.wait_for_status(sys_status::CPLOCK, delay).await
    }

    /// Turn SPI CRC on or off, on the chip and on the host
    ///
    /// The chip is updated first, so the write doing it still uses the
    /// previous mode.
    #[maybe_async_attr]
    pub async fn enable_spi_crc(&mut self, mode: SpiCrcMode) -> Result<(), Error<SPI>> {
        let (and, or) = match mode {
            SpiCrcMode::Disabled => (!sys_cfg::SPI_CRCEN, 0),
            SpiCrcMode::Write | SpiCrcMode::WriteRead => (u32::MAX, sys_cfg::SPI_CRCEN),
        };
        self.ll
            .modify::<u32>(regs::SYS_CFG, 0, and, or)
            .await?;
        self.ll.set_crc_mode(mode);

        Ok(())
    }

    #[maybe_async_attr]
    async fn wait_for_status<D>(&mut self, bits: u32, delay: &mut D) -> Result<(), Error<SPI>>
    where
        D: spi_type::delay::DelayNs,
    {
        for _ in 0..POLL_ATTEMPTS {
            let status = self.ll.read32(regs::SYS_STATUS, 0).await?;
            self.report_read_crc_errors();
            if status & bits == bits {
                return Ok(());
            }
            delay.delay_us(POLL_STEP_US).await;
        }

        warn!("timed out waiting for status {:#x}", bits);
        Err(Error::Timeout)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use embedded_hal_mock::eh1::spi::Mock as SpiMock;

    use crate::configs::{PhrMode, StsMode};
    use crate::hl::test_util::{read, write, CountingDelay};
    use crate::{hl::NoCallbacks, platform::NoIrqControl, variant::Dw3000};

    fn masked32(and: u32, or: u32) -> std::vec::Vec<u8> {
        [and.to_le_bytes(), or.to_le_bytes()].concat()
    }

    #[tokio::test]
    async fn init_waits_for_idle_rc() {
        let expectations = [
            read(&[0x00], &[0x02, 0x03, 0xCA, 0xDE]),
            read(&[0x41, 0x10], &[0x00, 0x00, 0x00, 0x00]),
            read(&[0x41, 0x10], &[0x00, 0x00, 0x80, 0x01]),
        ]
        .concat();
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        let mut delay = CountingDelay::default();
        dw3000.init(&mut delay).await.unwrap();
        assert_eq!(delay.calls, 1);

        spi.done();
    }

    #[tokio::test]
    async fn init_rejects_other_variant() {
        let expectations = read(&[0x00], &[0x04, 0x03, 0xCA, 0xDE]);
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        let result = dw3000.init(&mut CountingDelay::default()).await;
        assert!(matches!(result, Err(Error::InitializationFailed)));

        spi.done();
    }

    #[tokio::test]
    async fn pll_lock_gives_up() {
        let mut expectations = write(&[0xE2, 0x11], &[0xFC, 0x00]);
        for _ in 0..POLL_ATTEMPTS {
            expectations.extend(read(&[0x41, 0x10], &[0x00, 0x00, 0x00, 0x00]));
        }
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        let mut delay = CountingDelay::default();
        let result = dw3000.lock_pll(&mut delay).await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(delay.calls, POLL_ATTEMPTS);

        spi.done();
    }

    #[tokio::test]
    async fn configure_writes_and_caches() {
        let config = Config {
            phr_mode: PhrMode::Extended,
            sts_mode: StsMode::ModeNoData,
            disable_fce: true,
            zero_len_fce_good: true,
            ..Config::default()
        };
        let (and, or) = config.sys_cfg_masks();
        let expectations = [
            write(&[0xC0, 0x43], &masked32(and, or)),
            write(&[0xC2, 0x50], &config.chan_ctrl().to_le_bytes()),
            write(&[0x84], &config.sts_cfg().to_le_bytes()),
            write(&[0xC0, 0x43], &masked32(!sys_cfg::SPI_CRCEN, 0)),
        ]
        .concat();
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        dw3000.configure(config).await.unwrap();

        let local = dw3000.local_data();
        assert!(local.long_frames);
        assert!(local.dis_fce);
        assert!(local.zero_len_fce_good);
        assert_eq!(local.sts_mode, StsMode::ModeNoData);

        spi.done();
    }

    #[tokio::test]
    async fn invalid_configuration_writes_nothing() {
        let expectations: [embedded_hal_mock::eh1::spi::Transaction<u8>; 0] = [];
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        let config = Config {
            preamble_code: 0,
            ..Config::default()
        };
        let result = dw3000.configure(config).await;
        assert!(matches!(result, Err(Error::InvalidConfiguration)));

        spi.done();
    }

    #[tokio::test]
    async fn spi_crc_covers_writes_once_enabled() {
        let expectations = write(&[0xC0, 0x43], &masked32(u32::MAX, sys_cfg::SPI_CRCEN));
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        dw3000.enable_spi_crc(SpiCrcMode::Write).await.unwrap();
        assert_eq!(dw3000.ll().crc_mode(), SpiCrcMode::Write);

        spi.done();
    }
}
