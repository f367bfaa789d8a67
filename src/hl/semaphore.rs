//! Dual SPI host arbitration and power commands
//!
//! Chips with two SPI interfaces arbitrate between the hosts with a
//! semaphore. This is independent of the interrupt masking the driver does
//! around its own register updates.

#[cfg(feature = "defmt")]
use defmt::Format;

use super::{Callbacks, DW3000};
use crate::{
    fast_command::FastCommand,
    fmt::debug,
    ll::{
        regs::{self, spi_sem},
        SpiCrcMode,
    },
    maybe_async_attr, spi_type, Error,
};

/// One of the two SPI host interfaces
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum SpiHost {
    /// SPI1
    Spi1,
    /// SPI2
    Spi2,
}

impl SpiHost {
    fn sleep_inhibit_bit(self) -> u8 {
        match self {
            SpiHost::Spi1 => spi_sem::SPI1_SLEEP_INHIBIT,
            SpiHost::Spi2 => spi_sem::SPI2_SLEEP_INHIBIT,
        }
    }
}

/// Content of the SPI semaphore register
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct SemaphoreStatus(pub u16);

impl SemaphoreStatus {
    /// Which host holds the semaphore, if any
    pub fn owner(&self) -> Option<SpiHost> {
        match self.0 as u8 & spi_sem::TX_OWNER_MASK {
            1 => Some(SpiHost::Spi1),
            2 => Some(SpiHost::Spi2),
            _ => None,
        }
    }

    /// The status octet, as reported in dual SPI events
    pub fn dss_stat(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Whether the semaphore became available to `host`
    pub fn available_to(&self, host: SpiHost) -> bool {
        let bit = match host {
            SpiHost::Spi1 => spi_sem::SPI1MAVAIL,
            SpiHost::Spi2 => spi_sem::SPI2MAVAIL,
        };
        self.dss_stat() & bit != 0
    }

    /// Whether `host` keeps the chip from going to sleep
    pub fn sleep_inhibited_by(&self, host: SpiHost) -> bool {
        self.dss_stat() & host.sleep_inhibit_bit() != 0
    }
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
    CB: Callbacks,
{
    /// Ask for the SPI semaphore
    ///
    /// Check [`DW3000::semaphore_status`] to see whether it was granted.
    #[maybe_async_attr]
    pub async fn request_semaphore(&mut self) -> Result<(), Error<SPI>> {
        self.fast_cmd(FastCommand::SemaphoreRequest).await
    }

    /// Give the SPI semaphore back
    #[maybe_async_attr]
    pub async fn release_semaphore(&mut self) -> Result<(), Error<SPI>> {
        self.fast_cmd(FastCommand::SemaphoreRelease).await
    }

    /// Take the SPI semaphore from the other host
    ///
    /// Only honoured when sent on SPI2.
    #[maybe_async_attr]
    pub async fn force_semaphore(&mut self) -> Result<(), Error<SPI>> {
        self.fast_cmd(FastCommand::SemaphoreForce).await
    }

    #[maybe_async_attr]
    pub async fn semaphore_status(&mut self) -> Result<SemaphoreStatus, Error<SPI>> {
        let raw = self.ll.read16(regs::SPI_SEM, 0).await?;
        self.report_read_crc_errors();
        Ok(SemaphoreStatus(raw))
    }

    /// Keep the chip awake on behalf of `host`, or stop doing so
    #[maybe_async_attr]
    pub async fn set_sleep_inhibit(&mut self, host: SpiHost, inhibit: bool) -> Result<(), Error<SPI>> {
        let bit = host.sleep_inhibit_bit();
        let or = if inhibit { bit } else { 0 };
        self.ll
            .modify::<u8>(regs::SPI_SEM, spi_sem::STATUS_OFFSET, !bit, or)
            .await?;
        Ok(())
    }

    /// Reset the chip through a fast command
    ///
    /// With `with_semaphore`, the reset only happens if this host holds the
    /// semaphore. All cached state returns to its power-on value, including
    /// SPI CRC, which the chip turns off.
    #[maybe_async_attr]
    pub async fn soft_reset(&mut self, with_semaphore: bool) -> Result<(), Error<SPI>> {
        let command = if with_semaphore {
            FastCommand::SemaphoreReset
        } else {
            FastCommand::SemaphoreResetNoSema
        };
        self.fast_cmd(command).await?;

        debug!("soft reset issued");
        self.reset_buffer_access();
        self.ll.set_crc_mode(SpiCrcMode::Disabled);

        Ok(())
    }

    /// Put the chip to sleep as configured in AON
    #[maybe_async_attr]
    pub async fn enter_sleep(&mut self) -> Result<(), Error<SPI>> {
        self.fast_cmd(FastCommand::EnterSleep).await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use embedded_hal_mock::eh1::spi::Mock as SpiMock;

    use crate::hl::test_util::{command, enable_double_buffer, read, write};
    use crate::hl::BufferAccess;
    use crate::{hl::NoCallbacks, platform::NoIrqControl, variant::Dw3000};

    #[test]
    fn status_decoding() {
        let status = SemaphoreStatus(0x2101);
        assert_eq!(status.owner(), Some(SpiHost::Spi1));
        assert!(status.available_to(SpiHost::Spi1));
        assert!(!status.available_to(SpiHost::Spi2));
        assert!(status.sleep_inhibited_by(SpiHost::Spi1));
        assert_eq!(SemaphoreStatus(0).owner(), None);
    }

    #[tokio::test]
    async fn semaphore_commands() {
        let expectations = [
            command(0xA9),
            read(&[0x34], &[0x02, 0x00]),
            write(&[0xF4, 0x05], &[0xBF, 0x40]),
            command(0xAB),
            command(0xAD),
            command(0xB3),
            command(0xB5),
        ]
        .concat();
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        dw3000.request_semaphore().await.unwrap();
        let status = dw3000.semaphore_status().await.unwrap();
        assert_eq!(status.owner(), Some(SpiHost::Spi2));
        dw3000.set_sleep_inhibit(SpiHost::Spi2, true).await.unwrap();
        dw3000.release_semaphore().await.unwrap();
        dw3000.force_semaphore().await.unwrap();
        dw3000.soft_reset(false).await.unwrap();
        dw3000.enter_sleep().await.unwrap();

        spi.done();
    }

    #[tokio::test]
    async fn soft_reset_drops_double_buffering_and_crc() {
        let expectations = [enable_double_buffer(0x01), command(0xB1)].concat();
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        dw3000.enable_double_buffer(false).await.unwrap();
        assert_eq!(dw3000.buffer_access(), BufferAccess::Buffer0);
        dw3000.ll().set_crc_mode(SpiCrcMode::Write);

        dw3000.soft_reset(true).await.unwrap();
        assert_eq!(dw3000.buffer_access(), BufferAccess::Off);
        assert_eq!(dw3000.ll().crc_mode(), SpiCrcMode::Disabled);

        spi.done();
    }
}
