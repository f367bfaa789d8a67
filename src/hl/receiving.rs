use core::ops::BitOr;

#[cfg(feature = "defmt")]
use defmt::Format;

use super::{Callbacks, DW3000};
use crate::{
    fast_command::{FastCommand, Start},
    fmt::warn,
    ll::regs::{self, db_diag, pll_common, rx_finfo, sys_cfg},
    maybe_async_attr,
    platform::IrqControl,
    spi_type,
    time::Instant,
    variant::ChipVariant,
    Error,
};

/// How [`DW3000::start_rx`] enables the receiver
///
/// At most one of `DELAYED`, `DLY_REF`, `DLY_RS` and `DLY_TS` may be set.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct RxMode(u8);

impl RxMode {
    /// Enable right away
    pub const IMMEDIATE: RxMode = RxMode(0x00);
    /// Enable at DX_TIME
    pub const DELAYED: RxMode = RxMode(0x01);
    /// If a delayed start is late, stay idle instead of enabling right away
    pub const IDLE_ON_DLY_ERR: RxMode = RxMode(0x02);
    /// Enable at DREF_TIME + DX_TIME
    pub const DLY_REF: RxMode = RxMode(0x04);
    /// Enable at the last RX timestamp + DX_TIME
    pub const DLY_RS: RxMode = RxMode(0x08);
    /// Enable at the last TX timestamp + DX_TIME
    pub const DLY_TS: RxMode = RxMode(0x10);

    const ALL: u8 = 0x1F;

    /// Whether all bits of `other` are set
    pub const fn contains(self, other: RxMode) -> bool {
        self.0 & other.0 == other.0
    }

    /// The start condition, or `None` for an invalid combination
    pub fn start(self) -> Option<Start> {
        if self.0 & !Self::ALL != 0 {
            return None;
        }

        let starts = [
            (RxMode::DELAYED, Start::Delayed),
            (RxMode::DLY_REF, Start::DelayedRef),
            (RxMode::DLY_RS, Start::DelayedRs),
            (RxMode::DLY_TS, Start::DelayedTs),
        ];
        let mut flavours = starts.iter().filter(|(flag, _)| self.contains(*flag));
        match (flavours.next(), flavours.next()) {
            (None, _) => Some(Start::Immediate),
            (Some((_, start)), None) => Some(*start),
            (Some(_), Some(_)) => None,
        }
    }
}

impl BitOr for RxMode {
    type Output = RxMode;

    fn bitor(self, rhs: RxMode) -> RxMode {
        RxMode(self.0 | rhs.0)
    }
}

/// Length and ranging bit of a received frame
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct FrameInfo {
    /// Frame length including the FCS
    pub len: u16,
    /// Ranging bit from the PHR
    pub ranging: bool,
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
    V: ChipVariant,
    CB: Callbacks,
    IRQ: IrqControl,
{
    /// Enable the receiver
    ///
    /// For delayed modes, the start time must have been programmed with
    /// [`DW3000::set_delayed_trx_time`]. If the start time has already passed,
    /// [`Error::Late`] is returned; the receiver is then enabled immediately,
    /// unless [`RxMode::IDLE_ON_DLY_ERR`] is set.
    #[maybe_async_attr]
    pub async fn start_rx(&mut self, mode: RxMode) -> Result<(), Error<SPI>> {
        let start = mode.start().ok_or(Error::InvalidArgument)?;

        // A preceding transmission may have left a different bias trim
        self.restore_pll_bias_trim().await?;

        if start == Start::Immediate {
            self.ll.fast_command(FastCommand::Rx.code()).await?;
            return Ok(());
        }

        self.apply_antenna_delay(start).await?;

        let command = FastCommand::receive(start).ok_or(Error::InvalidArgument)?;
        self.ll.fast_command(command.code()).await?;

        let late = self.half_period_warning().await?;
        self.report_read_crc_errors();
        if late {
            self.force_trx_off().await?;
            if !mode.contains(RxMode::IDLE_ON_DLY_ERR) {
                self.ll.fast_command(FastCommand::Rx.code()).await?;
            }
            warn!("delayed RX too late");
            return Err(Error::Late);
        }

        Ok(())
    }
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
    V: ChipVariant,
{
    #[maybe_async_attr]
    pub(crate) async fn restore_pll_bias_trim(&mut self) -> Result<(), Error<SPI>> {
        self.ll
            .modify::<u16>(
                regs::PLL_COMMON,
                0,
                !pll_common::BIAS_TRIM_MASK,
                V::PLL_BIAS_TRIM << pll_common::BIAS_TRIM_SHIFT,
            )
            .await?;
        Ok(())
    }
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
    CB: Callbacks,
{
    /// Set the frame wait timeout, or disable it with `None`
    ///
    /// The timeout is counted in units of 512/499.2 MHz, about 1.026 us.
    #[maybe_async_attr]
    pub async fn set_rx_timeout(&mut self, timeout: Option<u32>) -> Result<(), Error<SPI>> {
        match timeout {
            Some(timeout) => {
                self.ll
                    .write32(regs::RX_FWTO, 0, timeout & 0xF_FFFF)
                    .await?;
                self.ll
                    .modify::<u32>(regs::SYS_CFG, 0, u32::MAX, sys_cfg::RXWTOE)
                    .await?;
            }
            None => {
                self.ll
                    .modify::<u32>(regs::SYS_CFG, 0, !sys_cfg::RXWTOE, 0)
                    .await?;
            }
        }

        Ok(())
    }

    /// Set the preamble detection timeout in PAC units, 0 disables it
    #[maybe_async_attr]
    pub async fn set_preamble_detect_timeout(&mut self, pacs: u16) -> Result<(), Error<SPI>> {
        self.ll.write16(regs::PRE_TOC, 0, pacs).await?;
        Ok(())
    }

    /// Read received frame data, starting at `offset` into the receive buffer
    ///
    /// Reads from the buffer the host currently owns when double buffering
    /// is on.
    #[maybe_async_attr]
    pub async fn read_rx_data(&mut self, buffer: &mut [u8], offset: u16) -> Result<(), Error<SPI>> {
        if usize::from(offset) + buffer.len() > regs::RX_BUFFER_LEN {
            return Err(Error::InvalidArgument);
        }

        let rx_buffer = self.local.dbl_buff.rx_buffer();
        if offset <= regs::RX_BUFFER_DIRECT_LIMIT {
            self.ll.read_bytes(rx_buffer, offset, buffer).await?;
        } else {
            self.ll
                .write32(regs::PTR_ADDR_B, 0, u32::from(rx_buffer.file()))
                .await?;
            self.ll
                .write32(regs::PTR_OFFSET_B, 0, u32::from(offset))
                .await?;
            self.ll
                .read_bytes(regs::INDIRECT_POINTER_B, 0, buffer)
                .await?;
        }

        self.report_read_crc_errors();
        Ok(())
    }

    /// Returns the timestamp of the last received frame
    #[maybe_async_attr]
    pub async fn read_rx_timestamp(&mut self) -> Result<Instant, Error<SPI>> {
        let value = match self.local.dbl_buff.diagnostics() {
            Some(diag) => self.ll.read40(diag, db_diag::RX_TIME).await?,
            None => self.ll.read40(regs::RX_TIME, 0).await?,
        };
        self.report_read_crc_errors();
        Ok(Instant::from_raw(value))
    }

    /// Length and ranging bit of the last received frame
    #[maybe_async_attr]
    pub async fn read_frame_info(&mut self) -> Result<FrameInfo, Error<SPI>> {
        let info = self.frame_info().await?;
        self.report_read_crc_errors();
        Ok(info)
    }

    /// [`DW3000::read_frame_info`] without reporting CRC mismatches, for
    /// use inside an interrupt pass
    #[maybe_async_attr]
    pub(crate) async fn frame_info(&mut self) -> Result<FrameInfo, Error<SPI>> {
        let finfo = match self.local.dbl_buff.diagnostics() {
            Some(diag) => self.ll.read16(diag, db_diag::FINFO).await?,
            None => self.ll.read16(regs::RX_FINFO, 0).await?,
        };
        let finfo = u32::from(finfo);

        Ok(FrameInfo {
            len: (finfo & self.local.rx_len_mask()) as u16,
            ranging: finfo & rx_finfo::RNG != 0,
        })
    }
}
