use core::ops::BitOr;

#[cfg(feature = "defmt")]
use defmt::Format;

use super::{Callbacks, DW3000};
use crate::{
    fast_command::{FastCommand, Start},
    fmt::warn,
    ll::regs::{self, cia_conf, sys_status, tx_fctrl},
    maybe_async_attr,
    platform::IrqControl,
    spi_type,
    time::Instant,
    Error,
};

/// How [`DW3000::start_tx`] starts a transmission
///
/// At most one of `DELAYED`, `DLY_REF`, `DLY_RS`, `DLY_TS` and `CCA` may be
/// set. `RESPONSE_EXPECTED` can be combined with any of them.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct TxMode(u8);

impl TxMode {
    /// Send right away
    pub const IMMEDIATE: TxMode = TxMode(0x00);
    /// Send at DX_TIME
    pub const DELAYED: TxMode = TxMode(0x01);
    /// Enable the receiver once the frame is out
    pub const RESPONSE_EXPECTED: TxMode = TxMode(0x02);
    /// Send at DREF_TIME + DX_TIME
    pub const DLY_REF: TxMode = TxMode(0x04);
    /// Send at the last RX timestamp + DX_TIME
    pub const DLY_RS: TxMode = TxMode(0x08);
    /// Send at the last TX timestamp + DX_TIME
    pub const DLY_TS: TxMode = TxMode(0x10);
    /// Send only if no preamble is detected
    pub const CCA: TxMode = TxMode(0x20);

    const ALL: u8 = 0x3F;

    /// Whether all bits of `other` are set
    pub const fn contains(self, other: TxMode) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw mode bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// The start condition, or `None` for an invalid combination
    pub fn start(self) -> Option<Start> {
        if self.0 & !Self::ALL != 0 {
            return None;
        }

        let starts = [
            (TxMode::DELAYED, Start::Delayed),
            (TxMode::DLY_REF, Start::DelayedRef),
            (TxMode::DLY_RS, Start::DelayedRs),
            (TxMode::DLY_TS, Start::DelayedTs),
            (TxMode::CCA, Start::Cca),
        ];
        let mut selected = None;
        for (flag, start) in starts {
            if self.contains(flag) {
                if selected.is_some() {
                    return None;
                }
                selected = Some(start);
            }
        }

        Some(selected.unwrap_or(Start::Immediate))
    }
}

impl BitOr for TxMode {
    type Output = TxMode;

    fn bitor(self, rhs: TxMode) -> TxMode {
        TxMode(self.0 | rhs.0)
    }
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
    CB: Callbacks,
    IRQ: IrqControl,
{
    /// Start a transmission of the frame in the TX buffer
    ///
    /// For delayed modes, the start time must have been programmed with
    /// [`DW3000::set_delayed_trx_time`]. If the chip reports that the start
    /// time has already passed, the transmission is cancelled and
    /// [`Error::Late`] is returned.
    #[maybe_async_attr]
    pub async fn start_tx(&mut self, mode: TxMode) -> Result<(), Error<SPI>> {
        let start = mode.start().ok_or(Error::InvalidArgument)?;

        self.apply_antenna_delay(start).await?;

        let command = FastCommand::transmit(start, mode.contains(TxMode::RESPONSE_EXPECTED));
        self.ll.fast_command(command.code()).await?;

        if !start.is_delayed() {
            return Ok(());
        }

        let late = self.half_period_warning().await?;
        self.report_read_crc_errors();
        if late {
            self.force_trx_off().await?;
            warn!("delayed TX too late, mode {:#x}", mode.bits());
            return Err(Error::Late);
        }

        Ok(())
    }
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
    CB: Callbacks,
{
    /// Copy frame data into the TX buffer at `offset`
    ///
    /// The FCS is appended by the chip and is not part of `data`.
    #[maybe_async_attr]
    pub async fn write_tx_data(&mut self, data: &[u8], offset: u16) -> Result<(), Error<SPI>> {
        let required_len = usize::from(offset) + data.len();
        if required_len > regs::TX_BUFFER_LEN {
            return Err(Error::BufferTooSmall { required_len });
        }

        if offset <= regs::RX_BUFFER_DIRECT_LIMIT {
            self.ll.write_bytes(regs::TX_BUFFER, offset, data).await?;
        } else {
            self.ll
                .write32(regs::PTR_ADDR_B, 0, u32::from(regs::TX_BUFFER.file()))
                .await?;
            self.ll
                .write32(regs::PTR_OFFSET_B, 0, u32::from(offset))
                .await?;
            self.ll
                .write_bytes(regs::INDIRECT_POINTER_B, 0, data)
                .await?;
        }

        Ok(())
    }

    /// Set the length, TX buffer offset and ranging bit of the next frame
    ///
    /// `len` includes the two FCS octets.
    #[maybe_async_attr]
    pub async fn write_tx_fctrl(
        &mut self,
        len: u16,
        offset: u16,
        ranging: bool,
    ) -> Result<(), Error<SPI>> {
        let max_len = self.local.rx_len_mask();
        if u32::from(len) > max_len || usize::from(offset) >= regs::TX_BUFFER_LEN {
            return Err(Error::InvalidArgument);
        }

        let mut value = u32::from(len) | (u32::from(offset) << tx_fctrl::TXB_OFFSET_SHIFT);
        if ranging {
            value |= tx_fctrl::TR;
        }
        let and = !(tx_fctrl::TXFLEN_MASK | tx_fctrl::TR | tx_fctrl::TXB_OFFSET_MASK);
        self.ll
            .modify::<u32>(regs::TX_FCTRL, 0, and, value)
            .await?;

        Ok(())
    }

    /// Returns the timestamp of the last transmitted frame
    #[maybe_async_attr]
    pub async fn read_tx_timestamp(&mut self) -> Result<Instant, Error<SPI>> {
        let value = self.ll.read40(regs::TX_TIME, 0).await?;
        self.report_read_crc_errors();
        Ok(Instant::from_raw(value))
    }
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
{
    /// Pull DX_TIME back by the antenna delay for starts relative to a
    /// timestamp
    ///
    /// RX timestamps include the RX antenna delay and TX timestamps the TX
    /// antenna delay, so the start time is corrected by the matching one.
    #[maybe_async_attr]
    pub(crate) async fn apply_antenna_delay(&mut self, start: Start) -> Result<(), Error<SPI>> {
        if !matches!(start, Start::DelayedRs | Start::DelayedTs) {
            return Ok(());
        }

        let dx_time = self.ll.read32(regs::DX_TIME, 0).await?;
        let antenna_delay = if start == Start::DelayedRs {
            self.ll.read32(regs::CIA_CONF, 0).await? & cia_conf::RXANTD_MASK
        } else {
            u32::from(self.ll.read16(regs::TX_ANTD, 0).await?)
        };
        self.ll
            .write32(regs::DX_TIME, 0, dx_time.wrapping_sub(antenna_delay))
            .await?;

        Ok(())
    }

    /// Whether the last delayed command came too late
    #[maybe_async_attr]
    pub(crate) async fn half_period_warning(&mut self) -> Result<bool, Error<SPI>> {
        let status = self.ll.read8(regs::SYS_STATUS, 3).await?;
        Ok(status & sys_status::HPDWARN_BYTE3 != 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use embedded_hal_mock::eh1::spi::Mock as SpiMock;

    use crate::hl::test_util::{command, read, write};
    use crate::{hl::NoCallbacks, platform::NoIrqControl, variant::Dw3000};

    #[test]
    fn mode_validation() {
        assert_eq!(TxMode::IMMEDIATE.start(), Some(Start::Immediate));
        assert_eq!(
            (TxMode::DLY_REF | TxMode::RESPONSE_EXPECTED).start(),
            Some(Start::DelayedRef)
        );
        assert_eq!((TxMode::DELAYED | TxMode::DLY_TS).start(), None);
        assert_eq!((TxMode::CCA | TxMode::DLY_RS).start(), None);
        assert_eq!(TxMode(0x40).start(), None);
    }

    #[tokio::test]
    async fn immediate_tx_is_one_command() {
        let expectations = [command(0x83), command(0x99)].concat();
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        dw3000.start_tx(TxMode::IMMEDIATE).await.unwrap();
        dw3000.start_tx(TxMode::RESPONSE_EXPECTED).await.unwrap();

        spi.done();
    }

    #[tokio::test]
    async fn late_delayed_tx_turns_radio_off() {
        let expectations = [
            command(0x87),
            read(&[0x41, 0x1C], &[0x08]),
            read(&[0x5E, 0xC8], &[0x0A]),
            command(0x81),
        ]
        .concat();
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        let result = dw3000.start_tx(TxMode::DELAYED).await;
        assert!(matches!(result, Err(Error::Late)));

        spi.done();
    }

    #[tokio::test]
    async fn timely_delayed_tx_succeeds() {
        let expectations = [command(0x93), read(&[0x41, 0x1C], &[0x00])].concat();
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        dw3000.start_tx(TxMode::DLY_REF).await.unwrap();

        spi.done();
    }

    #[tokio::test]
    async fn delay_from_rx_timestamp_subtracts_rx_antenna_delay() {
        let expectations = [
            read(&[0x40, 0xB0], &[0x00, 0x10, 0x00, 0x00]),
            read(&[0x1C], &[0x4A, 0x40, 0x00, 0x00]),
            write(&[0xC0, 0xB0], &[0xB6, 0xCF, 0xFF, 0xFF]),
            command(0x9F),
            read(&[0x41, 0x1C], &[0x00]),
        ]
        .concat();
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        dw3000
            .start_tx(TxMode::DLY_RS | TxMode::RESPONSE_EXPECTED)
            .await
            .unwrap();

        spi.done();
    }

    #[tokio::test]
    async fn invalid_mode_sends_nothing() {
        let expectations: [embedded_hal_mock::eh1::spi::Transaction<u8>; 0] = [];
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        let result = dw3000.start_tx(TxMode::DELAYED | TxMode::CCA).await;
        assert!(matches!(result, Err(Error::InvalidArgument)));

        spi.done();
    }

    #[tokio::test]
    async fn tx_data_and_frame_control() {
        let expectations = [
            write(&[0xA8], &[0xC5, 0x00, 0x01]),
            write(&[0xFE, 0x30], &[0x14, 0x00, 0x00, 0x00]),
            write(&[0xFE, 0x40], &[0x90, 0x00, 0x00, 0x00]),
            write(&[0xBC], &[0xAA, 0xBB]),
            write(
                &[0xC0, 0x93],
                &[0x00, 0xF4, 0x00, 0xFC, 0x05, 0x08, 0x00, 0x00],
            ),
        ]
        .concat();
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        dw3000.write_tx_data(&[0xC5, 0x00, 0x01], 0).await.unwrap();
        dw3000.write_tx_data(&[0xAA, 0xBB], 0x90).await.unwrap();
        dw3000.write_tx_fctrl(5, 0, true).await.unwrap();

        let result = dw3000.write_tx_data(&[0; 8], 1020).await;
        assert!(matches!(
            result,
            Err(Error::BufferTooSmall { required_len: 1028 })
        ));
        let result = dw3000.write_tx_fctrl(200, 0, false).await;
        assert!(matches!(result, Err(Error::InvalidArgument)));

        spi.done();
    }
}
