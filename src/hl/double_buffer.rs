//! Double-buffered reception
//!
//! With double buffering, the chip receives into one buffer while the host
//! reads the other. The host tracks which buffer it is reading and hands it
//! back with `CMD_DB_TOGGLE` when done.

#[cfg(feature = "defmt")]
use defmt::Format;

use super::{Callbacks, DW3000};
use crate::{
    fast_command::FastCommand,
    fmt::trace,
    ll::regs::{self, db_diag, rdb_diag, sys_cfg, RegAddr},
    maybe_async_attr, spi_type, Error,
};

/// Which receive buffer the host is reading
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum BufferAccess {
    /// Double buffering is disabled, everything comes from buffer 0
    #[default]
    Off,
    /// Reading buffer 0
    Buffer0,
    /// Reading buffer 1
    Buffer1,
}

impl BufferAccess {
    /// The buffer the host reads after handing this one back
    pub fn toggled(self) -> Self {
        match self {
            BufferAccess::Off => BufferAccess::Off,
            BufferAccess::Buffer0 => BufferAccess::Buffer1,
            BufferAccess::Buffer1 => BufferAccess::Buffer0,
        }
    }

    /// Whether double buffering is enabled
    pub fn is_enabled(self) -> bool {
        self != BufferAccess::Off
    }

    /// The receive buffer register holding the frame data
    pub fn rx_buffer(self) -> RegAddr {
        match self {
            BufferAccess::Buffer1 => regs::RX_BUFFER_1,
            BufferAccess::Off | BufferAccess::Buffer0 => regs::RX_BUFFER_0,
        }
    }

    /// Where the frame info and RX timestamp of this buffer are read
    ///
    /// Buffer 1's diagnostics sit above the directly addressable range of
    /// DB_DIAG, so they are reached through indirect pointer A, which
    /// [`DW3000::enable_double_buffer`] points there.
    pub(crate) fn diagnostics(self) -> Option<RegAddr> {
        match self {
            BufferAccess::Off => None,
            BufferAccess::Buffer0 => Some(regs::DB_DIAG),
            BufferAccess::Buffer1 => Some(regs::INDIRECT_POINTER_A),
        }
    }
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
    CB: Callbacks,
{
    /// Which receive buffer the host is reading
    pub fn buffer_access(&self) -> BufferAccess {
        self.local.dbl_buff
    }

    /// Enable double-buffered reception
    ///
    /// With `auto_reenable`, the receiver is re-enabled by the chip after
    /// every reception, good or bad.
    #[maybe_async_attr]
    pub async fn enable_double_buffer(&mut self, auto_reenable: bool) -> Result<(), Error<SPI>> {
        let or = if auto_reenable { sys_cfg::RXAUTR } else { 0 };
        self.ll
            .modify::<u32>(regs::SYS_CFG, 0, !(sys_cfg::DIS_DRXB | sys_cfg::RXAUTR), or)
            .await?;
        self.local.dbl_buff = BufferAccess::Buffer0;

        self.ll
            .write32(regs::PTR_ADDR_A, 0, u32::from(regs::DB_DIAG.file()))
            .await?;
        self.ll
            .write32(regs::PTR_OFFSET_A, 0, u32::from(db_diag::BUFFER1_OFFSET))
            .await?;

        // Frame info is only copied into DB_DIAG with a diagnostic mode set
        let mode = self.ll.read8(regs::RDB_DIAG, 0).await? & rdb_diag::RDB_DMODE_MASK;
        if mode == 0 {
            self.ll
                .modify::<u8>(regs::RDB_DIAG, 0, !rdb_diag::RDB_DMODE_MASK, 1)
                .await?;
        }

        self.report_read_crc_errors();
        Ok(())
    }

    /// Disable double-buffered reception
    #[maybe_async_attr]
    pub async fn disable_double_buffer(&mut self) -> Result<(), Error<SPI>> {
        self.ll
            .modify::<u32>(regs::SYS_CFG, 0, u32::MAX, sys_cfg::DIS_DRXB)
            .await?;
        self.reset_buffer_access();

        Ok(())
    }

    /// Hand the buffer the host was reading back to the chip
    ///
    /// Does nothing when double buffering is off.
    #[maybe_async_attr]
    pub async fn signal_buffer_free(&mut self) -> Result<(), Error<SPI>> {
        if !self.local.dbl_buff.is_enabled() {
            return Ok(());
        }

        self.ll
            .fast_command(FastCommand::DbToggle.code())
            .await?;
        self.local.dbl_buff = self.local.dbl_buff.toggled();
        trace!("host now reads {:?}", self.local.dbl_buff);

        Ok(())
    }
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ> {
    /// Forget the buffer the host was reading, after the chip dropped
    /// double buffering on its own
    pub(crate) fn reset_buffer_access(&mut self) {
        self.local.dbl_buff = BufferAccess::Off;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use embedded_hal_mock::eh1::spi::Mock as SpiMock;

    use crate::hl::test_util::{command, enable_double_buffer as enable_expectations, write};
    use crate::{hl::NoCallbacks, platform::NoIrqControl, variant::Dw3000};

    #[test]
    fn toggling_alternates_buffers() {
        assert_eq!(BufferAccess::Buffer0.toggled(), BufferAccess::Buffer1);
        assert_eq!(BufferAccess::Buffer1.toggled(), BufferAccess::Buffer0);
        assert_eq!(BufferAccess::Off.toggled(), BufferAccess::Off);
    }

    #[tokio::test]
    async fn free_signals_alternate_after_enable() {
        let expectations = [enable_expectations(0), command(0xA7), command(0xA7)].concat();
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        dw3000.enable_double_buffer(false).await.unwrap();
        assert_eq!(dw3000.buffer_access(), BufferAccess::Buffer0);

        dw3000.signal_buffer_free().await.unwrap();
        assert_eq!(dw3000.buffer_access(), BufferAccess::Buffer1);

        dw3000.signal_buffer_free().await.unwrap();
        assert_eq!(dw3000.buffer_access(), BufferAccess::Buffer0);

        spi.done();
    }

    #[tokio::test]
    async fn free_signal_is_noop_when_off() {
        let expectations = [
            write(&[0xC0, 0x43], &[0xFF, 0xFF, 0xFF, 0xFF, 0x08, 0x00, 0x00, 0x00]),
        ]
        .concat();
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        dw3000.signal_buffer_free().await.unwrap();
        dw3000.disable_double_buffer().await.unwrap();
        dw3000.signal_buffer_free().await.unwrap();
        assert_eq!(dw3000.buffer_access(), BufferAccess::Off);

        spi.done();
    }

    #[tokio::test]
    async fn enable_keeps_existing_diagnostic_mode() {
        let expectations = enable_expectations(0x02);
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone(), Dw3000, NoCallbacks, NoIrqControl);

        dw3000.enable_double_buffer(false).await.unwrap();
        assert_eq!(dw3000.buffer_access(), BufferAccess::Buffer0);

        spi.done();
    }
}
