//! Interrupt event classification
//!
//! [`DW3000::isr`] decodes one interrupt into at most one callback per event
//! group, in this order: system panic, TX done, SPI ready, good reception,
//! reception error, reception timeout, dual SPI. Read CRC mismatches seen
//! along the way are reported last.
//!
//! TX done and SPI ready callbacks run before their status bits are cleared.
//! All reception and dual SPI callbacks run after, so they can re-arm the
//! receiver right away.

use super::{BufferAccess, CallbackData, Callbacks, RxFlags, DW3000};
use crate::{
    fmt::{debug, trace},
    ll::regs::{self, fint_stat, rdb_status, spi_sem, sys_status, sys_status_hi},
    maybe_async_attr, spi_type,
    variant::ChipVariant,
    Error,
};

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
    V: ChipVariant,
    CB: Callbacks,
{
    /// Handle a DW3000 interrupt
    ///
    /// Call this once per assertion of the interrupt line.
    #[maybe_async_attr]
    pub async fn isr(&mut self) -> Result<(), Error<SPI>> {
        let fstat = self.ll.read8(regs::FINT_STAT, 0).await?;
        self.process_events(fstat).await
    }

    /// Handle pending events, for hosts without the interrupt line
    ///
    /// Returns `WouldBlock` when the chip has nothing to report.
    #[maybe_async_attr]
    pub async fn poll(&mut self) -> nb::Result<(), Error<SPI>> {
        let fstat = self
            .ll
            .read8(regs::FINT_STAT, 0)
            .await
            .map_err(|error| nb::Error::Other(error.into()))?;
        if fstat == 0 {
            return Err(nb::Error::WouldBlock);
        }

        self.process_events(fstat).await.map_err(nb::Error::Other)
    }

    #[maybe_async_attr]
    async fn process_events(&mut self, fstat: u8) -> Result<(), Error<SPI>> {
        let buffer = self.local.dbl_buff;
        self.event = CallbackData {
            buffer,
            ..CallbackData::default()
        };

        let mut status = self.ll.read32(regs::SYS_STATUS, 0).await?;
        if buffer.is_enabled() {
            let rdb = self.ll.read8(regs::RDB_STATUS, 0).await?;
            let nibble = match buffer {
                BufferAccess::Buffer1 => rdb >> 4,
                _ => rdb & rdb_status::BUFFER0,
            };
            self.event.rdb_status = nibble;

            // Fold the buffer's own status into the low status word
            if nibble & rdb_status::RXFCG0 != 0 {
                status |= sys_status::RXFCG;
            }
            if nibble & rdb_status::RXFR0 != 0 {
                status |= sys_status::RXFR;
            }
            if nibble & rdb_status::CIADONE0 != 0 {
                status |= sys_status::CIADONE;
            }
        }
        self.event.status = status;
        trace!("isr: fstat {:#x}, status {:#x}", fstat, status);

        if fstat & fint_stat::SYS_PANIC != 0 {
            self.handle_panic(status).await?;
        }

        if fstat & fint_stat::TXOK != 0 {
            self.restore_pll_bias_trim().await?;
            self.callbacks.on_tx_done(&self.event);
            self.ll
                .write32(regs::SYS_STATUS, 0, sys_status::ALL_TX)
                .await?;
        }

        if fstat & fint_stat::SYS_EVENT != 0 && status & sys_status::SPI_READY != 0 {
            self.callbacks.on_spi_ready(&self.event);
            self.ll
                .write32(regs::SYS_STATUS, 0, sys_status::SPI_READY)
                .await?;
        }

        let mut rdb_pending = self.event.rdb_status;

        // RXOK follows RXFR and CIADONE, so it is also raised for frames that
        // failed the frame check
        let benign_fce = self.is_benign_fce(status).await?;
        let check_failed = status & sys_status::RXFCE != 0 && !benign_fce;
        if (fstat & fint_stat::RXOK != 0 && !check_failed) || benign_fce {
            let absorbed = self.handle_rx_good(status, benign_fce, &mut rdb_pending).await?;
            status &= !absorbed;
        }

        if status & sys_status::RX_ERR_EVENTS != 0 {
            if status & sys_status::RXPHE != 0 {
                self.event.rx_flags.insert(RxFlags::PHR_ERROR);
            }
            self.clear_rx_status(
                sys_status::ALL_RX_ERR | sys_status::CIADONE | sys_status::RXFR,
                &mut rdb_pending,
            )
            .await?;
            self.signal_buffer_free().await?;
            debug!("rx error, status {:#x}", status);
            self.callbacks.on_rx_error(&self.event);
        }

        if status & sys_status::ALL_RX_TO != 0 {
            self.clear_rx_status(sys_status::ALL_RX_TO | sys_status::CIADONE, &mut rdb_pending)
                .await?;
            self.signal_buffer_free().await?;
            self.callbacks.on_rx_timeout(&self.event);
        }

        if V::DUAL_SPI && status & sys_status::DUAL_SPI_AVAIL != 0 {
            self.event.dss_stat = self
                .ll
                .read8(regs::SPI_SEM, spi_sem::STATUS_OFFSET)
                .await?;
            self.ll
                .write32(regs::SYS_STATUS, 0, status & sys_status::DUAL_SPI_AVAIL)
                .await?;
            self.callbacks.on_dual_spi_event(&self.event);
        }

        if self.ll.take_crc_mismatches() > 0 {
            self.callbacks.on_spi_read_crc_error(&self.event);
        }

        Ok(())
    }

    #[maybe_async_attr]
    async fn handle_panic(&mut self, status: u32) -> Result<(), Error<SPI>> {
        let status_hi = self.ll.read16(regs::SYS_STATUS_HI, 0).await?;
        self.event.status_hi = status_hi;
        let hi = u32::from(status_hi);

        if status & sys_status::SPICRCE != 0 || hi & sys_status_hi::SPI_ERRORS != 0 {
            self.clear_status(
                status & sys_status::SPICRCE,
                hi & sys_status_hi::SPI_ERRORS,
            )
            .await?;
            self.callbacks.on_spi_error(&self.event);
        }

        if hi & sys_status_hi::CMD_ERR != 0 {
            self.clear_status(0, sys_status_hi::CMD_ERR).await?;
            self.callbacks.on_cmd_error(&self.event);
        }

        let lo_panic = status & (sys_status::VWARN | sys_status::PLL_HILO);
        let hi_panic = hi & sys_status_hi::AES_ERR;
        if lo_panic != 0 || hi_panic != 0 {
            self.clear_status(lo_panic, hi_panic).await?;
            self.callbacks.on_sys_panic(&self.event);
        }

        Ok(())
    }

    /// Whether a frame check error is an empty frame the configuration
    /// accepts
    #[maybe_async_attr]
    async fn is_benign_fce(&mut self, status: u32) -> Result<bool, Error<SPI>> {
        if status & sys_status::RXFCE == 0 || !self.local.zero_len_fce_good {
            return Ok(false);
        }
        let info = self.frame_info().await?;
        Ok(info.len == 0)
    }

    /// Classify a good (or benign) reception
    ///
    /// Returns the status bits the reception absorbed, so later groups do
    /// not report the same frame again. A frame whose length was never
    /// latched absorbs nothing and is left to the error group.
    #[maybe_async_attr]
    async fn handle_rx_good(
        &mut self,
        status: u32,
        benign_fce: bool,
        rdb_pending: &mut u8,
    ) -> Result<u32, Error<SPI>> {
        let no_data = benign_fce || self.local.sts_mode.is_no_data();
        let decodable = status & sys_status::RXFCG != 0
            || (status & sys_status::RXFR != 0 && self.local.dis_fce);
        if !no_data && !decodable {
            trace!("rx event without a frame length, status {:#x}", status);
            return Ok(0);
        }

        let mut clear = sys_status::ALL_RX_GOOD;

        if status & sys_status::CIAERR != 0 {
            self.event.rx_flags.insert(RxFlags::CIA_ERROR);
            clear |= sys_status::CIAERR;
        }
        if status & sys_status::CIADONE != 0 {
            self.event.rx_flags.insert(RxFlags::CIA_DONE);
        }
        if status & sys_status::CPERR != 0 {
            self.event.rx_flags.insert(RxFlags::STS_ERROR);
            clear |= sys_status::CPERR;
        }

        let mut len = 0;
        if no_data {
            self.event.rx_flags.insert(RxFlags::NO_DATA);
            if benign_fce {
                clear |= sys_status::RXFCE;
            }
        } else {
            let info = self.frame_info().await?;
            len = usize::from(info.len);
            if info.ranging {
                self.event.rx_flags.insert(RxFlags::RANGING);
            }
        }

        // A decoded empty frame can't carry an FCS; the PHR was decoded wrong
        let phr_error = !no_data && len == 0;
        if phr_error {
            self.event.rx_flags.insert(RxFlags::PHR_ERROR);
            clear |= sys_status::ALL_RX_ERR;
        } else if len > 0 {
            let rx_buffer = self.local.dbl_buff.rx_buffer();
            self.ll
                .read_bytes(rx_buffer, 0, &mut self.rx_scratch[..len])
                .await?;
        }
        self.event.datalength = len as u16;

        self.clear_rx_status(clear, rdb_pending).await?;
        self.signal_buffer_free().await?;

        if phr_error {
            debug!("empty frame reported as PHR error");
            self.callbacks.on_rx_error(&self.event);
        } else {
            trace!("rx ok, {} octets from {:?}", len, self.event.buffer);
            self.callbacks
                .on_rx_ok(&self.event, &self.rx_scratch[..len]);
        }

        Ok(clear)
    }

    #[maybe_async_attr]
    async fn clear_status(&mut self, lo: u32, hi: u32) -> Result<(), Error<SPI>> {
        if lo != 0 {
            self.ll.write32(regs::SYS_STATUS, 0, lo).await?;
        }
        if hi != 0 {
            self.ll
                .write16(regs::SYS_STATUS_HI, 0, hi as u16)
                .await?;
        }
        Ok(())
    }

    /// Clear reception status, including the double-buffer status of the
    /// buffer being read the first time around
    #[maybe_async_attr]
    async fn clear_rx_status(&mut self, lo: u32, rdb_pending: &mut u8) -> Result<(), Error<SPI>> {
        self.ll.write32(regs::SYS_STATUS, 0, lo).await?;

        if *rdb_pending != 0 {
            let rdb = match self.event.buffer {
                BufferAccess::Buffer1 => *rdb_pending << 4,
                _ => *rdb_pending,
            };
            self.ll.write8(regs::RDB_STATUS, 0, rdb).await?;
            *rdb_pending = 0;
        }

        Ok(())
    }
}
