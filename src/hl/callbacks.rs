//! Event callbacks
//!
//! [`DW3000::isr`](crate::hl::DW3000::isr) classifies the chip status and
//! reports each event through a [`Callbacks`] implementation. Every method
//! has an empty default, so an implementation only spells out the events it
//! cares about.

use core::ops::BitOr;

#[cfg(feature = "defmt")]
use defmt::Format;

use super::BufferAccess;

/// Flags describing a reception
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct RxFlags(u8);

impl RxFlags {
    /// The ranging bit was set in the PHR
    pub const RANGING: RxFlags = RxFlags(0x01);
    /// No-data STS frame, or an empty frame accepted despite RXFCE
    pub const NO_DATA: RxFlags = RxFlags(0x02);
    /// The CIA finished processing
    pub const CIA_DONE: RxFlags = RxFlags(0x04);
    /// The CIA failed
    pub const CIA_ERROR: RxFlags = RxFlags(0x08);
    /// STS quality check failed
    pub const STS_ERROR: RxFlags = RxFlags(0x10);
    /// PHY header error, also used for frames decoded with length 0
    pub const PHR_ERROR: RxFlags = RxFlags(0x20);

    /// No flag set
    pub const fn empty() -> Self {
        RxFlags(0)
    }

    /// Raw flag bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether all flags in `other` are set
    pub const fn contains(self, other: RxFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: RxFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for RxFlags {
    type Output = RxFlags;

    fn bitor(self, rhs: RxFlags) -> RxFlags {
        RxFlags(self.0 | rhs.0)
    }
}

/// Everything the interrupt handler learned about the event being reported
///
/// Reset at the start of every pass of the interrupt handler.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct CallbackData {
    /// Low 32 bits of SYS_STATUS, with the double-buffer status merged in
    pub status: u32,
    /// High bits of SYS_STATUS, only read when the chip reports a panic
    pub status_hi: u16,
    /// Frame length including the FCS
    pub datalength: u16,
    /// Reception flags
    pub rx_flags: RxFlags,
    /// Double-buffer status nibble of the buffer that was read
    pub rdb_status: u8,
    /// SPI semaphore status octet, for dual SPI events
    pub dss_stat: u8,
    /// The receive buffer the frame was read from
    pub buffer: BufferAccess,
}

/// Event handlers invoked from the interrupt handler
///
/// For TX done and SPI ready events, the status bits are still set when the
/// handler runs. For all reception events and dual SPI events, the status has
/// already been cleared and the receive buffer handed back, so the receiver
/// can be re-armed as soon as the handler returns.
#[allow(unused_variables)]
pub trait Callbacks {
    /// A frame was sent
    fn on_tx_done(&mut self, data: &CallbackData) {}

    /// A frame was received; `payload` holds `data.datalength` octets
    fn on_rx_ok(&mut self, data: &CallbackData, payload: &[u8]) {}

    /// A reception failed
    fn on_rx_error(&mut self, data: &CallbackData) {}

    /// Preamble detection or frame wait timed out
    fn on_rx_timeout(&mut self, data: &CallbackData) {}

    /// The SPI is ready after power up or wake up, or IDLE_RC was reached
    fn on_spi_ready(&mut self, data: &CallbackData) {}

    /// The chip saw a CRC error, overflow, underflow or collision on the SPI
    fn on_spi_error(&mut self, data: &CallbackData) {}

    /// A register read did not match the CRC reported by the chip
    ///
    /// Reported once the driver operation doing the read has finished, or
    /// at the end of the interrupt pass for reads made by [`DW3000::isr`].
    ///
    /// [`DW3000::isr`]: super::DW3000::isr
    fn on_spi_read_crc_error(&mut self, data: &CallbackData) {}

    /// The SPI semaphore became available to one of the hosts
    fn on_dual_spi_event(&mut self, data: &CallbackData) {}

    /// The chip rejected a fast command
    fn on_cmd_error(&mut self, data: &CallbackData) {}

    /// AES error, brownout or loss of PLL lock
    fn on_sys_panic(&mut self, data: &CallbackData) {}
}

/// Ignores every event
#[derive(Copy, Clone, Debug, Default)]
pub struct NoCallbacks;

impl Callbacks for NoCallbacks {}

impl<T: Callbacks + ?Sized> Callbacks for &mut T {
    fn on_tx_done(&mut self, data: &CallbackData) {
        (**self).on_tx_done(data)
    }

    fn on_rx_ok(&mut self, data: &CallbackData, payload: &[u8]) {
        (**self).on_rx_ok(data, payload)
    }

    fn on_rx_error(&mut self, data: &CallbackData) {
        (**self).on_rx_error(data)
    }

    fn on_rx_timeout(&mut self, data: &CallbackData) {
        (**self).on_rx_timeout(data)
    }

    fn on_spi_ready(&mut self, data: &CallbackData) {
        (**self).on_spi_ready(data)
    }

    fn on_spi_error(&mut self, data: &CallbackData) {
        (**self).on_spi_error(data)
    }

    fn on_spi_read_crc_error(&mut self, data: &CallbackData) {
        (**self).on_spi_read_crc_error(data)
    }

    fn on_dual_spi_event(&mut self, data: &CallbackData) {
        (**self).on_dual_spi_event(data)
    }

    fn on_cmd_error(&mut self, data: &CallbackData) {
        (**self).on_cmd_error(data)
    }

    fn on_sys_panic(&mut self, data: &CallbackData) {
        (**self).on_sys_panic(data)
    }
}
