//! High-level interface to the DW3000
//!
//! The entry point to this API is the [DW3000] struct. Please refer to the
//! documentation there for more details.
//!
//! This module implements a high-level interface to the DW3000. This is the
//! recommended way to access the DW3000 using this crate, unless you need the
//! greater flexibility provided by the [register-level interface].
//!
//! [register-level interface]: ../ll/index.html

use core::{fmt, marker::PhantomData};

pub use awake::*;
pub use callbacks::*;
pub use double_buffer::*;
pub use error::*;
pub use receiving::*;
pub use semaphore::*;
pub use sending::*;

use crate::{
    configs::{PhrMode, StsLen, StsMode, UwbChannel},
    ll,
    platform::{IrqControl, NoIrqControl},
    variant::{ChipVariant, Dw3000},
};

mod awake;
mod callbacks;
mod double_buffer;
mod error;
mod init;
mod isr;
mod receiving;
mod semaphore;
mod sending;

/// Settings cached from the last [`DW3000::configure`] call and the
/// double-buffer mode
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LocalData {
    /// The configured channel
    pub channel: UwbChannel,
    /// The configured STS mode
    pub sts_mode: StsMode,
    /// The configured STS length
    pub sts_len: StsLen,
    /// Which receive buffer the host is reading
    pub dbl_buff: BufferAccess,
    /// Frame check is disabled
    pub dis_fce: bool,
    /// Extended PHR, frames up to 1023 octets
    pub long_frames: bool,
    /// Accept zero-length frames reported with RXFCE
    pub zero_len_fce_good: bool,
}

impl LocalData {
    pub(crate) fn rx_len_mask(&self) -> u32 {
        if self.long_frames {
            ll::regs::rx_finfo::RXFLEN_EXT_MASK
        } else {
            ll::regs::rx_finfo::RXFLEN_STD_MASK
        }
    }

    pub(crate) fn set_phr_mode(&mut self, mode: PhrMode) {
        self.long_frames = mode == PhrMode::Extended;
    }
}

/// Entry point to the DW3000 driver API
///
/// One instance drives one chip. Besides the bus it owns:
///
/// - `V`, the [`ChipVariant`] the chip must identify as
/// - `CB`, the [`Callbacks`] that [`DW3000::isr`] reports events to
/// - `IRQ`, the [`IrqControl`] used to mask the DW3000 interrupt on the host
///   around short register updates that race with the interrupt handler
pub struct DW3000<SPI, V = Dw3000, CB = NoCallbacks, IRQ = NoIrqControl> {
    ll: ll::DW3000<SPI>,
    local: LocalData,
    callbacks: CB,
    irq: IRQ,
    event: CallbackData,
    rx_scratch: [u8; ll::regs::RX_BUFFER_LEN],
    _variant: PhantomData<V>,
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    V: ChipVariant,
    CB: Callbacks,
    IRQ: IrqControl,
{
    /// Create a new instance of `DW3000`
    ///
    /// Requires the SPI device connected to the DW3000. Nothing is sent
    /// until [`DW3000::init`] is called.
    pub fn new(spi: SPI, _variant: V, callbacks: CB, irq: IRQ) -> Self {
        DW3000 {
            ll: ll::DW3000::new(spi),
            local: LocalData::default(),
            callbacks,
            irq,
            event: CallbackData::default(),
            rx_scratch: [0; ll::regs::RX_BUFFER_LEN],
            _variant: PhantomData,
        }
    }
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ> {
    /// Provides direct access to the register-level API
    ///
    /// Be aware that by using the register-level API, you can invalidate
    /// various assumptions that the high-level API makes about the operation of
    /// the DW3000. Don't use the register-level and high-level APIs in tandem,
    /// unless you know what you're doing.
    pub fn ll(&mut self) -> &mut ll::DW3000<SPI> {
        &mut self.ll
    }

    /// The cached configuration and double-buffer state
    pub fn local_data(&self) -> &LocalData {
        &self.local
    }

    /// The callbacks passed to [`DW3000::new`]
    pub fn callbacks(&self) -> &CB {
        &self.callbacks
    }

    /// Mutable access to the callbacks
    pub fn callbacks_mut(&mut self) -> &mut CB {
        &mut self.callbacks
    }

    /// The record of the last event reported by [`DW3000::isr`]
    pub fn last_event(&self) -> &CallbackData {
        &self.event
    }

    /// Give back the SPI device, the callbacks and the interrupt control
    pub fn free(self) -> (SPI, CB, IRQ) {
        (self.ll.free(), self.callbacks, self.irq)
    }
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    CB: Callbacks,
{
    /// Report read CRC mismatches latched by a foreground operation
    ///
    /// Called once an operation has finished its reads. Mismatches latched
    /// by an operation that failed stay pending until the next one reports
    /// them, or until [`DW3000::isr`] does.
    pub(crate) fn report_read_crc_errors(&mut self) {
        if self.ll.take_crc_mismatches() > 0 {
            let data = CallbackData {
                buffer: self.local.dbl_buff,
                ..CallbackData::default()
            };
            self.callbacks.on_spi_read_crc_error(&data);
        }
    }
}

// Can't be derived without putting requirements on `SPI`.
impl<SPI, V, CB, IRQ> fmt::Debug for DW3000<SPI, V, CB, IRQ>
where
    V: ChipVariant,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DW3000 {{ variant: {}, local: {:?}, .. }}", V::NAME, self.local)
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::vec::Vec;

    use embedded_hal_mock::eh1::spi::Transaction as SpiTransaction;

    use super::{CallbackData, Callbacks};

    /// A read of `data` after sending `header`
    pub fn read(header: &[u8], data: &[u8]) -> Vec<SpiTransaction<u8>> {
        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(header.to_vec()),
            SpiTransaction::read_vec(data.to_vec()),
            SpiTransaction::transaction_end(),
        ]
    }

    /// A write of `data` after sending `header`
    pub fn write(header: &[u8], data: &[u8]) -> Vec<SpiTransaction<u8>> {
        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(header.to_vec()),
            SpiTransaction::write_vec(data.to_vec()),
            SpiTransaction::transaction_end(),
        ]
    }

    /// A fast command
    pub fn command(byte: u8) -> Vec<SpiTransaction<u8>> {
        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![byte]),
            SpiTransaction::transaction_end(),
        ]
    }

    /// What [`DW3000::enable_double_buffer`] sends without auto re-enable,
    /// given the RDB_DIAG value it reads back
    ///
    /// [`DW3000::enable_double_buffer`]: super::DW3000::enable_double_buffer
    pub fn enable_double_buffer(rdb_diag: u8) -> Vec<SpiTransaction<u8>> {
        let mut expectations = [
            write(&[0xC0, 0x43], &[0xF7, 0xFB, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00]),
            write(&[0xFE, 0x10], &[0x18, 0x00, 0x00, 0x00]),
            write(&[0xFE, 0x20], &[0xE8, 0x00, 0x00, 0x00]),
            read(&[0x42, 0xA0], &[rdb_diag]),
        ]
        .concat();
        if rdb_diag & 0x07 == 0 {
            expectations.extend(write(&[0xC2, 0xA1], &[0xF8, 0x01]));
        }
        expectations
    }

    /// A delay that returns right away and counts how often it was asked
    /// to wait
    #[derive(Debug, Default)]
    pub struct CountingDelay {
        pub calls: u32,
    }

    #[cfg(feature = "async")]
    impl embedded_hal_async::delay::DelayNs for CountingDelay {
        async fn delay_ns(&mut self, _ns: u32) {
            self.calls += 1;
        }
    }

    #[cfg(not(feature = "async"))]
    impl embedded_hal::delay::DelayNs for CountingDelay {
        fn delay_ns(&mut self, _ns: u32) {
            self.calls += 1;
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Event {
        TxDone,
        RxOk(CallbackData, Vec<u8>),
        RxError(CallbackData),
        RxTimeout,
        SpiReady(u32),
        SpiError(u16),
        SpiReadCrcError,
        DualSpi(u8),
        CmdError,
        SysPanic,
    }

    /// Callbacks that record every event in order
    #[derive(Debug, Default)]
    pub struct Recorder {
        pub events: Vec<Event>,
    }

    impl Callbacks for Recorder {
        fn on_tx_done(&mut self, _data: &CallbackData) {
            self.events.push(Event::TxDone);
        }

        fn on_rx_ok(&mut self, data: &CallbackData, payload: &[u8]) {
            self.events.push(Event::RxOk(*data, payload.to_vec()));
        }

        fn on_rx_error(&mut self, data: &CallbackData) {
            self.events.push(Event::RxError(*data));
        }

        fn on_rx_timeout(&mut self, _data: &CallbackData) {
            self.events.push(Event::RxTimeout);
        }

        fn on_spi_ready(&mut self, data: &CallbackData) {
            self.events.push(Event::SpiReady(data.status));
        }

        fn on_spi_error(&mut self, data: &CallbackData) {
            self.events.push(Event::SpiError(data.status_hi));
        }

        fn on_spi_read_crc_error(&mut self, _data: &CallbackData) {
            self.events.push(Event::SpiReadCrcError);
        }

        fn on_dual_spi_event(&mut self, data: &CallbackData) {
            self.events.push(Event::DualSpi(data.dss_stat));
        }

        fn on_cmd_error(&mut self, _data: &CallbackData) {
            self.events.push(Event::CmdError);
        }

        fn on_sys_panic(&mut self, _data: &CallbackData) {
            self.events.push(Event::SysPanic);
        }
    }
}
