//! Fast commands
//!
//! A fast command is a single-octet, write-only transaction that makes the
//! chip act immediately. The codes are fixed by the DW3000 command table.

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::ll;

/// Fast command codes
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[repr(u8)]
pub enum FastCommand {
    /// Go to IDLE and clear any pending TX/RX events
    TxRxOff = 0x00,
    /// Start transmission immediately
    Tx = 0x01,
    /// Enable the receiver immediately
    Rx = 0x02,
    /// Delayed TX at DX_TIME
    DelayedTx = 0x03,
    /// Delayed RX at DX_TIME
    DelayedRx = 0x04,
    /// Delayed TX at TX timestamp + DX_TIME
    DelayedTxTs = 0x05,
    /// Delayed RX at TX timestamp + DX_TIME
    DelayedRxTs = 0x06,
    /// Delayed TX at RX timestamp + DX_TIME
    DelayedTxRs = 0x07,
    /// Delayed RX at RX timestamp + DX_TIME
    DelayedRxRs = 0x08,
    /// Delayed TX at DREF_TIME + DX_TIME
    DelayedTxRef = 0x09,
    /// Delayed RX at DREF_TIME + DX_TIME
    DelayedRxRef = 0x0A,
    /// TX only if no preamble is detected
    CcaTx = 0x0B,
    /// TX immediately, then enable the receiver
    TxW4r = 0x0C,
    /// Delayed TX at DX_TIME, then enable the receiver
    DelayedTxW4r = 0x0D,
    /// Delayed TX at TX timestamp + DX_TIME, then enable the receiver
    DelayedTxTsW4r = 0x0E,
    /// Delayed TX at RX timestamp + DX_TIME, then enable the receiver
    DelayedTxRsW4r = 0x0F,
    /// Delayed TX at DREF_TIME + DX_TIME, then enable the receiver
    DelayedTxRefW4r = 0x10,
    /// TX if no preamble is detected, then enable the receiver
    CcaTxW4r = 0x11,
    /// Clear all interrupt events
    ClearIrqs = 0x12,
    /// Hand the finished receive buffer back and swap the host-side buffer
    DbToggle = 0x13,
    /// Request the SPI semaphore
    SemaphoreRequest = 0x14,
    /// Release the SPI semaphore
    SemaphoreRelease = 0x15,
    /// Take the SPI semaphore regardless of the current owner (host 2 only)
    SemaphoreForce = 0x16,
    /// Soft reset, honouring the semaphore
    SemaphoreReset = 0x18,
    /// Soft reset without semaphore arbitration
    SemaphoreResetNoSema = 0x19,
    /// Enter sleep or deep sleep
    EnterSleep = 0x1A,
}

impl FastCommand {
    /// The 5-bit command code
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// The octet that goes on the bus
    pub const fn header_byte(self) -> u8 {
        0x80 | (self.code() << 1) | 0x01
    }

    /// The transmit command for a start time, with or without wait-for-response
    pub const fn transmit(start: Start, response_expected: bool) -> Self {
        match (start, response_expected) {
            (Start::Immediate, false) => FastCommand::Tx,
            (Start::Immediate, true) => FastCommand::TxW4r,
            (Start::Delayed, false) => FastCommand::DelayedTx,
            (Start::Delayed, true) => FastCommand::DelayedTxW4r,
            (Start::DelayedRef, false) => FastCommand::DelayedTxRef,
            (Start::DelayedRef, true) => FastCommand::DelayedTxRefW4r,
            (Start::DelayedRs, false) => FastCommand::DelayedTxRs,
            (Start::DelayedRs, true) => FastCommand::DelayedTxRsW4r,
            (Start::DelayedTs, false) => FastCommand::DelayedTxTs,
            (Start::DelayedTs, true) => FastCommand::DelayedTxTsW4r,
            (Start::Cca, false) => FastCommand::CcaTx,
            (Start::Cca, true) => FastCommand::CcaTxW4r,
        }
    }

    /// The receive command for a start time
    ///
    /// Returns `None` for [`Start::Cca`], which has no receive counterpart.
    pub const fn receive(start: Start) -> Option<Self> {
        match start {
            Start::Immediate => Some(FastCommand::Rx),
            Start::Delayed => Some(FastCommand::DelayedRx),
            Start::DelayedRef => Some(FastCommand::DelayedRxRef),
            Start::DelayedRs => Some(FastCommand::DelayedRxRs),
            Start::DelayedTs => Some(FastCommand::DelayedRxTs),
            Start::Cca => None,
        }
    }
}

impl From<FastCommand> for u8 {
    fn from(command: FastCommand) -> Self {
        command.code()
    }
}

/// When a transmission or reception starts
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Start {
    /// Right away
    Immediate,
    /// At DX_TIME
    Delayed,
    /// At DREF_TIME + DX_TIME
    DelayedRef,
    /// At the last RX timestamp + DX_TIME
    DelayedRs,
    /// At the last TX timestamp + DX_TIME
    DelayedTs,
    /// After a clear channel assessment
    Cca,
}

impl Start {
    /// Whether the chip checks the start time against the half-period warning
    pub const fn is_delayed(self) -> bool {
        matches!(
            self,
            Start::Delayed | Start::DelayedRef | Start::DelayedRs | Start::DelayedTs
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_byte_matches_codec() {
        for command in [
            FastCommand::TxRxOff,
            FastCommand::Rx,
            FastCommand::DelayedTxRefW4r,
            FastCommand::DbToggle,
            FastCommand::EnterSleep,
        ] {
            let header = ll::Header::fast_command(command.code()).unwrap();
            assert_eq!(header.as_bytes(), &[command.header_byte()]);
        }

        assert_eq!(FastCommand::TxRxOff.header_byte(), 0x81);
        assert_eq!(FastCommand::Tx.header_byte(), 0x83);
        assert_eq!(FastCommand::DbToggle.header_byte(), 0xA7);
    }

    #[test]
    fn transmit_selects_wait_for_response_variant() {
        assert_eq!(FastCommand::transmit(Start::Delayed, false), FastCommand::DelayedTx);
        assert_eq!(
            FastCommand::transmit(Start::Delayed, true),
            FastCommand::DelayedTxW4r
        );
        assert_eq!(FastCommand::transmit(Start::Cca, true), FastCommand::CcaTxW4r);
        assert_eq!(FastCommand::receive(Start::DelayedTs), Some(FastCommand::DelayedRxTs));
        assert_eq!(FastCommand::receive(Start::Cca), None);
    }
}
