//! Low-level interface to the DW3000
//!
//! This module implements the SPI transaction protocol of the DW3000: header
//! encoding, the optional CRC-8 trailer, plain and masked register accesses,
//! and fast commands. Users of this library should typically not need to use
//! this directly. Please consider using the [high-level interface] instead.
//!
//! Every method here is exactly one bus transaction, except reads in
//! [`SpiCrcMode::WriteRead`], which are followed by a read of `SPI_RD_CRC`.
//!
//! [high-level interface]: ../hl/index.html

use core::fmt;

use embedded_hal::spi::ErrorType;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::{fmt::warn, maybe_async_attr, spi_type};
use spi_type::spi::{Operation, SpiDevice};

pub mod header;
pub mod regs;

pub use header::{crc8, Direction, Header, MaskWidth, ProtocolError, SPI_CRC};
pub use regs::RegAddr;

/// When the CRC-8 trailer is used on the bus
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpiCrcMode {
    /// No CRC on any transaction
    #[default]
    Disabled,
    /// CRC appended to writes, reads are not checked
    Write,
    /// CRC appended to writes and verified after every read
    WriteRead,
}

impl SpiCrcMode {
    fn on_write(self) -> bool {
        !matches!(self, SpiCrcMode::Disabled)
    }

    fn on_read(self) -> bool {
        matches!(self, SpiCrcMode::WriteRead)
    }
}

/// A register value type: `u8`, `u16` or `u32`
///
/// Values are little-endian on the bus.
pub trait Word: Copy + Default + sealed::Sealed {
    /// Width of the masks for an AND/OR write of this type
    const WIDTH: MaskWidth;

    /// Decode from the first `WIDTH.octets()` octets of `bytes`
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// Encode into the first `WIDTH.octets()` octets of `bytes`
    fn write_le_slice(self, bytes: &mut [u8]);
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
}

macro_rules! impl_word {
    ($($ty:ty => $width:ident,)*) => {
        $(
            impl Word for $ty {
                const WIDTH: MaskWidth = MaskWidth::$width;

                fn from_le_slice(bytes: &[u8]) -> Self {
                    const LEN: usize = core::mem::size_of::<$ty>();
                    let mut raw = [0; LEN];
                    raw.copy_from_slice(&bytes[..LEN]);
                    <$ty>::from_le_bytes(raw)
                }

                fn write_le_slice(self, bytes: &mut [u8]) {
                    let raw = self.to_le_bytes();
                    bytes[..raw.len()].copy_from_slice(&raw);
                }
            }
        )*
    };
}

impl_word! {
    u8 => Bits8,
    u16 => Bits16,
    u32 => Bits32,
}

/// Entry point to the DW3000 driver's low-level API
///
/// Please consider using [hl::DW3000] instead.
///
/// [hl::DW3000]: ../hl/struct.DW3000.html
pub struct DW3000<SPI> {
    spi: SPI,
    crc_mode: SpiCrcMode,
    crc_mismatches: u8,
}

impl<SPI> DW3000<SPI> {
    /// Create a new instance of `DW3000`
    ///
    /// Requires the SPI device that is connected to the DW3000. CRC is off
    /// until [`DW3000::set_crc_mode`] is called.
    pub fn new(spi: SPI) -> Self {
        DW3000 {
            spi,
            crc_mode: SpiCrcMode::Disabled,
            crc_mismatches: 0,
        }
    }

    /// Allow access to the SPI bus
    pub fn bus(&mut self) -> &mut SPI {
        &mut self.spi
    }

    /// Give back the SPI device
    pub fn free(self) -> SPI {
        self.spi
    }

    /// The CRC mode used for subsequent transactions
    pub fn crc_mode(&self) -> SpiCrcMode {
        self.crc_mode
    }

    /// Change the CRC mode used for subsequent transactions
    ///
    /// This only changes what the host does. The chip side is enabled through
    /// `SYS_CFG.SPI_CRCEN`.
    pub fn set_crc_mode(&mut self, mode: SpiCrcMode) {
        self.crc_mode = mode;
    }

    /// Number of read CRC mismatches since the last call, resetting the count
    pub fn take_crc_mismatches(&mut self) -> u8 {
        core::mem::take(&mut self.crc_mismatches)
    }
}

impl<SPI> DW3000<SPI>
where
    SPI: SpiDevice<u8>,
{
    /// Send a fast command
    ///
    /// `fast` is the 5-bit command code, see [`crate::FastCommand`].
    #[maybe_async_attr]
    pub async fn fast_command(&mut self, fast: u8) -> Result<(), Error<SPI>> {
        let header = Header::fast_command(fast)?;

        self.spi
            .write(header.as_bytes())
            .await
            .map_err(Error::Bus)?;

        Ok(())
    }

    /// Perform one register transaction
    ///
    /// For reads, `buffer` receives the register content. For writes and
    /// masked writes, `buffer` is the payload; a masked write payload is the
    /// AND mask followed by the OR mask.
    #[maybe_async_attr]
    pub async fn transact(
        &mut self,
        addr: RegAddr,
        offset: u16,
        direction: Direction,
        buffer: &mut [u8],
    ) -> Result<(), Error<SPI>> {
        let header = Header::register(addr, offset, direction, buffer.len())?;

        if direction.is_write() {
            self.send(&header, buffer).await
        } else {
            self.receive(&header, buffer).await?;
            if self.crc_mode.on_read() && addr.offset(offset) != regs::SPI_RD_CRC {
                self.check_read_crc(&header, buffer).await?;
            }
            Ok(())
        }
    }

    /// Read `buffer.len()` octets starting at `addr + offset`
    #[maybe_async_attr]
    pub async fn read_bytes(
        &mut self,
        addr: RegAddr,
        offset: u16,
        buffer: &mut [u8],
    ) -> Result<(), Error<SPI>> {
        self.transact(addr, offset, Direction::Read, buffer).await
    }

    /// Write `data` starting at `addr + offset`
    #[maybe_async_attr]
    pub async fn write_bytes(
        &mut self,
        addr: RegAddr,
        offset: u16,
        data: &[u8],
    ) -> Result<(), Error<SPI>> {
        let header = Header::register(addr, offset, Direction::Write, data.len())?;
        self.send(&header, data).await
    }

    /// Read a register value
    #[maybe_async_attr]
    pub async fn read<W: Word>(&mut self, addr: RegAddr, offset: u16) -> Result<W, Error<SPI>> {
        let mut buffer = [0; 4];
        let buffer = &mut buffer[..W::WIDTH.octets()];
        self.transact(addr, offset, Direction::Read, buffer).await?;
        Ok(W::from_le_slice(buffer))
    }

    /// Write a register value
    #[maybe_async_attr]
    pub async fn write<W: Word>(
        &mut self,
        addr: RegAddr,
        offset: u16,
        value: W,
    ) -> Result<(), Error<SPI>> {
        let mut buffer = [0; 4];
        let buffer = &mut buffer[..W::WIDTH.octets()];
        value.write_le_slice(buffer);
        self.transact(addr, offset, Direction::Write, buffer).await
    }

    /// Atomically update a register as `(value & and) | or`
    ///
    /// The chip applies both masks itself, so this is a single transaction
    /// and never observes a stale value.
    #[maybe_async_attr]
    pub async fn modify<W: Word>(
        &mut self,
        addr: RegAddr,
        offset: u16,
        and: W,
        or: W,
    ) -> Result<(), Error<SPI>> {
        let width = W::WIDTH.octets();
        let mut buffer = [0; 8];
        and.write_le_slice(&mut buffer[..width]);
        or.write_le_slice(&mut buffer[width..]);
        self.transact(addr, offset, Direction::Modify(W::WIDTH), &mut buffer[..2 * width])
            .await
    }

    #[maybe_async_attr]
    pub async fn read8(&mut self, addr: RegAddr, offset: u16) -> Result<u8, Error<SPI>> {
        self.read(addr, offset).await
    }

    #[maybe_async_attr]
    pub async fn read16(&mut self, addr: RegAddr, offset: u16) -> Result<u16, Error<SPI>> {
        self.read(addr, offset).await
    }

    #[maybe_async_attr]
    pub async fn read32(&mut self, addr: RegAddr, offset: u16) -> Result<u32, Error<SPI>> {
        self.read(addr, offset).await
    }

    #[maybe_async_attr]
    pub async fn write8(&mut self, addr: RegAddr, offset: u16, value: u8) -> Result<(), Error<SPI>> {
        self.write(addr, offset, value).await
    }

    #[maybe_async_attr]
    pub async fn write16(
        &mut self,
        addr: RegAddr,
        offset: u16,
        value: u16,
    ) -> Result<(), Error<SPI>> {
        self.write(addr, offset, value).await
    }

    #[maybe_async_attr]
    pub async fn write32(
        &mut self,
        addr: RegAddr,
        offset: u16,
        value: u32,
    ) -> Result<(), Error<SPI>> {
        self.write(addr, offset, value).await
    }

    /// Read a 40-bit value, such as a timestamp
    #[maybe_async_attr]
    pub async fn read40(&mut self, addr: RegAddr, offset: u16) -> Result<u64, Error<SPI>> {
        let mut buffer = [0; 8];
        self.transact(addr, offset, Direction::Read, &mut buffer[..5])
            .await?;
        Ok(u64::from_le_bytes(buffer))
    }

    #[maybe_async_attr]
    async fn send(&mut self, header: &Header, data: &[u8]) -> Result<(), Error<SPI>> {
        if self.crc_mode.on_write() {
            let crc = [crc8(header, data)];
            self.spi
                .transaction(&mut [
                    Operation::Write(header.as_bytes()),
                    Operation::Write(data),
                    Operation::Write(&crc),
                ])
                .await
                .map_err(Error::Bus)
        } else {
            self.spi
                .transaction(&mut [Operation::Write(header.as_bytes()), Operation::Write(data)])
                .await
                .map_err(Error::Bus)
        }
    }

    #[maybe_async_attr]
    async fn receive(&mut self, header: &Header, buffer: &mut [u8]) -> Result<(), Error<SPI>> {
        self.spi
            .transaction(&mut [Operation::Write(header.as_bytes()), Operation::Read(buffer)])
            .await
            .map_err(Error::Bus)
    }

    #[maybe_async_attr]
    async fn check_read_crc(&mut self, header: &Header, data: &[u8]) -> Result<(), Error<SPI>> {
        let expected = crc8(header, data);

        let crc_header = Header::register(regs::SPI_RD_CRC, 0, Direction::Read, 1)?;
        let mut received = [0];
        self.receive(&crc_header, &mut received).await?;

        if received[0] != expected {
            warn!(
                "SPI read CRC mismatch: computed {:#x}, chip reported {:#x}",
                expected,
                received[0]
            );
            self.crc_mismatches = self.crc_mismatches.saturating_add(1);
        }

        Ok(())
    }
}

impl<SPI> fmt::Debug for DW3000<SPI> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DW3000 {{ crc_mode: {:?}, .. }}", self.crc_mode)
    }
}

/// An error that can occur when communicating with the DW3000
pub enum Error<SPI>
where
    SPI: ErrorType,
{
    /// The SPI transfer failed
    Bus(SPI::Error),

    /// The transaction cannot be encoded; nothing was sent
    Protocol(ProtocolError),
}

impl<SPI> From<ProtocolError> for Error<SPI>
where
    SPI: ErrorType,
{
    fn from(error: ProtocolError) -> Self {
        Error::Protocol(error)
    }
}

// We can't derive this implementation, as the compiler will complain that the
// associated error type doesn't implement `Debug`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Bus(error) => write!(f, "Bus({:?})", error),
            Error::Protocol(error) => write!(f, "Protocol({:?})", error),
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI> defmt::Format for Error<SPI>
where
    SPI: ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Bus(_) => defmt::write!(f, "Bus()"),
            Error::Protocol(error) => defmt::write!(f, "Protocol({})", error),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    fn write(bytes: &[u8]) -> [SpiTransaction<u8>; 3] {
        [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(bytes.to_vec()),
            SpiTransaction::transaction_end(),
        ]
    }

    #[tokio::test]
    async fn fast_command_is_a_single_octet() {
        let expectations = write(&[0x89]);
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone());

        dw3000.fast_command(0x04).await.unwrap();

        spi.done();
    }

    #[tokio::test]
    async fn read_uses_header_then_payload() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x41, 0x10]),
            SpiTransaction::read_vec(vec![0x03, 0x00, 0x80, 0x00]),
            SpiTransaction::transaction_end(),
        ];
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone());

        let status = dw3000.read32(regs::SYS_STATUS, 0).await.unwrap();
        assert_eq!(status, 0x0080_0003);

        spi.done();
    }

    #[tokio::test]
    async fn modify_carries_both_masks_in_one_transaction() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0xD2, 0x42]),
            SpiTransaction::write_vec(vec![0xFF, 0x1F, 0x00, 0xE0]),
            SpiTransaction::transaction_end(),
        ];
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone());

        dw3000
            .modify::<u16>(regs::PLL_COMMON, 0, 0x1FFF, 0xE000)
            .await
            .unwrap();

        spi.done();
    }

    #[tokio::test]
    async fn write_appends_crc_when_enabled() {
        let header = Header::register(regs::SYS_STATUS, 0, Direction::Write, 4).unwrap();
        let payload = [0x80, 0x00, 0x00, 0x00];
        let crc = crc8(&header, &payload);

        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0xC1, 0x10]),
            SpiTransaction::write_vec(payload.to_vec()),
            SpiTransaction::write_vec(vec![crc]),
            SpiTransaction::transaction_end(),
        ];
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone());
        dw3000.set_crc_mode(SpiCrcMode::Write);

        dw3000.write32(regs::SYS_STATUS, 0, 0x80).await.unwrap();

        spi.done();
    }

    fn read_with_crc(payload: &[u8], reported_crc: u8) -> Vec<SpiTransaction<u8>> {
        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x41, 0x10]),
            SpiTransaction::read_vec(payload.to_vec()),
            SpiTransaction::transaction_end(),
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x40, 0x60]),
            SpiTransaction::read_vec(vec![reported_crc]),
            SpiTransaction::transaction_end(),
        ]
    }

    #[tokio::test]
    async fn read_crc_match_latches_nothing() {
        let header = Header::register(regs::SYS_STATUS, 0, Direction::Read, 4).unwrap();
        let payload = [0x00, 0x60, 0x00, 0x00];
        let expectations = read_with_crc(&payload, crc8(&header, &payload));
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone());
        dw3000.set_crc_mode(SpiCrcMode::WriteRead);

        dw3000.read32(regs::SYS_STATUS, 0).await.unwrap();
        assert_eq!(dw3000.take_crc_mismatches(), 0);

        spi.done();
    }

    #[tokio::test]
    async fn corrupted_read_latches_mismatch() {
        let header = Header::register(regs::SYS_STATUS, 0, Direction::Read, 4).unwrap();
        let payload = [0x00, 0x60, 0x00, 0x00];
        let crc = crc8(&header, &payload);

        let mut corrupted = payload;
        corrupted[1] ^= 0x01;
        let expectations = read_with_crc(&corrupted, crc);
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone());
        dw3000.set_crc_mode(SpiCrcMode::WriteRead);

        dw3000.read32(regs::SYS_STATUS, 0).await.unwrap();
        assert_eq!(dw3000.take_crc_mismatches(), 1);
        assert_eq!(dw3000.take_crc_mismatches(), 0);

        spi.done();
    }

    #[tokio::test]
    async fn corrupted_read_is_ignored_without_read_crc() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x41, 0x10]),
            SpiTransaction::read_vec(vec![0x00, 0x61, 0x00, 0x00]),
            SpiTransaction::transaction_end(),
        ];
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone());
        dw3000.set_crc_mode(SpiCrcMode::Write);

        dw3000.read32(regs::SYS_STATUS, 0).await.unwrap();
        assert_eq!(dw3000.take_crc_mismatches(), 0);

        spi.done();
    }

    #[tokio::test]
    async fn invalid_transaction_sends_nothing() {
        let expectations: [SpiTransaction<u8>; 0] = [];
        let mut spi = SpiMock::new(&expectations);
        let mut dw3000 = DW3000::new(spi.clone());

        let mut buffer = [0; 4];
        let result = dw3000
            .transact(
                regs::SYS_CFG,
                0,
                Direction::Modify(MaskWidth::Bits8),
                &mut buffer,
            )
            .await;
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::InvalidMask { .. }))
        ));

        let result = dw3000.fast_command(0x21).await;
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::InvalidFastCommand(0x21)))
        ));

        spi.done();
    }
}
