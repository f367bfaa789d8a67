//! SPI header encoding for the DW3000 transaction protocol
//!
//! Every bus transaction starts with a 1- or 2-octet header. The DW3000 user
//! manual (section 2.3.1) defines three layouts:
//!
//! - fast command: `1 | 0 | cmd[4:0] | 1`
//! - short (fast access) read/write: `rw | 0 | file[4:0] | 0`
//! - extended address: `rw | 1 | file[4:0] | sub[6]`, `sub[5:0] | m1 | m0`
//!
//! The `m1 m0` bits select plain access (`00`) or a masked AND/OR write of
//! 8, 16 or 32 bits (`01`, `10`, `11`).

use core::fmt;

use crc::{Crc, CRC_8_SMBUS};

#[cfg(feature = "defmt")]
use defmt::Format;

use super::regs::RegAddr;

/// CRC-8 with polynomial `x^8 + x^2 + x + 1`, initial value 0
///
/// This is the CRC the DW3000 expects after a write and computes for a read
/// when SPI CRC mode is enabled.
pub const SPI_CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Upper bound (exclusive) on the payload of a single transaction
pub const MAX_TRANSACTION_LEN: usize = 0x3100;

/// Largest sub-address reachable through the header
pub const MAX_SUB_ADDRESS: u32 = 0x7F;

/// Largest register file id
pub const MAX_FILE_ID: u32 = 0x1F;

const WRITE_BIT: u8 = 0x80;
const EXTENDED_BIT: u8 = 0x40;
const FAST_COMMAND_BIT: u8 = 0x01;

/// Width of the masks carried by a masked (AND/OR) write
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum MaskWidth {
    /// 8-bit AND mask followed by 8-bit OR mask
    Bits8 = 0b01,
    /// 16-bit AND mask followed by 16-bit OR mask
    Bits16 = 0b10,
    /// 32-bit AND mask followed by 32-bit OR mask
    Bits32 = 0b11,
}

impl MaskWidth {
    /// Number of octets in one mask
    pub const fn octets(self) -> usize {
        match self {
            MaskWidth::Bits8 => 1,
            MaskWidth::Bits16 => 2,
            MaskWidth::Bits32 => 4,
        }
    }
}

/// Direction of a register transaction
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Direction {
    /// Read from the register
    Read,
    /// Write to the register
    Write,
    /// Atomic AND/OR write performed by the chip
    Modify(MaskWidth),
}

impl Direction {
    /// Whether the transaction carries data from host to chip
    pub fn is_write(self) -> bool {
        !matches!(self, Direction::Read)
    }

    fn mode_bits(self) -> u8 {
        match self {
            Direction::Read | Direction::Write => 0b00,
            Direction::Modify(width) => width as u8,
        }
    }
}

/// A transaction that cannot be expressed on the bus
///
/// These are programming errors. They are reported before any byte is
/// clocked out.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum ProtocolError {
    /// The register file id does not fit in 5 bits
    InvalidFile(u32),

    /// The sub-address does not fit in 7 bits
    InvalidSubAddress(u32),

    /// The payload is larger than the register space allows
    InvalidLength(usize),

    /// A masked write payload is not one AND mask and one OR mask of the
    /// declared width
    InvalidMask {
        /// Width declared by the direction
        width: MaskWidth,
        /// Length of the payload that was passed
        len: usize,
    },

    /// The fast command code does not fit in 5 bits
    InvalidFastCommand(u8),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidFile(file) => write!(f, "invalid register file {:#x}", file),
            ProtocolError::InvalidSubAddress(sub) => write!(f, "invalid sub-address {:#x}", sub),
            ProtocolError::InvalidLength(len) => write!(f, "invalid payload length {}", len),
            ProtocolError::InvalidMask { width, len } => {
                write!(f, "masked write of {:?} with {} octets", width, len)
            }
            ProtocolError::InvalidFastCommand(cmd) => write!(f, "invalid fast command {:#x}", cmd),
        }
    }
}

/// An encoded transaction header
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Header {
    bytes: [u8; 2],
    len: usize,
}

impl Header {
    /// Encode the header for a fast command
    pub fn fast_command(cmd: u8) -> Result<Self, ProtocolError> {
        if cmd > 0x1F {
            return Err(ProtocolError::InvalidFastCommand(cmd));
        }

        Ok(Header {
            bytes: [WRITE_BIT | (cmd << 1) | FAST_COMMAND_BIT, 0],
            len: 1,
        })
    }

    /// Encode the header for a register access
    ///
    /// `offset` is added to the sub-address of `addr` before encoding.
    /// `payload_len` is the number of octets that follow the header, not
    /// counting a CRC byte.
    pub fn register(
        addr: RegAddr,
        offset: u16,
        direction: Direction,
        payload_len: usize,
    ) -> Result<Self, ProtocolError> {
        if payload_len >= MAX_TRANSACTION_LEN {
            return Err(ProtocolError::InvalidLength(payload_len));
        }
        if let Direction::Modify(width) = direction {
            if payload_len != 2 * width.octets() {
                return Err(ProtocolError::InvalidMask {
                    width,
                    len: payload_len,
                });
            }
        }

        let combined = addr.value() + u32::from(offset);
        let file = combined >> 16;
        let sub = combined & 0xFFFF;
        if file > MAX_FILE_ID {
            return Err(ProtocolError::InvalidFile(file));
        }
        if sub > MAX_SUB_ADDRESS {
            return Err(ProtocolError::InvalidSubAddress(sub));
        }

        let word = ((file as u16) << 9) | ((sub as u16) << 2);
        let rw = if direction.is_write() { WRITE_BIT } else { 0 };
        let mut bytes = [rw | (word >> 8) as u8, (word as u8) | direction.mode_bits()];

        let short = sub == 0 && matches!(direction, Direction::Read | Direction::Write);
        let len = if short {
            1
        } else {
            bytes[0] |= EXTENDED_BIT;
            2
        };

        Ok(Header { bytes, len })
    }

    /// The header octets that go on the wire
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Number of header octets (1 or 2)
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this is the single-octet form
    pub fn is_short(&self) -> bool {
        self.len == 1
    }
}

/// CRC-8 over a header followed by its payload
pub fn crc8(header: &Header, payload: &[u8]) -> u8 {
    let mut digest = SPI_CRC.digest();
    digest.update(header.as_bytes());
    digest.update(payload);
    digest.finalize()
}
