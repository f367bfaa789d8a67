use core::fmt;
use core::fmt::{Display, Formatter};

use embedded_hal::spi;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::ll;

/// An error that can occur when driving the DW3000
pub enum Error<SPI>
where
    SPI: spi::ErrorType,
{
    /// Error occured while using SPI bus
    Spi(ll::Error<SPI>),

    /// The start time of a delayed transmission or reception had already
    /// passed when the command was issued
    ///
    /// The radio has been switched off. For a reception without
    /// [`RxMode::IDLE_ON_DLY_ERR`](crate::hl::RxMode::IDLE_ON_DLY_ERR), the
    /// receiver was re-enabled immediately instead.
    Late,

    /// A bounded wait for the chip ran out of attempts
    Timeout,

    /// The mode or argument combination is not supported; nothing was sent
    InvalidArgument,

    /// Buffer too small
    BufferTooSmall {
        /// Indicates how large a buffer would have been required
        required_len: usize,
    },

    /// The chip did not identify as the expected variant
    InitializationFailed,

    /// The configuration was not valid. Some combinations of settings are not
    /// allowed.
    InvalidConfiguration,
}

impl<SPI> From<ll::Error<SPI>> for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: ll::Error<SPI>) -> Self {
        Error::Spi(error)
    }
}

impl<SPI> Display for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Spi(ll::Error::Bus(_)) => write!(f, "SPI transfer failed"),
            Error::Spi(ll::Error::Protocol(error)) => write!(f, "{}", error),
            Error::Late => write!(f, "delayed start time already passed"),
            Error::Timeout => write!(f, "timed out waiting for the chip"),
            Error::InvalidArgument => write!(f, "unsupported argument"),
            Error::BufferTooSmall { required_len } => {
                write!(f, "buffer too small, {} octets required", required_len)
            }
            Error::InitializationFailed => write!(f, "unexpected device id"),
            Error::InvalidConfiguration => write!(f, "invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl<SPI> std::error::Error for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
}

// We can't derive this implementation, as `Debug` is only implemented
// conditionally for `ll::Debug`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(error) => write!(f, "Spi({:?})", error),
            Error::Late => write!(f, "Late"),
            Error::Timeout => write!(f, "Timeout"),
            Error::InvalidArgument => write!(f, "InvalidArgument"),
            Error::BufferTooSmall { required_len } => {
                write!(f, "BufferTooSmall {{ required_len: {:?} }}", required_len,)
            }
            Error::InitializationFailed => write!(f, "InitializationFailed"),
            Error::InvalidConfiguration => write!(f, "InvalidConfiguration"),
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI> Format for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Spi(error) => defmt::write!(f, "Spi({:?})", error),
            Error::Late => defmt::write!(f, "Late"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::InvalidArgument => defmt::write!(f, "InvalidArgument"),
            Error::BufferTooSmall { required_len } => {
                defmt::write!(f, "BufferTooSmall {{ required_len: {:?} }}", required_len,)
            }
            Error::InitializationFailed => defmt::write!(f, "InitializationFailed"),
            Error::InvalidConfiguration => defmt::write!(f, "InvalidConfiguration"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use embedded_hal_mock::eh1::spi::Mock as SpiMock;

    #[test]
    fn protocol_errors_display_their_cause() {
        use std::string::ToString;

        let error = Error::<SpiMock<u8>>::from(ll::Error::Protocol(
            ll::ProtocolError::InvalidSubAddress(0x84),
        ));
        assert_eq!(error.to_string(), "invalid sub-address 0x84");

        let error = Error::<SpiMock<u8>>::BufferTooSmall { required_len: 42 };
        assert_eq!(
            std::format!("{:?}", error),
            "BufferTooSmall { required_len: 42 }"
        );
    }

    #[cfg(feature = "defmt")]
    #[test]
    fn test_defmt() {
        let error = Error::<SpiMock<u8>>::BufferTooSmall { required_len: 42 };

        defmt::info!("error: {:?}", error);
    }
}
