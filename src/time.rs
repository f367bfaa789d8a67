//! Time-related types based on the DW3000's system time
//!
//! The chip counts time in device time units (DTU) of 1/(128 * 499.2 MHz),
//! about 15.65 ps, in a 40-bit counter that wraps roughly every 17.2 s.

use core::ops::{Add, Sub};

#[cfg(feature = "defmt")]
use defmt::Format;

/// The maximum value of 40-bit system time stamps.
pub const TIME_MAX: u64 = 0xff_ffff_ffff;

/// Device time units per microsecond, rounded
pub const DTU_PER_US: u64 = 63898;

/// DX_TIME and DREF_TIME hold bits 8..39 of a 40-bit time; bit 8 is ignored
const DELAYED_TIME_SHIFT: u32 = 8;

/// Represents an instant in time
///
/// Internally uses the same 40-bit timestamps that the DW3000 uses.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instant(u64);

impl Instant {
    /// Creates a new instance of `Instant`
    ///
    /// Returns `None` if `value` does not fit in 40 bits.
    ///
    /// ``` rust
    /// use dw3000_trx::time::{Instant, TIME_MAX};
    ///
    /// assert!(Instant::new(TIME_MAX).is_some());
    /// assert!(Instant::new(TIME_MAX + 1).is_none());
    /// ```
    pub fn new(value: u64) -> Option<Self> {
        if value <= TIME_MAX {
            Some(Instant(value))
        } else {
            None
        }
    }

    /// Builds an instant from a raw register value, dropping bits above 40
    pub fn from_raw(value: u64) -> Self {
        Instant(value & TIME_MAX)
    }

    /// Rebuilds an instant from a 32-bit DX_TIME / DREF_TIME register value
    pub fn from_delayed_time(value: u32) -> Self {
        Instant(u64::from(value) << DELAYED_TIME_SHIFT)
    }

    /// Returns the raw 40-bit timestamp
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The value to program into DX_TIME or DREF_TIME
    ///
    /// Those registers hold bits 8..39 of the start time; the chip ignores
    /// bit 8 as well, giving an effective resolution of about 8 ns.
    pub fn delayed_time(&self) -> u32 {
        (self.0 >> DELAYED_TIME_SHIFT) as u32
    }

    /// Returns the amount of time passed between the two `Instant`s
    ///
    /// Assumes that `self` is the later of the two. Timestamps wrap, so the
    /// numerical order says nothing about the real order.
    ///
    /// ``` rust
    /// use dw3000_trx::time::{Instant, TIME_MAX};
    ///
    /// let before_wrap = Instant::new(TIME_MAX).unwrap();
    /// let after_wrap = Instant::new(49).unwrap();
    ///
    /// assert_eq!(after_wrap.duration_since(before_wrap).value(), 50);
    /// ```
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        Duration(self.0.wrapping_sub(earlier.0) & TIME_MAX)
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Self::Output {
        Instant((self.0 + rhs.0) & TIME_MAX)
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Self::Output {
        Instant(self.0.wrapping_sub(rhs.0) & TIME_MAX)
    }
}

impl Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Self::Output {
        self.duration_since(rhs)
    }
}

/// A duration between two instants in DW3000 system time
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Duration(u64);

impl Duration {
    /// Creates a new `Duration`, or `None` if `value` exceeds 40 bits
    pub fn new(value: u64) -> Option<Self> {
        if value <= TIME_MAX {
            Some(Duration(value))
        } else {
            None
        }
    }

    /// A duration of a whole number of microseconds
    pub fn from_micros(micros: u32) -> Self {
        Duration(u64::from(micros) * DTU_PER_US)
    }

    /// A duration of a whole number of nanoseconds
    pub fn from_nanos(nanos: u32) -> Self {
        Duration(u64::from(nanos) * DTU_PER_US / 1000)
    }

    /// Duration in device time units
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u16> for Duration {
    fn from(value: u16) -> Self {
        Duration(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_arithmetic_wraps_at_40_bits() {
        let instant = Instant::new(TIME_MAX - 9).unwrap();

        assert_eq!((instant + Duration(20)).value(), 10);
        assert_eq!((Instant(5) - Duration(10)).value(), TIME_MAX - 4);
        assert_eq!((Instant(10) - instant).value(), 20);
    }

    #[test]
    fn delayed_time_drops_low_octet() {
        let instant = Instant::new(0x12_3456_78FF).unwrap();

        assert_eq!(instant.delayed_time(), 0x1234_5678);
        assert_eq!(
            Instant::from_delayed_time(0x1234_5678).value(),
            0x12_3456_7800
        );
    }

    #[test]
    fn duration_conversions() {
        assert_eq!(Duration::from_micros(1).value(), DTU_PER_US);
        assert_eq!(Duration::from_nanos(1000).value(), DTU_PER_US);
        assert!(Duration::new(TIME_MAX + 1).is_none());
    }
}
