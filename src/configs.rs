//! Radio configuration
//!
//! [`Config`] gathers the PHY settings that the transmit/receive path and the
//! interrupt handler depend on. It is applied with
//! [`DW3000::configure`](crate::hl::DW3000::configure), which writes the
//! matching register fields and caches what the interrupt handler needs.

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::ll::{
    regs::{chan_ctrl, sts_cfg, sys_cfg},
    SpiCrcMode,
};

/// Device configuration
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// The UWB channel
    pub channel: UwbChannel,
    /// Start-of-frame delimiter
    pub sfd_sequence: SfdSequence,
    /// Preamble code, used for both TX and RX
    pub preamble_code: u8,
    /// Standard (127 octets) or extended (1023 octets) PHR
    pub phr_mode: PhrMode,
    /// Scrambled timestamp sequence packet format
    pub sts_mode: StsMode,
    /// Length of the scrambled timestamp sequence
    pub sts_len: StsLen,
    /// Don't check the frame check sequence of received frames
    pub disable_fce: bool,
    /// Treat a frame check error on a zero-length frame as a good reception
    ///
    /// Some PHY configurations produce valid empty frames that the chip
    /// reports with RXFCE set.
    pub zero_len_fce_good: bool,
    /// CRC on the SPI bus
    pub spi_crc: SpiCrcMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            channel: UwbChannel::default(),
            sfd_sequence: SfdSequence::default(),
            preamble_code: UwbChannel::default().recommended_preamble_code(),
            phr_mode: PhrMode::default(),
            sts_mode: StsMode::default(),
            sts_len: StsLen::default(),
            disable_fce: false,
            zero_len_fce_good: false,
            spi_crc: SpiCrcMode::default(),
        }
    }
}

impl Config {
    /// Check that the combination of settings is supported
    pub fn is_valid(&self) -> bool {
        (1..=24).contains(&self.preamble_code)
    }

    /// SYS_CFG bits controlled by the configuration, as an AND/OR pair
    pub(crate) fn sys_cfg_masks(&self) -> (u32, u32) {
        let and = !(sys_cfg::DIS_FCE | sys_cfg::PHR_MODE | sys_cfg::CP_SPC_MASK | sys_cfg::CP_SDC);

        let mut or = (self.sts_mode.packet_config() << sys_cfg::CP_SPC_SHIFT) & sys_cfg::CP_SPC_MASK;
        if self.sts_mode.is_sdc() {
            or |= sys_cfg::CP_SDC;
        }
        if self.disable_fce {
            or |= sys_cfg::DIS_FCE;
        }
        if self.phr_mode == PhrMode::Extended {
            or |= sys_cfg::PHR_MODE;
        }

        (and, or)
    }

    /// CHAN_CTRL value
    pub(crate) fn chan_ctrl(&self) -> u16 {
        let mut value = 0;
        if self.channel == UwbChannel::Channel9 {
            value |= chan_ctrl::RF_CHAN;
        }
        value |= (self.sfd_sequence as u16) << chan_ctrl::SFD_TYPE_SHIFT;
        value |= u16::from(self.preamble_code & 0x1F) << chan_ctrl::TX_PCODE_SHIFT;
        value |= u16::from(self.preamble_code & 0x1F) << chan_ctrl::RX_PCODE_SHIFT;
        value
    }

    /// STS_CFG value
    pub(crate) fn sts_cfg(&self) -> u16 {
        self.sts_len.cps_len() & sts_cfg::CPS_LEN_MASK
    }
}

/// All the available UWB channels
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UwbChannel {
    /// Channel 5, centred on 6489.6 MHz
    #[default]
    Channel5,
    /// Channel 9, centred on 7987.2 MHz
    Channel9,
}

impl UwbChannel {
    /// A 64 MHz PRF preamble code valid on this channel
    pub fn recommended_preamble_code(&self) -> u8 {
        9
    }

    /// Channel number as used in the IEEE 802.15.4 UWB PHY
    pub fn number(&self) -> u8 {
        match self {
            UwbChannel::Channel5 => 5,
            UwbChannel::Channel9 => 9,
        }
    }
}

/// Start-of-frame delimiter sequence
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SfdSequence {
    /// IEEE 802.15.4 8 symbol SFD
    Ieee = 0b00,
    /// Decawave 8 symbol SFD
    Decawave8 = 0b01,
    /// Decawave 16 symbol SFD
    Decawave16 = 0b10,
    /// IEEE 802.15.4z 8 symbol SFD
    #[default]
    IeeeShort = 0b11,
}

/// PHY header mode
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PhrMode {
    /// Frames of up to 127 octets
    #[default]
    Standard,
    /// Frames of up to 1023 octets
    Extended,
}

/// Scrambled timestamp sequence packet format
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StsMode {
    /// No STS
    #[default]
    Off,
    /// STS after the SFD, before the PHR
    Mode1,
    /// STS after the payload
    Mode2,
    /// STS and no PHR or payload
    ModeNoData,
    /// Mode 1 with the super deterministic code
    Mode1Sdc,
    /// Mode 2 with the super deterministic code
    Mode2Sdc,
    /// No-data mode with the super deterministic code
    ModeNoDataSdc,
}

impl StsMode {
    /// Whether a reception in this mode never carries a payload
    pub fn is_no_data(&self) -> bool {
        matches!(self, StsMode::ModeNoData | StsMode::ModeNoDataSdc)
    }

    /// Whether the super deterministic code is used
    pub fn is_sdc(&self) -> bool {
        matches!(
            self,
            StsMode::Mode1Sdc | StsMode::Mode2Sdc | StsMode::ModeNoDataSdc
        )
    }

    fn packet_config(&self) -> u32 {
        match self {
            StsMode::Off => 0,
            StsMode::Mode1 | StsMode::Mode1Sdc => 1,
            StsMode::Mode2 | StsMode::Mode2Sdc => 2,
            StsMode::ModeNoData | StsMode::ModeNoDataSdc => 3,
        }
    }
}

/// Length of the scrambled timestamp sequence in symbols
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StsLen {
    StsLen32,
    #[default]
    StsLen64,
    StsLen128,
    StsLen256,
    StsLen512,
    StsLen1024,
    StsLen2048,
}

impl StsLen {
    /// Number of symbols
    pub fn symbols(&self) -> u16 {
        match self {
            StsLen::StsLen32 => 32,
            StsLen::StsLen64 => 64,
            StsLen::StsLen128 => 128,
            StsLen::StsLen256 => 256,
            StsLen::StsLen512 => 512,
            StsLen::StsLen1024 => 1024,
            StsLen::StsLen2048 => 2048,
        }
    }

    /// STS_CFG.CPS_LEN, the length in blocks of 8 minus one
    pub fn cps_len(&self) -> u16 {
        self.symbols() / 8 - 1
    }
}
