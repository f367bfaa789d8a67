//! Register addresses and bit layouts used by the driver
//!
//! Only the registers this driver touches are listed here. Addresses are
//! `(file << 16) | sub_address`, the same packing the DW3000 user manual
//! uses in its register tables.

#[cfg(feature = "defmt")]
use defmt::Format;

/// A register file id plus sub-address
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct RegAddr(u32);

impl RegAddr {
    /// Build an address from a file id and a sub-address
    pub const fn new(file: u8, sub: u8) -> Self {
        RegAddr(((file as u32) << 16) | sub as u32)
    }

    /// Build an address from its packed representation
    ///
    /// No validation happens here. An out-of-range address is rejected when
    /// the transaction header is encoded.
    pub const fn from_raw(value: u32) -> Self {
        RegAddr(value)
    }

    /// The packed `(file << 16) | sub` value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The register file id
    pub const fn file(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// The sub-address inside the register file
    pub const fn sub(self) -> u16 {
        self.0 as u16
    }

    /// This register shifted by `offset` octets
    pub const fn offset(self, offset: u16) -> Self {
        RegAddr(self.0 + offset as u32)
    }
}

// General configuration, file 0x00
pub const DEV_ID: RegAddr = RegAddr::new(0x00, 0x00);
pub const SYS_CFG: RegAddr = RegAddr::new(0x00, 0x10);
pub const SPI_RD_CRC: RegAddr = RegAddr::new(0x00, 0x18);
pub const SYS_TIME: RegAddr = RegAddr::new(0x00, 0x1C);
pub const TX_FCTRL: RegAddr = RegAddr::new(0x00, 0x24);
pub const DX_TIME: RegAddr = RegAddr::new(0x00, 0x2C);
pub const DREF_TIME: RegAddr = RegAddr::new(0x00, 0x30);
pub const RX_FWTO: RegAddr = RegAddr::new(0x00, 0x34);
pub const SYS_ENABLE_LO: RegAddr = RegAddr::new(0x00, 0x3C);
pub const SYS_ENABLE_HI: RegAddr = RegAddr::new(0x00, 0x40);
pub const SYS_STATUS: RegAddr = RegAddr::new(0x00, 0x44);
pub const SYS_STATUS_HI: RegAddr = RegAddr::new(0x00, 0x48);
pub const RX_FINFO: RegAddr = RegAddr::new(0x00, 0x4C);
pub const RX_TIME: RegAddr = RegAddr::new(0x00, 0x64);
pub const TX_TIME: RegAddr = RegAddr::new(0x00, 0x74);

// General configuration, file 0x01
pub const TX_ANTD: RegAddr = RegAddr::new(0x01, 0x04);
pub const CHAN_CTRL: RegAddr = RegAddr::new(0x01, 0x14);
pub const RDB_STATUS: RegAddr = RegAddr::new(0x01, 0x24);
pub const RDB_DIAG: RegAddr = RegAddr::new(0x01, 0x28);

pub const STS_CFG: RegAddr = RegAddr::new(0x02, 0x00);
pub const PRE_TOC: RegAddr = RegAddr::new(0x06, 0x04);
pub const PLL_COMMON: RegAddr = RegAddr::new(0x09, 0x10);
pub const CIA_CONF: RegAddr = RegAddr::new(0x0E, 0x00);
pub const SYS_STATE: RegAddr = RegAddr::new(0x0F, 0x30);
pub const CLK_CTRL: RegAddr = RegAddr::new(0x11, 0x04);

pub const RX_BUFFER_0: RegAddr = RegAddr::new(0x12, 0x00);
pub const RX_BUFFER_1: RegAddr = RegAddr::new(0x13, 0x00);
pub const TX_BUFFER: RegAddr = RegAddr::new(0x14, 0x00);

pub const DB_DIAG: RegAddr = RegAddr::new(0x18, 0x00);
pub const SPI_SEM: RegAddr = RegAddr::new(0x1A, 0x00);
pub const INDIRECT_POINTER_A: RegAddr = RegAddr::new(0x1D, 0x00);
pub const INDIRECT_POINTER_B: RegAddr = RegAddr::new(0x1E, 0x00);

pub const FINT_STAT: RegAddr = RegAddr::new(0x1F, 0x00);
pub const PTR_ADDR_A: RegAddr = RegAddr::new(0x1F, 0x04);
pub const PTR_OFFSET_A: RegAddr = RegAddr::new(0x1F, 0x08);
pub const PTR_ADDR_B: RegAddr = RegAddr::new(0x1F, 0x0C);
pub const PTR_OFFSET_B: RegAddr = RegAddr::new(0x1F, 0x10);

/// Low 32 bits of SYS_STATUS (and SYS_ENABLE)
pub mod sys_status {
    pub const IRQS: u32 = 1 << 0;
    pub const CPLOCK: u32 = 1 << 1;
    pub const SPICRCE: u32 = 1 << 2;
    pub const AAT: u32 = 1 << 3;
    pub const TXFRB: u32 = 1 << 4;
    pub const TXPRS: u32 = 1 << 5;
    pub const TXPHS: u32 = 1 << 6;
    pub const TXFRS: u32 = 1 << 7;
    pub const RXPRD: u32 = 1 << 8;
    pub const RXSFDD: u32 = 1 << 9;
    pub const CIADONE: u32 = 1 << 10;
    pub const RXPHD: u32 = 1 << 11;
    pub const RXPHE: u32 = 1 << 12;
    pub const RXFR: u32 = 1 << 13;
    pub const RXFCG: u32 = 1 << 14;
    pub const RXFCE: u32 = 1 << 15;
    pub const RXFSL: u32 = 1 << 16;
    pub const RXFTO: u32 = 1 << 17;
    pub const CIAERR: u32 = 1 << 18;
    pub const VWARN: u32 = 1 << 19;
    pub const RXOVRR: u32 = 1 << 20;
    pub const RXPTO: u32 = 1 << 21;
    pub const SPIRDY: u32 = 1 << 23;
    pub const RCINIT: u32 = 1 << 24;
    pub const PLL_HILO: u32 = 1 << 25;
    pub const RXSTO: u32 = 1 << 26;
    pub const HPDWARN: u32 = 1 << 27;
    pub const CPERR: u32 = 1 << 28;
    pub const ARFE: u32 = 1 << 29;
    pub const SPI1_AVAIL: u32 = 1 << 30;
    pub const SPI2_AVAIL: u32 = 1 << 31;

    /// HPDWARN as seen in the single octet at offset 3
    pub const HPDWARN_BYTE3: u8 = (HPDWARN >> 24) as u8;

    pub const ALL_TX: u32 = AAT | TXFRB | TXPRS | TXPHS | TXFRS;
    pub const ALL_RX_GOOD: u32 = RXFR | RXFCG | RXPRD | RXSFDD | RXPHD | CIADONE;
    pub const ALL_RX_ERR: u32 =
        RXPHE | RXFCE | RXFSL | RXSTO | ARFE | CIAERR | CPERR | RXOVRR;
    pub const ALL_RX_TO: u32 = RXFTO | RXPTO;

    /// Reception failures reported through the RX error callback
    pub const RX_ERR_EVENTS: u32 = RXFCE | RXFSL | RXPHE | ARFE | RXSTO | RXOVRR;

    pub const SPI_READY: u32 = SPIRDY | RCINIT;
    pub const DUAL_SPI_AVAIL: u32 = SPI1_AVAIL | SPI2_AVAIL;
}

/// SYS_STATUS bits 32..63, relative to the high word
pub mod sys_status_hi {
    pub const RXPREJ: u32 = 1 << 1;
    pub const VT_DET: u32 = 1 << 4;
    pub const GPIOIRQ: u32 = 1 << 5;
    pub const AES_DONE: u32 = 1 << 6;
    pub const AES_ERR: u32 = 1 << 7;
    pub const CMD_ERR: u32 = 1 << 8;
    pub const SPI_OVF: u32 = 1 << 9;
    pub const SPI_UNF: u32 = 1 << 10;
    pub const SPIERR: u32 = 1 << 11;
    pub const CCA_FAIL: u32 = 1 << 12;

    pub const SPI_ERRORS: u32 = SPI_OVF | SPI_UNF | SPIERR;
}

/// FINT_STAT, the coarse OR of groups of status bits
pub mod fint_stat {
    pub const TXOK: u8 = 1 << 0;
    pub const CCA_FAIL: u8 = 1 << 1;
    pub const RXTSERR: u8 = 1 << 2;
    pub const RXOK: u8 = 1 << 3;
    pub const RXERR: u8 = 1 << 4;
    pub const RXTO: u8 = 1 << 5;
    pub const SYS_EVENT: u8 = 1 << 6;
    pub const SYS_PANIC: u8 = 1 << 7;
}

/// RDB_STATUS, one nibble per receive buffer
pub mod rdb_status {
    pub const RXFCG0: u8 = 1 << 0;
    pub const RXFR0: u8 = 1 << 1;
    pub const CIADONE0: u8 = 1 << 2;
    pub const CP_ERR0: u8 = 1 << 3;

    pub const BUFFER0: u8 = 0x0F;
    pub const BUFFER1: u8 = 0xF0;
}

pub mod sys_cfg {
    pub const DIS_FCE: u32 = 1 << 2;
    pub const DIS_DRXB: u32 = 1 << 3;
    pub const PHR_MODE: u32 = 1 << 4;
    pub const SPI_CRCEN: u32 = 1 << 6;
    pub const RXWTOE: u32 = 1 << 9;
    pub const RXAUTR: u32 = 1 << 10;
    pub const CP_SPC_SHIFT: u32 = 12;
    pub const CP_SPC_MASK: u32 = 0b11 << CP_SPC_SHIFT;
    pub const CP_SDC: u32 = 1 << 15;
}

pub mod tx_fctrl {
    pub const TXFLEN_MASK: u32 = 0x3FF;
    pub const TR: u32 = 1 << 11;
    pub const TXB_OFFSET_SHIFT: u32 = 16;
    pub const TXB_OFFSET_MASK: u32 = 0x3FF << TXB_OFFSET_SHIFT;
}

pub mod rx_finfo {
    /// Frame length with the extended (1023 octet) PHR mode
    pub const RXFLEN_EXT_MASK: u32 = 0x3FF;
    /// Frame length with the standard (127 octet) PHR mode
    pub const RXFLEN_STD_MASK: u32 = 0x7F;
    pub const RNG: u32 = 1 << 15;
}

pub mod chan_ctrl {
    pub const RF_CHAN: u16 = 1 << 0;
    pub const SFD_TYPE_SHIFT: u16 = 1;
    pub const TX_PCODE_SHIFT: u16 = 3;
    pub const RX_PCODE_SHIFT: u16 = 8;
}

pub mod sts_cfg {
    /// Length of the STS in blocks of 8 chips, minus one
    pub const CPS_LEN_MASK: u16 = 0xFF;
}

pub mod pll_common {
    pub const BIAS_TRIM_SHIFT: u16 = 13;
    pub const BIAS_TRIM_MASK: u16 = 0b111 << BIAS_TRIM_SHIFT;
    /// Bias trim restored before every reception
    pub const BIAS_TRIM_RX: u16 = 7;
}

pub mod clk_ctrl {
    pub const SYS_CLK_MASK: u8 = 0b11;
    pub const SYS_CLK_AUTO: u8 = 0b00;
}

pub mod cia_conf {
    pub const RXANTD_MASK: u32 = 0xFFFF;
}

pub mod sys_state {
    /// PMSC state lives in the third octet of SYS_STATE
    pub const PMSC_OFFSET: u16 = 2;

    pub const INIT_RC: u8 = 0x00;
    pub const IDLE_RC: u8 = 0x01;
    pub const IDLE_PLL: u8 = 0x02;
    pub const IDLE: u8 = 0x03;
    pub const TX_FIRST: u8 = 0x08;
    pub const TX_LAST: u8 = 0x0F;
    pub const RX_FIRST: u8 = 0x12;
    pub const RX_LAST: u8 = 0x19;
}

pub mod rdb_diag {
    pub const RDB_DMODE_MASK: u8 = 0b111;
}

pub mod db_diag {
    /// Offset of receive buffer 1's frame info inside DB_DIAG
    pub const BUFFER1_OFFSET: u16 = 0xE8;
    /// Frame info, relative to a buffer's base
    pub const FINFO: u16 = 0x00;
    /// RX timestamp, relative to a buffer's base
    pub const RX_TIME: u16 = 0x04;
}

pub mod spi_sem {
    /// Semaphore status octet
    pub const STATUS_OFFSET: u16 = 1;

    pub const SPI1MAVAIL: u8 = 1 << 0;
    pub const SPI2MAVAIL: u8 = 1 << 1;
    /// Sleep inhibit for host 1, relative to the status octet
    pub const SPI1_SLEEP_INHIBIT: u8 = 1 << 5;
    /// Sleep inhibit for host 2, relative to the status octet
    pub const SPI2_SLEEP_INHIBIT: u8 = 1 << 6;
    /// Current semaphore owner, bits 0..1 of the first octet
    pub const TX_OWNER_MASK: u8 = 0b11;
}

/// Largest offset into a receive buffer reachable by a direct read
pub const RX_BUFFER_DIRECT_LIMIT: u16 = 127;

/// Size of a receive buffer
pub const RX_BUFFER_LEN: usize = 1023;

/// Size of the transmit buffer
pub const TX_BUFFER_LEN: usize = 1024;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn addresses_pack_file_and_sub() {
        assert_eq!(SYS_STATUS.value(), 0x44);
        assert_eq!(SYS_STATE.value(), 0x0F_0030);
        assert_eq!(SYS_STATE.file(), 0x0F);
        assert_eq!(SYS_STATE.sub(), 0x30);
        assert_eq!(SYS_STATUS.offset(4), SYS_STATUS_HI);
    }

    #[test]
    fn masks_partition_status_word() {
        use sys_status::*;

        assert_eq!(ALL_TX & ALL_RX_GOOD, 0);
        assert_eq!(ALL_RX_GOOD & ALL_RX_TO, 0);
        assert_eq!(ALL_RX_TO & ALL_RX_ERR, 0);
        assert_eq!(RX_ERR_EVENTS & !ALL_RX_ERR, 0);
        assert_eq!(HPDWARN_BYTE3, 0x08);
    }
}
