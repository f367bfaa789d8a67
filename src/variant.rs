//! Chip variants
//!
//! Members of the DW3000 family share the register map this driver uses, but
//! differ in device id and in a few capabilities. The variant is a type
//! parameter of [`hl::DW3000`](crate::hl::DW3000), picked at construction.

/// Per-model constants
pub trait ChipVariant {
    /// Human-readable model name
    const NAME: &'static str;

    /// DEV_ID values this model reports (with and without PDoA)
    const DEV_IDS: &'static [u32];

    /// Whether the chip has a second SPI host interface
    const DUAL_SPI: bool;

    /// PLL_COMMON bias trim to restore before reception
    const PLL_BIAS_TRIM: u16 = crate::ll::regs::pll_common::BIAS_TRIM_RX;

    /// Whether `dev_id` identifies this model
    fn matches(dev_id: u32) -> bool {
        Self::DEV_IDS.contains(&dev_id)
    }
}

/// DW3000 (DW3110 / DW3120)
#[derive(Copy, Clone, Debug, Default)]
pub struct Dw3000;

impl ChipVariant for Dw3000 {
    const NAME: &'static str = "DW3000";
    const DEV_IDS: &'static [u32] = &[0xDECA_0302, 0xDECA_0312];
    const DUAL_SPI: bool = true;
}

/// DW3720 / QM33
#[derive(Copy, Clone, Debug, Default)]
pub struct Dw3720;

impl ChipVariant for Dw3720 {
    const NAME: &'static str = "DW3720";
    const DEV_IDS: &'static [u32] = &[0xDECA_0304, 0xDECA_0314];
    const DUAL_SPI: bool = true;
}
