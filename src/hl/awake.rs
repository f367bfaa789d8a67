#[cfg(feature = "defmt")]
use defmt::Format;

use super::{Callbacks, DW3000};
use crate::{
    fast_command::FastCommand,
    fmt::debug,
    ll::regs::{self, cia_conf, sys_state},
    maybe_async_attr,
    platform::{IrqControl, IrqGuard},
    spi_type,
    time::{Duration, Instant},
    Error,
};

/// Power management state, decoded from the PMSC octet of SYS_STATE
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum DeviceState {
    /// INIT_RC, right after power up or wake up
    Init,
    /// IDLE_RC, running from the RC oscillator
    IdleRC,
    /// IDLE_PLL, PLL locked but not fully idle
    IdlePLL,
    /// IDLE, ready to transmit or receive
    Idle,
    /// Any of the transmitter states
    Transmitting,
    /// Any of the receiver states
    Receiving,
    /// A transitional state not covered above
    Other(u8),
}

impl DeviceState {
    /// Decode the PMSC state octet
    pub fn from_pmsc(pmsc: u8) -> Self {
        match pmsc {
            sys_state::INIT_RC => DeviceState::Init,
            sys_state::IDLE_RC => DeviceState::IdleRC,
            sys_state::IDLE_PLL => DeviceState::IdlePLL,
            sys_state::IDLE => DeviceState::Idle,
            sys_state::TX_FIRST..=sys_state::TX_LAST => DeviceState::Transmitting,
            sys_state::RX_FIRST..=sys_state::RX_LAST => DeviceState::Receiving,
            other => DeviceState::Other(other),
        }
    }

    /// Whether the radio is off
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            DeviceState::Init | DeviceState::IdleRC | DeviceState::IdlePLL | DeviceState::Idle
        )
    }
}

/// How [`DW3000::set_interrupt`] applies its masks
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum InterruptOption {
    /// Disable the given sources, leave the others alone
    Disable,
    /// Enable the given sources, leave the others alone
    Enable,
    /// Enable the given sources and disable all others
    EnableOnly,
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
    CB: Callbacks,
{
    /// Returns the power management state of the DW3000
    #[maybe_async_attr]
    pub async fn state(&mut self) -> Result<DeviceState, Error<SPI>> {
        let pmsc = self
            .ll
            .read8(regs::SYS_STATE, sys_state::PMSC_OFFSET)
            .await?;
        self.report_read_crc_errors();
        Ok(DeviceState::from_pmsc(pmsc))
    }

    /// Send any fast command
    #[maybe_async_attr]
    pub async fn fast_cmd(&mut self, command: FastCommand) -> Result<(), Error<SPI>> {
        self.ll.fast_command(command.code()).await?;
        Ok(())
    }

    /// Returns the current system time, bits 8..39
    #[maybe_async_attr]
    pub async fn sys_time(&mut self) -> Result<u32, Error<SPI>> {
        let time = self.ll.read32(regs::SYS_TIME, 0).await?;
        self.report_read_crc_errors();
        Ok(time)
    }

    /// Set the start time for the next delayed transmission or reception
    #[maybe_async_attr]
    pub async fn set_delayed_trx_time(&mut self, time: Instant) -> Result<(), Error<SPI>> {
        self.ll
            .write32(regs::DX_TIME, 0, time.delayed_time())
            .await?;
        Ok(())
    }

    /// Set the reference time used by the `DLY_REF` start modes
    #[maybe_async_attr]
    pub async fn set_reference_time(&mut self, time: Instant) -> Result<(), Error<SPI>> {
        self.ll
            .write32(regs::DREF_TIME, 0, time.delayed_time())
            .await?;
        Ok(())
    }

    /// Returns the TX antenna delay
    #[maybe_async_attr]
    pub async fn get_tx_antenna_delay(&mut self) -> Result<Duration, Error<SPI>> {
        let tx_antenna_delay = self.ll.read16(regs::TX_ANTD, 0).await?;
        self.report_read_crc_errors();
        Ok(Duration::from(tx_antenna_delay))
    }

    /// Returns the RX antenna delay
    #[maybe_async_attr]
    pub async fn get_rx_antenna_delay(&mut self) -> Result<Duration, Error<SPI>> {
        let cia_conf = self.ll.read32(regs::CIA_CONF, 0).await?;
        self.report_read_crc_errors();
        Ok(Duration::from((cia_conf & cia_conf::RXANTD_MASK) as u16))
    }

    /// Sets the RX and TX antenna delays
    #[maybe_async_attr]
    pub async fn set_antenna_delay(&mut self, rx_delay: u16, tx_delay: u16) -> Result<(), Error<SPI>> {
        self.ll
            .modify::<u32>(
                regs::CIA_CONF,
                0,
                !cia_conf::RXANTD_MASK,
                u32::from(rx_delay),
            )
            .await?;
        self.ll.write16(regs::TX_ANTD, 0, tx_delay).await?;

        Ok(())
    }
}

impl<SPI, V, CB, IRQ> DW3000<SPI, V, CB, IRQ>
where
    SPI: spi_type::spi::SpiDevice<u8>,
    CB: Callbacks,
    IRQ: IrqControl,
{
    /// Turn the transmitter and receiver off
    ///
    /// Does nothing if the radio is already idle, so calling it again is
    /// harmless. The DW3000 interrupt is masked on the host around the
    /// command, so the interrupt handler never sees a half-cancelled
    /// operation.
    #[maybe_async_attr]
    pub async fn force_trx_off(&mut self) -> Result<(), Error<SPI>> {
        let state = self.state().await?;
        if state.is_idle() {
            return Ok(());
        }

        debug!("forcing TRX off from {:?}", state);
        let _guard = IrqGuard::new(&mut self.irq);
        self.ll
            .fast_command(FastCommand::TxRxOff.code())
            .await?;

        Ok(())
    }

    /// Enable or disable interrupt sources
    ///
    /// `bitmask_lo` uses the SYS_STATUS low word layout (see
    /// [`regs::sys_status`]), `bitmask_hi` the high word layout. The host
    /// interrupt is masked while SYS_ENABLE is updated.
    #[maybe_async_attr]
    pub async fn set_interrupt(
        &mut self,
        bitmask_lo: u32,
        bitmask_hi: u32,
        option: InterruptOption,
    ) -> Result<(), Error<SPI>> {
        let _guard = IrqGuard::new(&mut self.irq);

        match option {
            InterruptOption::Disable => {
                self.ll
                    .modify::<u32>(regs::SYS_ENABLE_LO, 0, !bitmask_lo, 0)
                    .await?;
                self.ll
                    .modify::<u32>(regs::SYS_ENABLE_HI, 0, !bitmask_hi, 0)
                    .await?;
            }
            InterruptOption::Enable => {
                self.ll
                    .modify::<u32>(regs::SYS_ENABLE_LO, 0, u32::MAX, bitmask_lo)
                    .await?;
                self.ll
                    .modify::<u32>(regs::SYS_ENABLE_HI, 0, u32::MAX, bitmask_hi)
                    .await?;
            }
            InterruptOption::EnableOnly => {
                self.ll.write32(regs::SYS_ENABLE_LO, 0, bitmask_lo).await?;
                self.ll.write32(regs::SYS_ENABLE_HI, 0, bitmask_hi).await?;
            }
        }

        Ok(())
    }
}
