//! Hooks into the host platform
//!
//! The driver never touches the host's interrupt controller itself. Whoever
//! wires the DW3000 IRQ line to the MCU provides an [`IrqControl`] that can
//! mask and unmask that one interrupt.

/// Masks and restores the host interrupt connected to the DW3000 IRQ line
pub trait IrqControl {
    /// Mask the DW3000 interrupt, returning whether it was enabled before
    fn mask(&mut self) -> IrqState;

    /// Restore the state returned by the matching [`IrqControl::mask`]
    fn restore(&mut self, state: IrqState);
}

/// Interrupt state captured when masking
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrqState(pub bool);

/// For hosts that poll instead of using the IRQ line
#[derive(Copy, Clone, Debug, Default)]
pub struct NoIrqControl;

impl IrqControl for NoIrqControl {
    fn mask(&mut self) -> IrqState {
        IrqState(false)
    }

    fn restore(&mut self, _state: IrqState) {}
}

/// Keeps the DW3000 interrupt masked until dropped
pub struct IrqGuard<'a, IRQ: IrqControl> {
    irq: &'a mut IRQ,
    state: IrqState,
}

impl<'a, IRQ: IrqControl> IrqGuard<'a, IRQ> {
    /// Mask the interrupt
    pub fn new(irq: &'a mut IRQ) -> Self {
        let state = irq.mask();
        IrqGuard { irq, state }
    }
}

impl<IRQ: IrqControl> Drop for IrqGuard<'_, IRQ> {
    fn drop(&mut self) {
        self.irq.restore(self.state);
    }
}
