//! Access to the flash memory module
//!
//! [`FlashHardware`] is the seam between the driver and the silicon. On the
//! target it is implemented by [`MmioFlash`](crate::mmio::MmioFlash), which
//! performs volatile accesses to the FTFx registers. On the host it is
//! implemented by the simulator in `kinflash-sim`.

/// Register-level interface to an FTFL/FTFE flash memory module
///
/// Register offsets are relative to the module base (see [`crate::regs`]).
/// 32-bit accesses use the little-endian bus order of the Cortex-M core.
pub trait FlashHardware {
    /// Read an 8-bit register
    fn read_reg8(&mut self, offset: usize) -> u8;

    /// Write an 8-bit register
    fn write_reg8(&mut self, offset: usize, value: u8);

    /// Read a 32-bit register
    fn read_reg32(&mut self, offset: usize) -> u32;

    /// Write a 32-bit register
    fn write_reg32(&mut self, offset: usize, value: u32);

    /// Read flash contents at `addr` into `buf`
    fn read_flash(&mut self, addr: u32, buf: &mut [u8]);

    /// Copy `data` into FlexRAM at `offset`
    fn write_flexram(&mut self, offset: u32, data: &[u8]);
}

impl<T: FlashHardware + ?Sized> FlashHardware for &mut T {
    fn read_reg8(&mut self, offset: usize) -> u8 {
        (**self).read_reg8(offset)
    }

    fn write_reg8(&mut self, offset: usize, value: u8) {
        (**self).write_reg8(offset, value)
    }

    fn read_reg32(&mut self, offset: usize) -> u32 {
        (**self).read_reg32(offset)
    }

    fn write_reg32(&mut self, offset: usize, value: u32) {
        (**self).write_reg32(offset, value)
    }

    fn read_flash(&mut self, addr: u32, buf: &mut [u8]) {
        (**self).read_flash(addr, buf)
    }

    fn write_flexram(&mut self, offset: u32, data: &[u8]) {
        (**self).write_flexram(offset, data)
    }
}
