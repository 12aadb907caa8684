//! Memory-mapped access to the on-chip flash memory module
//!
//! This is the [`FlashHardware`] implementation used on the target itself.
//!
//! # Safety
//!
//! The register block, the flash array and FlexRAM are accessed through raw
//! pointers. Constructing an [`MmioFlash`] asserts that the addresses are
//! correct for the part and that nothing else drives the controller.

use crate::hardware::FlashHardware;
use crate::regs::FTF_BASE;

/// Memory-mapped FTFx register block, flash array and FlexRAM
pub struct MmioFlash {
    /// Register block base
    regs: *mut u8,
    /// FlexRAM base
    flexram: *mut u8,
    /// FlexRAM size, writes past it are dropped
    flexram_size: u32,
}

impl MmioFlash {
    /// Wrap the flash module at the given addresses
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `regs` is the base of an FTFL/FTFE register block
    /// - `flexram..flexram + flexram_size` is the FlexRAM window
    /// - No other code accesses the controller while this value exists
    pub unsafe fn new(regs: usize, flexram: usize, flexram_size: u32) -> Self {
        Self {
            regs: regs as *mut u8,
            flexram: flexram as *mut u8,
            flexram_size,
        }
    }

    /// Wrap the flash module at the standard K-series addresses
    ///
    /// # Safety
    ///
    /// Same requirements as [`MmioFlash::new`].
    pub unsafe fn k_series(flexram_size: u32) -> Self {
        Self::new(FTF_BASE, crate::geometry::FLEXRAM_BASE as usize, flexram_size)
    }
}

impl FlashHardware for MmioFlash {
    #[inline]
    fn read_reg8(&mut self, offset: usize) -> u8 {
        unsafe { core::ptr::read_volatile(self.regs.add(offset)) }
    }

    #[inline]
    fn write_reg8(&mut self, offset: usize, value: u8) {
        unsafe { core::ptr::write_volatile(self.regs.add(offset), value) }
    }

    #[inline]
    fn read_reg32(&mut self, offset: usize) -> u32 {
        debug_assert!(offset & 3 == 0, "unaligned 32-bit register read");
        unsafe { core::ptr::read_volatile(self.regs.add(offset) as *const u32) }
    }

    #[inline]
    fn write_reg32(&mut self, offset: usize, value: u32) {
        debug_assert!(offset & 3 == 0, "unaligned 32-bit register write");
        unsafe { core::ptr::write_volatile(self.regs.add(offset) as *mut u32, value) }
    }

    fn read_flash(&mut self, addr: u32, buf: &mut [u8]) {
        let base = addr as usize as *const u8;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = unsafe { core::ptr::read_volatile(base.add(i)) };
        }
    }

    fn write_flexram(&mut self, offset: u32, data: &[u8]) {
        let end = (offset as usize).saturating_add(data.len());
        debug_assert!(end <= self.flexram_size as usize);
        let len = data
            .len()
            .min((self.flexram_size as usize).saturating_sub(offset as usize));

        for (i, &byte) in data[..len].iter().enumerate() {
            unsafe {
                core::ptr::write_volatile(self.flexram.add(offset as usize + i), byte);
            }
        }
    }
}
