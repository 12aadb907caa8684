//! Flash geometry and controller capabilities
//!
//! Kinetis parts come with two generations of flash controller. FTFL parts
//! program in long-words (and bytes on the oldest cores) and use 2 KB
//! sectors; FTFE parts only program whole phrases and use 4 KB sectors.
//! [`FlashGeometry`] captures everything the driver needs to know about the
//! part it is running on.

use core::ops::Range;

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Number of FPROT protection regions program flash is divided into
pub const PROTECTION_REGIONS: u32 = 32;

/// Largest sector size the read-modify-write path can buffer
pub const MAX_SECTOR_SIZE: usize = 4096;

/// Largest once-record supported by any FTFx controller
pub const MAX_ONCE_RECORD_SIZE: usize = 8;

/// Flash configuration field (backdoor key, FPROT, FSEC, FOPT).
/// Erasing it without reprogramming secures the device on the next reset.
pub const FLASH_CONFIG_FIELD: Range<u32> = 0x0400..0x0410;

/// Default FlexRAM base address
pub const FLEXRAM_BASE: u32 = 0x1400_0000;

bitflags! {
    /// Commands supported by the flash controller
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Program Byte (0x04)
        const BYTE_PROGRAM     = 1 << 0;
        /// Program Longword (0x06)
        const LONGWORD_PROGRAM = 1 << 1;
        /// Program Phrase (0x07)
        const PHRASE_PROGRAM   = 1 << 2;
        /// Program Section (0x0B) through FlexRAM
        const SECTION_PROGRAM  = 1 << 3;
        /// Set FlexRAM Function (0x81)
        const FLEXRAM          = 1 << 4;
        /// Read Once / Program Once (0x41 / 0x43)
        const PROGRAM_ONCE     = 1 << 5;
        /// Read Resource (0x03)
        const READ_RESOURCE    = 1 << 6;
    }
}

/// Physical layout of the on-chip flash and its controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashGeometry {
    /// First address of program flash
    pub flash_base: u32,
    /// Size of program flash in bytes
    pub flash_size: u32,
    /// Size of one flash block (Erase Flash Block granularity)
    pub block_size: u32,
    /// Size of one sector (Erase Flash Sector granularity)
    pub sector_size: u32,
    /// Bytes per unit counted by Program Section
    pub section_unit: u32,
    /// Largest payload accepted by a single Program Section
    pub max_section_size: u32,
    /// Bytes per once-record
    pub once_record_size: usize,
    /// Number of once-records
    pub once_record_count: u8,
    /// Base address of FlexRAM
    pub flexram_base: u32,
    /// Size of FlexRAM in bytes
    pub flexram_size: u32,
    /// Commands supported by the controller
    pub capabilities: Capabilities,
}

impl FlashGeometry {
    /// FTFL controller with 512 KB program flash and 2 KB sectors
    pub fn ftfl() -> Self {
        Self {
            flash_base: 0,
            flash_size: 512 * 1024,
            block_size: 256 * 1024,
            sector_size: 2048,
            section_unit: 8,
            max_section_size: 2048,
            once_record_size: 4,
            once_record_count: 16,
            flexram_base: FLEXRAM_BASE,
            flexram_size: 4096,
            capabilities: Capabilities::BYTE_PROGRAM
                | Capabilities::LONGWORD_PROGRAM
                | Capabilities::SECTION_PROGRAM
                | Capabilities::FLEXRAM
                | Capabilities::PROGRAM_ONCE
                | Capabilities::READ_RESOURCE,
        }
    }

    /// FTFE controller with 1 MB program flash and 4 KB sectors (MK64FN1M0)
    pub fn ftfe() -> Self {
        Self {
            flash_base: 0,
            flash_size: 1024 * 1024,
            block_size: 512 * 1024,
            sector_size: 4096,
            section_unit: 16,
            max_section_size: 2048,
            once_record_size: 8,
            once_record_count: 8,
            flexram_base: FLEXRAM_BASE,
            flexram_size: 4096,
            capabilities: Capabilities::PHRASE_PROGRAM
                | Capabilities::SECTION_PROGRAM
                | Capabilities::FLEXRAM
                | Capabilities::PROGRAM_ONCE
                | Capabilities::READ_RESOURCE,
        }
    }

    /// Look up a preset by name ("ftfl" or "ftfe")
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "ftfl" => Some(Self::ftfl()),
            "ftfe" | "k64" => Some(Self::ftfe()),
            _ => None,
        }
    }

    /// Check that the geometry is internally consistent
    pub fn validate(&self) -> Result<()> {
        let pow2 = |v: u32| v != 0 && v.is_power_of_two();

        if !pow2(self.sector_size)
            || !pow2(self.block_size)
            || !pow2(self.section_unit)
            || self.sector_size as usize > MAX_SECTOR_SIZE
            || !self.block_size.is_multiple_of(self.sector_size)
            || !self.flash_size.is_multiple_of(self.block_size)
            || !self.flash_base.is_multiple_of(self.block_size)
        {
            return Err(Error::InvalidAlignment);
        }

        if self.flash_base.checked_add(self.flash_size).is_none() {
            return Err(Error::AddressOutOfBounds);
        }
        // FPROT splits program flash into 32 regions of whole sectors
        if self.flash_size < PROTECTION_REGIONS * self.sector_size {
            return Err(Error::InvalidSize);
        }

        if self.once_record_size == 0
            || self.once_record_size > MAX_ONCE_RECORD_SIZE
            || !self.once_record_size.is_multiple_of(4)
        {
            return Err(Error::Unsupported);
        }

        if !self.max_section_size.is_multiple_of(self.section_unit)
            || self.max_section_size > self.flexram_size
        {
            return Err(Error::InvalidSize);
        }

        if !self.capabilities.intersects(
            Capabilities::LONGWORD_PROGRAM | Capabilities::PHRASE_PROGRAM,
        ) {
            return Err(Error::Unsupported);
        }

        Ok(())
    }

    /// Address range of program flash
    pub fn program_range(&self) -> Range<u32> {
        self.flash_base..self.flash_base + self.flash_size
    }

    /// Smallest unit the controller can program natively, besides bytes
    pub fn word_unit(&self) -> u32 {
        if self.capabilities.contains(Capabilities::LONGWORD_PROGRAM) {
            4
        } else {
            8
        }
    }

    /// Start address of the sector containing `addr`
    pub fn sector_start(&self, addr: u32) -> u32 {
        addr & !(self.sector_size - 1)
    }

    /// Returns true if `addr..addr + len` lies entirely inside program flash
    pub fn contains(&self, addr: u32, len: usize) -> bool {
        let range = self.program_range();
        let Ok(len) = u32::try_from(len) else {
            return false;
        };
        match addr.checked_add(len) {
            Some(end) => addr >= range.start && end <= range.end,
            None => false,
        }
    }

    /// Validate that `addr..addr + len` may be modified
    ///
    /// The range must lie inside program flash, and must not touch the flash
    /// configuration field unless `allow_config_field` is set.
    pub fn check_writable(&self, addr: u32, len: usize, allow_config_field: bool) -> Result<()> {
        if !self.contains(addr, len) {
            return Err(Error::AddressOutOfBounds);
        }

        // contains() guarantees this does not overflow
        let end = addr + len as u32;
        if !allow_config_field && addr < FLASH_CONFIG_FIELD.end && end > FLASH_CONFIG_FIELD.start {
            log::warn!(
                "Refusing to modify 0x{:08X}..0x{:08X}: overlaps flash configuration field",
                addr,
                end
            );
            return Err(Error::ReservedRegion);
        }

        Ok(())
    }
}

impl Default for FlashGeometry {
    fn default() -> Self {
        Self::ftfl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(FlashGeometry::ftfl().validate().is_ok());
        assert!(FlashGeometry::ftfe().validate().is_ok());
        assert_eq!(FlashGeometry::preset("k64"), Some(FlashGeometry::ftfe()));
        assert_eq!(FlashGeometry::preset("stm32"), None);
    }

    #[test]
    fn test_word_unit() {
        assert_eq!(FlashGeometry::ftfl().word_unit(), 4);
        assert_eq!(FlashGeometry::ftfe().word_unit(), 8);
    }

    #[test]
    fn test_contains() {
        let geo = FlashGeometry::ftfl();
        assert!(geo.contains(0, 512 * 1024));
        assert!(!geo.contains(0, 512 * 1024 + 1));
        assert!(!geo.contains(0xFFFF_FFF0, 0x20));
        assert!(!geo.contains(crate::regs::IFR_READ_RESOURCE_ADDRESS, 4));
    }

    #[test]
    fn test_config_field_guard() {
        let geo = FlashGeometry::ftfl();
        assert_eq!(
            geo.check_writable(0x0400, 4, false),
            Err(Error::ReservedRegion)
        );
        assert_eq!(geo.check_writable(0, 0x800, false), Err(Error::ReservedRegion));
        assert!(geo.check_writable(0x0400, 4, true).is_ok());
        assert!(geo.check_writable(0x0410, 4, false).is_ok());
        assert!(geo.check_writable(0x03FC, 4, false).is_ok());
    }

    #[test]
    fn test_invalid_geometry() {
        let mut geo = FlashGeometry::ftfl();
        geo.sector_size = 3000;
        assert_eq!(geo.validate(), Err(Error::InvalidAlignment));

        let mut geo = FlashGeometry::ftfe();
        geo.max_section_size = 8192;
        assert_eq!(geo.validate(), Err(Error::InvalidSize));
    }

    #[test]
    fn test_geometry_past_end_of_address_space() {
        let mut geo = FlashGeometry::ftfl();
        geo.flash_base = 0xFFF8_0000;
        geo.flash_size = 0x0010_0000;
        assert_eq!(geo.validate(), Err(Error::AddressOutOfBounds));

        // Ends exactly at the top of the address space
        geo.flash_size = 0x0008_0000;
        assert_eq!(geo.validate(), Err(Error::AddressOutOfBounds));
    }

    #[test]
    fn test_geometry_too_small_for_protection_regions() {
        let mut geo = FlashGeometry::ftfl();
        geo.flash_size = 16 * geo.sector_size;
        geo.block_size = geo.flash_size;
        assert_eq!(geo.validate(), Err(Error::InvalidSize));

        geo.flash_size = 32 * geo.sector_size;
        geo.block_size = geo.flash_size;
        assert!(geo.validate().is_ok());
    }
}
