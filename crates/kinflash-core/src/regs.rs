//! Kinetis FTFL/FTFE flash memory module register definitions
//!
//! Offsets are relative to the module base (`0x4002_0000` on K-series parts).
//! The FCCOB registers are laid out in groups of four with the lowest index
//! at the highest address, so FCCOB0 is the most significant byte of the
//! 32-bit word at `FCCOB3`.

use bitflags::bitflags;

/// Base address of the flash memory module on K-series parts
pub const FTF_BASE: usize = 0x4002_0000;

// ============================================================================
// Register offsets
// ============================================================================

/// Flash Status Register (8 bits)
pub const REG_FSTAT: usize = 0x00;
/// Flash Configuration Register (8 bits)
pub const REG_FCNFG: usize = 0x01;
/// Flash Security Register (8 bits, read-only)
pub const REG_FSEC: usize = 0x02;
/// Flash Option Register (8 bits, read-only)
pub const REG_FOPT: usize = 0x03;
/// FCCOB3..FCCOB0 (first quartet)
pub const REG_FCCOB3: usize = 0x04;
/// FCCOB7..FCCOB4 (second quartet)
pub const REG_FCCOB7: usize = 0x08;
/// FCCOBB..FCCOB8 (third quartet)
pub const REG_FCCOBB: usize = 0x0C;
/// Program Flash Protection Registers FPROT3..FPROT0
pub const REG_FPROT3: usize = 0x10;
/// EEPROM Protection Register
pub const REG_FEPROT: usize = 0x16;
/// Data Flash Protection Register
pub const REG_FDPROT: usize = 0x17;

/// Offsets of the three FCCOB quartets, in load order
pub const FCCOB_QUARTETS: [usize; 3] = [REG_FCCOB3, REG_FCCOB7, REG_FCCOBB];

/// Register offset of FCCOB register `index` (0x0..=0xB)
pub const fn fccob_offset(index: usize) -> usize {
    REG_FCCOB3 + (index & !3) + (3 - (index & 3))
}

// ============================================================================
// Command opcodes (written to FCCOB0)
// ============================================================================

/// Read Resource
pub const CMD_READ_RESOURCE: u8 = 0x03;
/// Program Byte (legacy byte-granular controllers)
pub const CMD_PROGRAM_BYTE: u8 = 0x04;
/// Program Longword
pub const CMD_PROGRAM_LONGWORD: u8 = 0x06;
/// Program Phrase
pub const CMD_PROGRAM_PHRASE: u8 = 0x07;
/// Erase Flash Block
pub const CMD_ERASE_BLOCK: u8 = 0x08;
/// Erase Flash Sector
pub const CMD_ERASE_SECTOR: u8 = 0x09;
/// Program Section (data staged in FlexRAM)
pub const CMD_PROGRAM_SECTION: u8 = 0x0B;
/// Read Once
pub const CMD_READ_ONCE: u8 = 0x41;
/// Program Once
pub const CMD_PROGRAM_ONCE: u8 = 0x43;
/// Erase All Blocks
pub const CMD_ERASE_ALL_BLOCKS: u8 = 0x44;
/// Set FlexRAM Function
pub const CMD_SET_FLEXRAM: u8 = 0x81;

// ============================================================================
// Set FlexRAM function control codes
// ============================================================================

/// Make FlexRAM available for emulated EEPROM
pub const FLEXRAM_FN_EEPROM: u8 = 0x00;
/// Make FlexRAM available as plain RAM (needed for Program Section)
pub const FLEXRAM_FN_RAM: u8 = 0xFF;

/// IFR address holding the data-flash partition and EEPROM size codes
pub const IFR_READ_RESOURCE_ADDRESS: u32 = 0x0080_00FC;

/// Resource select code for the program flash IFR
pub const RESOURCE_SELECT_IFR: u8 = 0x00;

bitflags! {
    /// FSTAT bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FstatFlags: u8 {
        /// Command Complete Interrupt Flag - set when the controller is idle
        const CCIF     = 1 << 7;
        /// Read Collision Error
        const RDCOLERR = 1 << 6;
        /// Flash Access Error
        const ACCERR   = 1 << 5;
        /// Flash Protection Violation
        const FPVIOL   = 1 << 4;
        /// Memory Controller Command Completion Status
        const MGSTAT0  = 1 << 0;

        /// Bits that are cleared by writing one
        const W1C_ERRORS = Self::RDCOLERR.bits() | Self::ACCERR.bits() | Self::FPVIOL.bits();
        /// Every bit that indicates a failed command
        const ANY_ERROR = Self::W1C_ERRORS.bits() | Self::MGSTAT0.bits();
    }
}

bitflags! {
    /// FCNFG bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FcnfgFlags: u8 {
        /// Command Complete Interrupt Enable
        const CCIE    = 1 << 7;
        /// Read Collision Error Interrupt Enable
        const RDCOLLIE = 1 << 6;
        /// Erase All Request
        const ERSAREQ = 1 << 5;
        /// Erase Suspend
        const ERSSUSP = 1 << 4;
        /// Swap
        const SWAP    = 1 << 3;
        /// Flash memory configuration (program flash only)
        const PFLSH   = 1 << 2;
        /// FlexRAM available as traditional RAM
        const RAMRDY  = 1 << 1;
        /// FlexRAM available for EEPROM emulation
        const EEERDY  = 1 << 0;
    }
}

/// FSEC security field value meaning "unsecured"
pub const FSEC_SEC_UNSECURE: u8 = 0b10;
/// Mask of the SEC field in FSEC
pub const FSEC_SEC_MASK: u8 = 0b11;
