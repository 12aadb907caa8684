//! Flash command block (FCCOB) encoding
//!
//! A [`Command`] describes one flash controller command and its parameters.
//! [`Command::encode`] turns it into a [`CommandBlock`], the 12-byte image of
//! the FCCOB registers that the executor loads into the controller.
//!
//! The register image is stored in register order: FCCOB3, FCCOB2, FCCOB1,
//! FCCOB0, FCCOB7, ... FCCOB8. Read as little-endian 32-bit words this puts
//! FCCOB0 (the opcode) in the most significant byte of word 0, and the data
//! bytes of program commands in flash byte order in words 1 and 2.

use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::geometry::MAX_ONCE_RECORD_SIZE;
use crate::regs::*;

/// Number of FCCOB registers
pub const FCCOB_REGS: usize = 12;

/// Register image of the FCCOB block
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct CommandBlock {
    words: [U32; 3],
}

impl Default for CommandBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBlock {
    /// A block with every register zero
    pub const fn new() -> Self {
        Self {
            words: [U32::ZERO; 3],
        }
    }

    /// Build a block from the three register words
    pub fn from_words(words: [u32; 3]) -> Self {
        Self {
            words: words.map(U32::new),
        }
    }

    /// The three register words (FCCOB3..0, FCCOB7..4, FCCOBB..8)
    pub fn words(&self) -> [u32; 3] {
        [self.words[0].get(), self.words[1].get(), self.words[2].get()]
    }

    /// Register word `index` (0..3)
    pub fn word(&self, index: usize) -> u32 {
        self.words[index].get()
    }

    /// Set register word `index` (0..3)
    pub fn set_word(&mut self, index: usize, value: u32) {
        self.words[index].set(value);
    }

    /// The 12 register bytes in register order
    pub fn bytes(&self) -> [u8; FCCOB_REGS] {
        let mut out = [0; FCCOB_REGS];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Value of FCCOB register `index` (0x0..=0xB)
    pub fn fccob(&self, index: usize) -> u8 {
        self.as_bytes()[fccob_offset(index) - REG_FCCOB3]
    }

    /// Set FCCOB register `index` (0x0..=0xB)
    pub fn set_fccob(&mut self, index: usize, value: u8) {
        self.as_mut_bytes()[fccob_offset(index) - REG_FCCOB3] = value;
    }

    /// Command opcode (FCCOB0)
    pub fn opcode(&self) -> u8 {
        self.fccob(0)
    }

    /// 24-bit address held in FCCOB1..3
    pub fn address(&self) -> u32 {
        self.word(0) & 0x00FF_FFFF
    }

    /// Data bytes FCCOB4..B in flash byte order
    pub fn data(&self) -> &[u8] {
        &self.as_bytes()[4..]
    }

    fn set_opcode_address(&mut self, opcode: u8, addr: u32) {
        self.set_word(0, (opcode as u32) << 24 | (addr & 0x00FF_FFFF));
    }

    fn set_data(&mut self, data: &[u8]) {
        let len = data.len().min(8);
        self.as_mut_bytes()[4..4 + len].copy_from_slice(&data[..len]);
    }
}

/// A flash controller command with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Erase Flash Block
    EraseBlock {
        /// Any address inside the block
        addr: u32,
    },
    /// Erase Flash Sector
    EraseSector {
        /// Sector-aligned address
        addr: u32,
    },
    /// Erase All Blocks
    EraseAllBlocks,
    /// Program Byte
    ProgramByte {
        /// Target address
        addr: u32,
        /// Byte to program
        data: u8,
    },
    /// Program Longword
    ProgramLongWord {
        /// Word-aligned address
        addr: u32,
        /// Value as it reads back from flash
        data: u32,
    },
    /// Program Phrase
    ProgramPhrase {
        /// Phrase-aligned address
        addr: u32,
        /// Bytes in flash order
        data: [u8; 8],
    },
    /// Program Section from the FlexRAM staging buffer
    ProgramSection {
        /// Section-aligned address
        addr: u32,
        /// Number of section units to program
        units: u16,
    },
    /// Set FlexRAM Function
    SetFlexRamFunction {
        /// Function control code
        code: u8,
    },
    /// Read Once
    ReadOnce {
        /// Record index
        index: u8,
    },
    /// Program Once
    ProgramOnce {
        /// Record index
        index: u8,
        /// Record bytes, only the first `len` are used
        data: [u8; MAX_ONCE_RECORD_SIZE],
        /// Record size (4 or 8)
        len: u8,
    },
    /// Read Resource
    ReadResource {
        /// Aligned resource address
        addr: u32,
        /// Resource select code
        select: u8,
    },
}

impl Command {
    /// FCCOB0 opcode for this command
    pub fn opcode(&self) -> u8 {
        match self {
            Self::EraseBlock { .. } => CMD_ERASE_BLOCK,
            Self::EraseSector { .. } => CMD_ERASE_SECTOR,
            Self::EraseAllBlocks => CMD_ERASE_ALL_BLOCKS,
            Self::ProgramByte { .. } => CMD_PROGRAM_BYTE,
            Self::ProgramLongWord { .. } => CMD_PROGRAM_LONGWORD,
            Self::ProgramPhrase { .. } => CMD_PROGRAM_PHRASE,
            Self::ProgramSection { .. } => CMD_PROGRAM_SECTION,
            Self::SetFlexRamFunction { .. } => CMD_SET_FLEXRAM,
            Self::ReadOnce { .. } => CMD_READ_ONCE,
            Self::ProgramOnce { .. } => CMD_PROGRAM_ONCE,
            Self::ReadResource { .. } => CMD_READ_RESOURCE,
        }
    }

    /// Flash address targeted by this command, if any
    pub fn address(&self) -> Option<u32> {
        match *self {
            Self::EraseBlock { addr }
            | Self::EraseSector { addr }
            | Self::ProgramByte { addr, .. }
            | Self::ProgramLongWord { addr, .. }
            | Self::ProgramPhrase { addr, .. }
            | Self::ProgramSection { addr, .. }
            | Self::ReadResource { addr, .. } => Some(addr),
            _ => None,
        }
    }

    /// Number of FCCOB registers (starting at FCCOB0) the command uses
    pub fn register_count(&self) -> usize {
        match self {
            Self::EraseAllBlocks => 1,
            Self::SetFlexRamFunction { .. } | Self::ReadOnce { .. } => 2,
            Self::EraseBlock { .. } | Self::EraseSector { .. } => 4,
            Self::ProgramByte { .. } => 5,
            Self::ProgramSection { .. } => 6,
            Self::ProgramLongWord { .. } => 8,
            Self::ProgramOnce { len, .. } => 4 + *len as usize,
            Self::ProgramPhrase { .. } | Self::ReadResource { .. } => FCCOB_REGS,
        }
    }

    /// Number of 32-bit register quartets the executor has to load
    pub fn quartet_count(&self) -> usize {
        self.register_count().div_ceil(4)
    }

    /// Encode the command into a fresh register image
    ///
    /// Registers the command does not use are left at zero.
    pub fn encode(&self) -> CommandBlock {
        let mut block = CommandBlock::new();
        let opcode = self.opcode();

        match *self {
            Self::EraseBlock { addr } | Self::EraseSector { addr } => {
                block.set_opcode_address(opcode, addr);
            }
            Self::EraseAllBlocks => {
                block.set_fccob(0, opcode);
            }
            Self::ProgramByte { addr, data } => {
                block.set_opcode_address(opcode, addr);
                block.set_fccob(4, data);
            }
            Self::ProgramLongWord { addr, data } => {
                block.set_opcode_address(opcode, addr);
                block.set_word(1, data);
            }
            Self::ProgramPhrase { addr, data } => {
                block.set_opcode_address(opcode, addr);
                block.set_data(&data);
            }
            Self::ProgramSection { addr, units } => {
                block.set_opcode_address(opcode, addr);
                let [hi, lo] = units.to_be_bytes();
                block.set_fccob(4, hi);
                block.set_fccob(5, lo);
            }
            Self::SetFlexRamFunction { code } => {
                block.set_fccob(0, opcode);
                block.set_fccob(1, code);
            }
            Self::ReadOnce { index } => {
                block.set_fccob(0, opcode);
                block.set_fccob(1, index);
            }
            Self::ProgramOnce { index, data, len } => {
                block.set_fccob(0, opcode);
                block.set_fccob(1, index);
                block.set_data(&data[..(len as usize).min(MAX_ONCE_RECORD_SIZE)]);
            }
            Self::ReadResource { addr, select } => {
                block.set_opcode_address(opcode, addr);
                block.set_fccob(8, select);
            }
        }

        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erase_sector_layout() {
        let block = Command::EraseSector { addr: 0x0001_2800 }.encode();
        assert_eq!(block.words(), [0x0901_2800, 0, 0]);
        // FCCOB3 first in memory, FCCOB0 last
        assert_eq!(block.bytes()[..4], [0x00, 0x28, 0x01, 0x09]);
        assert_eq!(block.fccob(0), 0x09);
        assert_eq!(block.fccob(1), 0x01);
        assert_eq!(block.fccob(2), 0x28);
        assert_eq!(block.fccob(3), 0x00);
        assert_eq!(block.address(), 0x0001_2800);
    }

    #[test]
    fn test_mass_erase_leaves_parameters_zero() {
        let block = Command::EraseAllBlocks.encode();
        assert_eq!(block.words(), [0x4400_0000, 0, 0]);
        assert_eq!(Command::EraseAllBlocks.quartet_count(), 1);
    }

    #[test]
    fn test_program_longword_data_order() {
        let cmd = Command::ProgramLongWord {
            addr: 0x1000,
            data: 0xDEAD_BEEF,
        };
        let block = cmd.encode();
        assert_eq!(block.word(1), 0xDEAD_BEEF);
        // FCCOB4 holds the most significant byte
        assert_eq!(block.fccob(4), 0xDE);
        assert_eq!(block.fccob(7), 0xEF);
        // Data bytes come out in flash (little-endian) order
        assert_eq!(&block.data()[..4], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(cmd.quartet_count(), 2);
    }

    #[test]
    fn test_program_phrase_data() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let block = Command::ProgramPhrase { addr: 0x2008, data }.encode();
        assert_eq!(block.data(), &data);
        assert_eq!(block.fccob(4), 4);
        assert_eq!(block.fccob(7), 1);
        assert_eq!(block.fccob(8), 8);
        assert_eq!(block.fccob(0xB), 5);
    }

    #[test]
    fn test_program_byte() {
        let block = Command::ProgramByte {
            addr: 0x0000_0123,
            data: 0x5A,
        }
        .encode();
        assert_eq!(block.words(), [0x0400_0123, 0x5A00_0000, 0]);
    }

    #[test]
    fn test_program_section_count() {
        let block = Command::ProgramSection {
            addr: 0x1000,
            units: 0x0102,
        }
        .encode();
        assert_eq!(block.fccob(4), 0x01);
        assert_eq!(block.fccob(5), 0x02);
        assert_eq!(block.words(), [0x0B00_1000, 0x0102_0000, 0]);
    }

    #[test]
    fn test_once_commands() {
        let block = Command::ReadOnce { index: 3 }.encode();
        assert_eq!(block.words(), [0x4103_0000, 0, 0]);

        let mut data = [0xFF; MAX_ONCE_RECORD_SIZE];
        data[..4].copy_from_slice(&[1, 2, 3, 0x5A]);
        let cmd = Command::ProgramOnce {
            index: 0,
            data,
            len: 4,
        };
        let block = cmd.encode();
        assert_eq!(block.words(), [0x4300_0000, 0x5A03_0201, 0]);
        assert_eq!(cmd.register_count(), 8);
    }

    #[test]
    fn test_set_flexram_and_read_resource() {
        let block = Command::SetFlexRamFunction { code: 0xFF }.encode();
        assert_eq!(block.words(), [0x81FF_0000, 0, 0]);

        let block = Command::ReadResource {
            addr: IFR_READ_RESOURCE_ADDRESS,
            select: RESOURCE_SELECT_IFR,
        }
        .encode();
        assert_eq!(block.words(), [0x0380_00FC, 0, 0]);
    }

    #[test]
    fn test_block_roundtrip_through_words() {
        let block = CommandBlock::from_words([0x0700_0008, 0x0403_0201, 0x0807_0605]);
        assert_eq!(block.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(block.opcode(), CMD_PROGRAM_PHRASE);
    }
}
