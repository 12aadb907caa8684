//! Simulated FTFx flash memory module
//!
//! [`SimController`] models the register interface of an FTFL/FTFE module
//! closely enough to run the real driver against it:
//!
//! - FSTAT with CCIF handshake, write-one-to-clear error flags and a
//!   configurable number of busy polls per command
//! - FCCOB command decoding with ACCERR for malformed commands, FPVIOL for
//!   protected regions and MGSTAT0 for injected failures
//! - program flash that can only clear bits, erase sets bytes to 0xFF
//! - program-once records, FlexRAM and the program flash IFR

use kinflash_core::fccob::CommandBlock;
use kinflash_core::geometry::{Capabilities, MAX_ONCE_RECORD_SIZE, PROTECTION_REGIONS};
use kinflash_core::regs::*;
use kinflash_core::FlashHardware;

use crate::config::{FlexRamMode, SimConfig};

/// Size of the simulated register block
const REG_BLOCK_SIZE: usize = 0x18;

/// Size of the simulated program flash IFR
const IFR_SIZE: usize = 0x100;

/// Base address of the program flash IFR as seen by Read Resource
const IFR_BASE: u32 = 0x0080_0000;

/// FCNFG bits that software may write
const FCNFG_WRITABLE: u8 = 0xD0;

/// Simulated Kinetis flash controller
pub struct SimController {
    config: SimConfig,
    flash: Vec<u8>,
    once: Vec<[u8; MAX_ONCE_RECORD_SIZE]>,
    once_programmed: Vec<bool>,
    flexram: Vec<u8>,
    flexram_mode: FlexRamMode,
    ifr: [u8; IFR_SIZE],
    regs: [u8; REG_BLOCK_SIZE],
    /// FSTAT reads left before the command in flight completes
    busy_remaining: u32,
    /// FSTAT error bits the command in flight completes with
    pending: FstatFlags,
    hang: bool,
    fail_at: Option<u32>,
    command_log: Vec<u8>,
    register_writes: usize,
}

impl SimController {
    /// Create a blank (fully erased) controller
    pub fn new(config: SimConfig) -> Self {
        let geometry = &config.geometry;
        let flash = vec![0xFF; geometry.flash_size as usize];
        let once = vec![[0xFF; MAX_ONCE_RECORD_SIZE]; geometry.once_record_count as usize];
        let once_programmed = vec![false; geometry.once_record_count as usize];
        let flexram = vec![0xFF; geometry.flexram_size as usize];

        let mut ifr = [0xFF; IFR_SIZE];
        ifr[(IFR_READ_RESOURCE_ADDRESS - IFR_BASE) as usize] = config.eeprom_size;
        ifr[(IFR_READ_RESOURCE_ADDRESS - IFR_BASE) as usize + 1] = config.partition;

        let mut regs = [0; REG_BLOCK_SIZE];
        regs[REG_FSTAT] = FstatFlags::CCIF.bits();
        regs[REG_FSEC] = if config.secure { 0xFF } else { 0xFE };
        regs[REG_FOPT] = 0xFF;
        regs[REG_FPROT3..REG_FPROT3 + 4].copy_from_slice(&config.fprot.to_le_bytes());
        regs[REG_FEPROT] = 0xFF;
        regs[REG_FDPROT] = 0xFF;

        let flexram_mode = config.flexram;
        Self {
            config,
            flash,
            once,
            once_programmed,
            flexram,
            flexram_mode,
            ifr,
            regs,
            busy_remaining: 0,
            pending: FstatFlags::empty(),
            hang: false,
            fail_at: None,
            command_log: Vec::new(),
            register_writes: 0,
        }
    }

    /// Create a controller with pre-filled program flash
    pub fn with_data(config: SimConfig, initial_data: &[u8]) -> Self {
        let mut sim = Self::new(config);
        let len = initial_data.len().min(sim.flash.len());
        sim.flash[..len].copy_from_slice(&initial_data[..len]);
        sim
    }

    /// Get the configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Program flash contents
    pub fn data(&self) -> &[u8] {
        &self.flash
    }

    /// Mutable program flash contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    /// Contents of once-record `index`, or None if it does not exist
    pub fn once_record(&self, index: u8) -> Option<&[u8]> {
        let size = self.config.geometry.once_record_size;
        self.once.get(index as usize).map(|r| &r[..size])
    }

    /// Returns true if once-record `index` has been programmed
    pub fn once_programmed(&self, index: u8) -> bool {
        self.once_programmed
            .get(index as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Load once-record `index` as if it had been programmed earlier
    pub fn set_once_record(&mut self, index: u8, data: &[u8]) {
        let size = self.config.geometry.once_record_size;
        if let Some(record) = self.once.get_mut(index as usize) {
            let len = data.len().min(size);
            record[..len].copy_from_slice(&data[..len]);
            self.once_programmed[index as usize] = data.iter().any(|&b| b != 0xFF);
        }
    }

    /// Current FlexRAM function
    pub fn flexram_mode(&self) -> FlexRamMode {
        self.flexram_mode
    }

    /// Opcodes of every launched command, in order
    pub fn command_log(&self) -> &[u8] {
        &self.command_log
    }

    /// Number of register and FlexRAM writes seen so far
    pub fn register_writes(&self) -> usize {
        self.register_writes
    }

    /// Keep every command in flight forever
    ///
    /// Clearing the hang completes the command in flight immediately.
    pub fn set_hang(&mut self, hang: bool) {
        self.hang = hang;
        if !hang && !self.idle() {
            self.busy_remaining = 0;
            self.complete();
        }
    }

    /// Pretend a command launched elsewhere is still running
    pub fn force_busy(&mut self, polls: u32) {
        self.regs[REG_FSTAT] &= !FstatFlags::CCIF.bits();
        self.pending = FstatFlags::empty();
        self.busy_remaining = polls;
    }

    /// Make program and erase commands touching `addr` fail with MGSTAT0
    pub fn inject_failure(&mut self, addr: u32) {
        self.fail_at = Some(addr);
    }

    /// Remove an injected failure
    pub fn clear_failure(&mut self) {
        self.fail_at = None;
    }

    fn idle(&self) -> bool {
        self.regs[REG_FSTAT] & FstatFlags::CCIF.bits() != 0
    }

    fn complete(&mut self) {
        self.regs[REG_FSTAT] |= (FstatFlags::CCIF | self.pending).bits();
        self.pending = FstatFlags::empty();
    }

    fn fstat_write(&mut self, value: u8) {
        let value = FstatFlags::from_bits_retain(value);
        let clear = value & FstatFlags::W1C_ERRORS;
        self.regs[REG_FSTAT] &= !clear.bits();

        if !value.contains(FstatFlags::CCIF) || !self.idle() {
            return;
        }

        // Launch is ignored while ACCERR or FPVIOL is still set
        let fstat = FstatFlags::from_bits_retain(self.regs[REG_FSTAT]);
        if fstat.intersects(FstatFlags::ACCERR | FstatFlags::FPVIOL) {
            log::trace!("sim: launch ignored, error flags still set");
            return;
        }

        self.regs[REG_FSTAT] &= !(FstatFlags::CCIF | FstatFlags::MGSTAT0).bits();
        self.pending = self.run_command();
        self.busy_remaining = self.config.busy_polls;
        if self.busy_remaining == 0 && !self.hang {
            self.complete();
        }
    }

    fn store_reg8(&mut self, offset: usize, value: u8) {
        match offset {
            REG_FSTAT => self.fstat_write(value),
            REG_FCNFG => self.regs[REG_FCNFG] = value & FCNFG_WRITABLE,
            o if (REG_FCCOB3..REG_FPROT3).contains(&o) => {
                // FCCOB is locked while a command runs
                if self.idle() {
                    self.regs[o] = value;
                }
            }
            _ => {}
        }
    }

    fn fccob(&self) -> CommandBlock {
        let mut words = [0u32; 3];
        for (word, offset) in words.iter_mut().zip(FCCOB_QUARTETS) {
            let mut bytes = [0; 4];
            bytes.copy_from_slice(&self.regs[offset..offset + 4]);
            *word = u32::from_le_bytes(bytes);
        }
        CommandBlock::from_words(words)
    }

    fn store_fccob(&mut self, block: &CommandBlock) {
        for (word, offset) in block.words().into_iter().zip(FCCOB_QUARTETS) {
            self.regs[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
        }
    }

    fn has(&self, cap: Capabilities) -> bool {
        self.config.geometry.capabilities.contains(cap)
    }

    /// Check that `addr..addr + len` is in program flash and aligned to `align`
    fn check_range(&self, addr: u32, len: u32, align: u32) -> Result<(), FstatFlags> {
        if len == 0 || !addr.is_multiple_of(align) || !self.config.geometry.contains(addr, len as usize)
        {
            return Err(FstatFlags::ACCERR);
        }

        // Less than 32 bytes of flash: one byte per region
        let region_size = (self.config.geometry.flash_size / PROTECTION_REGIONS).max(1);
        let fprot = self.config.fprot;
        let first = (addr - self.config.geometry.flash_base) / region_size;
        let last = (addr - self.config.geometry.flash_base + len - 1) / region_size;
        if (first..=last.min(PROTECTION_REGIONS - 1)).any(|region| fprot & (1 << region) == 0) {
            return Err(FstatFlags::FPVIOL);
        }

        if let Some(fail) = self.fail_at {
            if fail >= addr && fail < addr + len {
                return Err(FstatFlags::MGSTAT0);
            }
        }

        Ok(())
    }

    fn program(&mut self, addr: u32, data: &[u8]) {
        let start = (addr - self.config.geometry.flash_base) as usize;
        for (cell, &byte) in self.flash[start..start + data.len()].iter_mut().zip(data) {
            *cell &= byte;
        }
    }

    fn erase(&mut self, addr: u32, len: u32) {
        let start = (addr - self.config.geometry.flash_base) as usize;
        self.flash[start..start + len as usize].fill(0xFF);
    }

    /// Execute the loaded command and return the FSTAT error bits it ends with
    fn run_command(&mut self) -> FstatFlags {
        let block = self.fccob();
        self.command_log.push(block.opcode());
        log::trace!("sim: command {:#04x} {:08X?}", block.opcode(), block.words());

        match self.execute(&block) {
            Ok(()) => FstatFlags::empty(),
            Err(flags) => {
                log::debug!("sim: command {:#04x} failed: {:?}", block.opcode(), flags);
                flags
            }
        }
    }

    fn execute(&mut self, block: &CommandBlock) -> Result<(), FstatFlags> {
        let geometry = self.config.geometry.clone();
        let addr = block.address();

        match block.opcode() {
            CMD_ERASE_SECTOR => {
                self.check_range(addr, geometry.sector_size, geometry.sector_size)?;
                self.erase(addr, geometry.sector_size);
            }
            CMD_ERASE_BLOCK => {
                self.check_range(addr, geometry.block_size, geometry.block_size)?;
                self.erase(addr, geometry.block_size);
            }
            CMD_ERASE_ALL_BLOCKS => {
                if self.config.fprot != u32::MAX {
                    return Err(FstatFlags::FPVIOL);
                }
                if self.fail_at.is_some() {
                    return Err(FstatFlags::MGSTAT0);
                }
                self.flash.fill(0xFF);
            }
            CMD_PROGRAM_BYTE => {
                if !self.has(Capabilities::BYTE_PROGRAM) {
                    return Err(FstatFlags::ACCERR);
                }
                self.check_range(addr, 1, 1)?;
                self.program(addr, &[block.fccob(4)]);
            }
            CMD_PROGRAM_LONGWORD => {
                if !self.has(Capabilities::LONGWORD_PROGRAM) {
                    return Err(FstatFlags::ACCERR);
                }
                self.check_range(addr, 4, 4)?;
                self.program(addr, &block.data()[..4]);
            }
            CMD_PROGRAM_PHRASE => {
                if !self.has(Capabilities::PHRASE_PROGRAM) {
                    return Err(FstatFlags::ACCERR);
                }
                self.check_range(addr, 8, 8)?;
                self.program(addr, &block.data()[..8]);
            }
            CMD_PROGRAM_SECTION => {
                if !self.has(Capabilities::SECTION_PROGRAM) || self.flexram_mode != FlexRamMode::Ram
                {
                    return Err(FstatFlags::ACCERR);
                }
                let units = u16::from_be_bytes([block.fccob(4), block.fccob(5)]) as u32;
                let len = units * geometry.section_unit;
                if len > geometry.flexram_size {
                    return Err(FstatFlags::ACCERR);
                }
                self.check_range(addr, len, geometry.section_unit)?;
                let staged = self.flexram[..len as usize].to_vec();
                self.program(addr, &staged);
            }
            CMD_SET_FLEXRAM => {
                if !self.has(Capabilities::FLEXRAM) {
                    return Err(FstatFlags::ACCERR);
                }
                self.flexram_mode = match block.fccob(1) {
                    FLEXRAM_FN_RAM => FlexRamMode::Ram,
                    FLEXRAM_FN_EEPROM => FlexRamMode::Eeprom,
                    _ => return Err(FstatFlags::ACCERR),
                };
            }
            CMD_READ_ONCE => {
                let index = block.fccob(1) as usize;
                if !self.has(Capabilities::PROGRAM_ONCE) || index >= self.once.len() {
                    return Err(FstatFlags::ACCERR);
                }
                let mut result = *block;
                let record = self.once[index];
                for (i, &byte) in record[..geometry.once_record_size].iter().enumerate() {
                    result.set_fccob(fccob_data_index(i), byte);
                }
                self.store_fccob(&result);
            }
            CMD_PROGRAM_ONCE => {
                let index = block.fccob(1) as usize;
                if !self.has(Capabilities::PROGRAM_ONCE)
                    || index >= self.once.len()
                    || self.once_programmed[index]
                {
                    return Err(FstatFlags::ACCERR);
                }
                let size = geometry.once_record_size;
                self.once[index][..size].copy_from_slice(&block.data()[..size]);
                self.once_programmed[index] = true;
            }
            CMD_READ_RESOURCE => {
                if !self.has(Capabilities::READ_RESOURCE)
                    || block.fccob(8) != RESOURCE_SELECT_IFR
                    || !addr.is_multiple_of(4)
                    || !(IFR_BASE..IFR_BASE + IFR_SIZE as u32).contains(&addr)
                {
                    return Err(FstatFlags::ACCERR);
                }
                let offset = (addr - IFR_BASE) as usize;
                let len = (IFR_SIZE - offset).min(8);
                let mut result = *block;
                for i in 0..8 {
                    let byte = if i < len { self.ifr[offset + i] } else { 0 };
                    result.set_fccob(fccob_data_index(i), byte);
                }
                self.store_fccob(&result);
            }
            opcode => {
                log::debug!("sim: unsupported opcode {:#04x}", opcode);
                return Err(FstatFlags::ACCERR);
            }
        }

        Ok(())
    }
}

/// FCCOB register holding data byte `i` in flash byte order
fn fccob_data_index(i: usize) -> usize {
    4 + (i & !3) + (3 - (i & 3))
}

impl FlashHardware for SimController {
    fn read_reg8(&mut self, offset: usize) -> u8 {
        if offset == REG_FSTAT && !self.idle() && !self.hang {
            if self.busy_remaining > 0 {
                self.busy_remaining -= 1;
            }
            if self.busy_remaining == 0 {
                self.complete();
            }
        }
        if offset == REG_FCNFG {
            let ready = match self.flexram_mode {
                FlexRamMode::Ram => FcnfgFlags::RAMRDY,
                FlexRamMode::Eeprom => FcnfgFlags::EEERDY,
            };
            return (self.regs[REG_FCNFG] & FCNFG_WRITABLE) | ready.bits();
        }
        self.regs.get(offset).copied().unwrap_or(0)
    }

    fn write_reg8(&mut self, offset: usize, value: u8) {
        self.register_writes += 1;
        self.store_reg8(offset, value);
    }

    fn read_reg32(&mut self, offset: usize) -> u32 {
        let mut bytes = [0; 4];
        if let Some(regs) = self.regs.get(offset..offset + 4) {
            bytes.copy_from_slice(regs);
        }
        u32::from_le_bytes(bytes)
    }

    fn write_reg32(&mut self, offset: usize, value: u32) {
        self.register_writes += 1;
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.store_reg8(offset + i, byte);
        }
    }

    fn read_flash(&mut self, addr: u32, buf: &mut [u8]) {
        let start = addr.wrapping_sub(self.config.geometry.flash_base) as usize;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.flash.get(start + i).copied().unwrap_or(0xFF);
        }
    }

    fn write_flexram(&mut self, offset: u32, data: &[u8]) {
        self.register_writes += 1;
        let start = (offset as usize).min(self.flexram.len());
        let len = data.len().min(self.flexram.len() - start);
        self.flexram[start..start + len].copy_from_slice(&data[..len]);
    }
}
