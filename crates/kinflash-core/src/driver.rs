//! Internal flash driver
//!
//! [`InternalFlash`] is the operation library: it validates requests against
//! the [`FlashGeometry`], splits them into controller commands and runs them
//! through the [`CommandExecutor`]. All validation happens before the first
//! register write, so a rejected request leaves flash untouched. Multi-unit
//! operations stop at the first failing command; units programmed before the
//! failure stay programmed.

use crate::error::{Error, Result};
use crate::executor::CommandExecutor;
use crate::fccob::Command;
use crate::geometry::{Capabilities, FlashGeometry, MAX_ONCE_RECORD_SIZE, MAX_SECTOR_SIZE};
use crate::hardware::FlashHardware;
use crate::options::DriverOptions;
use crate::regs::*;

/// Data flash partition codes read from the program flash IFR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionInfo {
    /// EEPROM data set size byte (IFR 0x8000FC)
    pub eeprom_size: u8,
    /// FlexNVM partition byte (IFR 0x8000FD)
    pub partition: u8,
}

impl PartitionInfo {
    /// EEESIZE code
    pub fn eeprom_size_code(&self) -> u8 {
        self.eeprom_size & 0x0F
    }

    /// DEPART code
    pub fn partition_code(&self) -> u8 {
        self.partition & 0x0F
    }

    /// Returns true if Program Partition has ever been run on this part
    pub fn is_partitioned(&self) -> bool {
        self.partition != 0xFF
    }
}

/// Driver for the Kinetis FTFL/FTFE internal flash
pub struct InternalFlash<H> {
    exec: CommandExecutor<H>,
    geometry: FlashGeometry,
    options: DriverOptions,
}

impl<H: FlashHardware> InternalFlash<H> {
    /// Bring up the driver
    ///
    /// Waits for any command still in flight, clears stale error flags,
    /// disables the command-complete interrupt and logs the security and
    /// protection state.
    pub fn init(hw: H, geometry: FlashGeometry, options: DriverOptions) -> Result<Self> {
        geometry.validate()?;

        let mut exec = CommandExecutor::new(hw);
        if !exec.wait_idle(options.poll.mass_erase) {
            log::error!("Flash controller did not become idle");
            return Err(Error::Timeout { addr: 0 });
        }
        exec.clear_errors();

        let fcnfg = FcnfgFlags::from_bits_retain(exec.hardware().read_reg8(REG_FCNFG));
        if fcnfg.contains(FcnfgFlags::CCIE) {
            log::debug!("Disabling flash command complete interrupt");
            exec.hardware()
                .write_reg8(REG_FCNFG, (fcnfg - FcnfgFlags::CCIE).bits());
        }

        let fsec = exec.hardware().read_reg8(REG_FSEC);
        if fsec & FSEC_SEC_MASK == FSEC_SEC_UNSECURE {
            log::debug!("Flash security: unsecure (FSEC=0x{:02X})", fsec);
        } else {
            log::warn!("Flash security: SECURE (FSEC=0x{:02X})", fsec);
        }

        let fprot = exec.hardware().read_reg32(REG_FPROT3);
        if fprot != u32::MAX {
            log::info!(
                "Program flash protection active: FPROT=0x{:08X} (0 bits are protected regions)",
                fprot
            );
        }

        log::info!(
            "Internal flash: {} KB, {} byte sectors, FlexRAM {}",
            geometry.flash_size / 1024,
            geometry.sector_size,
            if fcnfg.contains(FcnfgFlags::RAMRDY) {
                "as RAM"
            } else if fcnfg.contains(FcnfgFlags::EEERDY) {
                "as EEPROM"
            } else {
                "unavailable"
            }
        );

        Ok(Self {
            exec,
            geometry,
            options,
        })
    }

    /// Flash geometry the driver was initialised with
    pub fn geometry(&self) -> &FlashGeometry {
        &self.geometry
    }

    /// Driver options
    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// FSTAT error flags of the last completed command
    pub fn last_error_flags(&self) -> FstatFlags {
        self.exec.last_error_flags()
    }

    /// Current FCNFG value
    pub fn fcnfg(&mut self) -> FcnfgFlags {
        FcnfgFlags::from_bits_retain(self.exec.hardware().read_reg8(REG_FCNFG))
    }

    /// Returns true if FlexRAM is available as traditional RAM
    pub fn flexram_ready(&mut self) -> bool {
        self.fcnfg().contains(FcnfgFlags::RAMRDY)
    }

    /// Returns true if the part is secured
    pub fn is_secure(&mut self) -> bool {
        self.exec.hardware().read_reg8(REG_FSEC) & FSEC_SEC_MASK != FSEC_SEC_UNSECURE
    }

    /// Program flash protection bits, bit n clear means region n is protected
    pub fn protection(&mut self) -> u32 {
        self.exec.hardware().read_reg32(REG_FPROT3)
    }

    /// Mutable access to the hardware handle
    pub fn hardware_mut(&mut self) -> &mut H {
        self.exec.hardware()
    }

    /// Shut down the driver and give back the hardware handle
    pub fn into_inner(self) -> H {
        self.exec.into_inner()
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Read program flash contents
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if !self.geometry.contains(addr, buf.len()) {
            return Err(Error::AddressOutOfBounds);
        }
        self.exec.hardware().read_flash(addr, buf);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Erase
    // ------------------------------------------------------------------

    /// Erase the sector starting at `dest`
    pub fn erase_sector(&mut self, dest: u32) -> Result<()> {
        if !dest.is_multiple_of(self.geometry.sector_size) {
            return Err(Error::InvalidAlignment);
        }
        self.geometry.check_writable(
            dest,
            self.geometry.sector_size as usize,
            self.options.allow_config_field,
        )?;

        log::debug!("Erasing sector at 0x{:08X}", dest);
        self.exec
            .execute(&Command::EraseSector { addr: dest }, self.options.poll.erase)?;
        Ok(())
    }

    /// Erase the flash block starting at `dest`
    pub fn erase_block(&mut self, dest: u32) -> Result<()> {
        if !dest.is_multiple_of(self.geometry.block_size) {
            return Err(Error::InvalidAlignment);
        }
        self.geometry.check_writable(
            dest,
            self.geometry.block_size as usize,
            self.options.allow_config_field,
        )?;

        log::debug!("Erasing block at 0x{:08X}", dest);
        self.exec
            .execute(&Command::EraseBlock { addr: dest }, self.options.poll.erase)?;
        Ok(())
    }

    /// Erase all program flash blocks
    ///
    /// This also erases the flash configuration field. The part comes back
    /// secured after reset unless the field is reprogrammed first.
    pub fn mass_erase(&mut self) -> Result<()> {
        log::warn!("Erasing all flash blocks, including the flash configuration field");
        self.exec
            .execute(&Command::EraseAllBlocks, self.options.poll.mass_erase)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Program
    // ------------------------------------------------------------------

    /// Program `source` at `dest`
    ///
    /// The length must be a multiple of the controller's word unit (4 bytes
    /// for long-word controllers, 8 for phrase-only controllers) and `dest`
    /// aligned to it. Section-aligned bulk data goes through Program Section
    /// when FlexRAM is available as RAM, the rest through single-word
    /// programs.
    pub fn program(&mut self, dest: u32, source: &[u8]) -> Result<()> {
        let unit = self.geometry.word_unit();
        if source.is_empty() || !(source.len() as u32).is_multiple_of(unit) {
            return Err(Error::InvalidSize);
        }
        if !dest.is_multiple_of(unit) {
            return Err(Error::InvalidAlignment);
        }
        self.geometry
            .check_writable(dest, source.len(), self.options.allow_config_field)?;

        let use_sections = self
            .geometry
            .capabilities
            .contains(Capabilities::SECTION_PROGRAM)
            && self.flexram_ready();

        if !use_sections {
            log::debug!(
                "Programming {} bytes at 0x{:08X} in {} byte units",
                source.len(),
                dest,
                unit
            );
            return self.program_units(dest, source);
        }

        let section_unit = self.geometry.section_unit;
        let head = ((section_unit - dest % section_unit) % section_unit) as usize;
        let head = head.min(source.len());
        let bulk = (source.len() - head) / section_unit as usize * section_unit as usize;
        let (head_data, rest) = source.split_at(head);
        let (bulk_data, tail_data) = rest.split_at(bulk);

        log::debug!(
            "Programming {} bytes at 0x{:08X} ({} head, {} section, {} tail)",
            source.len(),
            dest,
            head_data.len(),
            bulk_data.len(),
            tail_data.len()
        );

        let mut addr = dest;
        if !head_data.is_empty() {
            self.program_units(addr, head_data)?;
            addr += head_data.len() as u32;
        }
        for chunk in bulk_data.chunks(self.geometry.max_section_size as usize) {
            self.section_chunk(addr, chunk)?;
            addr += chunk.len() as u32;
        }
        if !tail_data.is_empty() {
            self.program_units(addr, tail_data)?;
        }

        Ok(())
    }

    /// Program a run of 4-byte long-words
    ///
    /// On phrase-only controllers `dest` and the length must also be
    /// phrase aligned. Stops at the first failing unit.
    pub fn program_long_words(&mut self, dest: u32, source: &[u8]) -> Result<()> {
        if source.is_empty() || !source.len().is_multiple_of(4) {
            return Err(Error::InvalidSize);
        }
        if !dest.is_multiple_of(4) {
            return Err(Error::InvalidAlignment);
        }
        let unit = self.geometry.word_unit();
        if !dest.is_multiple_of(unit) || !(source.len() as u32).is_multiple_of(unit) {
            return Err(Error::Unsupported);
        }
        self.geometry
            .check_writable(dest, source.len(), self.options.allow_config_field)?;

        log::debug!("Programming {} long-words at 0x{:08X}", source.len() / 4, dest);
        self.program_units(dest, source)
    }

    /// Program one long-word
    ///
    /// `data` is the value as it reads back from flash (little-endian).
    /// Phrase-only controllers fall back to a read-modify-write of the
    /// containing sector.
    pub fn program_long_word(&mut self, dest: u32, data: u32) -> Result<()> {
        if !dest.is_multiple_of(4) {
            return Err(Error::InvalidAlignment);
        }

        if self
            .geometry
            .capabilities
            .contains(Capabilities::LONGWORD_PROGRAM)
        {
            self.geometry
                .check_writable(dest, 4, self.options.allow_config_field)?;
            self.exec.execute(
                &Command::ProgramLongWord { addr: dest, data },
                self.options.poll.program,
            )?;
            Ok(())
        } else {
            self.modify_sector(dest, &data.to_le_bytes())
        }
    }

    /// Program one 8-byte phrase
    pub fn program_phrase(&mut self, dest: u32, data: [u8; 8]) -> Result<()> {
        if !dest.is_multiple_of(8) {
            return Err(Error::InvalidAlignment);
        }
        self.geometry
            .check_writable(dest, data.len(), self.options.allow_config_field)?;
        self.program_units(dest, &data)
    }

    /// Program one section from FlexRAM
    ///
    /// The length must be a non-zero multiple of the section unit and no
    /// larger than the maximum section size. FlexRAM must be available as
    /// RAM; see [`InternalFlash::set_eee_enable`].
    pub fn program_section(&mut self, dest: u32, source: &[u8]) -> Result<()> {
        self.check_section(dest, source)?;
        if source.len() > self.geometry.max_section_size as usize {
            return Err(Error::InvalidSize);
        }
        self.geometry
            .check_writable(dest, source.len(), self.options.allow_config_field)?;
        if !self.flexram_ready() {
            return Err(Error::FlexRamNotReady);
        }

        self.section_chunk(dest, source)
    }

    /// Program any multiple of the section unit as a series of sections
    pub fn program_section_phrases(&mut self, dest: u32, source: &[u8]) -> Result<()> {
        self.check_section(dest, source)?;
        self.geometry
            .check_writable(dest, source.len(), self.options.allow_config_field)?;
        if !self.flexram_ready() {
            return Err(Error::FlexRamNotReady);
        }

        let mut addr = dest;
        for chunk in source.chunks(self.geometry.max_section_size as usize) {
            self.section_chunk(addr, chunk)?;
            addr += chunk.len() as u32;
        }

        Ok(())
    }

    /// Program one byte
    ///
    /// Controllers without Program Byte fall back to a read-modify-write of
    /// the containing sector.
    pub fn program_byte(&mut self, dest: u32, data: u8) -> Result<()> {
        if self
            .geometry
            .capabilities
            .contains(Capabilities::BYTE_PROGRAM)
        {
            self.geometry
                .check_writable(dest, 1, self.options.allow_config_field)?;
            self.exec.execute(
                &Command::ProgramByte { addr: dest, data },
                self.options.poll.program,
            )?;
            Ok(())
        } else {
            self.modify_sector(dest, &[data])
        }
    }

    // ------------------------------------------------------------------
    // FlexRAM, once-records and resources
    // ------------------------------------------------------------------

    /// Issue Set FlexRAM Function with the given control code
    ///
    /// [`FLEXRAM_FN_RAM`] makes FlexRAM available for Program Section,
    /// [`FLEXRAM_FN_EEPROM`] hands it to EEPROM emulation.
    pub fn set_eee_enable(&mut self, code: u8) -> Result<()> {
        if !self.geometry.capabilities.contains(Capabilities::FLEXRAM) {
            return Err(Error::Unsupported);
        }

        log::debug!("Setting FlexRAM function 0x{:02X}", code);
        self.exec.execute(
            &Command::SetFlexRamFunction { code },
            self.options.poll.program,
        )?;
        Ok(())
    }

    /// Read once-record `index` into `buf`
    ///
    /// `buf` must be exactly one record long.
    pub fn read_once(&mut self, index: u8, buf: &mut [u8]) -> Result<()> {
        self.check_once(index, buf.len())?;

        let block = self
            .exec
            .execute(&Command::ReadOnce { index }, self.options.poll.program)?;
        buf.copy_from_slice(&block.data()[..buf.len()]);
        Ok(())
    }

    /// Program once-record `index`
    ///
    /// A record can only be programmed once; the controller rejects a second
    /// attempt with an access error.
    pub fn program_once(&mut self, index: u8, data: &[u8]) -> Result<()> {
        self.check_once(index, data.len())?;

        let mut record = [0; MAX_ONCE_RECORD_SIZE];
        record[..data.len()].copy_from_slice(data);

        log::debug!("Programming once-record {}", index);
        self.exec.execute(
            &Command::ProgramOnce {
                index,
                data: record,
                len: data.len() as u8,
            },
            self.options.poll.program,
        )?;
        Ok(())
    }

    /// Read 8 bytes of a flash resource (IFR or version ID)
    pub fn read_resource(&mut self, addr: u32, select: u8) -> Result<[u8; 8]> {
        if !self
            .geometry
            .capabilities
            .contains(Capabilities::READ_RESOURCE)
        {
            return Err(Error::Unsupported);
        }
        if !addr.is_multiple_of(4) {
            return Err(Error::InvalidAlignment);
        }

        let block = self.exec.execute(
            &Command::ReadResource { addr, select },
            self.options.poll.program,
        )?;
        let mut out = [0; 8];
        out.copy_from_slice(block.data());
        Ok(out)
    }

    /// Read the data flash partition codes
    pub fn read_partition_info(&mut self) -> Result<PartitionInfo> {
        let raw = self.read_resource(IFR_READ_RESOURCE_ADDRESS, RESOURCE_SELECT_IFR)?;
        Ok(PartitionInfo {
            eeprom_size: raw[0],
            partition: raw[1],
        })
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn check_section(&self, dest: u32, source: &[u8]) -> Result<()> {
        if !self
            .geometry
            .capabilities
            .contains(Capabilities::SECTION_PROGRAM)
        {
            return Err(Error::Unsupported);
        }
        let unit = self.geometry.section_unit;
        if source.is_empty() || !(source.len() as u32).is_multiple_of(unit) {
            return Err(Error::InvalidSize);
        }
        if !dest.is_multiple_of(unit) {
            return Err(Error::InvalidAlignment);
        }
        Ok(())
    }

    fn check_once(&self, index: u8, len: usize) -> Result<()> {
        if !self
            .geometry
            .capabilities
            .contains(Capabilities::PROGRAM_ONCE)
        {
            return Err(Error::Unsupported);
        }
        if index >= self.geometry.once_record_count {
            return Err(Error::AddressOutOfBounds);
        }
        if len != self.geometry.once_record_size {
            return Err(Error::InvalidSize);
        }
        Ok(())
    }

    /// Stage `chunk` in FlexRAM and run Program Section. Already validated.
    fn section_chunk(&mut self, addr: u32, chunk: &[u8]) -> Result<()> {
        let units = (chunk.len() as u32 / self.geometry.section_unit) as u16;

        log::trace!("Program Section 0x{:08X}: {} units", addr, units);
        self.exec.hardware().write_flexram(0, chunk);
        self.exec.execute(
            &Command::ProgramSection { addr, units },
            self.options.poll.section,
        )?;
        Ok(())
    }

    /// Program `source` one word unit at a time. Already validated.
    fn program_units(&mut self, dest: u32, source: &[u8]) -> Result<()> {
        let unit = self.geometry.word_unit() as usize;
        let mut addr = dest;

        for chunk in source.chunks_exact(unit) {
            let cmd = if unit == 4 {
                let mut word = [0; 4];
                word.copy_from_slice(chunk);
                Command::ProgramLongWord {
                    addr,
                    data: u32::from_le_bytes(word),
                }
            } else {
                let mut data = [0; 8];
                data.copy_from_slice(chunk);
                Command::ProgramPhrase { addr, data }
            };
            self.exec.execute(&cmd, self.options.poll.program)?;
            addr += unit as u32;
        }

        Ok(())
    }

    /// Replace `data.len()` bytes at `dest` by rewriting the whole sector
    ///
    /// Reads the sector, erases it and programs back every word unit that is
    /// not blank. Power loss between the erase and the last program loses the
    /// sector contents.
    fn modify_sector(&mut self, dest: u32, data: &[u8]) -> Result<()> {
        let sector = self.geometry.sector_start(dest);
        let sector_size = self.geometry.sector_size as usize;
        let end = dest as usize + data.len();
        if end > sector as usize + sector_size {
            return Err(Error::InvalidAlignment);
        }
        self.geometry
            .check_writable(sector, sector_size, self.options.allow_config_field)?;

        let mut buf = [0xFF; MAX_SECTOR_SIZE];
        let buf = &mut buf[..sector_size];
        self.exec.hardware().read_flash(sector, buf);

        let offset = (dest - sector) as usize;
        if buf[offset..offset + data.len()] == *data {
            log::trace!("0x{:08X} already holds the requested data", dest);
            return Ok(());
        }
        buf[offset..offset + data.len()].copy_from_slice(data);

        log::debug!(
            "Rewriting sector 0x{:08X} to update {} byte(s) at 0x{:08X}",
            sector,
            data.len(),
            dest
        );
        self.exec
            .execute(&Command::EraseSector { addr: sector }, self.options.poll.erase)?;

        let unit = self.geometry.word_unit() as usize;
        for (i, chunk) in buf.chunks_exact(unit).enumerate() {
            if chunk.iter().all(|&b| b == 0xFF) {
                continue;
            }
            self.program_units(sector + (i * unit) as u32, chunk)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_info_codes() {
        let info = PartitionInfo {
            eeprom_size: 0x33,
            partition: 0x08,
        };
        assert_eq!(info.eeprom_size_code(), 3);
        assert_eq!(info.partition_code(), 8);
        assert!(info.is_partitioned());

        let blank = PartitionInfo {
            eeprom_size: 0xFF,
            partition: 0xFF,
        };
        assert!(!blank.is_partitioned());
    }
}
