//! Flash command executor
//!
//! Every flash command goes through [`CommandExecutor::execute`]. A command
//! moves through these states:
//!
//! - **Idle**: CCIF is set, no command in flight. Anything else is rejected
//!   with [`Error::Busy`]; commands are never queued.
//! - **Loading**: stale ACCERR/FPVIOL flags are cleared and the FCCOB
//!   quartets the command uses are written.
//! - **Launching**: writing 1 to CCIF starts the command.
//! - **Busy**: FSTAT is polled until CCIF is set again, up to a ceiling.
//! - **Completed**: ACCERR, FPVIOL and MGSTAT0 decide the result.
//!
//! While a command runs the flash array cannot be read. Code that executes
//! from the same bank must not run until the command completes; enable the
//! `ramfunc` feature to place the launch/poll loop in the `.ramfunc` section.

use crate::error::{Error, Result};
use crate::fccob::{Command, CommandBlock};
use crate::hardware::FlashHardware;
use crate::regs::{FstatFlags, FCCOB_QUARTETS, REG_FSTAT};

/// Drives the FTFx command interface through an owned hardware handle
pub struct CommandExecutor<H> {
    hw: H,
    /// FSTAT error flags seen at the end of the last command
    last_flags: FstatFlags,
}

impl<H: FlashHardware> CommandExecutor<H> {
    /// Take ownership of the hardware handle
    pub fn new(hw: H) -> Self {
        Self {
            hw,
            last_flags: FstatFlags::empty(),
        }
    }

    /// Current FSTAT value
    pub fn fstat(&mut self) -> FstatFlags {
        FstatFlags::from_bits_retain(self.hw.read_reg8(REG_FSTAT))
    }

    /// Returns true if no command is in flight
    pub fn is_idle(&mut self) -> bool {
        self.fstat().contains(FstatFlags::CCIF)
    }

    /// Poll FSTAT until CCIF is set, at most `ceiling` times
    pub fn wait_idle(&mut self, ceiling: u32) -> bool {
        poll_ccif(&mut self.hw, ceiling).is_some()
    }

    /// Clear any pending ACCERR/FPVIOL/RDCOLERR flags
    pub fn clear_errors(&mut self) {
        let fstat = self.fstat();
        let pending = fstat & FstatFlags::W1C_ERRORS;
        if !pending.is_empty() {
            log::trace!("Clearing stale FSTAT flags {:?}", pending);
            self.hw.write_reg8(REG_FSTAT, pending.bits());
        }
    }

    /// Error flags reported by the last completed command
    ///
    /// This is a best-effort diagnostic; it is not updated for commands that
    /// were rejected before launch.
    pub fn last_error_flags(&self) -> FstatFlags {
        self.last_flags
    }

    /// Run one command to completion
    ///
    /// Returns the FCCOB registers as read back after completion, which hold
    /// the result of Read Once and Read Resource.
    pub fn execute(&mut self, cmd: &Command, ceiling: u32) -> Result<CommandBlock> {
        let addr = cmd.address().unwrap_or(0);

        // Idle
        if !self.is_idle() {
            log::warn!(
                "Flash controller busy, rejecting command {:#04x}",
                cmd.opcode()
            );
            return Err(Error::Busy);
        }

        // Loading
        let block = cmd.encode();
        self.clear_errors();
        for (offset, word) in FCCOB_QUARTETS
            .iter()
            .zip(block.words())
            .take(cmd.quartet_count())
        {
            self.hw.write_reg32(*offset, word);
        }
        log::debug!(
            "Launching flash command {:#04x} at 0x{:08X} ({:08X?})",
            cmd.opcode(),
            addr,
            &block.words()[..cmd.quartet_count()]
        );

        // Launching + Busy
        let fstat = match launch_and_wait(&mut self.hw, ceiling) {
            Some(fstat) => fstat,
            None => {
                log::error!(
                    "Flash command {:#04x} at 0x{:08X} did not complete within {} polls",
                    cmd.opcode(),
                    addr,
                    ceiling
                );
                return Err(Error::Timeout { addr });
            }
        };

        // Completed
        self.last_flags = fstat & FstatFlags::ANY_ERROR;
        if fstat.contains(FstatFlags::ACCERR) {
            log::debug!("Flash command {:#04x} failed: ACCERR", cmd.opcode());
            return Err(Error::AccessError { addr });
        }
        if fstat.contains(FstatFlags::FPVIOL) {
            log::debug!("Flash command {:#04x} failed: FPVIOL", cmd.opcode());
            return Err(Error::ProtectionViolation { addr });
        }
        if fstat.contains(FstatFlags::MGSTAT0) {
            log::debug!("Flash command {:#04x} failed: MGSTAT0", cmd.opcode());
            return Err(Error::CommandFailed { addr });
        }

        let mut result = CommandBlock::new();
        for (index, offset) in FCCOB_QUARTETS.iter().enumerate() {
            result.set_word(index, self.hw.read_reg32(*offset));
        }

        Ok(result)
    }

    /// Mutable access to the hardware handle
    pub fn hardware(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Give back the hardware handle
    pub fn into_inner(self) -> H {
        self.hw
    }
}

/// Start the loaded command and wait for it to complete
///
/// Returns the final FSTAT, or None if CCIF did not come back within
/// `ceiling` polls.
#[cfg_attr(feature = "ramfunc", link_section = ".ramfunc")]
#[inline(never)]
fn launch_and_wait<H: FlashHardware>(hw: &mut H, ceiling: u32) -> Option<FstatFlags> {
    hw.write_reg8(REG_FSTAT, FstatFlags::CCIF.bits());
    poll_ccif(hw, ceiling)
}

#[cfg_attr(feature = "ramfunc", link_section = ".ramfunc")]
#[inline(never)]
fn poll_ccif<H: FlashHardware>(hw: &mut H, ceiling: u32) -> Option<FstatFlags> {
    for _ in 0..ceiling {
        let fstat = FstatFlags::from_bits_retain(hw.read_reg8(REG_FSTAT));
        if fstat.contains(FstatFlags::CCIF) {
            return Some(fstat);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::REG_FCCOB3;

    /// Register file that completes every command after `latency` polls
    struct FakeRegs {
        regs: [u8; 0x18],
        latency: u32,
        remaining: u32,
        /// FSTAT error bits reported on completion
        result: u8,
        launches: u32,
    }

    impl FakeRegs {
        fn new(latency: u32) -> Self {
            let mut regs = [0; 0x18];
            regs[REG_FSTAT] = FstatFlags::CCIF.bits();
            Self {
                regs,
                latency,
                remaining: 0,
                result: 0,
                launches: 0,
            }
        }
    }

    impl FlashHardware for FakeRegs {
        fn read_reg8(&mut self, offset: usize) -> u8 {
            if offset == REG_FSTAT && self.remaining > 0 {
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.regs[REG_FSTAT] |= FstatFlags::CCIF.bits() | self.result;
                }
            }
            self.regs[offset]
        }

        fn write_reg8(&mut self, offset: usize, value: u8) {
            if offset != REG_FSTAT {
                self.regs[offset] = value;
                return;
            }
            self.regs[REG_FSTAT] &= !(value & FstatFlags::W1C_ERRORS.bits());
            if value & FstatFlags::CCIF.bits() != 0 {
                self.launches += 1;
                self.regs[REG_FSTAT] &= !(FstatFlags::CCIF | FstatFlags::MGSTAT0).bits();
                self.remaining = self.latency;
            }
        }

        fn read_reg32(&mut self, offset: usize) -> u32 {
            let mut bytes = [0; 4];
            bytes.copy_from_slice(&self.regs[offset..offset + 4]);
            u32::from_le_bytes(bytes)
        }

        fn write_reg32(&mut self, offset: usize, value: u32) {
            self.regs[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }

        fn read_flash(&mut self, _addr: u32, buf: &mut [u8]) {
            buf.fill(0xFF);
        }

        fn write_flexram(&mut self, _offset: u32, _data: &[u8]) {}
    }

    #[test]
    fn test_loads_quartets_and_launches() {
        let mut exec = CommandExecutor::new(FakeRegs::new(3));
        let cmd = Command::ProgramLongWord {
            addr: 0x1000,
            data: 0x1234_5678,
        };
        let block = exec.execute(&cmd, 10).unwrap();
        assert_eq!(block.words(), [0x0600_1000, 0x1234_5678, 0]);
        assert_eq!(exec.hardware().launches, 1);
        assert!(exec.last_error_flags().is_empty());
    }

    #[test]
    fn test_busy_rejects_without_launch() {
        let mut fake = FakeRegs::new(1);
        fake.regs[REG_FSTAT] = 0;
        let mut exec = CommandExecutor::new(fake);
        assert_eq!(
            exec.execute(&Command::EraseAllBlocks, 10),
            Err(Error::Busy)
        );
        assert_eq!(exec.hardware().launches, 0);
        assert_eq!(exec.hardware().read_reg32(REG_FCCOB3), 0);
    }

    #[test]
    fn test_poll_ceiling() {
        let mut exec = CommandExecutor::new(FakeRegs::new(50));
        let cmd = Command::EraseSector { addr: 0x800 };
        assert_eq!(
            exec.execute(&cmd, 10),
            Err(Error::Timeout { addr: 0x800 })
        );
        assert!(!exec.is_idle());
        assert!(exec.wait_idle(100));
    }

    #[test]
    fn test_error_flag_priority() {
        let mut fake = FakeRegs::new(1);
        fake.result = (FstatFlags::ACCERR | FstatFlags::MGSTAT0).bits();
        let mut exec = CommandExecutor::new(fake);
        let cmd = Command::EraseSector { addr: 0x2000 };
        assert_eq!(
            exec.execute(&cmd, 10),
            Err(Error::AccessError { addr: 0x2000 })
        );
        assert!(exec.last_error_flags().contains(FstatFlags::MGSTAT0));

        exec.hardware().result = FstatFlags::FPVIOL.bits();
        assert_eq!(
            exec.execute(&cmd, 10),
            Err(Error::ProtectionViolation { addr: 0x2000 })
        );

        exec.hardware().result = FstatFlags::MGSTAT0.bits();
        assert_eq!(
            exec.execute(&cmd, 10),
            Err(Error::CommandFailed { addr: 0x2000 })
        );
    }

    #[test]
    fn test_stale_errors_cleared_before_launch() {
        let mut fake = FakeRegs::new(1);
        fake.regs[REG_FSTAT] |= FstatFlags::ACCERR.bits();
        let mut exec = CommandExecutor::new(fake);
        assert!(exec.execute(&Command::EraseAllBlocks, 10).is_ok());
    }
}
