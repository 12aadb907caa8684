//! FlexRAM function command

use kinflash_core::regs::{FcnfgFlags, FLEXRAM_FN_EEPROM, FLEXRAM_FN_RAM};
use kinflash_core::{FlashHardware, InternalFlash};

/// Issue Set FlexRAM Function and report the resulting state
pub fn run_flexram<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
    code: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = match code {
        FLEXRAM_FN_RAM => "traditional RAM",
        FLEXRAM_FN_EEPROM => "EEPROM emulation",
        _ => "raw control code",
    };
    log::info!("Setting FlexRAM function 0x{:02X} ({})", code, name);

    flash.set_eee_enable(code)?;

    let fcnfg = flash.fcnfg();
    println!(
        "FlexRAM: RAMRDY={} EEERDY={}",
        fcnfg.contains(FcnfgFlags::RAMRDY) as u8,
        fcnfg.contains(FcnfgFlags::EEERDY) as u8
    );
    Ok(())
}
