//! Hardware revision commands

use kinflash_core::{Error, FlashHardware, HardwareRevision, InternalFlash};

/// Show the stored hardware revision
pub fn cmd_show<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
) -> Result<(), Box<dyn std::error::Error>> {
    match flash.read_hw_rev() {
        Ok(rev) => {
            println!("{}", rev);
            Ok(())
        }
        Err(Error::RecordBlank) => Err("Hardware revision has not been programmed".into()),
        Err(e) => Err(e.into()),
    }
}

/// Store the hardware revision
pub fn cmd_set<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
    revision: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let rev: HardwareRevision = revision
        .parse()
        .map_err(|_| format!("Invalid revision '{}', expected major.minor.patch", revision))?;

    match flash.program_hw_rev(rev) {
        Ok(()) => {}
        Err(Error::RecordLocked) => {
            let current = match flash.read_hw_rev() {
                Ok(current) => current.to_string(),
                Err(_) => "unrecognised data".to_string(),
            };
            return Err(format!(
                "Hardware revision record is already programmed ({}) and cannot be changed",
                current
            )
            .into());
        }
        Err(e) => return Err(e.into()),
    }

    let stored = flash.read_hw_rev()?;
    println!("Hardware revision set to {}", stored);
    Ok(())
}
