//! Erase command implementation

use indicatif::{ProgressBar, ProgressStyle};
use kinflash_core::{FlashHardware, InternalFlash};
use std::time::Duration;

/// Run the erase command
pub fn run_erase<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
    start: Option<u32>,
    length: Option<u32>,
    block: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(addr) = block {
        flash.erase_block(addr)?;
        println!(
            "Erased block at 0x{:08X} ({} bytes)",
            addr,
            flash.geometry().block_size
        );
        return Ok(());
    }

    match (start, length) {
        (Some(start_addr), Some(len)) => {
            erase_sectors_with_progress(flash, start_addr, len)?;
            println!("Erased {} bytes starting at 0x{:08X}", len, start_addr);
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err("Both --start and --length must be specified for partial erase".into());
        }
        (None, None) => {
            mass_erase_with_progress(flash)?;
            println!("Mass erase complete");
        }
    }

    Ok(())
}

/// Erase all blocks with progress spinner
pub fn mass_erase_with_progress<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
) -> Result<(), Box<dyn std::error::Error>> {
    let total_size = flash.geometry().flash_size;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!(
        "Erasing {} bytes (this may take a while)...",
        total_size
    ));
    pb.enable_steady_tick(Duration::from_millis(100));

    flash.mass_erase()?;

    pb.finish_with_message(format!("Erased {} bytes", total_size));
    Ok(())
}

/// Erase a sector-aligned range with progress bar
pub fn erase_sectors_with_progress<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
    start: u32,
    length: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let sector_size = flash.geometry().sector_size;
    if !start.is_multiple_of(sector_size) || !length.is_multiple_of(sector_size) {
        return Err(format!(
            "Erase range 0x{:08X}+0x{:X} is not aligned to the {} byte sector size",
            start, length, sector_size
        )
        .into());
    }
    if !flash.geometry().contains(start, length as usize) {
        return Err(format!(
            "Erase range 0x{:08X}..0x{:08X} is outside flash (0x{:08X})",
            start,
            start as u64 + length as u64,
            flash.geometry().flash_size
        )
        .into());
    }

    let pb = ProgressBar::new(length as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) Erasing")?
            .progress_chars("#>-"),
    );

    let mut addr = start;
    while addr < start + length {
        flash
            .erase_sector(addr)
            .map_err(|e| format!("Erasing sector 0x{:08X} failed: {}", addr, e))?;
        addr += sector_size;
        pb.set_position((addr - start) as u64);
    }

    pb.finish_with_message("Erase complete");
    Ok(())
}
