//! Write command implementation

use indicatif::{ProgressBar, ProgressStyle};
use kinflash_core::{FlashHardware, InternalFlash};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::erase::erase_sectors_with_progress;
use super::verify::verify_flash_with_progress;

/// Run the write command
pub fn run_write<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
    input: &Path,
    start: u32,
    do_verify: bool,
    no_erase: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = File::open(input)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    println!("Read {} bytes from {:?}", data.len(), input);

    if data.is_empty() {
        return Err("Input file is empty".into());
    }

    // Pad to the programming unit with erased bytes
    let unit = flash.geometry().word_unit() as usize;
    if data.len() % unit != 0 {
        let padded = data.len().next_multiple_of(unit);
        log::info!("Padding image from {} to {} bytes", data.len(), padded);
        data.resize(padded, 0xFF);
    }

    if !flash.geometry().contains(start, data.len()) {
        return Err(format!(
            "Image ({} bytes at 0x{:08X}) does not fit in flash ({} bytes)",
            data.len(),
            start,
            flash.geometry().flash_size
        )
        .into());
    }

    if !no_erase {
        let sector_size = flash.geometry().sector_size;
        let first = flash.geometry().sector_start(start);
        let end = (start + data.len() as u32).next_multiple_of(sector_size);
        erase_sectors_with_progress(flash, first, end - first)?;
    }

    let written = write_flash_with_progress(flash, start, &data)?;
    println!("Wrote {} bytes at 0x{:08X}", written, start);

    if do_verify {
        verify_flash_with_progress(flash, start, &data)?;
        println!("Verification passed!");
    }

    Ok(())
}

/// Program `data` at `start` one sector-sized chunk at a time
///
/// Chunks that are entirely 0xFF are skipped. Returns the number of bytes
/// actually programmed.
pub fn write_flash_with_progress<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
    start: u32,
    data: &[u8],
) -> Result<usize, Box<dyn std::error::Error>> {
    let chunk_size = flash.geometry().sector_size as usize;

    let pb = ProgressBar::new(data.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) Writing")?
            .progress_chars("#>-"),
    );

    let mut written = 0usize;
    let mut offset = 0usize;
    while offset < data.len() {
        // Keep chunks inside one sector so progress follows the erase layout
        let addr = start + offset as u32;
        let to_boundary = chunk_size - (addr as usize % chunk_size);
        let len = to_boundary.min(data.len() - offset);
        let chunk = &data[offset..offset + len];

        if chunk.iter().any(|&b| b != 0xFF) {
            flash
                .program(addr, chunk)
                .map_err(|e| format!("Programming 0x{:08X} failed: {}", addr, e))?;
            written += len;
        }

        offset += len;
        pb.set_position(offset as u64);
    }

    pb.finish_with_message("Write complete");
    Ok(written)
}
