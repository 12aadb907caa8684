//! Read command implementation

use indicatif::{ProgressBar, ProgressStyle};
use kinflash_core::{FlashHardware, InternalFlash};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Default chunk size for reading (4 KiB)
const READ_CHUNK_SIZE: usize = 4096;

/// Run the read command
pub fn run_read<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
    output: &Path,
    start: u32,
    length: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let range = flash.geometry().program_range();
    let length = match length {
        Some(len) => len,
        None => range.end.checked_sub(start).ok_or_else(|| {
            format!(
                "Start address 0x{:08X} is outside flash (0x{:08X}..0x{:08X})",
                start, range.start, range.end
            )
        })?,
    };

    let data = read_flash_with_progress(flash, start, length as usize)?;

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!("Wrote {} bytes to {:?}", data.len(), output);

    Ok(())
}

/// Read a flash range with progress bar
pub fn read_flash_with_progress<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
    start: u32,
    length: usize,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut data = vec![0u8; length];

    let pb = ProgressBar::new(length as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );

    let mut offset = 0usize;
    while offset < length {
        let chunk_size = std::cmp::min(READ_CHUNK_SIZE, length - offset);
        let chunk = &mut data[offset..offset + chunk_size];

        flash.read(start + offset as u32, chunk)?;

        offset += chunk_size;
        pb.set_position(offset as u64);
    }

    pb.finish_with_message("Read complete");
    Ok(data)
}
