//! Verify command implementation

use indicatif::{ProgressBar, ProgressStyle};
use kinflash_core::{FlashHardware, InternalFlash};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default chunk size for verification
const VERIFY_CHUNK_SIZE: usize = 4096;

/// Run the verify command
pub fn run_verify<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
    input: &Path,
    start: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = File::open(input)?;
    let mut expected = Vec::new();
    file.read_to_end(&mut expected)?;

    println!("Read {} bytes from {:?}", expected.len(), input);

    if !flash.geometry().contains(start, expected.len()) {
        return Err(format!(
            "File ({} bytes at 0x{:08X}) does not fit in flash ({} bytes)",
            expected.len(),
            start,
            flash.geometry().flash_size
        )
        .into());
    }

    verify_flash_with_progress(flash, start, &expected)?;

    println!("Verification passed!");

    Ok(())
}

/// Verify flash contents against expected data with progress bar
pub fn verify_flash_with_progress<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
    start: u32,
    expected: &[u8],
) -> Result<(), Box<dyn std::error::Error>> {
    let total_size = expected.len();
    let mut buf = vec![0u8; VERIFY_CHUNK_SIZE];

    let pb = ProgressBar::new(total_size as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) Verifying")?
            .progress_chars("#>-"),
    );

    let mut mismatch_count = 0usize;
    let mut first_mismatch: Option<(usize, u8, u8)> = None;

    for (index, want) in expected.chunks(VERIFY_CHUNK_SIZE).enumerate() {
        let offset = index * VERIFY_CHUNK_SIZE;
        let got = &mut buf[..want.len()];
        flash.read(start + offset as u32, got)?;

        for (i, (&g, &w)) in got.iter().zip(want).enumerate() {
            if g != w {
                mismatch_count += 1;
                first_mismatch.get_or_insert((offset + i, w, g));
            }
        }

        pb.set_position((offset + want.len()) as u64);
    }

    if let Some((offset, want, got)) = first_mismatch {
        pb.abandon_with_message("Verification failed");
        return Err(format!(
            "Verification failed: {} byte(s) differ, first at 0x{:08X} (expected 0x{:02X}, found 0x{:02X})",
            mismatch_count,
            start as usize + offset,
            want,
            got
        )
        .into());
    }

    pb.finish_with_message("Verify complete");
    Ok(())
}
