//! Info and once-record commands

use kinflash_core::regs::{FcnfgFlags, IFR_READ_RESOURCE_ADDRESS};
use kinflash_core::{Capabilities, Error, FlashHardware, InternalFlash};

/// Print controller, flash and record information
pub fn run_info<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
) -> Result<(), Box<dyn std::error::Error>> {
    let geometry = flash.geometry().clone();

    println!("Program flash:");
    println!(
        "  Range:        0x{:08X} - 0x{:08X} ({} KiB)",
        geometry.flash_base,
        geometry.flash_base + geometry.flash_size - 1,
        geometry.flash_size / 1024
    );
    println!("  Block size:   {} KiB", geometry.block_size / 1024);
    println!("  Sector size:  {} bytes", geometry.sector_size);
    println!("  Write unit:   {} bytes", geometry.word_unit());
    println!(
        "  Section:      {} byte units, up to {} bytes",
        geometry.section_unit, geometry.max_section_size
    );
    println!("  Commands:     {}", capability_names(geometry.capabilities));

    let options = flash.options();
    println!();
    println!("Driver options:");
    println!(
        "  Poll limits:  program {}, section {}, erase {}, mass erase {}",
        options.poll.program, options.poll.section, options.poll.erase, options.poll.mass_erase
    );
    println!(
        "  Config field: {}",
        if options.allow_config_field {
            "writable"
        } else {
            "protected"
        }
    );

    println!();
    println!("Controller state:");
    println!(
        "  Security:     {}",
        if flash.is_secure() {
            "SECURE"
        } else {
            "unsecure"
        }
    );
    let fprot = flash.protection();
    if fprot == u32::MAX {
        println!("  Protection:   none");
    } else {
        let protected = (!fprot).count_ones();
        println!(
            "  Protection:   FPROT=0x{:08X} ({} of 32 regions protected)",
            fprot, protected
        );
    }
    let fcnfg = flash.fcnfg();
    println!(
        "  FlexRAM:      {} KiB at 0x{:08X}, {}",
        geometry.flexram_size / 1024,
        geometry.flexram_base,
        if fcnfg.contains(FcnfgFlags::RAMRDY) {
            "traditional RAM"
        } else if fcnfg.contains(FcnfgFlags::EEERDY) {
            "EEPROM emulation"
        } else {
            "not available"
        }
    );

    match flash.read_partition_info() {
        Ok(info) if info.is_partitioned() => println!(
            "  Partition:    DEPART=0x{:X} EEESIZE=0x{:X}",
            info.partition_code(),
            info.eeprom_size_code()
        ),
        Ok(_) => println!("  Partition:    not partitioned"),
        Err(e) => log::warn!(
            "Read Resource at 0x{:06X} failed: {}",
            IFR_READ_RESOURCE_ADDRESS,
            e
        ),
    }

    println!();
    match flash.read_hw_rev() {
        Ok(rev) => println!("Hardware revision: {}", rev),
        Err(Error::RecordBlank) => println!("Hardware revision: not programmed"),
        Err(e) => println!("Hardware revision: unreadable ({})", e),
    }

    Ok(())
}

/// Dump a program-once record as hex
pub fn run_once<H: FlashHardware>(
    flash: &mut InternalFlash<H>,
    index: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut record = vec![0u8; flash.geometry().once_record_size];
    flash.read_once(index, &mut record)?;

    let hex: Vec<String> = record.iter().map(|b| format!("{:02X}", b)).collect();
    let state = if record.iter().all(|&b| b == 0xFF) {
        " (blank)"
    } else {
        ""
    };
    println!("Once record {}: {}{}", index, hex.join(" "), state);

    Ok(())
}

fn capability_names(caps: Capabilities) -> String {
    let names: Vec<&str> = caps.iter_names().map(|(name, _)| name).collect();
    names.join(", ")
}
