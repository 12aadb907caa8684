//! Driver tests against the simulated controller

use kinflash_core::regs::{
    CMD_ERASE_SECTOR, CMD_PROGRAM_LONGWORD, CMD_PROGRAM_PHRASE, CMD_PROGRAM_SECTION,
    FLEXRAM_FN_EEPROM, FLEXRAM_FN_RAM,
};
use kinflash_core::{DriverOptions, Error, HardwareRevision, InternalFlash, PollLimits, Status};

use crate::{FlexRamMode, SimConfig, SimController};

fn options() -> DriverOptions {
    DriverOptions::new().with_poll_limits(PollLimits {
        program: 100,
        section: 100,
        erase: 100,
        mass_erase: 100,
    })
}

fn open(config: SimConfig) -> InternalFlash<SimController> {
    let geometry = config.geometry.clone();
    InternalFlash::init(SimController::new(config), geometry, options()).unwrap()
}

fn read(flash: &mut InternalFlash<SimController>, addr: u32, len: usize) -> Vec<u8> {
    let mut buf = vec![0; len];
    flash.read(addr, &mut buf).unwrap();
    buf
}

#[test]
fn test_erase_sector_reads_back_blank() {
    let mut flash = open(SimConfig::default());
    flash.hardware_mut().data_mut()[0x1000..0x1800].fill(0x00);

    flash.erase_sector(0x1000).unwrap();

    assert!(read(&mut flash, 0x1000, 0x800).iter().all(|&b| b == 0xFF));
    assert_eq!(flash.hardware_mut().command_log(), &[CMD_ERASE_SECTOR]);
}

#[test]
fn test_erase_sector_alignment() {
    let mut flash = open(SimConfig::default());
    assert_eq!(flash.erase_sector(0x1004), Err(Error::InvalidAlignment));
    assert_eq!(flash.erase_sector(0x8_0000), Err(Error::AddressOutOfBounds));
    assert!(flash.hardware_mut().command_log().is_empty());
}

#[test]
fn test_long_word_reads_back() {
    let mut flash = open(SimConfig::default());
    flash.program_long_word(0x2000, 0xDEAD_BEEF).unwrap();

    let buf = read(&mut flash, 0x2000, 4);
    assert_eq!(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]), 0xDEAD_BEEF);
    assert_eq!(Status::from(flash.program_long_word(0x2002, 0)), Status::Fail);
}

#[test]
fn test_program_without_erase_ands_bits() {
    let mut flash = open(SimConfig::default());
    flash.program_long_word(0x2000, 0xF0F0_FFFF).unwrap();
    flash.program_long_word(0x2000, 0xFF00_FF0F).unwrap();

    let buf = read(&mut flash, 0x2000, 4);
    assert_eq!(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]), 0xF000_FF0F);
}

#[test]
fn test_mass_erase_is_idempotent() {
    let mut flash = open(SimConfig::default());
    flash.hardware_mut().data_mut()[0x3000..0x3100].fill(0x12);

    flash.mass_erase().unwrap();
    flash.mass_erase().unwrap();

    assert!(flash.hardware_mut().data().iter().all(|&b| b == 0xFF));
}

#[test]
fn test_section_size_rejected_before_hardware_access() {
    let mut flash = open(SimConfig::default());
    let writes = flash.hardware_mut().register_writes();

    assert_eq!(flash.program_section(0x1000, &[0; 12]), Err(Error::InvalidSize));
    assert_eq!(flash.program_section(0x1000, &[]), Err(Error::InvalidSize));
    assert_eq!(
        flash.program_section(0x1000, &[0; 2048 + 8]),
        Err(Error::InvalidSize)
    );
    assert_eq!(flash.program_section(0x1004, &[0; 8]), Err(Error::InvalidAlignment));

    assert_eq!(flash.hardware_mut().register_writes(), writes);
}

#[test]
fn test_program_section_requires_flexram_as_ram() {
    let config = SimConfig {
        flexram: FlexRamMode::Eeprom,
        ..SimConfig::default()
    };
    let mut flash = open(config);
    let data = [0xA5; 64];

    assert_eq!(flash.program_section(0x1000, &data), Err(Error::FlexRamNotReady));

    flash.set_eee_enable(FLEXRAM_FN_RAM).unwrap();
    assert_eq!(flash.hardware_mut().flexram_mode(), FlexRamMode::Ram);
    flash.program_section(0x1000, &data).unwrap();
    assert_eq!(read(&mut flash, 0x1000, 64), data);

    flash.set_eee_enable(FLEXRAM_FN_EEPROM).unwrap();
    assert!(!flash.flexram_ready());
}

#[test]
fn test_program_section_phrases_splits_sections() {
    let mut flash = open(SimConfig::default());
    let data: Vec<u8> = (0..5000u32).map(|i| i as u8).take(4096 + 64).collect();

    flash.program_section_phrases(0x4000, &data).unwrap();

    assert_eq!(read(&mut flash, 0x4000, data.len()), data);
    assert_eq!(
        flash.hardware_mut().command_log(),
        &[CMD_PROGRAM_SECTION, CMD_PROGRAM_SECTION, CMD_PROGRAM_SECTION]
    );
}

#[test]
fn test_busy_controller_rejects_command() {
    let mut flash = open(SimConfig::default());
    flash.hardware_mut().force_busy(1000);
    let writes = flash.hardware_mut().register_writes();

    assert_eq!(flash.erase_sector(0x1000), Err(Error::Busy));
    assert_eq!(flash.hardware_mut().register_writes(), writes);
    assert!(flash.hardware_mut().command_log().is_empty());
}

#[test]
fn test_hung_controller_times_out() {
    let mut flash = open(SimConfig::default());
    flash.hardware_mut().set_hang(true);

    assert_eq!(
        flash.erase_sector(0x800),
        Err(Error::Timeout { addr: 0x800 })
    );

    // The next command finds the controller still busy
    assert_eq!(flash.erase_sector(0x1000), Err(Error::Busy));

    flash.hardware_mut().set_hang(false);
    flash.erase_sector(0x1000).unwrap();
}

#[test]
fn test_init_waits_for_command_in_flight() {
    let config = SimConfig::default();
    let geometry = config.geometry.clone();
    let mut sim = SimController::new(config);
    sim.force_busy(10);
    assert!(InternalFlash::init(sim, geometry.clone(), options()).is_ok());

    let mut sim = SimController::new(SimConfig::default());
    sim.force_busy(10);
    sim.set_hang(true);
    assert_eq!(
        InternalFlash::init(sim, geometry, options()).err(),
        Some(Error::Timeout { addr: 0 })
    );
}

#[test]
fn test_hw_rev_round_trip() {
    let mut flash = open(SimConfig::default());
    assert_eq!(flash.read_hw_rev(), Err(Error::RecordBlank));

    let rev = HardwareRevision::new(1, 2, 3);
    flash.program_hw_rev(rev).unwrap();
    assert_eq!(flash.read_hw_rev(), Ok(rev));
    assert_eq!(flash.hardware_mut().once_record(0), Some(&[1, 2, 3, 0x5A][..]));

    // One-time write
    assert_eq!(
        flash.program_hw_rev(HardwareRevision::new(2, 0, 0)),
        Err(Error::RecordLocked)
    );
    assert_eq!(flash.read_hw_rev(), Ok(rev));
}

#[test]
fn test_hw_rev_on_ftfe() {
    let mut flash = open(SimConfig::ftfe());
    let rev = HardwareRevision::new(2, 0, 1);
    flash.program_hw_rev(rev).unwrap();
    assert_eq!(
        flash.hardware_mut().once_record(0),
        Some(&[2, 0, 1, 0x5A, 0, 0, 0, 0][..])
    );
    assert_eq!(flash.read_hw_rev(), Ok(rev));
}

#[test]
fn test_hw_rev_unrecognised_record() {
    let mut flash = open(SimConfig::default());
    flash.hardware_mut().set_once_record(0, &[1, 2, 3, 4]);
    assert_eq!(flash.read_hw_rev(), Err(Error::InvalidRecord));
    assert_eq!(
        flash.program_hw_rev(HardwareRevision::new(1, 0, 0)),
        Err(Error::RecordLocked)
    );
}

#[test]
fn test_program_once_twice_is_access_error() {
    let mut flash = open(SimConfig::default());
    flash.program_once(5, &[1, 2, 3, 4]).unwrap();
    assert_eq!(
        flash.program_once(5, &[0, 0, 0, 0]),
        Err(Error::AccessError { addr: 0 })
    );

    let mut buf = [0; 4];
    flash.read_once(5, &mut buf).unwrap();
    assert_eq!(buf, [1, 2, 3, 4]);

    assert_eq!(flash.read_once(16, &mut buf), Err(Error::AddressOutOfBounds));
    assert_eq!(flash.read_once(0, &mut [0; 8]), Err(Error::InvalidSize));
}

#[test]
fn test_program_256_bytes() {
    let mut flash = open(SimConfig::default());
    let data: Vec<u8> = (0..=255u8).collect();

    assert_eq!(Status::from(flash.program(0x1000, &data)), Status::Ok);
    assert_eq!(read(&mut flash, 0x1000, 256), data);
}

#[test]
fn test_program_255_bytes_writes_nothing() {
    let mut flash = open(SimConfig::default());
    let writes = flash.hardware_mut().register_writes();

    assert_eq!(flash.program(0x1000, &[0; 255]), Err(Error::InvalidSize));
    assert_eq!(Status::from(flash.program(0x1000, &[0; 255])), Status::Fail);

    assert_eq!(flash.hardware_mut().register_writes(), writes);
    assert!(read(&mut flash, 0x1000, 256).iter().all(|&b| b == 0xFF));
}

#[test]
fn test_program_splits_head_and_tail() {
    let mut flash = open(SimConfig::default());
    let data: Vec<u8> = (0..24u8).collect();

    // 0x1004 is word aligned but not section aligned
    flash.program(0x1004, &data).unwrap();

    assert_eq!(read(&mut flash, 0x1004, 24), data);
    assert_eq!(
        flash.hardware_mut().command_log(),
        &[CMD_PROGRAM_LONGWORD, CMD_PROGRAM_SECTION, CMD_PROGRAM_LONGWORD]
    );
}

#[test]
fn test_program_without_flexram_uses_long_words() {
    let config = SimConfig {
        flexram: FlexRamMode::Eeprom,
        ..SimConfig::default()
    };
    let mut flash = open(config);
    let data = [0x5A; 32];

    flash.program(0x1000, &data).unwrap();

    assert_eq!(read(&mut flash, 0x1000, 32), data);
    assert_eq!(flash.hardware_mut().command_log(), &[CMD_PROGRAM_LONGWORD; 8]);
}

#[test]
fn test_program_on_ftfe_uses_phrase_unit() {
    let mut flash = open(SimConfig::ftfe());
    assert_eq!(flash.program(0x1000, &[0; 12]), Err(Error::InvalidSize));
    assert_eq!(flash.program(0x1004, &[0; 8]), Err(Error::InvalidAlignment));
    flash.program(0x1000, &[0x11; 48]).unwrap();
    assert_eq!(read(&mut flash, 0x1000, 48), [0x11; 48]);
}

#[test]
fn test_partial_failure_reports_address() {
    let mut flash = open(SimConfig::default());
    flash.hardware_mut().inject_failure(0x1008);
    let data = [0u8; 16];

    let err = flash.program_long_words(0x1000, &data).unwrap_err();
    assert_eq!(err, Error::CommandFailed { addr: 0x1008 });
    assert_eq!(err.failed_address(), Some(0x1008));

    // Units before the failure stay programmed, nothing after it is touched
    assert_eq!(read(&mut flash, 0x1000, 8), [0; 8]);
    assert!(read(&mut flash, 0x1008, 8).iter().all(|&b| b == 0xFF));
    assert_eq!(flash.hardware_mut().command_log().len(), 3);

    // The rest can be programmed once the fault is gone
    flash.hardware_mut().clear_failure();
    flash.program_long_words(0x1008, &data[8..]).unwrap();
    assert_eq!(read(&mut flash, 0x1008, 8), [0; 8]);
}

#[test]
fn test_long_words_on_phrase_controller() {
    let mut flash = open(SimConfig::ftfe());
    assert_eq!(
        flash.program_long_words(0x1004, &[0; 8]),
        Err(Error::Unsupported)
    );
    assert_eq!(
        flash.program_long_words(0x1000, &[0; 4]),
        Err(Error::Unsupported)
    );
    flash.program_long_words(0x1000, &[0x42; 16]).unwrap();
    assert_eq!(
        flash.hardware_mut().command_log(),
        &[CMD_PROGRAM_PHRASE, CMD_PROGRAM_PHRASE]
    );
}

#[test]
fn test_program_byte_native() {
    let mut flash = open(SimConfig::default());
    flash.program_byte(0x2003, 0x7E).unwrap();
    assert_eq!(read(&mut flash, 0x2000, 4), [0xFF, 0xFF, 0xFF, 0x7E]);
}

#[test]
fn test_program_byte_rewrites_sector_on_ftfe() {
    let mut flash = open(SimConfig::ftfe());
    {
        let data = flash.hardware_mut().data_mut();
        data[0x8_0000..0x8_0008].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[0x8_0010] = 0x55;
    }

    flash.program_byte(0x8_0001, 0x12).unwrap();

    assert_eq!(read(&mut flash, 0x8_0000, 8), [1, 0x12, 3, 4, 5, 6, 7, 8]);
    assert_eq!(read(&mut flash, 0x8_0010, 1), [0x55]);
    assert_eq!(
        flash.hardware_mut().command_log(),
        &[CMD_ERASE_SECTOR, CMD_PROGRAM_PHRASE, CMD_PROGRAM_PHRASE]
    );

    // Same value again needs no commands
    flash.program_byte(0x8_0001, 0x12).unwrap();
    assert_eq!(flash.hardware_mut().command_log().len(), 3);
}

#[test]
fn test_long_word_rewrites_sector_on_ftfe() {
    let mut flash = open(SimConfig::ftfe());
    flash.program_long_word(0x8_0004, 0xAABB_CCDD).unwrap();
    assert_eq!(
        read(&mut flash, 0x8_0000, 8),
        [0xFF, 0xFF, 0xFF, 0xFF, 0xDD, 0xCC, 0xBB, 0xAA]
    );
}

#[test]
fn test_program_phrase_on_ftfl() {
    let mut flash = open(SimConfig::default());
    flash.program_phrase(0x1000, [1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    assert_eq!(read(&mut flash, 0x1000, 8), [1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(
        flash.hardware_mut().command_log(),
        &[CMD_PROGRAM_LONGWORD, CMD_PROGRAM_LONGWORD]
    );
}

#[test]
fn test_config_field_guard() {
    let mut flash = open(SimConfig::default());
    assert_eq!(flash.erase_sector(0), Err(Error::ReservedRegion));
    assert_eq!(flash.program(0x400, &[0; 16]), Err(Error::ReservedRegion));
    assert_eq!(flash.erase_block(0), Err(Error::ReservedRegion));
    assert_eq!(flash.program_byte(0x40C, 0xFE), Err(Error::ReservedRegion));
    assert!(flash.hardware_mut().command_log().is_empty());

    let config = SimConfig::default();
    let geometry = config.geometry.clone();
    let mut flash = InternalFlash::init(
        SimController::new(config),
        geometry,
        options().with_config_field_writes(true),
    )
    .unwrap();
    assert!(flash.options().allow_config_field);
    flash.erase_sector(0).unwrap();
    flash.program_byte(0x40C, 0xFE).unwrap();
}

#[test]
fn test_erase_block() {
    let mut flash = open(SimConfig::default());
    flash.hardware_mut().data_mut()[0x4_0000..0x8_0000].fill(0);
    assert_eq!(flash.erase_block(0x4_0800), Err(Error::InvalidAlignment));
    flash.erase_block(0x4_0000).unwrap();
    assert!(read(&mut flash, 0x4_0000, 0x4_0000).iter().all(|&b| b == 0xFF));
}

#[test]
fn test_protected_region_violation() {
    let config = SimConfig {
        fprot: 0x7FFF_FFFF,
        ..SimConfig::default()
    };
    let mut flash = open(config);
    assert_eq!(flash.protection(), 0x7FFF_FFFF);
    assert_eq!(
        flash.erase_sector(0x7_F800),
        Err(Error::ProtectionViolation { addr: 0x7_F800 })
    );
    assert!(!flash.last_error_flags().is_empty());

    // Error flags are cleared before the next command
    flash.erase_sector(0x1000).unwrap();
    assert!(flash.last_error_flags().is_empty());
}

#[test]
fn test_read_partition_info() {
    let config = SimConfig {
        eeprom_size: 0x33,
        partition: 0x08,
        ..SimConfig::default()
    };
    let mut flash = open(config);
    let info = flash.read_partition_info().unwrap();
    assert_eq!(info.eeprom_size_code(), 3);
    assert_eq!(info.partition_code(), 8);

    let mut flash = open(SimConfig::default());
    assert!(!flash.read_partition_info().unwrap().is_partitioned());
}

#[test]
fn test_security_state() {
    let mut flash = open(SimConfig::default());
    assert!(!flash.is_secure());

    let config = SimConfig {
        secure: true,
        ..SimConfig::default()
    };
    let mut flash = open(config);
    assert!(flash.is_secure());
}
