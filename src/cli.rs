//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a FlexRAM function name or raw control code
fn parse_flexram_code(s: &str) -> Result<u8, String> {
    match s {
        "ram" => Ok(0xFF),
        "eeprom" | "eee" => Ok(0x00),
        _ => parse_hex_u32(s).and_then(|v| {
            u8::try_from(v).map_err(|_| format!("Control code out of range: {}", s))
        }),
    }
}

#[derive(Parser)]
#[command(name = "kinflash")]
#[command(author, version, about = "Kinetis internal flash provisioning tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Target options shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// Flash controller to simulate: "ftfl", "ftfe" or "<name>:<key>=<value>,..."
    #[arg(short, long, default_value = "ftfl")]
    pub target: String,

    /// Flash image file (created blank if it does not exist)
    #[arg(short = 'f', long)]
    pub image: PathBuf,

    /// Driver options (poll, section_poll, erase_poll, mass_erase_poll, allow_config_field)
    #[arg(short = 'o', long = "option", value_delimiter = ',')]
    pub options: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show controller and flash information
    Info {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Read flash contents to file
    Read {
        #[command(flatten)]
        target: TargetArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Start address (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Number of bytes to read (defaults to the rest of flash)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Write file to flash
    Write {
        #[command(flatten)]
        target: TargetArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Skip verification after writing
        #[arg(long)]
        no_verify: bool,

        /// Don't erase before writing
        #[arg(long)]
        no_erase: bool,
    },

    /// Erase flash
    Erase {
        #[command(flatten)]
        target: TargetArgs,

        /// Start address of a sector range (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_hex_u32)]
        start: Option<u32>,

        /// Length of the sector range (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,

        /// Erase the flash block at this address instead
        #[arg(long, value_parser = parse_hex_u32, conflicts_with_all = ["start", "length"])]
        block: Option<u32>,
    },

    /// Verify flash contents against file
    Verify {
        #[command(flatten)]
        target: TargetArgs,

        /// Input file path to verify against
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,
    },

    /// Hardware revision record
    #[command(subcommand)]
    HwRev(HwRevCommands),

    /// Dump a program-once record
    Once {
        #[command(flatten)]
        target: TargetArgs,

        /// Record index
        index: u8,
    },

    /// Select the FlexRAM function ("ram", "eeprom" or a raw control code)
    Flexram {
        #[command(flatten)]
        target: TargetArgs,

        /// Function to select
        #[arg(value_parser = parse_flexram_code)]
        function: u8,
    },

    /// List supported targets
    ListTargets,
}

/// Hardware revision subcommands
#[derive(Subcommand)]
pub enum HwRevCommands {
    /// Show the stored hardware revision
    Show {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Store the hardware revision (can only be done once)
    Set {
        #[command(flatten)]
        target: TargetArgs,

        /// Revision as major.minor.patch
        revision: String,
    },
}
