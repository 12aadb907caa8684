//! kinflash - Kinetis internal flash provisioning tool
//!
//! Drives the FTFL/FTFE flash controller through the `kinflash-core` driver.
//!
//! # Architecture
//!
//! Every command brings up an [`kinflash_core::InternalFlash`] on a
//! controller and then runs generic operations against it. The controller
//! here is the register-level simulator from `kinflash-sim`, backed by an
//! image file, so flash contents and program-once records persist between
//! invocations:
//! - **Read-only commands** (info, read, verify, hw-rev show, once) leave the
//!   image untouched
//! - **Mutating commands** (write, erase, hw-rev set, flexram) save the
//!   image and its `.once` sidecar after the command succeeds

mod cli;
mod commands;
mod target;

use clap::Parser;
use cli::{Cli, Commands, HwRevCommands};
use target::with_flash;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Info { target } => {
            with_flash(&target.target, &target.image, &target.options, false, |flash| {
                commands::info::run_info(flash)
            })
        }
        Commands::Read {
            target,
            output,
            start,
            length,
        } => with_flash(&target.target, &target.image, &target.options, false, |flash| {
            commands::read::run_read(flash, &output, start, length)
        }),
        Commands::Write {
            target,
            input,
            start,
            no_verify,
            no_erase,
        } => with_flash(&target.target, &target.image, &target.options, true, |flash| {
            commands::write::run_write(flash, &input, start, !no_verify, no_erase)
        }),
        Commands::Erase {
            target,
            start,
            length,
            block,
        } => with_flash(&target.target, &target.image, &target.options, true, |flash| {
            commands::erase::run_erase(flash, start, length, block)
        }),
        Commands::Verify {
            target,
            input,
            start,
        } => with_flash(&target.target, &target.image, &target.options, false, |flash| {
            commands::verify::run_verify(flash, &input, start)
        }),
        Commands::HwRev(subcmd) => match subcmd {
            HwRevCommands::Show { target } => {
                with_flash(&target.target, &target.image, &target.options, false, |flash| {
                    commands::hwrev::cmd_show(flash)
                })
            }
            HwRevCommands::Set { target, revision } => {
                with_flash(&target.target, &target.image, &target.options, true, |flash| {
                    commands::hwrev::cmd_set(flash, &revision)
                })
            }
        },
        Commands::Once { target, index } => {
            with_flash(&target.target, &target.image, &target.options, false, |flash| {
                commands::info::run_once(flash, index)
            })
        }
        Commands::Flexram { target, function } => {
            with_flash(&target.target, &target.image, &target.options, true, |flash| {
                commands::flexram::run_flexram(flash, function)
            })
        }
        Commands::ListTargets => {
            commands::list_targets();
            Ok(())
        }
    }
}
