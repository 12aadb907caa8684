//! kinflash-core - Kinetis FTFL/FTFE internal flash driver
//!
//! This crate drives the command interface of the flash memory module found
//! on Kinetis K-series microcontrollers. It is `no_std` and talks to the
//! hardware only through the [`FlashHardware`] trait, so the same driver runs
//! on the target (with [`mmio::MmioFlash`]) and on the host against a
//! simulated controller.
//!
//! # Features
//!
//! - `std` - Enable standard library support (`std::error::Error` impls)
//! - `ramfunc` - Place the command launch/poll loop in the `.ramfunc` link
//!   section, for firmware that modifies the flash bank it executes from
//!
//! # Example
//!
//! ```ignore
//! use kinflash_core::{DriverOptions, FlashGeometry, InternalFlash, mmio::MmioFlash};
//!
//! let hw = unsafe { MmioFlash::k_series(4096) };
//! let mut flash = InternalFlash::init(hw, FlashGeometry::ftfe(), DriverOptions::default())?;
//! flash.erase_sector(0x8_0000)?;
//! flash.program(0x8_0000, &image)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

pub mod driver;
pub mod error;
pub mod executor;
pub mod fccob;
pub mod geometry;
pub mod hardware;
pub mod hwrev;
pub mod mmio;
pub mod options;
pub mod regs;

pub use driver::{InternalFlash, PartitionInfo};
pub use error::{Error, Result, Status};
pub use fccob::{Command, CommandBlock};
pub use geometry::{Capabilities, FlashGeometry};
pub use hardware::FlashHardware;
pub use hwrev::HardwareRevision;
pub use options::{DriverOptions, PollLimits};
