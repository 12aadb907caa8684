//! kinflash-sim - Simulated Kinetis flash controller
//!
//! This crate provides a register-level model of the FTFL/FTFE flash memory
//! module. It implements [`kinflash_core::FlashHardware`], so the real driver
//! can be exercised on the host, and can persist its state to image files
//! for offline provisioning.

pub mod config;
pub mod controller;
pub mod error;
pub mod image;

#[cfg(test)]
mod tests;

pub use config::{FlexRamMode, SimConfig};
pub use controller::SimController;
pub use error::{Result, SimError};
