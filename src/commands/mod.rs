//! CLI command implementations
//!
//! Every command operates on an initialised [`kinflash_core::InternalFlash`]
//! and is generic over the hardware it drives.

pub mod erase;
pub mod flexram;
pub mod hwrev;
pub mod info;
mod list;
pub mod read;
pub mod verify;
pub mod write;

pub use list::list_targets;
