//! Error types for kinflash-core
//!
//! This module provides a no_std compatible error type. Every driver
//! operation reports failure through it; nothing in the crate panics on a
//! flash failure. Callers that only care about pass/fail can collapse any
//! result into a [`Status`].

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Parameter errors (detected before touching hardware)
    /// Address or size does not satisfy the operation's alignment
    InvalidAlignment,
    /// Address range lies outside program flash
    AddressOutOfBounds,
    /// Address range overlaps a region the driver refuses to modify
    ReservedRegion,
    /// Size is zero or not a multiple of the operation's unit
    InvalidSize,
    /// Operation or size is not supported by this controller
    Unsupported,

    // Controller errors
    /// A command was already in flight when a new one was requested
    Busy,
    /// The controller flagged ACCERR (illegal command or parameters)
    AccessError {
        /// Target address of the failed command
        addr: u32,
    },
    /// The controller flagged FPVIOL (protected region)
    ProtectionViolation {
        /// Target address of the failed command
        addr: u32,
    },
    /// The command completed with MGSTAT0 set (program/erase verify failure)
    CommandFailed {
        /// Target address of the failed command
        addr: u32,
    },
    /// The controller did not signal completion within the poll ceiling
    Timeout {
        /// Target address of the command that timed out
        addr: u32,
    },
    /// FlexRAM is not available as RAM for staging section data
    FlexRamNotReady,

    // Once-record errors
    /// The once-record already holds data
    RecordLocked,
    /// The once-record has never been programmed
    RecordBlank,
    /// The once-record holds data that is not a recognised record
    InvalidRecord,
}

impl Error {
    /// Collapse this error into the coarse OK/FAIL view
    pub fn status(&self) -> Status {
        Status::Fail
    }

    /// Returns true if the error was raised by parameter validation,
    /// i.e. before any register was written
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAlignment
                | Self::AddressOutOfBounds
                | Self::ReservedRegion
                | Self::InvalidSize
                | Self::Unsupported
        )
    }

    /// Address of the command that failed, if the controller reported one
    pub fn failed_address(&self) -> Option<u32> {
        match *self {
            Self::AccessError { addr }
            | Self::ProtectionViolation { addr }
            | Self::CommandFailed { addr }
            | Self::Timeout { addr } => Some(addr),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAlignment => write!(f, "invalid alignment"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::ReservedRegion => write!(f, "address range is reserved"),
            Self::InvalidSize => write!(f, "invalid size"),
            Self::Unsupported => write!(f, "operation not supported by the flash controller"),
            Self::Busy => write!(f, "flash controller busy"),
            Self::AccessError { addr } => {
                write!(f, "flash access error at address 0x{:08X}", addr)
            }
            Self::ProtectionViolation { addr } => {
                write!(f, "flash protection violation at address 0x{:08X}", addr)
            }
            Self::CommandFailed { addr } => {
                write!(f, "flash command failed at address 0x{:08X}", addr)
            }
            Self::Timeout { addr } => {
                write!(f, "flash command timed out at address 0x{:08X}", addr)
            }
            Self::FlexRamNotReady => write!(f, "FlexRAM is not available as RAM"),
            Self::RecordLocked => write!(f, "once-record is already programmed"),
            Self::RecordBlank => write!(f, "once-record is blank"),
            Self::InvalidRecord => write!(f, "once-record contents are not recognised"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

/// Coarse two-valued outcome of a flash operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation completed without error
    Ok,
    /// The operation failed for any reason
    Fail,
}

impl Status {
    /// Returns true for [`Status::Ok`]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Numeric code (0 = OK, 1 = FAIL)
    pub fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Fail => 1,
        }
    }
}

impl<T> From<&Result<T>> for Status {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => e.status(),
        }
    }
}

impl<T> From<Result<T>> for Status {
    fn from(result: Result<T>) -> Self {
        Self::from(&result)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}
