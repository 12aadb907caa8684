//! Hardware revision record
//!
//! The board revision is stored once, at manufacturing time, in a program-once
//! record. The record holds `[major, minor, patch, 0x5A]` followed by zero
//! padding on controllers with 8-byte records.

use core::fmt;

use crate::driver::InternalFlash;
use crate::error::{Error, Result};
use crate::geometry::MAX_ONCE_RECORD_SIZE;
use crate::hardware::FlashHardware;

/// Once-record index reserved for the hardware revision
pub const HW_REV_RECORD_INDEX: u8 = 0;

/// Marker byte identifying a hardware revision record
pub const HW_REV_RECORD_TAG: u8 = 0x5A;

/// Board hardware revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HardwareRevision {
    /// Major revision
    pub major: u8,
    /// Minor revision
    pub minor: u8,
    /// Patch level
    pub patch: u8,
}

impl HardwareRevision {
    /// Create a revision
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Encode into a once-record image; only the first record-size bytes are used
    pub fn encode(&self) -> [u8; MAX_ONCE_RECORD_SIZE] {
        let mut record = [0; MAX_ONCE_RECORD_SIZE];
        record[..4].copy_from_slice(&[self.major, self.minor, self.patch, HW_REV_RECORD_TAG]);
        record
    }

    /// Decode a once-record
    pub fn decode(record: &[u8]) -> Result<Self> {
        if record.len() < 4 {
            return Err(Error::InvalidSize);
        }
        if record.iter().all(|&b| b == 0xFF) {
            return Err(Error::RecordBlank);
        }
        if record[3] != HW_REV_RECORD_TAG {
            return Err(Error::InvalidRecord);
        }
        Ok(Self::new(record[0], record[1], record[2]))
    }
}

impl fmt::Display for HardwareRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl core::str::FromStr for HardwareRevision {
    type Err = Error;

    /// Parse `major.minor.patch`
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('.').map(|p| p.trim().parse::<u8>());
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch)), None) => {
                Ok(Self::new(major, minor, patch))
            }
            _ => Err(Error::InvalidRecord),
        }
    }
}

impl<H: FlashHardware> InternalFlash<H> {
    /// Store the hardware revision
    ///
    /// The record can be written exactly once. If the slot already holds
    /// anything, the call fails with [`Error::RecordLocked`] without issuing
    /// Program Once.
    pub fn program_hw_rev(&mut self, rev: HardwareRevision) -> Result<()> {
        let size = self.geometry().once_record_size;
        let mut current = [0; MAX_ONCE_RECORD_SIZE];
        self.read_once(HW_REV_RECORD_INDEX, &mut current[..size])?;

        if current[..size].iter().any(|&b| b != 0xFF) {
            log::warn!(
                "Hardware revision record already programmed ({:02X?})",
                &current[..size]
            );
            return Err(Error::RecordLocked);
        }

        log::info!("Programming hardware revision {}", rev);
        let record = rev.encode();
        self.program_once(HW_REV_RECORD_INDEX, &record[..size])
    }

    /// Read the stored hardware revision
    pub fn read_hw_rev(&mut self) -> Result<HardwareRevision> {
        let size = self.geometry().once_record_size;
        let mut record = [0; MAX_ONCE_RECORD_SIZE];
        self.read_once(HW_REV_RECORD_INDEX, &mut record[..size])?;
        HardwareRevision::decode(&record[..size])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let rev = HardwareRevision::new(1, 2, 3);
        assert_eq!(rev.encode(), [1, 2, 3, 0x5A, 0, 0, 0, 0]);
        assert_eq!(HardwareRevision::decode(&rev.encode()[..4]), Ok(rev));
        assert_eq!(HardwareRevision::decode(&rev.encode()), Ok(rev));
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            HardwareRevision::decode(&[0xFF; 4]),
            Err(Error::RecordBlank)
        );
        assert_eq!(
            HardwareRevision::decode(&[1, 2, 3, 0x00]),
            Err(Error::InvalidRecord)
        );
        assert_eq!(HardwareRevision::decode(&[1, 2]), Err(Error::InvalidSize));
    }

    #[test]
    fn test_parse() {
        assert_eq!("2.0.1".parse(), Ok(HardwareRevision::new(2, 0, 1)));
        assert!("2.0".parse::<HardwareRevision>().is_err());
        assert!("2.0.300".parse::<HardwareRevision>().is_err());
    }
}
