//! Driver options
//!
//! Options are usually built in code, but can also be parsed from the
//! `key=value` pairs used on the command line.

use core::fmt;

/// Upper bounds on the number of FSTAT polls per command
///
/// A poll is one read of FSTAT. The ceiling protects against a hung
/// controller; it is not a timing guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollLimits {
    /// Program and once-record commands
    pub program: u32,
    /// Program Section
    pub section: u32,
    /// Sector and block erase
    pub erase: u32,
    /// Erase All Blocks
    pub mass_erase: u32,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self {
            program: 1_000_000,
            section: 10_000_000,
            erase: 20_000_000,
            mass_erase: 200_000_000,
        }
    }
}

/// Options for the internal flash driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverOptions {
    /// Poll ceilings
    pub poll: PollLimits,
    /// Allow program/erase operations that touch the flash configuration field
    pub allow_config_field: bool,
}

/// An option that could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidOption<'a> {
    /// Option key
    pub key: &'a str,
    /// Offending value
    pub value: &'a str,
}

impl fmt::Display for InvalidOption<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for driver option {}: {}", self.key, self.value)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InvalidOption<'_> {}

impl DriverOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the poll ceilings
    pub fn with_poll_limits(mut self, poll: PollLimits) -> Self {
        self.poll = poll;
        self
    }

    /// Allow writes to the flash configuration field
    pub fn with_config_field_writes(mut self, allow: bool) -> Self {
        self.allow_config_field = allow;
        self
    }

    /// Parse options from key-value pairs (from CLI)
    ///
    /// Supported options:
    /// - `poll=<n>`: ceiling for program commands
    /// - `section_poll=<n>`: ceiling for Program Section
    /// - `erase_poll=<n>`: ceiling for sector/block erase
    /// - `mass_erase_poll=<n>`: ceiling for Erase All Blocks
    /// - `allow_config_field=<yes|no>`
    pub fn from_options<'a>(options: &[(&'a str, &'a str)]) -> Result<Self, InvalidOption<'a>> {
        let mut opts = Self::default();

        for &(key, value) in options {
            let invalid = InvalidOption { key, value };
            match key {
                "poll" => opts.poll.program = parse_count(value).ok_or(invalid)?,
                "section_poll" => opts.poll.section = parse_count(value).ok_or(invalid)?,
                "erase_poll" => opts.poll.erase = parse_count(value).ok_or(invalid)?,
                "mass_erase_poll" => opts.poll.mass_erase = parse_count(value).ok_or(invalid)?,
                "allow_config_field" => {
                    opts.allow_config_field = parse_bool(value).ok_or(invalid)?
                }
                _ => {
                    log::warn!("Unknown driver option: {}={}", key, value);
                }
            }
        }

        Ok(opts)
    }
}

fn parse_count(value: &str) -> Option<u32> {
    match value.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_options() {
        let opts = DriverOptions::from_options(&[
            ("poll", "50"),
            ("erase_poll", "500"),
            ("allow_config_field", "yes"),
            ("bogus", "1"),
        ])
        .unwrap();
        assert_eq!(opts.poll.program, 50);
        assert_eq!(opts.poll.erase, 500);
        assert_eq!(opts.poll.mass_erase, PollLimits::default().mass_erase);
        assert!(opts.allow_config_field);
    }

    #[test]
    fn test_rejects_zero_ceiling() {
        let err = DriverOptions::from_options(&[("poll", "0")]).unwrap_err();
        assert_eq!(err.key, "poll");
        assert!(DriverOptions::from_options(&[("allow_config_field", "maybe")]).is_err());
    }
}
