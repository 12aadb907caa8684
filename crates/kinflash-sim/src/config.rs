//! Simulator configuration

use kinflash_core::FlashGeometry;

use crate::error::{Result, SimError};

/// What FlexRAM is currently used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexRamMode {
    /// Traditional RAM (RAMRDY set), usable by Program Section
    Ram,
    /// EEPROM emulation (EEERDY set)
    Eeprom,
}

/// Configuration for the simulated controller
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Flash geometry and controller capabilities
    pub geometry: FlashGeometry,
    /// Number of FSTAT reads before a launched command completes
    pub busy_polls: u32,
    /// Initial FlexRAM function
    pub flexram: FlexRamMode,
    /// FPROT3..FPROT0 as one word, bit n clear protects region n
    pub fprot: u32,
    /// Report the part as secured in FSEC
    pub secure: bool,
    /// EEPROM data set size byte returned from the IFR
    pub eeprom_size: u8,
    /// FlexNVM partition byte returned from the IFR
    pub partition: u8,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            geometry: FlashGeometry::ftfl(),
            busy_polls: 2,
            flexram: FlexRamMode::Ram,
            fprot: u32::MAX,
            secure: false,
            eeprom_size: 0xFF,
            partition: 0xFF,
        }
    }
}

impl SimConfig {
    /// Configuration for an FTFE (K64) part
    pub fn ftfe() -> Self {
        Self {
            geometry: FlashGeometry::ftfe(),
            ..Self::default()
        }
    }

    /// Parse options from key-value pairs (from CLI)
    ///
    /// Supported options:
    /// - `preset=<ftfl|ftfe|k64>`
    /// - `busy=<n>`: FSTAT reads per command
    /// - `flexram=<ram|eeprom>`
    /// - `fprot=<hex>`: protection word
    /// - `secure=<yes|no>`
    pub fn from_options(options: &[(&str, &str)]) -> Result<Self> {
        let mut config = Self::default();

        for &(key, value) in options {
            match key {
                "preset" => {
                    config.geometry = FlashGeometry::preset(value).ok_or_else(|| {
                        SimError::InvalidParameter(format!(
                            "unknown preset '{}', expected ftfl or ftfe",
                            value
                        ))
                    })?;
                }
                "busy" => {
                    config.busy_polls = value.parse().map_err(|_| {
                        SimError::InvalidParameter(format!("invalid busy count '{}'", value))
                    })?;
                }
                "flexram" => {
                    config.flexram = match value {
                        "ram" => FlexRamMode::Ram,
                        "eeprom" | "eee" => FlexRamMode::Eeprom,
                        _ => {
                            return Err(SimError::InvalidParameter(format!(
                                "invalid flexram mode '{}', expected ram or eeprom",
                                value
                            )))
                        }
                    };
                }
                "fprot" => {
                    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
                    config.fprot = u32::from_str_radix(digits, 16).map_err(|_| {
                        SimError::InvalidParameter(format!("invalid fprot '{}'", value))
                    })?;
                }
                "secure" => {
                    config.secure = match value {
                        "1" | "yes" | "true" | "on" => true,
                        "0" | "no" | "false" | "off" => false,
                        _ => {
                            return Err(SimError::InvalidParameter(format!(
                                "invalid secure flag '{}'",
                                value
                            )))
                        }
                    };
                }
                _ => {
                    log::warn!("Unknown simulator option: {}={}", key, value);
                }
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_options() {
        let config = SimConfig::from_options(&[
            ("preset", "ftfe"),
            ("busy", "0"),
            ("flexram", "eeprom"),
            ("fprot", "0xFFFFFFFE"),
        ])
        .unwrap();
        assert_eq!(config.geometry, FlashGeometry::ftfe());
        assert_eq!(config.busy_polls, 0);
        assert_eq!(config.flexram, FlexRamMode::Eeprom);
        assert_eq!(config.fprot, 0xFFFF_FFFE);
        assert!(!config.secure);
    }

    #[test]
    fn test_invalid_options() {
        assert!(SimConfig::from_options(&[("preset", "stm32")]).is_err());
        assert!(SimConfig::from_options(&[("flexram", "rom")]).is_err());
        assert!(SimConfig::from_options(&[("busy", "-1")]).is_err());
    }
}
