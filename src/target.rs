//! Target selection and driver bring-up
//!
//! Commands run the real driver against a simulated controller backed by an
//! image file. The target string selects the controller: it can be just the
//! part family (e.g., "ftfe") or include simulator options
//! (e.g., "ftfe:flexram=eeprom,busy=4").

use kinflash_core::{DriverOptions, FlashGeometry, InternalFlash};
use kinflash_sim::{image, SimConfig, SimController};
use std::path::Path;

/// Information about a supported target
pub struct TargetInfo {
    /// Name used on the command line
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Supported targets
pub const TARGETS: &[TargetInfo] = &[
    TargetInfo {
        name: "ftfl",
        aliases: &[],
        description: "FTFL controller, 512 KB flash, 2 KB sectors, long-word programming",
    },
    TargetInfo {
        name: "ftfe",
        aliases: &["k64"],
        description: "FTFE controller (MK64FN1M0), 1 MB flash, 4 KB sectors, phrase programming",
    },
];

/// Parse a target string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_target_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Parse `key=value` driver options
pub fn parse_driver_options(options: &[String]) -> Result<DriverOptions, Box<dyn std::error::Error>> {
    let pairs: Vec<(&str, &str)> = options
        .iter()
        .filter_map(|opt| {
            let pair = opt.split_once('=');
            if pair.is_none() {
                log::warn!("Ignoring driver option without value: {}", opt);
            }
            pair
        })
        .collect();

    DriverOptions::from_options(&pairs).map_err(|e| e.to_string().into())
}

/// Build the simulator configuration for a target string
pub fn sim_config(target: &str) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let (name, options) = parse_target_string(target);

    let geometry = FlashGeometry::preset(name).ok_or_else(|| unknown_target_error(name))?;
    let mut config = SimConfig::from_options(&options)?;
    if !options.iter().any(|(key, _)| *key == "preset") {
        config.geometry = geometry;
    }

    Ok(config)
}

/// Execute a function with an initialised driver
///
/// The image is loaded (or created blank), the driver is brought up on the
/// simulated controller and, if `save` is set, the resulting flash state is
/// written back after `f` returns successfully.
pub fn with_flash<F>(
    target: &str,
    image_path: &Path,
    driver_options: &[String],
    save: bool,
    f: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut InternalFlash<SimController>) -> Result<(), Box<dyn std::error::Error>>,
{
    let config = sim_config(target)?;
    let options = parse_driver_options(driver_options)?;
    let geometry = config.geometry.clone();

    log::info!("Opening {} image {}", target, image_path.display());
    let sim = image::load(image_path, config)?;

    let mut flash = InternalFlash::init(sim, geometry, options)
        .map_err(|e| format!("Failed to initialize flash driver: {}", e))?;

    f(&mut flash)?;

    if save {
        image::save(&flash.into_inner(), image_path)?;
    }

    Ok(())
}

fn unknown_target_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown target: {}\n\nAvailable targets:\n", name);
    for t in TARGETS {
        msg.push_str(&format!("  {:6} - {}\n", t.name, t.description));
    }
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_string() {
        assert_eq!(parse_target_string("ftfl"), ("ftfl", vec![]));
        assert_eq!(
            parse_target_string("ftfe:busy=0,flexram=eeprom"),
            ("ftfe", vec![("busy", "0"), ("flexram", "eeprom")])
        );
    }

    #[test]
    fn test_sim_config() {
        let config = sim_config("k64:busy=0").unwrap();
        assert_eq!(config.geometry, FlashGeometry::ftfe());
        assert_eq!(config.busy_polls, 0);
        assert!(sim_config("stm32").is_err());
    }

    #[test]
    fn test_driver_options() {
        let opts = parse_driver_options(&["poll=10".to_string(), "bogus".to_string()]).unwrap();
        assert_eq!(opts.poll.program, 10);
        assert!(parse_driver_options(&["poll=0".to_string()]).is_err());
    }
}
