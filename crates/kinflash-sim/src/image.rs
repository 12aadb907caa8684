//! On-disk flash images
//!
//! Program flash is stored as a raw binary the size of the flash array.
//! Once-records go into a sidecar file next to it (`<image>.once`), one
//! record after another.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::SimConfig;
use crate::controller::SimController;
use crate::error::{Result, SimError};

/// Path of the once-record sidecar for `image`
pub fn once_path(image: &Path) -> PathBuf {
    let mut path = OsString::from(image.as_os_str());
    path.push(".once");
    PathBuf::from(path)
}

/// Load a controller from `path`
///
/// A missing image gives a blank controller; a missing sidecar leaves the
/// once-records blank.
pub fn load(path: &Path, config: SimConfig) -> Result<SimController> {
    let expected = config.geometry.flash_size as usize;
    let mut sim = match fs::read(path) {
        Ok(data) => {
            if data.len() != expected {
                return Err(SimError::SizeMismatch {
                    path: path.to_path_buf(),
                    expected,
                    actual: data.len(),
                });
            }
            log::debug!("Loaded {} bytes from {}", data.len(), path.display());
            SimController::with_data(config, &data)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("{} does not exist, starting from blank flash", path.display());
            SimController::new(config)
        }
        Err(source) => {
            return Err(SimError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let sidecar = once_path(path);
    match fs::read(&sidecar) {
        Ok(records) => {
            let size = sim.config().geometry.once_record_size;
            for (index, record) in records.chunks_exact(size).enumerate() {
                let Ok(index) = u8::try_from(index) else {
                    break;
                };
                sim.set_once_record(index, record);
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(source) => {
            return Err(SimError::ReadFailed {
                path: sidecar,
                source,
            })
        }
    }

    Ok(sim)
}

/// Write the controller state back to `path` and its sidecar
pub fn save(sim: &SimController, path: &Path) -> Result<()> {
    fs::write(path, sim.data()).map_err(|source| SimError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })?;

    let mut records = Vec::new();
    for index in 0..sim.config().geometry.once_record_count {
        if let Some(record) = sim.once_record(index) {
            records.extend_from_slice(record);
        }
    }

    let sidecar = once_path(path);
    fs::write(&sidecar, records).map_err(|source| SimError::WriteFailed {
        path: sidecar,
        source,
    })?;

    log::debug!("Saved flash image to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_image(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("kinflash-{}-{}.bin", name, std::process::id()))
    }

    #[test]
    fn test_round_trip() {
        let path = temp_image("roundtrip");
        let mut sim = SimController::new(SimConfig::default());
        sim.data_mut()[0x1000..0x1004].copy_from_slice(&[1, 2, 3, 4]);
        sim.set_once_record(0, &[2, 0, 1, 0x5A]);
        save(&sim, &path).unwrap();

        let loaded = load(&path, SimConfig::default()).unwrap();
        assert_eq!(loaded.data(), sim.data());
        assert_eq!(loaded.once_record(0), Some(&[2, 0, 1, 0x5A][..]));
        assert!(loaded.once_programmed(0));
        assert!(!loaded.once_programmed(1));

        fs::remove_file(&path).ok();
        fs::remove_file(once_path(&path)).ok();
    }

    #[test]
    fn test_missing_image_is_blank() {
        let path = temp_image("missing");
        let sim = load(&path, SimConfig::default()).unwrap();
        assert!(sim.data().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_size_mismatch() {
        let path = temp_image("short");
        fs::write(&path, [0u8; 16]).unwrap();
        let err = load(&path, SimConfig::default()).err().unwrap();
        assert!(matches!(err, SimError::SizeMismatch { actual: 16, .. }));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_once_path() {
        assert_eq!(
            once_path(Path::new("/tmp/flash.bin")),
            PathBuf::from("/tmp/flash.bin.once")
        );
    }
}
