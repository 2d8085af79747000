//! Calibration persistence to a TOML file.
use std::path::PathBuf;

use loadcell_config::PersistedCalibration;
use loadcell_core::atomic::write_atomic;
use loadcell_core::{CalibrationState, CalibrationStore};
use loadcell_traits::BoxError;

#[derive(Debug, Clone)]
pub struct FileCalibrationStore {
    path: PathBuf,
}

impl FileCalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CalibrationStore for FileCalibrationStore {
    fn persist(&mut self, state: &CalibrationState) -> Result<(), BoxError> {
        let text = PersistedCalibration::from(*state)
            .to_toml_string()
            .map_err(|e| e.to_string())?;
        write_atomic(&self.path, text.as_bytes())?;
        tracing::debug!(path = %self.path.display(), "calibration written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.toml");
        let mut store = FileCalibrationStore::new(&path);

        store.persist(&CalibrationState::new(-42, 0.125)).unwrap();

        let loaded = loadcell_config::load_calibration_file(&path).unwrap();
        assert_eq!(
            loaded,
            Some(PersistedCalibration {
                tare_raw: -42,
                scale: 0.125
            })
        );
    }

    #[test]
    fn non_finite_scale_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.toml");
        let mut store = FileCalibrationStore::new(&path);
        assert!(store.persist(&CalibrationState::new(0, f64::INFINITY)).is_err());
        assert!(!path.exists());
    }
}
