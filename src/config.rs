use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cloak::background::BackgroundEstimator;
use crate::cloak::error::CloakError;
use crate::cloak::mask::{ColorRange, MaskBuilder};

/// Everything that tunes the cloak effect. Every field falls back to its default when it is
/// missing from the JSON file, so a config file only needs to list what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloakConfig {
    /// Number of frames sampled for the background median.
    pub background_samples: usize,
    /// Delay after each background sample, in milliseconds.
    pub sample_interval_ms: u64,
    /// Delay before retrying a failed frame read in the main loop, in milliseconds.
    pub read_retry_ms: u64,
    /// How long each key poll waits, in milliseconds.
    pub key_wait_ms: u64,
    /// HSV range of the cloak.
    pub color_range: ColorRange,
    /// Side length of the elliptical structuring element. Must be odd.
    pub kernel_size: i32,
    pub open_iterations: i32,
    pub dilate_iterations: i32,
    pub window_name: String,
}

impl Default for CloakConfig {
    fn default() -> Self {
        Self {
            background_samples: 30,
            sample_interval_ms: 100,
            read_retry_ms: 500,
            key_wait_ms: 1,
            color_range: ColorRange::blue(),
            kernel_size: 5,
            open_iterations: 2,
            dilate_iterations: 1,
            window_name: "Invisible Cloak".to_string(),
        }
    }
}

impl CloakConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CloakError> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CloakError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CloakError> {
        if self.background_samples == 0 {
            return Err(CloakError::InvalidConfig(
                "background_samples must be at least 1".to_string(),
            ));
        }
        if self.kernel_size < 1 || self.kernel_size % 2 == 0 {
            return Err(CloakError::InvalidConfig(format!(
                "kernel_size must be a positive odd number, got {}",
                self.kernel_size
            )));
        }
        if self.open_iterations < 0 || self.dilate_iterations < 0 {
            return Err(CloakError::InvalidConfig(
                "morphology iteration counts must not be negative".to_string(),
            ));
        }
        if self.window_name.is_empty() {
            return Err(CloakError::InvalidConfig(
                "window_name must not be empty".to_string(),
            ));
        }
        self.color_range.validate()
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn read_retry(&self) -> Duration {
        Duration::from_millis(self.read_retry_ms)
    }

    pub fn key_wait(&self) -> Duration {
        Duration::from_millis(self.key_wait_ms)
    }

    pub fn background_estimator(&self) -> Result<BackgroundEstimator, CloakError> {
        BackgroundEstimator::new(self.background_samples, self.sample_interval())
    }

    pub fn mask_builder(&self) -> Result<MaskBuilder, CloakError> {
        MaskBuilder::new(
            self.color_range,
            self.kernel_size,
            self.open_iterations,
            self.dilate_iterations,
        )
    }
}
