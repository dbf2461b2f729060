use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::registration::RegistrationParams;

/// Valid dwell-time window of the ion-beam scan generator, microseconds.
pub const DWELL_TIME_RANGE_US: (f64, f64) = (0.025, 25.0);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MillConfig {
    // Scalar first so the TOML serializer never emits a value after a table.
    pub output_dir: PathBuf,
    pub imaging: ImagingConfig,
    pub registration: RegistrationParams,
    pub drift: DriftConfig,
    pub fiducial: FiducialConfig,
    pub lamella: LamellaConfig,
    pub stages: Vec<StageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagingConfig {
    pub resolution_width: usize,
    pub resolution_height: usize,
    pub dwell_time_us: f64,
    /// Meters per pixel of the ion-beam image at the drift-tracking field
    /// of view.
    pub pixel_size_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Sleep between pause/measure/resume cycles while a stage mills.
    pub poll_interval_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiducialConfig {
    pub width_m: f64,
    pub height_m: f64,
    pub depth_m: f64,
    pub current_a: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LamellaConfig {
    /// Number of lamella sites to process in one run.
    pub count: usize,
    pub width_m: f64,
    /// Final lamella thickness; the trench gap of the last stage.
    pub thickness_m: f64,
    /// Extra stage tilt during milling, degrees.
    pub overtilt_degrees: f64,
}

/// One milling stage: coarse stages carry more current and a wider trench
/// gap, finishing stages step the gap down to the lamella thickness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub current_a: f64,
    pub depth_m: f64,
    pub trench_height_m: f64,
    /// Distance between the two trench faces for this stage.
    pub gap_m: f64,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            resolution_width: 1024,
            resolution_height: 884,
            dwell_time_us: 0.2,
            pixel_size_m: 1.5e-8,
        }
    }
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            poll_interval_s: 30.0,
        }
    }
}

impl Default for FiducialConfig {
    fn default() -> Self {
        Self {
            width_m: 1e-6,
            height_m: 1e-6,
            depth_m: 5e-7,
            current_a: 1e-10,
        }
    }
}

impl Default for LamellaConfig {
    fn default() -> Self {
        Self {
            count: 1,
            width_m: 1.2e-5,
            thickness_m: 2e-7,
            overtilt_degrees: 1.0,
        }
    }
}

impl MillConfig {
    /// Rough / medium / fine three-stage recipe.
    pub fn default_stages() -> Vec<StageConfig> {
        vec![
            StageConfig {
                current_a: 1e-9,
                depth_m: 1e-6,
                trench_height_m: 4e-6,
                gap_m: 3e-6,
            },
            StageConfig {
                current_a: 3e-10,
                depth_m: 6e-7,
                trench_height_m: 2e-6,
                gap_m: 1e-6,
            },
            StageConfig {
                current_a: 5e-11,
                depth_m: 4e-7,
                trench_height_m: 1e-6,
                gap_m: 2e-7,
            },
        ]
    }

    /// Load a config from TOML or JSON, sniffed from the content.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed: std::result::Result<Self, String> = if content.trim_start().starts_with('{') {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            toml::from_str(&content).map_err(|e| e.to_string())
        };
        let mut config = parsed.map_err(|message| Error::ConfigParse {
            path: path.to_path_buf(),
            message,
        })?;
        if config.stages.is_empty() {
            config.stages = Self::default_stages();
        }
        Ok(config)
    }

    /// Fatal pre-run validation. Every message names the offending value
    /// and the valid range so the operator can fix the file in one pass.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let (dwell_min, dwell_max) = DWELL_TIME_RANGE_US;
        if self.imaging.dwell_time_us < dwell_min || self.imaging.dwell_time_us > dwell_max {
            errors.push(format!(
                "imaging.dwell_time_us = {} is outside [{}, {}]",
                self.imaging.dwell_time_us, dwell_min, dwell_max
            ));
        }
        if self.imaging.resolution_width < 64 || self.imaging.resolution_height < 64 {
            errors.push(format!(
                "imaging resolution {}x{} is below the 64x64 minimum",
                self.imaging.resolution_width, self.imaging.resolution_height
            ));
        }
        if self.imaging.pixel_size_m <= 0.0 {
            errors.push(format!(
                "imaging.pixel_size_m = {} must be positive",
                self.imaging.pixel_size_m
            ));
        }
        if self.drift.poll_interval_s <= 0.0 {
            errors.push(format!(
                "drift.poll_interval_s = {} must be positive",
                self.drift.poll_interval_s
            ));
        }
        if self.lamella.count == 0 {
            errors.push("lamella.count = 0, nothing to mill".to_string());
        }
        if self.fiducial.current_a <= 0.0 {
            errors.push(format!(
                "fiducial.current_a = {} must be positive",
                self.fiducial.current_a
            ));
        }
        if self.stages.is_empty() {
            errors.push("stages list is empty, at least one milling stage is required".to_string());
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.current_a <= 0.0 {
                errors.push(format!(
                    "stages[{i}].current_a = {} must be positive",
                    stage.current_a
                ));
            }
            if stage.depth_m <= 0.0 {
                errors.push(format!(
                    "stages[{i}].depth_m = {} must be positive",
                    stage.depth_m
                ));
            }
            if stage.gap_m < self.lamella.thickness_m {
                errors.push(format!(
                    "stages[{i}].gap_m = {} is below lamella.thickness_m = {}",
                    stage.gap_m, self.lamella.thickness_m
                ));
            }
        }
        // Gaps must narrow monotonically toward the final thickness.
        for pair in self.stages.windows(2) {
            if pair[1].gap_m > pair[0].gap_m {
                errors.push(format!(
                    "stage gaps must not widen: {} -> {}",
                    pair[0].gap_m, pair[1].gap_m
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn grab_settings(&self) -> crate::hardware::GrabSettings {
        crate::hardware::GrabSettings {
            resolution: (self.imaging.resolution_width, self.imaging.resolution_height),
            dwell_time_us: self.imaging.dwell_time_us,
            pixel_size: crate::imaging::PixelSize::isotropic(self.imaging.pixel_size_m),
        }
    }
}
