//! Configuration management for the gaze tracking service

use crate::constants::{
    DEFAULT_CAMERA_ID, DEFAULT_EXPONENTIAL_ALPHA, DEFAULT_MODEL_PATH, DEFAULT_POINT_DURATION_MS,
    DEFAULT_RIDGE_ALPHA, DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH, KALMAN_DT,
    KALMAN_MEASUREMENT_VAR, KALMAN_PROCESS_VAR, MIN_SAMPLES_PER_POINT, MIN_TRAINING_SAMPLES,
    TRACKING_PERIOD_MS,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Measurement source configuration
    pub source: SourceConfig,

    /// Calibration configuration
    pub calibration: CalibrationConfig,

    /// Smoothing filter configuration
    pub filter: FilterConfig,

    /// Estimator model configuration
    pub model: ModelConfig,

    /// Tracking worker configuration
    pub tracking: TrackingConfig,
}

/// Measurement source parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Camera index to open
    pub camera_id: i32,
}

/// Calibration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Wall-clock collection window per target point (milliseconds)
    pub point_duration_ms: u64,

    /// Minimum accepted samples for a point to count
    pub min_samples_per_point: usize,

    /// Minimum total accepted samples required by training
    pub min_training_samples: usize,

    /// Screen width used to place calibration targets
    pub screen_width: f64,

    /// Screen height used to place calibration targets
    pub screen_height: f64,
}

/// Smoothing filter parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Filter type: "kalman", "exponential", or "none"
    pub filter_type: String,

    /// Kalman prediction step interval in seconds
    pub kalman_dt: f64,

    /// Kalman process noise variance
    pub process_var: f64,

    /// Kalman measurement noise variance
    pub measurement_var: f64,

    /// Exponential filter alpha value
    pub exponential_alpha: f64,
}

/// Estimator model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default path for save_model / load_model
    pub path: PathBuf,

    /// Ridge regularization strength
    pub ridge_alpha: f64,
}

/// Tracking worker parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Worker iteration period in milliseconds
    pub period_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            calibration: CalibrationConfig::default(),
            filter: FilterConfig::default(),
            model: ModelConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            camera_id: DEFAULT_CAMERA_ID,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            point_duration_ms: DEFAULT_POINT_DURATION_MS,
            min_samples_per_point: MIN_SAMPLES_PER_POINT,
            min_training_samples: MIN_TRAINING_SAMPLES,
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            filter_type: "kalman".to_string(),
            kalman_dt: KALMAN_DT,
            process_var: KALMAN_PROCESS_VAR,
            measurement_var: KALMAN_MEASUREMENT_VAR,
            exponential_alpha: DEFAULT_EXPONENTIAL_ALPHA,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODEL_PATH),
            ridge_alpha: DEFAULT_RIDGE_ALPHA,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            period_ms: TRACKING_PERIOD_MS,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.calibration.point_duration_ms == 0 {
            return Err(Error::Config(
                "Calibration point duration must be greater than 0".to_string(),
            ));
        }
        if self.calibration.min_samples_per_point == 0 {
            return Err(Error::Config(
                "Minimum samples per point must be greater than 0".to_string(),
            ));
        }
        if self.calibration.screen_width <= 0.0 || self.calibration.screen_height <= 0.0 {
            return Err(Error::Config("Screen dimensions must be positive".to_string()));
        }

        if self.filter.kalman_dt <= 0.0 {
            return Err(Error::Config("Kalman dt must be positive".to_string()));
        }
        if self.filter.process_var <= 0.0 || self.filter.measurement_var <= 0.0 {
            return Err(Error::Config("Noise variances must be positive".to_string()));
        }
        if self.filter.exponential_alpha <= 0.0 || self.filter.exponential_alpha > 1.0 {
            return Err(Error::Config(
                "Exponential alpha must be in (0.0, 1.0]".to_string(),
            ));
        }
        match self.filter.filter_type.as_str() {
            "kalman" | "exponential" | "none" => {}
            other => {
                return Err(Error::Config(format!("Unknown filter type: {other}")));
            }
        }

        if self.model.ridge_alpha < 0.0 {
            return Err(Error::Config(
                "Ridge regularization strength must be non-negative".to_string(),
            ));
        }

        if self.tracking.period_ms == 0 {
            return Err(Error::Config("Tracking period must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Gaze Tracking Service Configuration

# Measurement source
source:
  camera_id: 0

# Calibration policy
calibration:
  point_duration_ms: 1000
  min_samples_per_point: 5
  min_training_samples: 5
  screen_width: 1920.0
  screen_height: 1080.0

# Smoothing filter
filter:
  filter_type: "kalman"
  kalman_dt: 0.05
  process_var: 50.0
  measurement_var: 10.0
  exponential_alpha: 0.5

# Estimator model
model:
  path: "gaze_model.json"
  ridge_alpha: 1.0

# Tracking worker
tracking:
  period_ms: 50
"#;
