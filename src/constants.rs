//! Constants used throughout the service

/// Tracking worker cadence in milliseconds (20 samples/sec)
pub const TRACKING_PERIOD_MS: u64 = 50;

/// Kalman prediction step interval, matching the worker cadence
pub const KALMAN_DT: f64 = 0.05;

/// Kalman process noise variance (allows natural gaze movement)
pub const KALMAN_PROCESS_VAR: f64 = 50.0;

/// Kalman measurement noise variance (trusts the trained model)
pub const KALMAN_MEASUREMENT_VAR: f64 = 10.0;

/// Consecutive sampling failures before the worker self-terminates
pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Minimum accepted samples per calibration point
pub const MIN_SAMPLES_PER_POINT: usize = 5;

/// Minimum total accepted samples required by training
pub const MIN_TRAINING_SAMPLES: usize = 5;

/// Wall-clock collection window per calibration point in milliseconds
pub const DEFAULT_POINT_DURATION_MS: u64 = 1000;

/// Default camera index
pub const DEFAULT_CAMERA_ID: i32 = 0;

/// Default model file path
pub const DEFAULT_MODEL_PATH: &str = "gaze_model.json";

/// Default ridge regularization strength
pub const DEFAULT_RIDGE_ALPHA: f64 = 1.0;

/// Default exponential filter alpha
pub const DEFAULT_EXPONENTIAL_ALPHA: f64 = 0.5;

/// Default screen dimensions for calibration target placement
pub const DEFAULT_SCREEN_WIDTH: f64 = 1920.0;
pub const DEFAULT_SCREEN_HEIGHT: f64 = 1080.0;

/// Initial state covariance magnitude for the Kalman smoother
pub const KALMAN_INITIAL_COVARIANCE: f64 = 1000.0;
