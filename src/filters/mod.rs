//! Smoothing filters for the gaze coordinate stream.
//!
//! Raw predictions from the estimator are noisy frame to frame; these
//! filters convert the raw stream into a smoothed stream suitable for
//! cursor-like consumers. Filter state is reset whenever calibration is
//! (re)established and discarded on clear_calibration.

/// Kalman filter implementation for optimal state estimation
pub mod kalman;

/// Exponential filter for responsive smoothing
pub mod exponential;

use crate::config::FilterConfig;
use crate::Result;

/// Trait for all gaze smoothing filters
pub trait GazeFilter: Send {
    /// Advance the filter with a raw measurement, returning the smoothed position
    fn step(&mut self, x: f64, y: f64) -> (f64, f64);

    /// Reset filter state to neutral
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes through values unchanged
pub struct NoFilter;

impl GazeFilter for NoFilter {
    fn step(&mut self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Create a gaze filter from configuration
pub fn create_filter(config: &FilterConfig) -> Result<Box<dyn GazeFilter>> {
    match config.filter_type.to_lowercase().as_str() {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "kalman" => Ok(Box::new(kalman::KalmanSmoother::new(
            config.kalman_dt,
            config.process_var,
            config.measurement_var,
        ))),
        "exponential" => Ok(Box::new(exponential::ExponentialFilter::new(
            config.exponential_alpha,
        ))),
        other => Err(crate::Error::Filter(format!("Unknown filter type: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filter() {
        let mut filter = NoFilter;
        let (x, y) = filter.step(320.0, 240.0);
        assert_eq!(x, 320.0);
        assert_eq!(y, 240.0);
    }

    #[test]
    fn test_create_filter() {
        let mut config = FilterConfig::default();
        assert!(create_filter(&config).is_ok());

        config.filter_type = "none".to_string();
        assert!(create_filter(&config).is_ok());

        config.filter_type = "exponential".to_string();
        assert!(create_filter(&config).is_ok());

        config.filter_type = "unknown".to_string();
        assert!(create_filter(&config).is_err());
    }
}
