//! Gaze tracking service library.
//!
//! A long-running, stateful service that accepts commands over a
//! line-delimited JSON channel, drives a calibration workflow, and
//! streams smoothed gaze measurements from a background worker:
//!
//! 1. Calibration collects feature samples while the operator looks at
//!    known screen targets, then trains the estimator
//! 2. Tracking runs a background worker that samples, predicts, smooths,
//!    and pushes `gaze_update` events at a fixed cadence
//! 3. A constant-velocity Kalman filter smooths the raw coordinate stream
//!
//! Frame acquisition and the feature-to-screen model are consumed through
//! the [`source::MeasurementSource`] and [`estimator::GazeEstimator`]
//! traits; the crate ships a synthetic source and a ridge regressor as
//! working defaults.
//!
//! # Examples
//!
//! ```no_run
//! use gaze_tracking::config::Config;
//! use gaze_tracking::estimator::RidgeEstimator;
//! use gaze_tracking::service::GazeService;
//! use gaze_tracking::source::SyntheticSource;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let source = SyntheticSource::new(
//!     config.calibration.screen_width,
//!     config.calibration.screen_height,
//! );
//! let estimator = RidgeEstimator::new(config.model.ridge_alpha);
//!
//! let stdin = std::io::stdin();
//! let mut service = GazeService::new(config, source, estimator, std::io::stdout())?;
//! service.run(stdin.lock())?;
//! # Ok(())
//! # }
//! ```

/// Calibration sample collection and session bookkeeping
pub mod calibration;

/// Configuration management
pub mod config;

/// Constants used throughout the service
pub mod constants;

/// Error types and result handling
pub mod error;

/// Gaze estimator trait and the shipped ridge regressor
pub mod estimator;

/// Smoothing filters for the gaze coordinate stream
pub mod filters;

/// Wire protocol: commands, responses, events
pub mod protocol;

/// The service: command dispatch and read loop
pub mod service;

/// Measurement source trait and the synthetic source
pub mod source;

/// Shared service state flags
pub mod state;

/// Tracking worker and sampling pipeline
pub mod worker;

pub use error::{Error, Result};
