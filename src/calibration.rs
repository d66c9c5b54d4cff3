//! Calibration sample collection.
//!
//! Collection is duration-based: each target point owns a fixed
//! wall-clock window during which every sample the source yields is
//! considered, and a sample is accepted only when feature extraction
//! succeeds and no blink is detected. A point whose window produced fewer
//! than the configured minimum is rejected and its samples are discarded;
//! the caller is told the shortfall. Training requires a minimum total of
//! accepted samples across at least one point.

use crate::config::CalibrationConfig;
use crate::estimator::{Features, GazeEstimator};
use crate::source::MeasurementSource;
use crate::{Error, Result};
use log::{debug, warn};
use std::time::{Duration, Instant};

/// One accepted calibration sample
#[derive(Debug, Clone)]
pub struct CalibrationSample {
    /// Extracted features at the moment of collection
    pub features: Features,
    /// Target the operator was looking at
    pub target_x: f64,
    /// Target the operator was looking at
    pub target_y: f64,
}

/// Accumulated calibration samples, consumed exactly once by training
#[derive(Debug, Default)]
pub struct CalibrationSession {
    samples: Vec<CalibrationSample>,
    points_accepted: usize,
}

impl CalibrationSession {
    /// Start an empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total accepted samples so far
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Number of accepted target points so far
    pub fn points_accepted(&self) -> usize {
        self.points_accepted
    }

    /// Append the samples of an accepted point
    pub fn accept_point(&mut self, samples: Vec<CalibrationSample>) {
        self.points_accepted += 1;
        self.samples.extend(samples);
    }

    /// Discard all accumulated samples
    pub fn clear(&mut self) {
        self.samples.clear();
        self.points_accepted = 0;
    }

    /// Consume the session into training inputs, leaving it empty.
    /// Fails with `InsufficientSamples` below the configured minimum.
    pub fn take_training_set(&mut self, min_samples: usize) -> Result<(Vec<Features>, Vec<(f64, f64)>)> {
        if self.samples.len() < min_samples {
            return Err(Error::InsufficientSamples {
                got: self.samples.len(),
                needed: min_samples,
            });
        }

        let samples = std::mem::take(&mut self.samples);
        self.points_accepted = 0;

        let mut features = Vec::with_capacity(samples.len());
        let mut targets = Vec::with_capacity(samples.len());
        for sample in samples {
            features.push(sample.features);
            targets.push((sample.target_x, sample.target_y));
        }
        Ok((features, targets))
    }
}

/// The 3x3 grid of calibration targets for the given screen size
#[must_use]
pub fn grid_targets(screen_width: f64, screen_height: f64) -> Vec<(f64, f64)> {
    let fractions = [0.1, 0.5, 0.9];
    let mut targets = Vec::with_capacity(9);
    for &fy in &fractions {
        for &fx in &fractions {
            targets.push((fx * screen_width, fy * screen_height));
        }
    }
    targets
}

/// Collect one target point's window of samples.
///
/// Read failures inside the window are logged and skipped; operator
/// cancellation aborts the whole collection. Returns the accepted samples
/// or `InsufficientSamples` when the window fell short of the minimum.
pub fn collect_point(
    source: &mut dyn MeasurementSource,
    estimator: &dyn GazeEstimator,
    target: (f64, f64),
    config: &CalibrationConfig,
    duration_override: Option<Duration>,
) -> Result<Vec<CalibrationSample>> {
    let window = duration_override.unwrap_or(Duration::from_millis(config.point_duration_ms));
    let deadline = Instant::now() + window;
    let mut accepted = Vec::new();
    let mut rejected = 0usize;

    while Instant::now() < deadline {
        let frame = match source.read_sample() {
            Ok(frame) => frame,
            Err(Error::Cancelled(reason)) => return Err(Error::Cancelled(reason)),
            Err(e) => {
                debug!("Sample read failed during calibration: {e}");
                rejected += 1;
                continue;
            }
        };

        match estimator.extract_features(&frame) {
            (Some(features), false) => accepted.push(CalibrationSample {
                features,
                target_x: target.0,
                target_y: target.1,
            }),
            _ => rejected += 1,
        }
    }

    debug!(
        "Calibration point ({:.0}, {:.0}): {} accepted, {} rejected",
        target.0,
        target.1,
        accepted.len(),
        rejected
    );

    if accepted.len() < config.min_samples_per_point {
        warn!(
            "Calibration point ({:.0}, {:.0}) rejected: {} of {} required samples",
            target.0,
            target.1,
            accepted.len(),
            config.min_samples_per_point
        );
        return Err(Error::InsufficientSamples {
            got: accepted.len(),
            needed: config.min_samples_per_point,
        });
    }

    Ok(accepted)
}
