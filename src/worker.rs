//! Tracking worker and the sampling pipeline it shares with the engine.
//!
//! The pipeline (source handle, estimator, smoothing filter) lives in an
//! `Arc<Mutex<_>>`: the worker locks it once per iteration, the protocol
//! engine locks it for one-shot samples and for the whole of a blocking
//! calibration, so tracking and calibration can never interleave on the
//! measurement source.

use crate::constants::MAX_CONSECUTIVE_ERRORS;
use crate::estimator::GazeEstimator;
use crate::filters::GazeFilter;
use crate::protocol::{GazePoint, GazeReport, OutputChannel};
use crate::source::MeasurementSource;
use crate::state::ServiceState;
use crate::{Error, Result};
use log::{debug, info, warn};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// The sampling pipeline: one frame in, one gaze report out
pub struct Pipeline<S, E> {
    /// Measurement source handle
    pub source: S,
    /// Feature extraction and prediction
    pub estimator: E,
    /// Smoothing stage over raw predictions
    pub filter: Box<dyn GazeFilter>,
}

impl<S: MeasurementSource, E: GazeEstimator> Pipeline<S, E> {
    /// Assemble a pipeline
    pub fn new(source: S, estimator: E, filter: Box<dyn GazeFilter>) -> Self {
        Self {
            source,
            estimator,
            filter,
        }
    }

    /// Open the source if it is not already open (idempotent)
    pub fn ensure_open(&mut self, camera_id: i32) -> Result<()> {
        if !self.source.is_open() {
            self.source.open(camera_id)?;
        }
        Ok(())
    }

    /// Take one sample and turn it into a gaze report.
    ///
    /// Face loss, blinks, and a missing model are ordinary reports;
    /// source read failures and prediction failures with an established
    /// model are errors (the worker counts those toward self-termination).
    pub fn sample_gaze(&mut self, calibrated: bool) -> Result<GazeReport> {
        let frame = self.source.read_sample()?;

        let (features, blink) = self.estimator.extract_features(&frame);
        let Some(features) = features else {
            if blink {
                return Ok(GazeReport::blink());
            }
            return Ok(GazeReport::no_face());
        };

        if !calibrated {
            return Ok(GazeReport::not_calibrated());
        }

        let predictions = self.estimator.predict(std::slice::from_ref(&features))?;
        let (raw_x, raw_y) = predictions
            .first()
            .copied()
            .ok_or_else(|| Error::Model("Estimator returned no prediction".to_string()))?;

        let (x, y) = self.filter.step(raw_x, raw_y);
        Ok(GazeReport::gaze(
            GazePoint { x, y },
            GazePoint { x: raw_x, y: raw_y },
        ))
    }
}

/// Handle to the single background tracking thread
pub struct TrackingWorker {
    handle: Option<JoinHandle<()>>,
}

impl TrackingWorker {
    /// Spawn the worker. The caller must have set the tracking flag
    /// before spawning; clearing it is the cooperative stop signal.
    pub fn spawn<S, E, W>(
        pipeline: Arc<Mutex<Pipeline<S, E>>>,
        state: Arc<ServiceState>,
        output: OutputChannel<W>,
        period: Duration,
    ) -> Self
    where
        S: MeasurementSource + Send + 'static,
        E: GazeEstimator + Send + 'static,
        W: Write + Send + 'static,
    {
        let handle = std::thread::spawn(move || {
            run_loop(&pipeline, &state, &output, period);
        });
        Self { handle: Some(handle) }
    }

    /// Wait for the worker thread to finish its current iteration and
    /// exit. Call after clearing the tracking flag.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Tracking worker thread panicked");
            }
        }
    }
}

fn run_loop<S, E, W>(
    pipeline: &Arc<Mutex<Pipeline<S, E>>>,
    state: &Arc<ServiceState>,
    output: &OutputChannel<W>,
    period: Duration,
) where
    S: MeasurementSource + Send,
    E: GazeEstimator + Send,
    W: Write + Send,
{
    info!("Tracking loop started");
    let mut frames: u64 = 0;

    while state.is_tracking() {
        let started = Instant::now();

        let result = match pipeline.lock() {
            Ok(mut pipeline) => pipeline.sample_gaze(state.is_calibrated()),
            Err(_) => Err(Error::State("Sampling pipeline lock poisoned".to_string())),
        };
        frames += 1;

        match result {
            Ok(report) => {
                state.reset_errors();
                debug!(
                    "Frame {frames}: gaze={:?}, blink={}, no_face={}",
                    report.gaze, report.blink, report.no_face
                );
                if let Err(e) = output.send_gaze_update(&report) {
                    warn!("Failed to emit gaze update: {e}");
                }
            }
            Err(e) => {
                let errors = state.record_error();
                warn!("Frame {frames} error ({errors} consecutive): {e}");
                if let Err(send_err) = output.send_error_event(&e.to_string()) {
                    warn!("Failed to emit error event: {send_err}");
                }
                if errors >= MAX_CONSECUTIVE_ERRORS {
                    warn!("Stopping tracking: {MAX_CONSECUTIVE_ERRORS} consecutive frame errors");
                    state.set_tracking(false);
                    break;
                }
            }
        }

        // Sleep the remainder of the period; an overlong iteration just
        // degrades throughput instead of busy-spinning
        if let Some(remaining) = period.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    state.set_tracking(false);
    info!("Tracking loop stopped after {frames} frames");
}
