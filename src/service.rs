//! The gaze tracking service: command dispatch and the read loop.
//!
//! One service instance owns the calibration session and the worker
//! handle, and shares the sampling pipeline and state flags with the
//! worker. Commands are handled synchronously in arrival order; a
//! blocking command (calibration) delays later responses but never
//! reorders them. Every handler failure is converted into a
//! `success:false` response at the command boundary; nothing here
//! terminates the process.

use crate::calibration::{collect_point, grid_targets, CalibrationSession};
use crate::config::Config;
use crate::estimator::GazeEstimator;
use crate::filters::create_filter;
use crate::protocol::{Command, OutputChannel, Request};
use crate::source::MeasurementSource;
use crate::state::ServiceState;
use crate::worker::{Pipeline, TrackingWorker};
use crate::{Error, Result};
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Long-running gaze tracking service
pub struct GazeService<S, E, W>
where
    S: MeasurementSource + Send + 'static,
    E: GazeEstimator + Send + 'static,
    W: Write + Send + 'static,
{
    config: Config,
    pipeline: Arc<Mutex<Pipeline<S, E>>>,
    state: Arc<ServiceState>,
    session: CalibrationSession,
    output: OutputChannel<W>,
    worker: Option<TrackingWorker>,
}

impl<S, E, W> GazeService<S, E, W>
where
    S: MeasurementSource + Send + 'static,
    E: GazeEstimator + Send + 'static,
    W: Write + Send + 'static,
{
    /// Build a service from a validated configuration and collaborators
    pub fn new(config: Config, source: S, estimator: E, writer: W) -> Result<Self> {
        config.validate()?;
        let filter = create_filter(&config.filter)?;

        Ok(Self {
            pipeline: Arc::new(Mutex::new(Pipeline::new(source, estimator, filter))),
            state: Arc::new(ServiceState::new()),
            session: CalibrationSession::new(),
            output: OutputChannel::new(writer),
            worker: None,
            config,
        })
    }

    /// Shared state flags, for observers and tests
    pub fn state(&self) -> Arc<ServiceState> {
        Arc::clone(&self.state)
    }

    /// Main event loop: emit `ready`, then handle one command per line
    /// until the input ends
    pub fn run<R: BufRead>(&mut self, reader: R) -> Result<()> {
        info!("Gaze tracking service started");
        self.output.send_ready()?;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.handle_line(line)?;
        }

        self.shutdown();
        info!("Gaze tracking service stopped");
        Ok(())
    }

    /// Handle one input line: parse, dispatch, respond.
    ///
    /// Returns an error only when the output channel itself fails; all
    /// command-level failures become `success:false` responses.
    pub fn handle_line(&mut self, line: &str) -> Result<()> {
        let request = match Request::parse(line) {
            Ok(request) => request,
            Err(e) => {
                warn!("{e}");
                return self.output.send_error_event(&e.to_string());
            }
        };

        let command = match request.command {
            Ok(command) => command,
            Err(reason) => {
                warn!("Rejected request: {reason}");
                return self
                    .output
                    .send_response(&request.request_id, false, json!({ "error": reason }));
            }
        };

        debug!("Received command {command:?} (id: {})", request.request_id);
        match self.dispatch(command) {
            Ok(fields) => self.output.send_response(&request.request_id, true, fields),
            Err(e) => {
                warn!("Command failed: {e}");
                self.output
                    .send_response(&request.request_id, false, json!({ "error": e.to_string() }))
            }
        }
    }

    /// Stop the worker and release the source. Called on input EOF.
    pub fn shutdown(&mut self) {
        self.stop_worker();
        if let Ok(mut pipeline) = self.pipeline.lock() {
            pipeline.source.release();
        }
        self.state.set_camera_open(false);
    }

    fn dispatch(&mut self, command: Command) -> Result<Value> {
        match command {
            Command::Ping => Ok(json!({ "message": "pong" })),
            Command::RunCalibration { camera_id } => self.run_calibration(camera_id),
            Command::StartTracking => self.start_tracking(),
            Command::StopTracking => self.stop_tracking(),
            Command::AddCalibrationPoint {
                screen_x,
                screen_y,
                duration_ms,
            } => self.add_calibration_point(screen_x, screen_y, duration_ms),
            Command::TrainModel => self.train_model(),
            Command::ClearCalibration => self.clear_calibration(),
            Command::GetGaze => self.get_gaze(),
            Command::SaveModel { filepath } => self.save_model(filepath),
            Command::LoadModel { filepath } => self.load_model(filepath),
        }
    }

    fn lock_pipeline(&self) -> Result<MutexGuard<'_, Pipeline<S, E>>> {
        self.pipeline
            .lock()
            .map_err(|_| Error::State("Sampling pipeline lock poisoned".to_string()))
    }

    fn stop_worker(&mut self) {
        self.state.set_tracking(false);
        if let Some(worker) = self.worker.take() {
            worker.join();
        }
    }

    /// Blocking batch calibration over the 3x3 target grid. Owns the
    /// measurement source exclusively for its whole duration.
    fn run_calibration(&mut self, camera_id: Option<i32>) -> Result<Value> {
        if self.state.is_tracking() {
            return Err(Error::State(
                "Calibration cannot run while tracking; stop tracking first".to_string(),
            ));
        }

        let camera_id = camera_id.unwrap_or(self.config.source.camera_id);
        info!("Starting calibration (camera_id={camera_id})");

        // A fresh batch calibration supersedes any incremental samples
        self.session.clear();

        let mut pipeline = self.lock_pipeline()?;
        pipeline.ensure_open(camera_id)?;
        self.state.set_camera_open(true);
        // Reborrow so the source and estimator borrows split per field
        let pipeline = &mut *pipeline;

        let targets = grid_targets(
            self.config.calibration.screen_width,
            self.config.calibration.screen_height,
        );
        let mut session = CalibrationSession::new();
        let mut rejected = 0usize;

        for target in targets {
            match collect_point(
                &mut pipeline.source,
                &pipeline.estimator,
                target,
                &self.config.calibration,
                None,
            ) {
                Ok(samples) => session.accept_point(samples),
                Err(Error::InsufficientSamples { got, needed }) => {
                    warn!(
                        "Calibration point ({:.0}, {:.0}) fell short: {got} of {needed} samples",
                        target.0, target.1
                    );
                    rejected += 1;
                }
                // Cancellation or a hard failure aborts the whole run;
                // state reverts to what it was before
                Err(e) => return Err(e),
            }
        }

        let points_accepted = session.points_accepted();
        let (features, targets) =
            session.take_training_set(self.config.calibration.min_training_samples)?;
        let sample_count = features.len();

        pipeline.estimator.train(&features, &targets)?;
        pipeline.filter.reset();
        self.state.set_calibrated(true);

        info!("Calibration complete: {sample_count} samples over {points_accepted} points");
        Ok(json!({
            "message": "Calibration completed successfully",
            "points_accepted": points_accepted,
            "points_rejected": rejected,
            "samples": sample_count,
            "is_calibrated": true,
        }))
    }

    fn add_calibration_point(
        &mut self,
        screen_x: f64,
        screen_y: f64,
        duration_ms: Option<u64>,
    ) -> Result<Value> {
        if self.state.is_tracking() {
            return Err(Error::State(
                "Calibration samples cannot be collected while tracking".to_string(),
            ));
        }

        let samples = {
            let mut pipeline = self.lock_pipeline()?;
            pipeline.ensure_open(self.config.source.camera_id)?;
            self.state.set_camera_open(true);
            let pipeline = &mut *pipeline;

            collect_point(
                &mut pipeline.source,
                &pipeline.estimator,
                (screen_x, screen_y),
                &self.config.calibration,
                duration_ms.map(Duration::from_millis),
            )?
        };

        let accepted = samples.len();
        self.session.accept_point(samples);
        Ok(json!({
            "accepted": accepted,
            "total_samples": self.session.sample_count(),
            "points_accepted": self.session.points_accepted(),
        }))
    }

    fn train_model(&mut self) -> Result<Value> {
        let (features, targets) = self
            .session
            .take_training_set(self.config.calibration.min_training_samples)?;
        let sample_count = features.len();

        let mut pipeline = self.lock_pipeline()?;
        pipeline.estimator.train(&features, &targets)?;
        pipeline.filter.reset();
        self.state.set_calibrated(true);

        info!("Model trained on {sample_count} samples");
        Ok(json!({
            "message": "Model trained successfully",
            "samples": sample_count,
            "is_calibrated": true,
        }))
    }

    fn start_tracking(&mut self) -> Result<Value> {
        if !self.state.is_calibrated() {
            return Err(Error::State(
                "Must calibrate first. Run 'run_calibration' command.".to_string(),
            ));
        }
        if self.state.is_tracking() {
            debug!("Already tracking");
            return Ok(json!({ "message": "Already tracking" }));
        }

        {
            let mut pipeline = self.lock_pipeline()?;
            pipeline.ensure_open(self.config.source.camera_id)?;
            self.state.set_camera_open(true);
        }

        // Reap a worker that self-terminated earlier so at most one
        // thread is ever live
        if let Some(worker) = self.worker.take() {
            worker.join();
        }

        // A fresh worker starts with its full failure budget
        self.state.reset_errors();
        self.state.set_tracking(true);
        self.worker = Some(TrackingWorker::spawn(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.state),
            self.output.clone(),
            Duration::from_millis(self.config.tracking.period_ms),
        ));

        info!("Tracking started");
        Ok(json!({ "message": "Tracking started" }))
    }

    fn stop_tracking(&mut self) -> Result<Value> {
        self.stop_worker();
        info!("Tracking stopped");
        Ok(json!({ "message": "Tracking stopped" }))
    }

    fn clear_calibration(&mut self) -> Result<Value> {
        self.stop_worker();
        self.session.clear();

        let mut pipeline = self.lock_pipeline()?;
        pipeline.estimator.clear();
        pipeline.filter.reset();
        self.state.set_calibrated(false);

        info!("Calibration cleared");
        Ok(json!({ "message": "Calibration cleared" }))
    }

    fn get_gaze(&mut self) -> Result<Value> {
        let mut pipeline = self.lock_pipeline()?;
        pipeline.ensure_open(self.config.source.camera_id)?;
        self.state.set_camera_open(true);

        let report = pipeline.sample_gaze(self.state.is_calibrated())?;
        Ok(serde_json::to_value(report)?)
    }

    fn save_model(&mut self, filepath: Option<PathBuf>) -> Result<Value> {
        if !self.state.is_calibrated() {
            return Err(Error::Model("No trained model to save".to_string()));
        }

        let path = filepath.unwrap_or_else(|| self.config.model.path.clone());
        let pipeline = self.lock_pipeline()?;
        pipeline.estimator.save(&path)?;

        info!("Model saved to {}", path.display());
        Ok(json!({ "path": path.display().to_string() }))
    }

    fn load_model(&mut self, filepath: Option<PathBuf>) -> Result<Value> {
        let path = filepath.unwrap_or_else(|| self.config.model.path.clone());

        let mut pipeline = self.lock_pipeline()?;
        pipeline.estimator.load(&path)?;
        pipeline.filter.reset();
        self.state.set_calibrated(true);

        info!("Model loaded from {}", path.display());
        Ok(json!({
            "path": path.display().to_string(),
            "message": "Model loaded. Start tracking now!",
        }))
    }
}

impl<S, E, W> Drop for GazeService<S, E, W>
where
    S: MeasurementSource + Send + 'static,
    E: GazeEstimator + Send + 'static,
    W: Write + Send + 'static,
{
    fn drop(&mut self) {
        self.stop_worker();
    }
}
